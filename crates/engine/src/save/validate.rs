use std::collections::HashMap;
use std::fmt::Display;

use super::error::DeserializationError;
use super::snapshot::{SavedQuat, SavedVec3, Snapshot, SAVE_VERSION};

type ValidationResult = Result<(), DeserializationError>;

/// Parses and validates a save file body. Nothing is handed to restore unless
/// the whole document passes.
pub fn parse_snapshot_json(raw: &str) -> Result<Snapshot, DeserializationError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let snapshot = match serde_path_to_error::deserialize::<_, Snapshot>(&mut deserializer) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            return if path.is_empty() || path == "." {
                Err(DeserializationError::Json { source })
            } else {
                Err(DeserializationError::JsonAt { path, source })
            };
        }
    };
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

fn validation_err(path: &str, message: impl Into<String>) -> DeserializationError {
    DeserializationError::Validation {
        path: path.to_string(),
        message: message.into(),
    }
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> DeserializationError {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

fn check_finite(path: &str, value: f32) -> ValidationResult {
    if value.is_finite() {
        Ok(())
    } else {
        Err(expected_actual(path, "finite number", value))
    }
}

fn check_vec3(path: &str, value: SavedVec3) -> ValidationResult {
    check_finite(&format!("{path}.x"), value.x)?;
    check_finite(&format!("{path}.y"), value.y)?;
    check_finite(&format!("{path}.z"), value.z)
}

fn check_quat(path: &str, value: SavedQuat) -> ValidationResult {
    check_finite(&format!("{path}.x"), value.x)?;
    check_finite(&format!("{path}.y"), value.y)?;
    check_finite(&format!("{path}.z"), value.z)?;
    check_finite(&format!("{path}.w"), value.w)
}

fn check_health(path: &str, value: f32) -> ValidationResult {
    check_finite(path, value)?;
    if value < 0.0 {
        return Err(expected_actual(path, ">= 0", value));
    }
    Ok(())
}

pub fn validate_snapshot(snapshot: &Snapshot) -> ValidationResult {
    if snapshot.save_version == 0 || snapshot.save_version > SAVE_VERSION {
        return Err(expected_actual(
            "save_version",
            format!("1..={SAVE_VERSION}"),
            snapshot.save_version,
        ));
    }

    check_vec3("player.position", snapshot.player.position)?;
    check_quat("player.rotation", snapshot.player.rotation)?;
    check_health("player.health", snapshot.player.health)?;

    for (index, building) in snapshot.buildings.iter().enumerate() {
        check_vec3(&format!("buildings[{index}].position"), building.position)?;
        check_quat(&format!("buildings[{index}].rotation"), building.rotation)?;
        if building.level < 1 {
            return Err(expected_actual(
                &format!("buildings[{index}].level"),
                ">= 1",
                building.level,
            ));
        }
    }

    let mut known_quest_ids = HashMap::with_capacity(snapshot.quests.len());
    for (index, quest) in snapshot.quests.iter().enumerate() {
        if let Some(first_index) = known_quest_ids.insert(quest.id, index) {
            return Err(validation_err(
                &format!("quests[{index}].id"),
                format!(
                    "duplicate quest id {} (first seen at quests[{first_index}].id)",
                    quest.id
                ),
            ));
        }
        if quest.is_completed {
            if let Some(objective_index) = quest
                .objectives
                .iter()
                .position(|objective| !objective.is_completed)
            {
                return Err(validation_err(
                    &format!("quests[{index}].objectives[{objective_index}].is_completed"),
                    format!("quest {} is completed but this objective is not", quest.id),
                ));
            }
        }
    }

    let mut known_entity_ids = HashMap::<u64, String>::new();
    let mut claim_entity_id = |path: String, entity_id: Option<u64>| -> ValidationResult {
        let Some(entity_id) = entity_id else {
            return Ok(());
        };
        if let Some(first_path) = known_entity_ids.insert(entity_id, path.clone()) {
            return Err(validation_err(
                &path,
                format!("duplicate entity_id {entity_id} (first seen at {first_path})"),
            ));
        }
        Ok(())
    };

    for (index, npc) in snapshot.npcs.iter().enumerate() {
        claim_entity_id(format!("npcs[{index}].entity_id"), npc.entity_id)?;
        check_vec3(&format!("npcs[{index}].position"), npc.position)?;
        check_quat(&format!("npcs[{index}].rotation"), npc.rotation)?;
    }

    for (index, enemy) in snapshot.enemies.iter().enumerate() {
        claim_entity_id(format!("enemies[{index}].entity_id"), enemy.entity_id)?;
        check_vec3(&format!("enemies[{index}].position"), enemy.position)?;
        check_quat(&format!("enemies[{index}].rotation"), enemy.rotation)?;
        check_health(&format!("enemies[{index}].health"), enemy.health)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn base_json() -> serde_json::Value {
        json!({
            "save_version": 1,
            "name": "save_1",
            "saved_at": "2026-03-01T10:15:00Z",
            "player": {
                "position": { "x": 1.0, "y": 0.0, "z": 2.0 },
                "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 },
                "health": 75.0,
                "inventory": {}
            },
            "buildings": [
                { "name": "Hut", "position": { "x": 1.0, "y": 0.0, "z": 2.0 }, "level": 1, "can_be_upgraded": true }
            ],
            "resources": { "wood": 100, "stone": 20, "gold": 5 },
            "quests": [
                {
                    "id": 7,
                    "is_active": true,
                    "is_completed": false,
                    "objectives": [
                        { "current_amount": 3, "is_completed": true },
                        { "current_amount": 1, "is_completed": false }
                    ]
                }
            ],
            "npcs": [
                { "entity_id": 4, "name": "Trader", "position": { "x": 0.0, "y": 0.0, "z": 0.0 } }
            ],
            "enemies": [
                { "entity_id": 5, "name": "Enemy_03", "position": { "x": 9.0, "y": 0.0, "z": 9.0 }, "health": 40.0, "is_alive": true }
            ]
        })
    }

    fn parse(value: serde_json::Value) -> Result<Snapshot, DeserializationError> {
        parse_snapshot_json(&value.to_string())
    }

    fn validation_path(error: DeserializationError) -> String {
        match error {
            DeserializationError::Validation { path, .. } => path,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn parses_valid_snapshot_with_defaults() {
        let snapshot = parse(base_json()).expect("parse");
        assert_eq!(snapshot.quests[0].objectives[1].current_amount, 1);
        assert!(snapshot.npcs[0].is_alive);
        assert_eq!(snapshot.buildings[0].rotation, SavedQuat::default());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut value = base_json();
        value["weather"] = json!("rain");
        value["player"]["stamina"] = json!(12);
        assert!(parse(value).is_ok());
    }

    #[test]
    fn reports_missing_required_field_path() {
        let mut value = base_json();
        value["player"]
            .as_object_mut()
            .expect("player object")
            .remove("health");
        let error = parse(value).expect_err("missing health").to_string();
        assert!(error.contains("parse save json"));
        assert!(error.contains("player"));
        assert!(error.contains("missing field `health`"));
    }

    #[test]
    fn reports_type_mismatch_path() {
        let mut value = base_json();
        value["buildings"][0]["level"] = json!("high");
        let error = parse(value).expect_err("bad level");
        match error {
            DeserializationError::JsonAt { path, .. } => assert_eq!(path, "buildings[0].level"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn syntax_error_has_no_path() {
        let error = parse_snapshot_json("{ not json").expect_err("syntax");
        assert!(matches!(error, DeserializationError::Json { .. }));
    }

    #[test]
    fn rejects_newer_save_version() {
        let mut value = base_json();
        value["save_version"] = json!(SAVE_VERSION + 1);
        assert_eq!(validation_path(parse(value).expect_err("version")), "save_version");
    }

    #[test]
    fn rejects_level_zero_building() {
        let mut value = base_json();
        value["buildings"][0]["level"] = json!(0);
        assert_eq!(
            validation_path(parse(value).expect_err("level")),
            "buildings[0].level"
        );
    }

    #[test]
    fn rejects_completed_quest_with_open_objective() {
        let mut value = base_json();
        value["quests"][0]["is_completed"] = json!(true);
        assert_eq!(
            validation_path(parse(value).expect_err("quest")),
            "quests[0].objectives[1].is_completed"
        );
    }

    #[test]
    fn rejects_duplicate_entity_ids_across_npcs_and_enemies() {
        let mut value = base_json();
        value["enemies"][0]["entity_id"] = json!(4);
        let error = parse(value).expect_err("duplicate");
        assert_eq!(validation_path(error), "enemies[0].entity_id");
    }

    #[test]
    fn rejects_negative_enemy_health() {
        let mut value = base_json();
        value["enemies"][0]["health"] = json!(-1.0);
        assert_eq!(
            validation_path(parse(value).expect_err("health")),
            "enemies[0].health"
        );
    }
}
