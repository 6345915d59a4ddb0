use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::world::WorldHandle;

use super::error::CaptureError;
use super::snapshot::{
    BuildingSnapshot, EnemySnapshot, NpcSnapshot, ObjectiveSnapshot, PlayerSnapshot,
    QuestSnapshot, ResourceSnapshot, SavedQuat, SavedVec3, Snapshot, SAVE_VERSION,
};

/// Reads the live world into a snapshot without mutating it.
///
/// A world without an economy or quest log captures zero counters and no
/// quests. Inventory is not captured yet and always comes out empty.
pub fn capture_world(
    world: &impl WorldHandle,
    name: &str,
    saved_at: DateTime<Utc>,
) -> Result<Snapshot, CaptureError> {
    let player = world.player().ok_or(CaptureError::MissingPlayer)?;

    let buildings = world
        .buildings()
        .iter()
        .map(|building| BuildingSnapshot {
            name: building.display_name().to_string(),
            position: SavedVec3::from_vec3(building.pose.position),
            rotation: SavedQuat::from_quat(building.pose.rotation),
            level: building.level.max(1),
            can_be_upgraded: building.can_be_upgraded,
        })
        .collect::<Vec<_>>();

    let resources = world
        .resources()
        .map(|counters| ResourceSnapshot {
            wood: i64::from(counters.wood),
            stone: i64::from(counters.stone),
            gold: i64::from(counters.gold),
        })
        .unwrap_or_default();

    let quests = world
        .quest_log()
        .map(|log| {
            log.quests()
                .iter()
                .map(|quest| QuestSnapshot {
                    id: quest.id,
                    is_active: quest.is_active,
                    is_completed: quest.is_completed,
                    objectives: quest
                        .objectives
                        .iter()
                        .map(|objective| ObjectiveSnapshot {
                            current_amount: objective.current_amount,
                            is_completed: objective.is_completed,
                        })
                        .collect(),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let npcs = world
        .npcs()
        .into_iter()
        .map(|npc| NpcSnapshot {
            entity_id: Some(npc.id.0),
            name: npc.name,
            position: SavedVec3::from_vec3(npc.pose.position),
            rotation: SavedQuat::from_quat(npc.pose.rotation),
            is_alive: true,
        })
        .collect::<Vec<_>>();

    let enemies = world
        .enemies()
        .into_iter()
        .map(|enemy| EnemySnapshot {
            entity_id: Some(enemy.id.0),
            name: enemy.name,
            position: SavedVec3::from_vec3(enemy.pose.position),
            rotation: SavedQuat::from_quat(enemy.pose.rotation),
            health: enemy.health.max(0.0),
            is_alive: enemy.health > 0.0,
        })
        .collect::<Vec<_>>();

    debug!(
        name,
        buildings = buildings.len(),
        quests = quests.len(),
        npcs = npcs.len(),
        enemies = enemies.len(),
        "world_captured"
    );

    Ok(Snapshot {
        save_version: SAVE_VERSION,
        name: name.to_string(),
        saved_at,
        player: PlayerSnapshot {
            position: SavedVec3::from_vec3(player.pose.position),
            rotation: SavedQuat::from_quat(player.pose.rotation),
            health: player.health.min(player.max_health).max(0.0),
            inventory: BTreeMap::new(),
        },
        buildings,
        resources,
        quests,
        npcs,
        enemies,
    })
}
