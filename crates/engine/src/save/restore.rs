use std::collections::HashSet;

use tracing::{info, warn};

use crate::world::{ActorView, EnemyView, EntityId, ResourceCounters, WorldHandle};

use super::error::{RestoreError, RestoreMismatch};
use super::snapshot::{
    saved_pose, BuildingSnapshot, EnemySnapshot, NpcSnapshot, PlayerSnapshot, QuestSnapshot,
    ResourceSnapshot, Snapshot,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub mismatches: Vec<RestoreMismatch>,
    pub buildings_destroyed: usize,
    pub buildings_restored: usize,
    pub quests_restored: usize,
    pub npcs_moved: usize,
    pub enemies_updated: usize,
    pub enemies_destroyed: usize,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    fn mismatch(&mut self, mismatch: RestoreMismatch) {
        warn!(mismatch = %mismatch, "restore_mismatch");
        self.mismatches.push(mismatch);
    }
}

/// Reconciles the live world with `snapshot`.
///
/// Order: player, buildings, resources, quests, NPCs, enemies. Entries that
/// cannot be matched are recorded in the report and skipped. Queued spawns
/// and despawns are applied before returning.
pub fn restore_world(
    world: &mut impl WorldHandle,
    snapshot: &Snapshot,
) -> Result<RestoreReport, RestoreError> {
    let current_health = world.player().ok_or(RestoreError::MissingPlayer)?.health;
    let mut report = RestoreReport::default();

    restore_player(world, &snapshot.player, current_health, &mut report);
    restore_buildings(world, &snapshot.buildings, &mut report);
    restore_resources(world, snapshot.resources, &mut report);
    restore_quests(world, &snapshot.quests, &mut report);
    restore_npcs(world, &snapshot.npcs, &mut report);
    restore_enemies(world, &snapshot.enemies, &mut report);
    world.apply_pending();

    info!(
        name = %snapshot.name,
        buildings = report.buildings_restored,
        quests = report.quests_restored,
        npcs = report.npcs_moved,
        enemies_updated = report.enemies_updated,
        enemies_destroyed = report.enemies_destroyed,
        mismatches = report.mismatches.len(),
        "world_restored"
    );
    Ok(report)
}

fn restore_player(
    world: &mut impl WorldHandle,
    saved: &PlayerSnapshot,
    current_health: f32,
    report: &mut RestoreReport,
) {
    // Teleporting with the controller active lets it push the player back.
    world.set_player_controller_enabled(false);
    world.set_player_pose(saved_pose(saved.position, saved.rotation));
    world.set_player_controller_enabled(true);

    let delta = saved.health - current_health;
    if delta < 0.0 {
        world.damage_player(-delta);
    } else if delta > 0.0 {
        world.heal_player(delta);
    }

    if !saved.inventory.is_empty() {
        report.mismatch(RestoreMismatch::InventoryNotRestored {
            entries: saved.inventory.len(),
        });
    }
}

fn restore_buildings(
    world: &mut impl WorldHandle,
    saved: &[BuildingSnapshot],
    report: &mut RestoreReport,
) {
    // Queued spawns are not enumerable until applied.
    world.apply_pending();
    world.clear_current_building();
    for building in world.buildings() {
        if world.destroy_entity(building.id) {
            report.buildings_destroyed += 1;
        }
    }

    let tiers = world.building_tiers().unwrap_or_default();
    for building in saved {
        let Some(def) = tiers.for_level(building.level) else {
            report.mismatch(RestoreMismatch::MissingBuildingTier {
                name: building.name.clone(),
                level: building.level,
            });
            continue;
        };
        let id = world.instantiate_building(
            def,
            saved_pose(building.position, building.rotation),
            building.level,
            &building.name,
        );
        world.set_building_colliders_enabled(id, true);
        world.register_current_building(id);
        report.buildings_restored += 1;
    }
}

fn clamp_counter(
    resource: &'static str,
    value: i64,
    report: &mut RestoreReport,
) -> u32 {
    if value < 0 {
        report.mismatch(RestoreMismatch::NegativeResourceClamped { resource, value });
        return 0;
    }
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn restore_resources(
    world: &mut impl WorldHandle,
    saved: ResourceSnapshot,
    report: &mut RestoreReport,
) {
    let counters = ResourceCounters {
        wood: clamp_counter("wood", saved.wood, report),
        stone: clamp_counter("stone", saved.stone, report),
        gold: clamp_counter("gold", saved.gold, report),
    };
    if world.set_resources(counters) {
        world.refresh_resource_ui();
    } else if counters != ResourceCounters::default() {
        report.mismatch(RestoreMismatch::EconomyUnavailable);
    }
}

fn restore_quests(world: &mut impl WorldHandle, saved: &[QuestSnapshot], report: &mut RestoreReport) {
    if saved.is_empty() {
        return;
    }
    let Some(log) = world.quest_log_mut() else {
        report.mismatch(RestoreMismatch::QuestLogUnavailable {
            quests: saved.len(),
        });
        return;
    };

    let mut mismatches = Vec::new();
    let mut restored = 0;
    for quest in saved {
        let Some(live) = log.quest_mut(quest.id) else {
            mismatches.push(RestoreMismatch::UnknownQuest { id: quest.id });
            continue;
        };
        live.is_active = quest.is_active;
        live.is_completed = quest.is_completed;
        let copied = live.objectives.len().min(quest.objectives.len());
        for (objective, saved_objective) in live.objectives.iter_mut().zip(&quest.objectives) {
            objective.current_amount = saved_objective.current_amount;
            objective.is_completed = saved_objective.is_completed;
        }
        if live.objectives.len() != quest.objectives.len() {
            mismatches.push(RestoreMismatch::ObjectiveCountMismatch {
                id: quest.id,
                saved: quest.objectives.len(),
                live: live.objectives.len(),
                copied,
            });
        }
        restored += 1;
    }

    report.quests_restored += restored;
    for mismatch in mismatches {
        report.mismatch(mismatch);
    }
    world.refresh_quest_ui();
}

trait LiveActor {
    fn entity_id(&self) -> EntityId;
    fn actor_name(&self) -> &str;
}

impl LiveActor for ActorView {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn actor_name(&self) -> &str {
        &self.name
    }
}

impl LiveActor for EnemyView {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn actor_name(&self) -> &str {
        &self.name
    }
}

/// Picks the live actor for a saved entry: the same stable id and name
/// first, then the first unclaimed actor with the same name. Each live actor
/// is claimed at most once per restore.
fn claim_actor<'a, T: LiveActor>(
    live: &'a [T],
    claimed: &mut HashSet<EntityId>,
    entity_id: Option<u64>,
    name: &str,
) -> Option<&'a T> {
    let unclaimed_named = |actor: &&T| {
        actor.actor_name() == name && !claimed.contains(&actor.entity_id())
    };
    let found = entity_id
        .and_then(|saved_id| {
            live.iter()
                .filter(unclaimed_named)
                .find(|actor| actor.entity_id().0 == saved_id)
        })
        .or_else(|| live.iter().find(unclaimed_named))?;
    claimed.insert(found.entity_id());
    Some(found)
}

fn restore_npcs(world: &mut impl WorldHandle, saved: &[NpcSnapshot], report: &mut RestoreReport) {
    let live = world.npcs();
    let mut claimed = HashSet::new();
    for npc in saved {
        let Some(actor) = claim_actor(&live, &mut claimed, npc.entity_id, &npc.name) else {
            report.mismatch(RestoreMismatch::NpcNotFound {
                name: npc.name.clone(),
                entity_id: npc.entity_id,
            });
            continue;
        };
        if world.set_actor_pose(actor.id, saved_pose(npc.position, npc.rotation)) {
            report.npcs_moved += 1;
        }
    }
}

fn restore_enemies(
    world: &mut impl WorldHandle,
    saved: &[EnemySnapshot],
    report: &mut RestoreReport,
) {
    let live = world.enemies();
    let mut claimed = HashSet::new();
    for enemy in saved {
        let Some(actor) = claim_actor(&live, &mut claimed, enemy.entity_id, &enemy.name) else {
            // A dead enemy that is already gone needs nothing.
            if enemy.is_alive {
                report.mismatch(RestoreMismatch::EnemyNotFound {
                    name: enemy.name.clone(),
                    entity_id: enemy.entity_id,
                });
            }
            continue;
        };
        if enemy.is_alive {
            world.set_actor_pose(actor.id, saved_pose(enemy.position, enemy.rotation));
            world.set_enemy_health(actor.id, enemy.health);
            report.enemies_updated += 1;
        } else if world.destroy_entity(actor.id) {
            report.enemies_destroyed += 1;
        }
    }
}
