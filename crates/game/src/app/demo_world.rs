use outpost_engine::{
    BuildingTier, Catalog, Health, Pose, QuestLog, QuestProgress, ResourceCounters, SceneWorld,
    Vec3, WorldHandle,
};
use tracing::{info, warn};

const PLAYER_MAX_HEALTH: f32 = 100.0;
const ENEMY_MAX_HEALTH: f32 = 100.0;
const STARTING_RESOURCES: ResourceCounters = ResourceCounters {
    wood: 50,
    stone: 20,
    gold: 10,
};

/// Seeds the world a new session starts in: the player, a starting hut,
/// two villagers, a few enemies and the quest log with its first quest taken.
pub(crate) fn seed_world(catalog: &Catalog) -> SceneWorld {
    let mut world = SceneWorld::default();
    world.spawn_player(Pose::default(), PLAYER_MAX_HEALTH);
    world.set_economy(Some(STARTING_RESOURCES));

    let tiers = catalog.building_tiers();
    match tiers.get(BuildingTier::Base) {
        Some(def) => {
            world.spawn_building(def, Pose::at(Vec3::new(4.0, 0.0, 4.0)), 1);
        }
        None => warn!("demo_world_has_no_base_building"),
    }
    world.set_building_tiers(tiers);

    world.spawn_npc("Blacksmith", Pose::at(Vec3::new(-3.0, 0.0, 2.0)));
    world.spawn_npc("Trader", Pose::at(Vec3::new(-5.0, 0.0, -1.0)));
    for (index, x) in [12.0, 15.0, 18.0].into_iter().enumerate() {
        world.spawn_enemy(
            &format!("Enemy_{:02}", index + 1),
            Pose::at(Vec3::new(x, 0.0, 10.0)),
            Health::full(ENEMY_MAX_HEALTH),
        );
    }

    let mut quest_log = QuestLog::from_catalog(catalog);
    if let Some(id) = quest_log.activate_first() {
        info!(quest_id = id, "quest_activated");
    }
    world.set_quest_log(quest_log);
    world.apply_pending();
    world
}

/// Adds quest progress and pays out the gold reward on completion.
pub(crate) fn advance_quest(
    world: &mut SceneWorld,
    quest_id: i32,
    objective_index: usize,
    amount: u32,
) -> Option<QuestProgress> {
    let progress = world
        .quest_log_mut()?
        .record_progress(quest_id, objective_index, amount)?;
    if let QuestProgress::Completed { gold_reward, .. } = progress {
        if let Some(mut counters) = world.resources() {
            counters.gold = counters.gold.saturating_add(gold_reward);
            world.set_resources(counters);
            world.refresh_resource_ui();
        }
        info!(quest_id, gold_reward, "quest_completed");
    }
    world.refresh_quest_ui();
    Some(progress)
}

/// Adds (or with a negative amount removes) resources, never going below 0.
pub(crate) fn give_resource(world: &mut SceneWorld, resource: &str, amount: i64) -> Option<u32> {
    let mut counters = world.resources()?;
    let counter = match resource {
        "wood" => &mut counters.wood,
        "stone" => &mut counters.stone,
        "gold" => &mut counters.gold,
        _ => return None,
    };
    let updated = (i64::from(*counter) + amount).clamp(0, i64::from(u32::MAX));
    *counter = u32::try_from(updated).unwrap_or(u32::MAX);
    let value = *counter;
    world.set_resources(counters);
    world.refresh_resource_ui();
    Some(value)
}
