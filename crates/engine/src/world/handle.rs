use crate::content::{BuildingDef, BuildingTiers};

use super::math::Pose;
use super::quests::QuestLog;
use super::scene::{EntityId, EntityKind, Health, HostEvent, SceneWorld, CLONE_SUFFIX};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounters {
    pub wood: u32,
    pub stone: u32,
    pub gold: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerView {
    pub id: EntityId,
    pub pose: Pose,
    pub health: f32,
    pub max_health: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingView {
    pub id: EntityId,
    pub name: String,
    pub pose: Pose,
    pub level: u32,
    pub can_be_upgraded: bool,
}

impl BuildingView {
    /// Name without the clone suffix added on instantiation.
    pub fn display_name(&self) -> &str {
        self.name.strip_suffix(CLONE_SUFFIX).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorView {
    pub id: EntityId,
    pub name: String,
    pub pose: Pose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemyView {
    pub id: EntityId,
    pub name: String,
    pub pose: Pose,
    pub health: f32,
}

/// Capabilities the save core needs from a live world.
///
/// Enumeration methods only report entities that exist right now; work queued
/// by `instantiate_building` or `destroy_entity` becomes visible after
/// `apply_pending`. Mutators return `false` when their target is gone.
pub trait WorldHandle {
    fn player(&self) -> Option<PlayerView>;
    fn buildings(&self) -> Vec<BuildingView>;
    fn npcs(&self) -> Vec<ActorView>;
    fn enemies(&self) -> Vec<EnemyView>;
    fn resources(&self) -> Option<ResourceCounters>;
    fn quest_log(&self) -> Option<&QuestLog>;
    fn quest_log_mut(&mut self) -> Option<&mut QuestLog>;
    fn building_tiers(&self) -> Option<BuildingTiers>;

    fn instantiate_building(
        &mut self,
        def: &BuildingDef,
        pose: Pose,
        level: u32,
        name: &str,
    ) -> EntityId;
    fn set_building_colliders_enabled(&mut self, id: EntityId, enabled: bool) -> bool;
    fn destroy_entity(&mut self, id: EntityId) -> bool;
    fn register_current_building(&mut self, id: EntityId);
    fn clear_current_building(&mut self);

    fn set_player_controller_enabled(&mut self, enabled: bool);
    fn set_player_pose(&mut self, pose: Pose) -> bool;
    fn damage_player(&mut self, amount: f32);
    fn heal_player(&mut self, amount: f32);

    fn set_actor_pose(&mut self, id: EntityId, pose: Pose) -> bool;
    fn set_enemy_health(&mut self, id: EntityId, health: f32) -> bool;

    fn set_resources(&mut self, counters: ResourceCounters) -> bool;
    fn refresh_resource_ui(&mut self);
    fn refresh_quest_ui(&mut self);

    fn apply_pending(&mut self);
}

impl WorldHandle for SceneWorld {
    fn player(&self) -> Option<PlayerView> {
        let entity = self.player_entity()?;
        let health = entity.health.unwrap_or_else(|| Health::full(0.0));
        Some(PlayerView {
            id: entity.id,
            pose: entity.pose,
            health: health.current,
            max_health: health.max,
        })
    }

    fn buildings(&self) -> Vec<BuildingView> {
        self.entities_of(EntityKind::Building)
            .filter_map(|entity| {
                let building = entity.building.as_ref()?;
                Some(BuildingView {
                    id: entity.id,
                    name: entity.name.clone(),
                    pose: entity.pose,
                    level: building.level,
                    can_be_upgraded: building.can_be_upgraded,
                })
            })
            .collect()
    }

    fn npcs(&self) -> Vec<ActorView> {
        self.entities_of(EntityKind::Npc)
            .map(|entity| ActorView {
                id: entity.id,
                name: entity.name.clone(),
                pose: entity.pose,
            })
            .collect()
    }

    fn enemies(&self) -> Vec<EnemyView> {
        self.entities_of(EntityKind::Enemy)
            .map(|entity| EnemyView {
                id: entity.id,
                name: entity.name.clone(),
                pose: entity.pose,
                health: entity.health.map(|health| health.current).unwrap_or(0.0),
            })
            .collect()
    }

    fn resources(&self) -> Option<ResourceCounters> {
        self.resource_counters()
    }

    fn quest_log(&self) -> Option<&QuestLog> {
        self.quests()
    }

    fn quest_log_mut(&mut self) -> Option<&mut QuestLog> {
        self.quests_mut()
    }

    fn building_tiers(&self) -> Option<BuildingTiers> {
        self.tiers().cloned()
    }

    fn instantiate_building(
        &mut self,
        def: &BuildingDef,
        pose: Pose,
        level: u32,
        name: &str,
    ) -> EntityId {
        let id = self.spawn_building(def, pose, level);
        if let Some(entity) = self.find_any_mut(id) {
            entity.name = name.to_string();
        }
        id
    }

    fn set_building_colliders_enabled(&mut self, id: EntityId, enabled: bool) -> bool {
        match self
            .find_any_mut(id)
            .and_then(|entity| entity.building.as_mut())
        {
            Some(building) => {
                building.colliders_enabled = enabled;
                true
            }
            None => false,
        }
    }

    fn destroy_entity(&mut self, id: EntityId) -> bool {
        self.despawn(id)
    }

    fn register_current_building(&mut self, id: EntityId) {
        self.set_current_building(Some(id));
    }

    fn clear_current_building(&mut self) {
        self.set_current_building(None);
    }

    fn set_player_controller_enabled(&mut self, enabled: bool) {
        self.set_controller_enabled(enabled);
    }

    fn set_player_pose(&mut self, pose: Pose) -> bool {
        match self.player_entity_mut() {
            Some(entity) => {
                entity.pose = pose;
                true
            }
            None => false,
        }
    }

    fn damage_player(&mut self, amount: f32) {
        self.change_player_health(|health| health.damage(amount));
    }

    fn heal_player(&mut self, amount: f32) {
        self.change_player_health(|health| health.heal(amount));
    }

    fn set_actor_pose(&mut self, id: EntityId, pose: Pose) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) if matches!(entity.kind, EntityKind::Npc | EntityKind::Enemy) => {
                entity.pose = pose;
                true
            }
            _ => false,
        }
    }

    fn set_enemy_health(&mut self, id: EntityId, health: f32) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) if entity.kind == EntityKind::Enemy => match entity.health.as_mut() {
                Some(current) => {
                    current.set(health);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn set_resources(&mut self, counters: ResourceCounters) -> bool {
        match self.resources_slot() {
            Some(current) => {
                *current = counters;
                true
            }
            None => false,
        }
    }

    fn refresh_resource_ui(&mut self) {
        if let Some(counters) = self.resource_counters() {
            self.push_event(HostEvent::ResourceUiRefreshed(counters));
        }
    }

    fn refresh_quest_ui(&mut self) {
        if self.quests().is_some() {
            self.push_event(HostEvent::QuestUiRefreshed);
        }
    }

    fn apply_pending(&mut self) {
        SceneWorld::apply_pending(self);
    }
}

impl SceneWorld {
    fn change_player_health(&mut self, change: impl FnOnce(&mut Health)) {
        let Some(health) = self
            .player_entity_mut()
            .and_then(|entity| entity.health.as_mut())
        else {
            return;
        };
        let before = health.current;
        change(health);
        let event = HostEvent::HealthChanged {
            current: health.current,
            max: health.max,
        };
        if health.current != before {
            self.push_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::BuildingTier;
    use crate::world::Vec3;

    fn world_with_player() -> SceneWorld {
        let mut world = SceneWorld::default();
        world.spawn_player(Pose::default(), 100.0);
        world.apply_pending();
        world
    }

    #[test]
    fn player_health_changes_emit_events() {
        let mut world = world_with_player();
        world.damage_player(30.0);
        world.heal_player(10.0);
        world.heal_player(0.0);

        let mut events = Vec::new();
        world.drain_host_events_into(&mut events);
        assert_eq!(
            events,
            vec![
                HostEvent::HealthChanged {
                    current: 70.0,
                    max: 100.0
                },
                HostEvent::HealthChanged {
                    current: 80.0,
                    max: 100.0
                },
            ]
        );
        assert_eq!(world.player().expect("player").health, 80.0);
    }

    #[test]
    fn instantiated_building_is_renamed_before_apply() {
        let mut world = world_with_player();
        let def = BuildingDef {
            def_name: "hut".to_string(),
            label: "Hut".to_string(),
            prefab: "Hut".to_string(),
            tier: BuildingTier::Base,
            wood_cost: 0,
            stone_cost: 0,
            gold_cost: 0,
            upgrade_to: None,
        };
        let id = world.instantiate_building(&def, Pose::default(), 2, "Farmhouse");
        assert!(world.set_building_colliders_enabled(id, true));
        assert!(world.buildings().is_empty());

        WorldHandle::apply_pending(&mut world);
        let buildings = world.buildings();
        assert_eq!(buildings.len(), 1);
        assert_eq!(buildings[0].name, "Farmhouse");
        assert_eq!(buildings[0].level, 2);
        assert!(!buildings[0].can_be_upgraded);
    }

    #[test]
    fn display_name_strips_clone_suffix() {
        let view = BuildingView {
            id: EntityId(3),
            name: "Hut(Clone)".to_string(),
            pose: Pose::default(),
            level: 1,
            can_be_upgraded: true,
        };
        assert_eq!(view.display_name(), "Hut");
    }

    #[test]
    fn enemy_health_and_pose_only_apply_to_matching_kinds() {
        let mut world = world_with_player();
        let enemy = world.spawn_enemy("Enemy_01", Pose::default(), Health::full(50.0));
        let npc = world.spawn_npc("Trader", Pose::default());
        world.apply_pending();

        assert!(world.set_enemy_health(enemy, 80.0));
        assert_eq!(world.enemies()[0].health, 50.0);
        assert!(!world.set_enemy_health(npc, 10.0));

        let target = Pose::at(Vec3::new(1.0, 2.0, 3.0));
        assert!(world.set_actor_pose(npc, target));
        assert_eq!(world.npcs()[0].pose, target);
        let player = world.player().expect("player").id;
        assert!(!world.set_actor_pose(player, target));
    }

    #[test]
    fn resources_require_an_economy() {
        let mut world = world_with_player();
        assert!(!world.set_resources(ResourceCounters::default()));

        world.set_economy(Some(ResourceCounters::default()));
        let counters = ResourceCounters {
            wood: 5,
            stone: 6,
            gold: 7,
        };
        assert!(world.set_resources(counters));
        world.refresh_resource_ui();

        let mut events = Vec::new();
        world.drain_host_events_into(&mut events);
        assert_eq!(events, vec![HostEvent::ResourceUiRefreshed(counters)]);
    }
}
