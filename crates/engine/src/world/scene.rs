use crate::content::{BuildingDef, BuildingTiers};

use super::handle::ResourceCounters;
use super::math::Pose;
use super::quests::QuestLog;

pub const CLONE_SUFFIX: &str = "(Clone)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Building,
    Npc,
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn full(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount.max(0.0)).max(0.0);
    }

    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount.max(0.0)).min(self.max);
    }

    pub fn set(&mut self, value: f32) {
        self.current = value.clamp(0.0, self.max);
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingState {
    pub def_name: String,
    pub level: u32,
    pub can_be_upgraded: bool,
    pub colliders_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub pose: Pose,
    pub health: Option<Health>,
    pub building: Option<BuildingState>,
    applied_spawn_order: u64,
}

impl Entity {
    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}

/// Side effects a real engine would route to UI or gameplay listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    HealthChanged { current: f32, max: f32 },
    ResourceUiRefreshed(ResourceCounters),
    QuestUiRefreshed,
    CurrentBuildingChanged(Option<EntityId>),
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// In-memory live world. Spawns and despawns are queued and only become
/// visible after [`SceneWorld::apply_pending`].
#[derive(Debug)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    player_controller_enabled: bool,
    resources: Option<ResourceCounters>,
    quest_log: Option<QuestLog>,
    building_tiers: Option<BuildingTiers>,
    current_building: Option<EntityId>,
    host_events: Vec<HostEvent>,
}

impl Default for SceneWorld {
    fn default() -> Self {
        Self {
            allocator: EntityIdAllocator::default(),
            entities: Vec::new(),
            pending_spawns: Vec::new(),
            pending_despawns: Vec::new(),
            next_applied_spawn_order: 0,
            player_controller_enabled: true,
            resources: None,
            quest_log: None,
            building_tiers: None,
            current_building: None,
            host_events: Vec::new(),
        }
    }
}

impl SceneWorld {
    pub fn spawn_player(&mut self, pose: Pose, max_health: f32) -> EntityId {
        self.spawn_internal(
            "Player".to_string(),
            EntityKind::Player,
            pose,
            Some(Health::full(max_health)),
            None,
        )
    }

    pub fn spawn_npc(&mut self, name: &str, pose: Pose) -> EntityId {
        self.spawn_internal(name.to_string(), EntityKind::Npc, pose, None, None)
    }

    pub fn spawn_enemy(&mut self, name: &str, pose: Pose, health: Health) -> EntityId {
        self.spawn_internal(
            name.to_string(),
            EntityKind::Enemy,
            pose,
            Some(health),
            None,
        )
    }

    /// Instantiates a building the way a prefab instance comes up: named after
    /// the prefab with the clone suffix, colliders off, level 1 unless told
    /// otherwise.
    pub fn spawn_building(&mut self, def: &BuildingDef, pose: Pose, level: u32) -> EntityId {
        let building = BuildingState {
            def_name: def.def_name.clone(),
            level: level.max(1),
            can_be_upgraded: def.upgrade_to.is_some(),
            colliders_enabled: false,
        };
        self.spawn_internal(
            format!("{}{CLONE_SUFFIX}", def.prefab),
            EntityKind::Building,
            pose,
            None,
            Some(building),
        )
    }

    fn spawn_internal(
        &mut self,
        name: String,
        kind: EntityKind,
        pose: Pose,
        health: Option<Health>,
        building: Option<BuildingState>,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            name,
            kind,
            pose,
            health,
            building,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_spawns.is_empty() {
            for mut entity in self.pending_spawns.drain(..) {
                entity.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.entities.push(entity);
            }
        }

        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            if let Some(current) = self.current_building {
                if pending.binary_search(&current).is_ok() {
                    self.current_building = None;
                }
            }
            self.pending_despawns.clear();
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
        self.player_controller_enabled = true;
        self.current_building = None;
        self.host_events.clear();
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending_spawns.is_empty() || !self.pending_despawns.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |entity| entity.kind == kind)
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn find_by_name(&self, kind: EntityKind, name: &str) -> Option<&Entity> {
        self.entities_of(kind).find(|entity| entity.name == name)
    }

    /// Looks at live entities first, then at spawns that are still queued.
    pub(super) fn find_any_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if let Some(index) = self.entities.iter().position(|entity| entity.id == id) {
            return self.entities.get_mut(index);
        }
        self.pending_spawns.iter_mut().find(|entity| entity.id == id)
    }

    pub(super) fn player_entity(&self) -> Option<&Entity> {
        self.entities_of(EntityKind::Player).next()
    }

    pub(super) fn player_entity_mut(&mut self) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|entity| entity.kind == EntityKind::Player)
    }

    pub fn player_controller_enabled(&self) -> bool {
        self.player_controller_enabled
    }

    pub(super) fn set_controller_enabled(&mut self, enabled: bool) {
        self.player_controller_enabled = enabled;
    }

    pub fn set_economy(&mut self, resources: Option<ResourceCounters>) {
        self.resources = resources;
    }

    pub(super) fn resources_slot(&mut self) -> &mut Option<ResourceCounters> {
        &mut self.resources
    }

    pub fn resource_counters(&self) -> Option<ResourceCounters> {
        self.resources
    }

    pub fn set_quest_log(&mut self, quest_log: QuestLog) {
        self.quest_log = Some(quest_log);
    }

    pub fn quests(&self) -> Option<&QuestLog> {
        self.quest_log.as_ref()
    }

    pub fn quests_mut(&mut self) -> Option<&mut QuestLog> {
        self.quest_log.as_mut()
    }

    pub fn set_building_tiers(&mut self, tiers: BuildingTiers) {
        self.building_tiers = Some(tiers);
    }

    pub fn tiers(&self) -> Option<&BuildingTiers> {
        self.building_tiers.as_ref()
    }

    pub fn current_building(&self) -> Option<EntityId> {
        self.current_building
    }

    pub(super) fn set_current_building(&mut self, id: Option<EntityId>) {
        self.current_building = id;
        self.host_events.push(HostEvent::CurrentBuildingChanged(id));
    }

    pub(super) fn push_event(&mut self, event: HostEvent) {
        self.host_events.push(event);
    }

    pub fn drain_host_events_into(&mut self, out: &mut Vec<HostEvent>) {
        out.append(&mut self.host_events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::BuildingTier;
    use crate::world::Vec3;

    fn hut_def() -> BuildingDef {
        BuildingDef {
            def_name: "hut".to_string(),
            label: "Hut".to_string(),
            prefab: "Hut".to_string(),
            tier: BuildingTier::Base,
            wood_cost: 10,
            stone_cost: 0,
            gold_cost: 0,
            upgrade_to: Some("house".to_string()),
        }
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = EntityIdAllocator::default();
        let first = allocator.allocate();
        let second = allocator.allocate();
        let third = allocator.allocate();

        assert_eq!(first.0, 0);
        assert_eq!(second.0, 1);
        assert_eq!(third.0, 2);
    }

    #[test]
    fn spawn_and_despawn_take_effect_on_apply() {
        let mut world = SceneWorld::default();
        let id = world.spawn_npc("Trader", Pose::default());
        assert_eq!(world.entity_count(), 0);
        world.apply_pending();
        assert_eq!(world.entity_count(), 1);

        assert!(world.despawn(id));
        assert_eq!(world.entity_count(), 1);
        world.apply_pending();
        assert_eq!(world.entity_count(), 0);
        assert!(!world.despawn(id));
    }

    #[test]
    fn despawn_of_pending_spawn_removes_it_on_apply() {
        let mut world = SceneWorld::default();
        let id = world.spawn_npc("Ghost", Pose::default());
        assert!(world.despawn(id));
        world.apply_pending();
        assert!(world.find_entity(id).is_none());
    }

    #[test]
    fn duplicate_pending_despawns_are_idempotent() {
        let mut world = SceneWorld::default();
        let doomed = world.spawn_npc("Doomed", Pose::default());
        let survivor = world.spawn_npc("Survivor", Pose::at(Vec3::new(3.0, 0.0, 1.0)));
        world.apply_pending();

        world.despawn(doomed);
        world.despawn(doomed);
        world.apply_pending();

        assert_eq!(world.entity_count(), 1);
        assert!(world.find_entity(survivor).is_some());
    }

    #[test]
    fn buildings_spawn_as_prefab_clones_with_colliders_off() {
        let mut world = SceneWorld::default();
        let id = world.spawn_building(&hut_def(), Pose::default(), 0);
        world.apply_pending();

        let entity = world.find_entity(id).expect("building");
        assert_eq!(entity.name, "Hut(Clone)");
        let building = entity.building.as_ref().expect("building state");
        assert_eq!(building.level, 1);
        assert!(building.can_be_upgraded);
        assert!(!building.colliders_enabled);
    }

    #[test]
    fn despawning_current_building_clears_reference() {
        let mut world = SceneWorld::default();
        let id = world.spawn_building(&hut_def(), Pose::default(), 1);
        world.apply_pending();
        world.set_current_building(Some(id));

        world.despawn(id);
        world.apply_pending();
        assert_eq!(world.current_building(), None);
    }

    #[test]
    fn health_clamps_between_zero_and_max() {
        let mut health = Health::full(100.0);
        health.damage(250.0);
        assert_eq!(health.current, 0.0);
        assert!(!health.is_alive());
        health.heal(500.0);
        assert_eq!(health.current, 100.0);
        health.set(-5.0);
        assert_eq!(health.current, 0.0);
    }
}
