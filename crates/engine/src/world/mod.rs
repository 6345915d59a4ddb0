mod handle;
mod math;
mod quests;
mod scene;

pub use handle::{ActorView, BuildingView, EnemyView, PlayerView, ResourceCounters, WorldHandle};
pub use math::{Pose, Quat, Vec3};
pub use quests::{Quest, QuestLog, QuestObjective, QuestProgress};
pub use scene::{
    BuildingState, Entity, EntityId, EntityIdAllocator, EntityKind, Health, HostEvent, SceneWorld,
    CLONE_SUFFIX,
};
