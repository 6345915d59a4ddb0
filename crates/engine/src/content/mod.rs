mod compiler;
mod database;
mod discovery;
mod types;

pub use compiler::{compile_catalog, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{
    BuildingDef, BuildingTier, BuildingTiers, Catalog, QuestDef, QuestObjectiveDef,
};
pub use types::{ContentDiscoveryError, ContentRequest};
