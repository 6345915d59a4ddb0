//! Save/load: snapshot model, capture, restore and the on-disk gateway.

mod atomic_io;
mod autosave;
mod capture;
mod error;
mod gateway;
mod restore;
mod snapshot;
mod validate;

pub use autosave::{BackgroundSaveOutcome, BackgroundSaver};
pub use capture::capture_world;
pub use error::{
    CaptureError, DeserializationError, PersistenceError, RestoreError, RestoreMismatch,
};
pub use gateway::{
    ManualClock, SaveClock, SaveGateway, SaveGatewayConfig, SaveReceipt, SaveSlot, SlotMetadata,
    SlotName, SystemClock, AUTOSAVE_SLOT_NAME, MAX_MANUAL_SAVES, QUICKSAVE_SLOT_NAME,
};
pub use restore::{restore_world, RestoreReport};
pub use snapshot::{
    BuildingSnapshot, EnemySnapshot, NpcSnapshot, ObjectiveSnapshot, PlayerSnapshot,
    QuestSnapshot, ResourceSnapshot, SavedQuat, SavedVec3, Snapshot, SAVE_VERSION,
};
pub use validate::{parse_snapshot_json, validate_snapshot};
