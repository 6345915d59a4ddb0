use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("parse save json: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
    #[error("parse save json at {path}: {source}")]
    JsonAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid save slot name {name:?}: {reason}")]
    InvalidSlotName { name: String, reason: &'static str },
    #[error("failed to create save directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read save {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write save {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to list save directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("save not found: {path}")]
    NotFound { path: PathBuf },
    #[error("failed to encode save json: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error("refusing to write invalid save: {source}")]
    Invalid {
        #[source]
        source: DeserializationError,
    },
    #[error("corrupt save {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: DeserializationError,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("cannot capture world without a player")]
    MissingPlayer,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RestoreError {
    #[error("cannot restore into a world without a player")]
    MissingPlayer,
}

/// A snapshot entry that could not be reconciled. Restore keeps going.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RestoreMismatch {
    #[error("inventory restore is not implemented; {entries} saved item stacks were not applied")]
    InventoryNotRestored { entries: usize },
    #[error("no building tier for level {level}; skipped building {name:?}")]
    MissingBuildingTier { name: String, level: u32 },
    #[error("world has no economy; saved resources were not applied")]
    EconomyUnavailable,
    #[error("saved {resource} counter {value} was negative; clamped to 0")]
    NegativeResourceClamped { resource: &'static str, value: i64 },
    #[error("world has no quest log; {quests} saved quests were not applied")]
    QuestLogUnavailable { quests: usize },
    #[error("quest {id} is not in the live quest log")]
    UnknownQuest { id: i32 },
    #[error("quest {id} has {live} objectives but the save has {saved}; copied the first {copied}")]
    ObjectiveCountMismatch {
        id: i32,
        saved: usize,
        live: usize,
        copied: usize,
    },
    #[error("no live NPC matches {name:?}")]
    NpcNotFound {
        name: String,
        entity_id: Option<u64>,
    },
    #[error("no live enemy matches {name:?}")]
    EnemyNotFound {
        name: String,
        entity_id: Option<u64>,
    },
}
