use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::world::{Pose, Quat, Vec3};

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SavedVec3 {
    pub fn from_vec3(value: Vec3) -> Self {
        Self {
            x: value.x,
            y: value.y,
            z: value.z,
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedQuat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for SavedQuat {
    fn default() -> Self {
        Self::from_quat(Quat::IDENTITY)
    }
}

impl SavedQuat {
    pub fn from_quat(value: Quat) -> Self {
        Self {
            x: value.x,
            y: value.y,
            z: value.z,
            w: value.w,
        }
    }

    /// Renormalizes on the way in; a degenerate rotation restores as identity.
    pub fn to_quat(self) -> Quat {
        Quat {
            x: self.x,
            y: self.y,
            z: self.z,
            w: self.w,
        }
        .normalized()
        .unwrap_or(Quat::IDENTITY)
    }
}

pub(crate) fn saved_pose(position: SavedVec3, rotation: SavedQuat) -> Pose {
    Pose {
        position: position.to_vec3(),
        rotation: rotation.to_quat(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub position: SavedVec3,
    #[serde(default)]
    pub rotation: SavedQuat,
    pub health: f32,
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSnapshot {
    pub name: String,
    pub position: SavedVec3,
    #[serde(default)]
    pub rotation: SavedQuat,
    pub level: u32,
    #[serde(default)]
    pub can_be_upgraded: bool,
}

/// Signed on disk so hand-edited or legacy files with negative counters still
/// parse; restore clamps them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    #[serde(default)]
    pub wood: i64,
    #[serde(default)]
    pub stone: i64,
    #[serde(default)]
    pub gold: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveSnapshot {
    pub current_amount: u32,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestSnapshot {
    pub id: i32,
    pub is_active: bool,
    pub is_completed: bool,
    #[serde(default)]
    pub objectives: Vec<ObjectiveSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcSnapshot {
    #[serde(default)]
    pub entity_id: Option<u64>,
    pub name: String,
    pub position: SavedVec3,
    #[serde(default)]
    pub rotation: SavedQuat,
    #[serde(default = "default_alive")]
    pub is_alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    #[serde(default)]
    pub entity_id: Option<u64>,
    pub name: String,
    pub position: SavedVec3,
    #[serde(default)]
    pub rotation: SavedQuat,
    pub health: f32,
    pub is_alive: bool,
}

fn default_alive() -> bool {
    true
}

/// Everything one save slot holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub save_version: u32,
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub player: PlayerSnapshot,
    #[serde(default)]
    pub buildings: Vec<BuildingSnapshot>,
    #[serde(default)]
    pub resources: ResourceSnapshot,
    #[serde(default)]
    pub quests: Vec<QuestSnapshot>,
    #[serde(default)]
    pub npcs: Vec<NpcSnapshot>,
    #[serde(default)]
    pub enemies: Vec<EnemySnapshot>,
}

impl Snapshot {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
