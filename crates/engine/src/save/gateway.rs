use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::atomic_io::write_text_atomic;
use super::error::PersistenceError;
use super::snapshot::Snapshot;
use super::validate::{parse_snapshot_json, validate_snapshot};

pub const QUICKSAVE_SLOT_NAME: &str = "quicksave";
pub const AUTOSAVE_SLOT_NAME: &str = "autosave";
pub const MAX_MANUAL_SAVES: usize = 10;
const SAVE_EXTENSION: &str = "json";
const DISPLAY_TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

static SAVE_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_save_lock_poison_once(operation: &'static str) {
    if SAVE_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "save lock poisoned; recovered inner value");
    }
}

pub(crate) fn lock_recovering<'a, T>(
    mutex: &'a Mutex<T>,
    operation: &'static str,
) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn_save_lock_poison_once(operation);
            poisoned.into_inner()
        }
    }
}

/// A user-chosen manual slot name, safe to use as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotName(String);

impl SlotName {
    pub fn parse(raw: &str) -> Result<Self, PersistenceError> {
        let name = raw.trim();
        let reject = |reason: &'static str| PersistenceError::InvalidSlotName {
            name: raw.to_string(),
            reason,
        };
        if name.is_empty() {
            return Err(reject("name is empty"));
        }
        if name.eq_ignore_ascii_case(QUICKSAVE_SLOT_NAME) {
            return Err(reject("name is reserved for the quicksave slot"));
        }
        if name.eq_ignore_ascii_case(AUTOSAVE_SLOT_NAME) {
            return Err(reject("name is reserved for the autosave slot"));
        }
        if name.starts_with('.') {
            return Err(reject("name must not start with '.'"));
        }
        if name.contains(['/', '\\']) {
            return Err(reject("name must not contain path separators"));
        }
        if !name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, ' ' | '_' | '-'))
        {
            return Err(reject(
                "only ASCII letters, digits, spaces, '_' and '-' are allowed",
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SaveSlot {
    Quick,
    /// Periodic background saves. Kept apart from the quicksave so an
    /// autosave never replaces a deliberate one.
    Auto,
    Manual(SlotName),
}

impl SaveSlot {
    pub fn manual(raw: &str) -> Result<Self, PersistenceError> {
        SlotName::parse(raw).map(Self::Manual)
    }

    /// Accepts the reserved slot names as well as manual ones.
    pub fn named(raw: &str) -> Result<Self, PersistenceError> {
        let name = raw.trim();
        if name.eq_ignore_ascii_case(QUICKSAVE_SLOT_NAME) {
            Ok(Self::Quick)
        } else if name.eq_ignore_ascii_case(AUTOSAVE_SLOT_NAME) {
            Ok(Self::Auto)
        } else {
            Self::manual(name)
        }
    }

    pub fn file_stem(&self) -> &str {
        match self {
            Self::Quick => QUICKSAVE_SLOT_NAME,
            Self::Auto => AUTOSAVE_SLOT_NAME,
            Self::Manual(name) => name.as_str(),
        }
    }

    pub fn is_quick(&self) -> bool {
        matches!(self, Self::Quick)
    }
}

impl fmt::Display for SaveSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

pub trait SaveClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SaveClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock_recovering(&self.now, "clock_set") = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = lock_recovering(&self.now, "clock_advance");
        *now += by;
    }
}

impl SaveClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock_recovering(&self.now, "clock_now")
    }
}

#[derive(Debug, Clone)]
pub struct SaveGatewayConfig {
    pub save_dir: PathBuf,
    pub max_manual_saves: usize,
}

impl SaveGatewayConfig {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            max_manual_saves: MAX_MANUAL_SAVES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaveReceipt {
    pub slot: SaveSlot,
    pub path: PathBuf,
    pub saved_at: DateTime<Utc>,
    pub pruned: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SlotMetadata {
    pub slot: SaveSlot,
    pub display_name: String,
    pub saved_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub path: PathBuf,
}

impl SlotMetadata {
    /// `dd.MM.yyyy HH:mm`, UTC.
    pub fn display_timestamp(&self) -> String {
        self.saved_at.format(DISPLAY_TIMESTAMP_FORMAT).to_string()
    }
}

#[derive(Debug, Default)]
struct GatewayState {
    last_saved_at: HashMap<SaveSlot, DateTime<Utc>>,
}

/// Owns the save directory. Every operation holds one gateway-wide lock, so
/// a load never observes a half-finished save or retention pass.
pub struct SaveGateway {
    config: SaveGatewayConfig,
    clock: Arc<dyn SaveClock>,
    state: Mutex<GatewayState>,
}

impl fmt::Debug for SaveGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveGateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SaveGateway {
    pub fn new(config: SaveGatewayConfig) -> Result<Self, PersistenceError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: SaveGatewayConfig,
        clock: Arc<dyn SaveClock>,
    ) -> Result<Self, PersistenceError> {
        fs::create_dir_all(&config.save_dir).map_err(|source| PersistenceError::CreateDir {
            path: config.save_dir.clone(),
            source,
        })?;
        Ok(Self {
            config,
            clock,
            state: Mutex::new(GatewayState::default()),
        })
    }

    pub fn save_dir(&self) -> &Path {
        &self.config.save_dir
    }

    pub fn slot_path(&self, slot: &SaveSlot) -> PathBuf {
        self.config
            .save_dir
            .join(format!("{}.{SAVE_EXTENSION}", slot.file_stem()))
    }

    pub fn quick_save(&self, snapshot: &Snapshot) -> Result<SaveReceipt, PersistenceError> {
        self.save(&SaveSlot::Quick, snapshot)
    }

    pub fn quick_load(&self) -> Result<Snapshot, PersistenceError> {
        self.load(&SaveSlot::Quick)
    }

    pub fn has_quicksave(&self) -> bool {
        let _state = lock_recovering(&self.state, "has_quicksave");
        self.slot_path(&SaveSlot::Quick).is_file()
    }

    /// Writes `snapshot` into `slot`. The stored copy is renamed after the
    /// slot and stamped with a `saved_at` that never goes backwards for the
    /// same slot. Manual saves then enforce the retention cap.
    pub fn save(&self, slot: &SaveSlot, snapshot: &Snapshot) -> Result<SaveReceipt, PersistenceError> {
        let mut state = lock_recovering(&self.state, "save");
        let result = self.save_locked(&mut state, slot, snapshot);
        match &result {
            Ok(receipt) => info!(
                slot = %slot,
                path = %receipt.path.display(),
                saved_at = %receipt.saved_at,
                pruned = receipt.pruned.len(),
                "save_written"
            ),
            Err(err) => error!(slot = %slot, error = %err, "save_failed"),
        }
        result
    }

    fn save_locked(
        &self,
        state: &mut GatewayState,
        slot: &SaveSlot,
        snapshot: &Snapshot,
    ) -> Result<SaveReceipt, PersistenceError> {
        fs::create_dir_all(&self.config.save_dir).map_err(|source| {
            PersistenceError::CreateDir {
                path: self.config.save_dir.clone(),
                source,
            }
        })?;

        let path = self.slot_path(slot);
        let previous = state
            .last_saved_at
            .get(slot)
            .copied()
            .or_else(|| file_modified_at(&path));
        let now = self.clock.now();
        let saved_at = match previous {
            Some(previous) if previous > now => previous,
            _ => now,
        };

        let mut stamped = snapshot.clone();
        stamped.name = slot.file_stem().to_string();
        stamped.saved_at = saved_at;
        validate_snapshot(&stamped).map_err(|source| PersistenceError::Invalid { source })?;
        let json = stamped
            .encode()
            .map_err(|source| PersistenceError::Encode { source })?;

        write_text_atomic(&path, &json, Some(SystemTime::from(saved_at))).map_err(|source| {
            PersistenceError::Write {
                path: path.clone(),
                source,
            }
        })?;
        state.last_saved_at.insert(slot.clone(), saved_at);

        let pruned = match slot {
            SaveSlot::Quick | SaveSlot::Auto => Vec::new(),
            SaveSlot::Manual(_) => self.enforce_retention(&path),
        };

        Ok(SaveReceipt {
            slot: slot.clone(),
            path,
            saved_at,
            pruned,
        })
    }

    pub fn load(&self, slot: &SaveSlot) -> Result<Snapshot, PersistenceError> {
        let _state = lock_recovering(&self.state, "load");
        let path = self.slot_path(slot);
        let result = read_snapshot(&path);
        match &result {
            Ok(snapshot) => info!(
                slot = %slot,
                saved_at = %snapshot.saved_at,
                "save_loaded"
            ),
            Err(err) => warn!(slot = %slot, error = %err, "load_failed"),
        }
        result
    }

    /// Manual slots, newest first. Files that cannot be read or parsed are
    /// skipped.
    pub fn list_slots(&self) -> Result<Vec<SlotMetadata>, PersistenceError> {
        let _state = lock_recovering(&self.state, "list_slots");
        let mut slots = Vec::new();
        for (slot, path) in self.manual_save_files()? {
            match slot_metadata(slot, &path) {
                Ok(metadata) => slots.push(metadata),
                Err(err) => warn!(path = %path.display(), error = %err, "save_slot_unreadable"),
            }
        }
        slots.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        Ok(slots)
    }

    pub fn quicksave_metadata(&self) -> Option<SlotMetadata> {
        self.reserved_metadata(SaveSlot::Quick, "quicksave_metadata")
    }

    pub fn autosave_metadata(&self) -> Option<SlotMetadata> {
        self.reserved_metadata(SaveSlot::Auto, "autosave_metadata")
    }

    fn reserved_metadata(&self, slot: SaveSlot, operation: &'static str) -> Option<SlotMetadata> {
        let _state = lock_recovering(&self.state, operation);
        let path = self.slot_path(&slot);
        if !path.is_file() {
            return None;
        }
        slot_metadata(slot, &path).ok()
    }

    /// `*.json` files whose stem is a valid manual slot name. Reserved slots
    /// and stray files are neither listed nor counted against the cap.
    fn manual_save_files(&self) -> Result<Vec<(SaveSlot, PathBuf)>, PersistenceError> {
        let dir = &self.config.save_dir;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PersistenceError::ListDir {
                    path: dir.clone(),
                    source,
                })
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistenceError::ListDir {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !is_save_file(&path) {
                continue;
            }
            match slot_for_path(&path) {
                Some(slot) => files.push((slot, path)),
                None => debug!(path = %path.display(), "save_file_ignored"),
            }
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }

    /// Deletes the oldest manual saves beyond the cap. The file just written
    /// is always kept; deletion failures are logged and skipped.
    fn enforce_retention(&self, just_written: &Path) -> Vec<PathBuf> {
        let files = match self.manual_save_files() {
            Ok(files) => files,
            Err(err) => {
                warn!(error = %err, "retention_scan_failed");
                return Vec::new();
            }
        };

        let mut others = files
            .into_iter()
            .map(|(_, path)| path)
            .filter(|path| path != just_written)
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, path)
            })
            .collect::<Vec<_>>();
        others.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let keep = self.config.max_manual_saves.saturating_sub(1);
        let mut pruned = Vec::new();
        for (_, path) in others.into_iter().skip(keep) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "retention_pruned");
                    pruned.push(path);
                }
                Err(err) => warn!(path = %path.display(), error = %err, "retention_delete_failed"),
            }
        }
        pruned
    }
}

fn is_save_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SAVE_EXTENSION))
}

fn slot_for_path(path: &Path) -> Option<SaveSlot> {
    let stem = path.file_stem()?.to_str()?;
    SaveSlot::manual(stem).ok()
}

fn read_snapshot(path: &Path) -> Result<Snapshot, PersistenceError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            return Err(PersistenceError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_snapshot_json(&raw).map_err(|source| PersistenceError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn slot_metadata(slot: SaveSlot, path: &Path) -> Result<SlotMetadata, PersistenceError> {
    let snapshot = read_snapshot(path)?;
    let modified_at = file_modified_at(path).unwrap_or(snapshot.saved_at);
    Ok(SlotMetadata {
        display_name: slot.file_stem().to_string(),
        slot,
        saved_at: snapshot.saved_at,
        modified_at,
        path: path.to_path_buf(),
    })
}

fn file_modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn slot_names_are_validated() {
        assert_eq!(
            SlotName::parse("  save_1 ").expect("valid").as_str(),
            "save_1"
        );
        assert!(SlotName::parse("My Base-2").is_ok());

        for bad in ["", "   ", "quicksave", "QuickSave", "AutoSave", "../evil", "a/b", "a\\b", ".hidden", "café", "x.json"] {
            assert!(
                matches!(
                    SlotName::parse(bad),
                    Err(PersistenceError::InvalidSlotName { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn named_slots_resolve_reserved_names() {
        assert_eq!(SaveSlot::named("QuickSave").expect("quick"), SaveSlot::Quick);
        assert_eq!(SaveSlot::named(" autosave ").expect("auto"), SaveSlot::Auto);
        assert_eq!(
            SaveSlot::named("camp").expect("manual"),
            SaveSlot::manual("camp").expect("slot")
        );
        assert!(SaveSlot::named("a/b").is_err());
    }

    #[test]
    fn display_timestamp_uses_day_month_year() {
        let metadata = SlotMetadata {
            slot: SaveSlot::Quick,
            display_name: QUICKSAVE_SLOT_NAME.to_string(),
            saved_at: Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 0).single().expect("time"),
            modified_at: Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 0).single().expect("time"),
            path: PathBuf::from("quicksave.json"),
        };
        assert_eq!(metadata.display_timestamp(), "07.03.2026 09:05");
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("time");
        let clock = ManualClock::starting_at(start);
        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(90));
    }
}
