//! Persistence for the shared outputs broker
//!
//! The broker only talks to an [`OutputStore`]; the JSON file used between
//! dashboard runs is one implementation, an in-memory store is another.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ExsimError, ExsimResult};
use crate::types::Outputs;

/// Version written into fresh stores
pub const STORE_VERSION: &str = "1.0";

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

/// Current local time in ISO-8601 with microseconds (`2025-01-31T14:05:09.123456`).
pub fn now_iso8601() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

//==============================================================================
// Snapshot model
//==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoreMetadata {
    /// Known stamps are taken only when they are strings. Anything else,
    /// including a non-string stamp, is kept verbatim in `extra`.
    fn from_value_lossy(value: Value) -> Self {
        let mut metadata = Self::default();
        let fields = match value {
            Value::Object(fields) => fields,
            Value::Null => return metadata,
            _ => {
                warn!("Store metadata is not an object, ignoring it");
                return metadata;
            }
        };

        for (key, value) in fields {
            let slot = match key.as_str() {
                "created" => &mut metadata.created,
                "last_updated" => &mut metadata.last_updated,
                "version" => &mut metadata.version,
                _ => {
                    metadata.extra.insert(key, value);
                    continue;
                }
            };
            match value {
                Value::String(s) => *slot = Some(s),
                other => {
                    metadata.extra.insert(key, other);
                }
            }
        }
        metadata
    }
}

/// The latest outputs published by one dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedRecord {
    #[serde(default = "unknown_timestamp")]
    pub timestamp: String,
    #[serde(default)]
    pub outputs: Outputs,
}

fn unknown_timestamp() -> String {
    "unknown".to_string()
}

/// Whole content of the persisted store.
///
/// Dashboards are keyed by name so records written under names this build
/// doesn't know survive a rewrite. Entries that don't decode as an
/// [`ExportedRecord`] are held in `unreadable` and written back as they were.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub metadata: StoreMetadata,
    pub dashboards: BTreeMap<String, ExportedRecord>,
    pub unreadable: Map<String, Value>,
    pub extra: Map<String, Value>,
}

/// On-disk shape; a decoded record wins over a raw entry of the same name
#[derive(Serialize)]
struct SnapshotRepr<'a> {
    metadata: &'a StoreMetadata,
    dashboards: BTreeMap<&'a str, DashboardEntry<'a>>,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum DashboardEntry<'a> {
    Record(&'a ExportedRecord),
    Raw(&'a Value),
}

impl Serialize for StoreSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut dashboards: BTreeMap<&str, DashboardEntry> = self
            .unreadable
            .iter()
            .map(|(name, raw)| (name.as_str(), DashboardEntry::Raw(raw)))
            .collect();
        for (name, record) in &self.dashboards {
            dashboards.insert(name.as_str(), DashboardEntry::Record(record));
        }

        SnapshotRepr {
            metadata: &self.metadata,
            dashboards,
            extra: &self.extra,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StoreSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value_lossy)
    }
}

impl StoreSnapshot {
    /// Empty store with fresh `created`/`last_updated` stamps
    pub fn fresh() -> Self {
        let mut snapshot = Self::default();
        snapshot.initialize();
        snapshot
    }

    /// Stamp `created` and `version` where absent, keeping every record.
    pub fn initialize(&mut self) {
        let now = now_iso8601();
        if self.metadata.created.is_none() {
            self.metadata.created = Some(now.clone());
        }
        if self.metadata.last_updated.is_none() {
            self.metadata.last_updated = Some(now);
        }
        if self.metadata.version.is_none() {
            self.metadata.version = Some(STORE_VERSION.to_string());
        }
    }

    pub fn touch(&mut self) {
        self.metadata.last_updated = Some(now_iso8601());
    }

    pub fn record(&self, name: &str) -> Option<&ExportedRecord> {
        self.dashboards.get(name)
    }

    /// Set `name`'s record, replacing any unreadable entry under that name.
    pub fn insert_record(&mut self, name: &str, record: ExportedRecord) {
        self.unreadable.remove(name);
        self.dashboards.insert(name.to_string(), record);
    }

    /// Parse store content.
    ///
    /// Content that isn't a JSON object reads as an empty store. Inside an
    /// object each dashboard entry is decoded on its own, so one bad record
    /// never hides the others.
    pub fn from_json_lossy(content: &str) -> Self {
        match serde_json::from_str::<Value>(content) {
            Ok(value) => Self::from_value_lossy(value),
            Err(e) => {
                warn!("Shared outputs store is unreadable, treating as empty: {}", e);
                Self::default()
            }
        }
    }

    fn from_value_lossy(value: Value) -> Self {
        let Value::Object(fields) = value else {
            warn!("Shared outputs store is not a JSON object, treating as empty");
            return Self::default();
        };

        let mut snapshot = Self::default();
        for (key, value) in fields {
            match key.as_str() {
                "metadata" => snapshot.metadata = StoreMetadata::from_value_lossy(value),
                "dashboards" => match value {
                    Value::Object(entries) => {
                        for (name, raw) in entries {
                            match serde_json::from_value::<ExportedRecord>(raw.clone()) {
                                Ok(record) => {
                                    snapshot.dashboards.insert(name, record);
                                }
                                Err(e) => {
                                    warn!("Skipping unreadable record for {}: {}", name, e);
                                    snapshot.unreadable.insert(name, raw);
                                }
                            }
                        }
                    }
                    Value::Null => {}
                    _ => warn!("Store dashboards are not an object, ignoring them"),
                },
                _ => {
                    snapshot.extra.insert(key, value);
                }
            }
        }
        snapshot
    }
}

//==============================================================================
// Store abstraction
//==============================================================================

pub trait OutputStore: Send + Sync {
    /// Whether the backing medium has been initialised.
    fn exists(&self) -> bool;

    /// Current content. Never fails: missing or corrupt data reads as empty.
    fn load(&self) -> StoreSnapshot;

    /// Replace the whole content. Refreshes `metadata.last_updated`.
    fn save(&self, snapshot: &StoreSnapshot) -> ExsimResult<()>;

    /// Read-modify-write as one step.
    fn update(&self, apply: &mut dyn FnMut(&mut StoreSnapshot)) -> ExsimResult<()> {
        let mut snapshot = self.load();
        apply(&mut snapshot);
        self.save(&snapshot)
    }
}

//==============================================================================
// JSON file store
//==============================================================================

/// Store backed by a pretty-printed JSON file.
///
/// Writes go through a temp file + rename. `update` holds an in-process
/// mutex and a `<file>.lock` sibling for the duration of the cycle, so two
/// processes exporting different dashboards don't drop each other's records.
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
    lock_timeout: Duration,
    stale_lock_age: Duration,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
            lock_timeout: LOCK_TIMEOUT,
            stale_lock_age: LOCK_STALE_AFTER,
        }
    }

    /// How long `update` waits for another writer's lock before failing.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Age after which a lock file is considered abandoned.
    pub fn with_stale_lock_age(mut self, age: Duration) -> Self {
        self.stale_lock_age = age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn write_atomic(&self, snapshot: &StoreSnapshot) -> ExsimResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(snapshot)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl OutputStore for JsonFileStore {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> StoreSnapshot {
        match fs::read_to_string(&self.path) {
            Ok(content) => StoreSnapshot::from_json_lossy(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => StoreSnapshot::default(),
            Err(e) => {
                warn!(
                    "Cannot read shared outputs store {}: {}",
                    self.path.display(),
                    e
                );
                StoreSnapshot::default()
            }
        }
    }

    fn save(&self, snapshot: &StoreSnapshot) -> ExsimResult<()> {
        let mut snapshot = snapshot.clone();
        snapshot.touch();
        self.write_atomic(&snapshot)
    }

    fn update(&self, apply: &mut dyn FnMut(&mut StoreSnapshot)) -> ExsimResult<()> {
        let _local = self
            .guard
            .lock()
            .map_err(|_| ExsimError::Lock("store mutex poisoned".to_string()))?;
        let _file_lock =
            StoreLock::acquire(&self.lock_path(), self.lock_timeout, self.stale_lock_age)?;

        let mut snapshot = self.load();
        apply(&mut snapshot);
        self.save(&snapshot)
    }
}

/// Advisory lock file, removed on drop
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    /// Create the lock file, waiting at most `timeout` for other writers.
    ///
    /// A lock older than `stale_after` is broken, but every failed attempt
    /// still counts against the deadline.
    fn acquire(path: &Path, timeout: Duration, stale_after: Duration) -> ExsimResult<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {
                    debug!("Acquired store lock {}", path.display());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(path, stale_after) && Self::break_stale(path, stale_after) {
                        continue;
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    // Parent directory doesn't exist yet
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                return Err(ExsimError::Lock(format!(
                    "Timed out waiting for {}",
                    path.display()
                )));
            }
            thread::sleep(LOCK_RETRY_INTERVAL);
        }
    }

    fn is_stale(path: &Path, stale_after: Duration) -> bool {
        fs::symlink_metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map(|age| age > stale_after)
            .unwrap_or(false)
    }

    /// Move a stale lock aside and delete it. Only one writer can win the
    /// rename; if the file it moved turns out to be fresh, it goes back.
    fn break_stale(path: &Path, stale_after: Duration) -> bool {
        let is_file = fs::symlink_metadata(path)
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            warn!("Store lock {} is not a regular file", path.display());
            return false;
        }

        let mut aside = path.as_os_str().to_os_string();
        aside.push(format!(".stale-{}", Uuid::new_v4()));
        let aside = PathBuf::from(aside);

        if let Err(e) = fs::rename(path, &aside) {
            debug!("Lost the race to break {}: {}", path.display(), e);
            return false;
        }

        if !Self::is_stale(&aside, stale_after) {
            // Another writer took the lock in between; hand it back
            if let Err(e) = fs::hard_link(&aside, path) {
                warn!("Cannot restore store lock {}: {}", path.display(), e);
            }
            let _ = fs::remove_file(&aside);
            return false;
        }

        match fs::remove_file(&aside) {
            Ok(()) => {
                warn!("Removed stale store lock {}", path.display());
                true
            }
            Err(e) => {
                warn!("Cannot remove stale store lock {}: {}", aside.display(), e);
                true
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

//==============================================================================
// In-memory store
//==============================================================================

/// Store kept in process memory
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<StoreSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputStore for MemoryStore {
    fn exists(&self) -> bool {
        self.snapshot.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    fn load(&self) -> StoreSnapshot {
        self.snapshot
            .lock()
            .ok()
            .and_then(|s| s.clone())
            .unwrap_or_default()
    }

    fn save(&self, snapshot: &StoreSnapshot) -> ExsimResult<()> {
        let mut snapshot = snapshot.clone();
        snapshot.touch();
        let mut slot = self
            .snapshot
            .lock()
            .map_err(|_| ExsimError::Lock("store mutex poisoned".to_string()))?;
        *slot = Some(snapshot);
        Ok(())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut StoreSnapshot)) -> ExsimResult<()> {
        let mut slot = self
            .snapshot
            .lock()
            .map_err(|_| ExsimError::Lock("store mutex poisoned".to_string()))?;
        let mut snapshot = slot.clone().unwrap_or_default();
        apply(&mut snapshot);
        snapshot.touch();
        *slot = Some(snapshot);
        Ok(())
    }
}
