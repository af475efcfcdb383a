//! The persistent key-value store backing incremental builds.
//!
//! A store is opened once per run, read and written during the build, and
//! closed exactly once after a fully successful pass. Writes go to an
//! in-memory overlay that reads see immediately; nothing reaches the backing
//! file before [`CacheStore::close`]. A store dropped without `close`
//! discards its pending writes, so a failed run leaves the previous run's
//! cache intact.
//!
//! Backing file layout: the magic bytes `SDRC`, the little-endian `u32`
//! format version, then the bincode encoding of the store image.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::codec::{self, Value};
use crate::error::CacheError;
use crate::state::State;

/// Magic bytes identifying a sedrila cache file.
const CACHE_MAGIC: [u8; 4] = *b"SDRC";

/// Current cache format version. Increment on breaking changes.
const CACHE_FORMAT_VERSION: u32 = 2;

/// Builds the namespaced cache key `{name}__{tag}__`.
pub fn cache_key(name: &str, tag: &str) -> String {
    format!("{name}__{tag}__")
}

/// Everything persisted between runs.
#[derive(Debug, Serialize, Deserialize)]
struct StoreImage {
    reference_time: SystemTime,
    dirty: BTreeSet<PathBuf>,
    entries: BTreeMap<String, Vec<u8>>,
}

impl Default for StoreImage {
    fn default() -> Self {
        Self {
            reference_time: UNIX_EPOCH,
            dirty: BTreeSet::new(),
            entries: BTreeMap::new(),
        }
    }
}

impl StoreImage {
    fn read(path: &Path) -> Result<Option<Self>, CacheError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Self::parse(path, &raw).map(Some)
    }

    fn parse(path: &Path, raw: &[u8]) -> Result<Self, CacheError> {
        if raw.len() < 8 || raw[..4] != CACHE_MAGIC {
            return Err(CacheError::InvalidHeader {
                path: path.to_path_buf(),
                reason: "missing magic bytes".to_string(),
            });
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&raw[4..8]);
        let version = u32::from_le_bytes(version);
        if version != CACHE_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path: path.to_path_buf(),
                expected: CACHE_FORMAT_VERSION,
                actual: version,
            });
        }
        let (image, _) = bincode::serde::decode_from_slice(&raw[8..], bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        Ok(image)
    }

    fn write(&self, path: &Path) -> Result<(), CacheError> {
        let body = bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })?;
        let mut output = Vec::with_capacity(8 + body.len());
        output.extend_from_slice(&CACHE_MAGIC);
        output.extend_from_slice(&CACHE_FORMAT_VERSION.to_le_bytes());
        output.extend_from_slice(&body);

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        std::fs::write(&tmp, &output).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Overview of a cache file, as shown by `sedrila cache-info`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    /// Start time of the run that wrote the file.
    pub reference_time: SystemTime,
    /// Number of stored entries.
    pub entry_count: usize,
    /// Files that produced diagnostics in that run.
    pub dirty: Vec<PathBuf>,
}

/// Key-value store with typed values, a per-run reference time and a dirty set.
pub struct CacheStore {
    /// Backing file; `None` for an in-memory store.
    location: Option<PathBuf>,
    /// When this run began; becomes the next run's reference time.
    start: SystemTime,
    /// When the previous run began.
    reference_time: SystemTime,
    persisted: BTreeMap<String, Vec<u8>>,
    pending: BTreeMap<String, Value>,
    previous_dirty: BTreeSet<PathBuf>,
    current_dirty: BTreeSet<PathBuf>,
    closed: bool,
}

impl CacheStore {
    /// Opens a store for a run starting now.
    ///
    /// `location = None` gives an in-memory store. `start_clean` ignores any
    /// existing backing file.
    pub fn open(location: Option<&Path>, start_clean: bool) -> Result<Self, CacheError> {
        Self::open_at(location, start_clean, SystemTime::now())
    }

    /// Opens a store for a run that began at `start`.
    ///
    /// An existing backing file that cannot be decoded (wrong magic, other
    /// format version, truncated payload) is logged and ignored: the store
    /// starts empty with the epoch as reference time, so everything gets
    /// rebuilt. A file that cannot be read at all is an error.
    pub fn open_at(
        location: Option<&Path>,
        start_clean: bool,
        start: SystemTime,
    ) -> Result<Self, CacheError> {
        let image = match location {
            Some(path) if !start_clean => match StoreImage::read(path) {
                Ok(image) => image.unwrap_or_default(),
                Err(err @ CacheError::Io { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        target: "sedrila.cache",
                        path = %path.display(),
                        error = %err,
                        "unusable cache file, rebuilding from scratch"
                    );
                    StoreImage::default()
                }
            },
            _ => StoreImage::default(),
        };
        tracing::debug!(
            target: "sedrila.cache",
            entries = image.entries.len(),
            dirty = image.dirty.len(),
            in_memory = location.is_none(),
            "opened cache"
        );
        Ok(Self {
            location: location.map(Path::to_path_buf),
            start,
            reference_time: image.reference_time,
            persisted: image.entries,
            pending: BTreeMap::new(),
            previous_dirty: image.dirty,
            current_dirty: BTreeSet::new(),
            closed: false,
        })
    }

    /// An empty, non-persistent store.
    pub fn in_memory() -> Self {
        Self {
            location: None,
            start: SystemTime::now(),
            reference_time: UNIX_EPOCH,
            persisted: BTreeMap::new(),
            pending: BTreeMap::new(),
            previous_dirty: BTreeSet::new(),
            current_dirty: BTreeSet::new(),
            closed: false,
        }
    }

    /// Reads the summary of a cache file without opening it for a run.
    ///
    /// Unlike [`CacheStore::open`], an undecodable file is an error here.
    pub fn inspect(path: &Path) -> Result<StoreSummary, CacheError> {
        let image = StoreImage::read(path)?.ok_or_else(|| CacheError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no cache file"),
        })?;
        Ok(StoreSummary {
            reference_time: image.reference_time,
            entry_count: image.entries.len(),
            dirty: image.dirty.into_iter().collect(),
        })
    }

    /// The backing file, if any.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Start time of the previous run; the epoch if there was none.
    pub fn reference_time(&self) -> SystemTime {
        self.reference_time
    }

    /// Start time of this run.
    pub fn start_time(&self) -> SystemTime {
        self.start
    }

    /// Whether `key` has a value, either written this run or persisted.
    pub fn contains(&self, key: &str) -> bool {
        self.pending.contains_key(key) || self.persisted.contains_key(key)
    }

    /// Whether `key` was written during this run.
    pub fn written_this_run(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Reads a value, preferring this run's writes over persisted ones.
    ///
    /// An undecodable persisted entry reads as absent.
    pub fn read(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.pending.get(key) {
            return Some(value.clone());
        }
        let bytes = self.persisted.get(key)?;
        match codec::decode(bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(target: "sedrila.cache", key, error = %err, "dropping undecodable entry");
                None
            }
        }
    }

    /// Reads a value together with its key state.
    pub fn read_with_state(&self, key: &str) -> (Option<Value>, State) {
        match self.read(key) {
            None => (None, State::Missing),
            Some(value) if self.pending.contains_key(key) => (Some(value), State::Changed),
            Some(value) => (Some(value), State::Unchanged),
        }
    }

    /// Reads a scalar value; a value of another shape reads as absent.
    pub fn read_scalar(&self, key: &str) -> Option<String> {
        match self.read(key)? {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Reads a list value; a value of another shape reads as absent.
    pub fn read_list(&self, key: &str) -> Option<Vec<String>> {
        self.read(key)?.into_list()
    }

    /// Reads a set value; a value of another shape reads as absent.
    pub fn read_set(&self, key: &str) -> Option<BTreeSet<String>> {
        self.read(key)?.into_set()
    }

    /// Reads a map value; a value of another shape reads as absent.
    pub fn read_map(&self, key: &str) -> Option<BTreeMap<String, serde_json::Value>> {
        self.read(key)?.into_map()
    }

    /// Writes a value under `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` was already written during this run.
    pub fn write(&mut self, key: &str, value: Value) {
        assert!(
            !self.pending.contains_key(key),
            "cache key '{key}' written twice in one run"
        );
        tracing::trace!(target: "sedrila.cache", key, shape = value.shape_name(), "write");
        self.pending.insert(key.to_string(), value);
    }

    /// Writes a scalar value. See [`CacheStore::write`].
    pub fn write_scalar(&mut self, key: &str, value: impl Into<String>) {
        self.write(key, Value::Scalar(value.into()));
    }

    /// Writes a list value. See [`CacheStore::write`].
    pub fn write_list(&mut self, key: &str, value: Vec<String>) {
        self.write(key, Value::List(value));
    }

    /// Writes a set value. See [`CacheStore::write`].
    pub fn write_set(&mut self, key: &str, value: BTreeSet<String>) {
        self.write(key, Value::Set(value));
    }

    /// Writes a map value. See [`CacheStore::write`].
    pub fn write_map(&mut self, key: &str, value: BTreeMap<String, serde_json::Value>) {
        self.write(key, Value::Map(value));
    }

    /// Records that the file at `path` is known, under `key`, with an empty payload.
    ///
    /// Recording the same key twice in one run is allowed.
    pub fn record_path(&mut self, path: &Path, key: &str) {
        if self.pending.contains_key(key) {
            return;
        }
        tracing::trace!(target: "sedrila.cache", path = %path.display(), key, "record path");
        self.pending.insert(key.to_string(), Value::Scalar(String::new()));
    }

    /// Flags `path` for reprocessing in the next run.
    pub fn mark_dirty(&mut self, path: &Path) {
        if self.current_dirty.insert(path.to_path_buf()) {
            tracing::debug!(target: "sedrila.cache", path = %path.display(), "marked dirty");
        }
    }

    /// Files flagged by the previous run.
    pub fn previous_dirty(&self) -> impl Iterator<Item = &Path> {
        self.previous_dirty.iter().map(PathBuf::as_path)
    }

    /// Files flagged during this run.
    pub fn current_dirty(&self) -> impl Iterator<Item = &Path> {
        self.current_dirty.iter().map(PathBuf::as_path)
    }

    pub(crate) fn previous_dirty_contains(&self, path: &Path) -> bool {
        self.previous_dirty.contains(path)
    }

    /// Drops persisted entries whose key `live` rejects and that were not
    /// written this run. Returns how many were dropped.
    ///
    /// Without this, entries of removed parts and includes would be kept
    /// forever.
    pub fn retain_persisted(&mut self, live: impl Fn(&str) -> bool) -> usize {
        let before = self.persisted.len();
        let pending = &self.pending;
        self.persisted
            .retain(|key, _| live(key) || pending.contains_key(key));
        let dropped = before - self.persisted.len();
        if dropped > 0 {
            tracing::debug!(target: "sedrila.cache", dropped, "dropped stale entries");
        }
        dropped
    }

    /// Ends the run: stores this run's start as the new reference time,
    /// replaces the dirty set with this run's, flushes pending writes, and
    /// atomically replaces the backing file.
    pub fn close(mut self) -> Result<(), CacheError> {
        self.closed = true;
        let Some(path) = self.location.clone() else {
            return Ok(());
        };
        let mut entries = std::mem::take(&mut self.persisted);
        let written = self.pending.len();
        for (key, value) in std::mem::take(&mut self.pending) {
            entries.insert(key, codec::encode(&value)?);
        }
        let image = StoreImage {
            reference_time: self.start,
            dirty: std::mem::take(&mut self.current_dirty),
            entries,
        };
        image.write(&path)?;
        tracing::debug!(
            target: "sedrila.cache",
            path = %path.display(),
            written,
            entries = image.entries.len(),
            dirty = image.dirty.len(),
            "closed cache"
        );
        Ok(())
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        if !self.closed && !self.pending.is_empty() {
            tracing::debug!(
                target: "sedrila.cache",
                discarded = self.pending.len(),
                "cache dropped without close, discarding pending writes"
            );
        }
    }
}
