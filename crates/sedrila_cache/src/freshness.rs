//! Freshness classification of files and cache keys.
//!
//! A file is judged against the reference time (the previous run's start)
//! and against the previous run's dirty set. Files that exist but were never
//! recorded count as [`State::Missing`]: the absence of history is the more
//! informative signal.

use std::path::Path;
use std::time::SystemTime;

use crate::state::State;
use crate::store::CacheStore;

impl CacheStore {
    /// Classifies the file at `path`, recorded in the cache under `key`.
    pub fn classify_path(&self, path: &Path, key: &str) -> State {
        if !path.exists() || !self.contains(key) {
            return State::Missing;
        }
        if self.is_recent(path) || self.is_dirty(path) {
            State::Changed
        } else {
            State::Unchanged
        }
    }

    /// Classifies a cache key: written this run, persisted, or absent.
    pub fn classify_key(&self, key: &str) -> State {
        if self.written_this_run(key) {
            State::Changed
        } else if self.contains(key) {
            State::Unchanged
        } else {
            State::Missing
        }
    }

    /// Whether the previous run reported a diagnostic for `path`.
    pub fn is_dirty(&self, path: &Path) -> bool {
        self.previous_dirty_contains(path)
    }

    /// Whether the file was modified after the reference time.
    ///
    /// A file whose modification time cannot be read counts as recent.
    pub fn is_recent(&self, path: &Path) -> bool {
        match modification_time(path) {
            Some(mtime) => mtime > self.reference_time(),
            None => true,
        }
    }
}

fn modification_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn touch(path: &Path, secs: u64) {
        std::fs::write(path, "text").unwrap();
        filetime::set_file_mtime(path, FileTime::from_system_time(at(secs))).unwrap();
    }

    #[test]
    fn classify_key_states() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let mut store = CacheStore::open_at(Some(&cache), false, at(100)).unwrap();
        assert_eq!(store.classify_key("k"), State::Missing);
        store.write_scalar("k", "hello");
        assert_eq!(store.classify_key("k"), State::Changed);
        store.close().unwrap();

        let store = CacheStore::open_at(Some(&cache), false, at(200)).unwrap();
        assert_eq!(store.classify_key("k"), State::Unchanged);
        assert_eq!(store.read_scalar("k").as_deref(), Some("hello"));
    }

    #[test]
    fn nonexistent_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CacheStore::in_memory();
        let path = dir.path().join("gone.md");
        store.record_path(&path, "gone.md__sourcefile__");
        assert_eq!(store.classify_path(&path, "gone.md__sourcefile__"), State::Missing);
    }

    #[test]
    fn unrecorded_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        touch(&path, 50);
        let store = CacheStore::in_memory();
        assert_eq!(store.classify_path(&path, "a.md__sourcefile__"), State::Missing);
    }

    #[test]
    fn mtime_against_reference_time() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let path = dir.path().join("a.md");
        let key = "a.md__source__";

        touch(&path, 50);
        let mut store = CacheStore::open_at(Some(&cache), false, at(100)).unwrap();
        store.record_path(&path, key);
        store.close().unwrap();

        let store = CacheStore::open_at(Some(&cache), false, at(200)).unwrap();
        assert_eq!(store.classify_path(&path, key), State::Unchanged);
        drop(store);

        touch(&path, 150);
        let store = CacheStore::open_at(Some(&cache), false, at(200)).unwrap();
        assert_eq!(store.classify_path(&path, key), State::Changed);
        store.close().unwrap();

        let store = CacheStore::open_at(Some(&cache), false, at(300)).unwrap();
        assert_eq!(store.reference_time(), at(200));
        assert_eq!(store.classify_path(&path, key), State::Unchanged);
    }

    #[test]
    fn dirty_file_is_changed_despite_old_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let path = dir.path().join("a.md");
        let key = "a.md__sourcefile__";
        touch(&path, 50);

        let mut store = CacheStore::open_at(Some(&cache), false, at(100)).unwrap();
        store.record_path(&path, key);
        store.mark_dirty(&path);
        store.close().unwrap();

        let store = CacheStore::open_at(Some(&cache), false, at(200)).unwrap();
        assert!(store.is_dirty(&path));
        assert!(!store.is_recent(&path));
        assert_eq!(store.classify_path(&path, key), State::Changed);
        store.close().unwrap();

        let store = CacheStore::open_at(Some(&cache), false, at(300)).unwrap();
        assert_eq!(store.classify_path(&path, key), State::Unchanged);
    }

    #[test]
    fn subsecond_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "x").unwrap();
        let mtime = at(100) + Duration::from_millis(500);
        filetime::set_file_mtime(&path, FileTime::from_system_time(mtime)).unwrap();

        let cache = dir.path().join("cache");
        let store = CacheStore::open_at(Some(&cache), false, at(100)).unwrap();
        store.close().unwrap();
        let store = CacheStore::open_at(Some(&cache), false, at(200)).unwrap();
        assert!(store.is_recent(&path));
    }
}
