//! Freshness checks of source files and zip directory trees.

use std::collections::BTreeSet;

use sedrila_cache::State;
use sedrila_common::{InternalError, SedrilaResult};
use walkdir::WalkDir;

use crate::directory::Directory;
use crate::element::{Detail, ElementId};

impl Directory {
    /// A file seen for the first time is recorded and counts as changed; a
    /// file that does not exist stays missing.
    pub(crate) fn check_sourcefile(&mut self, id: ElementId) {
        let element = self.element(id);
        let key = element.cache_key();
        let Detail::File { path, .. } = &element.detail else {
            return;
        };
        let path = path.clone();
        let mut state = self.cache.classify_path(&path, &key);
        if state == State::Missing && path.exists() {
            self.cache.record_path(&path, &key);
            state = State::Changed;
        }
        self.element_mut(id).state = state;
    }

    /// A zip directory changed if any file in it is recent or the set of
    /// files differs from the cached list, which is then rewritten.
    pub(crate) fn check_zipdir(&mut self, id: ElementId) -> SedrilaResult<()> {
        let element = self.element(id);
        let key = element.cache_key();
        let Detail::Tree { path } = &element.detail else {
            return Ok(());
        };
        let path = path.clone();
        let mut files = Vec::new();
        let mut recent_file = false;
        for entry in WalkDir::new(&path).sort_by_file_name() {
            let entry = entry.map_err(|e| InternalError::new(format!("cannot walk {}: {e}", path.display())))?;
            if entry.file_type().is_file() {
                recent_file |= self.cache.is_recent(entry.path());
                files.push(entry.path().to_string_lossy().into_owned());
            }
        }
        let cached = self.cache.read_list(&key);
        let sets_differ = cached
            .as_ref()
            .map(|old| old.iter().collect::<BTreeSet<_>>() != files.iter().collect::<BTreeSet<_>>())
            .unwrap_or(true);
        let state = if cached.is_none() || recent_file || sets_differ {
            tracing::debug!(
                target: "sedrila.build",
                zipdir = %path.display(),
                cached = cached.is_some(),
                recent_file,
                sets_differ,
                "zipdir changed"
            );
            if !self.cache.written_this_run(&key) {
                self.cache.write_list(&key, files);
            }
            State::Changed
        } else {
            State::Unchanged
        };
        self.element_mut(id).state = state;
        Ok(())
    }
}
