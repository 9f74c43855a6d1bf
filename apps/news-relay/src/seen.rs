use crate::error::StoreError;
use crate::models::StoryId;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Durable, bounded set of already-published story ids.
///
/// Ids are kept in insertion order; once `capacity` is exceeded the oldest
/// entries are evicted first. Every successful `add` rewrites the document.
#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    capacity: usize,
    order: VecDeque<StoryId>,
    members: HashSet<StoryId>,
}

impl SeenStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, StoreError> {
        let path = path.into();
        let capacity = capacity.max(1);

        let ids: Vec<StoryId> = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No seen store found, starting empty");
                Vec::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let mut store = Self {
            path,
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
        };
        for id in ids {
            store.insert(id);
        }

        debug!(path = %store.path.display(), count = store.len(), capacity, "Seen store loaded");
        Ok(store)
    }

    pub fn contains(&self, id: &StoryId) -> bool {
        self.members.contains(id)
    }

    /// Record `id` and persist. Adding an id already present is a no-op.
    ///
    /// The in-memory set is updated even when the write fails.
    pub fn add(&mut self, id: StoryId) -> Result<(), StoreError> {
        if self.contains(&id) {
            return Ok(());
        }
        self.insert(id);
        self.save()
    }

    /// Ids currently held, oldest first.
    pub fn snapshot(&self) -> Vec<StoryId> {
        self.order.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn insert(&mut self, id: StoryId) {
        if !self.members.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
                debug!(story_id = %evicted, "Evicted oldest seen id");
            }
        }
    }

    fn save(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_vec_pretty(&self.order).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json).map_err(io_err)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to replace seen store");
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StoryId {
        StoryId::from(s)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::load(dir.path().join("seen.json"), 5).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SeenStore::load(dir.path().join("seen.json"), 5).unwrap();
        store.add(id("a")).unwrap();
        store.add(id("a")).unwrap();
        assert_eq!(store.snapshot(), vec![id("a")]);
    }

    #[test]
    fn test_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("seen.json");
        {
            let mut store = SeenStore::load(&path, 5).unwrap();
            store.add(id("a")).unwrap();
            store.add(id("b")).unwrap();
        }
        let store = SeenStore::load(&path, 5).unwrap();
        assert!(store.contains(&id("a")));
        assert!(store.contains(&id("b")));
        assert_eq!(store.snapshot(), vec![id("a"), id("b")]);
    }

    #[test]
    fn test_evicts_oldest_beyond_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let mut store = SeenStore::load(&path, 3).unwrap();
        for s in ["a", "b", "c", "d"] {
            store.add(id(s)).unwrap();
        }
        assert!(!store.contains(&id("a")));
        assert_eq!(store.snapshot(), vec![id("b"), id("c"), id("d")]);

        let reloaded = SeenStore::load(&path, 3).unwrap();
        assert!(!reloaded.contains(&id("a")));
        assert_eq!(reloaded.len(), 3);
    }

    #[test]
    fn test_re_adding_does_not_refresh_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SeenStore::load(dir.path().join("seen.json"), 2).unwrap();
        store.add(id("a")).unwrap();
        store.add(id("b")).unwrap();
        store.add(id("a")).unwrap();
        store.add(id("c")).unwrap();
        assert_eq!(store.snapshot(), vec![id("b"), id("c")]);
    }

    #[test]
    fn test_load_truncates_to_newest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        std::fs::write(&path, r#"["1","2","3","4"]"#).unwrap();
        let store = SeenStore::load(&path, 2).unwrap();
        assert_eq!(store.snapshot(), vec![id("3"), id("4")]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(SeenStore::load(&path, 5), Err(StoreError::Corrupt { .. })));
    }
}
