//! In-memory cache of parsed resources.
//!
//! Keys are absolute, normalized paths. Entries live until the host reports a
//! modification newer than the entry's timestamp.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::resource::Resource;

/// Resources by absolute path.
#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: HashMap<PathBuf, Arc<Resource>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<Resource>> {
        self.entries.get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Stores a resource under its own path, replacing any previous entry.
    pub fn insert(&mut self, resource: Arc<Resource>) {
        self.entries.insert(resource.file.clone(), resource);
    }

    pub fn remove(&mut self, path: &Path) -> Option<Arc<Resource>> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts every entry created before its path's reported modification
    /// time. Returns the number of evicted entries.
    pub fn invalidate(&mut self, changed: &HashMap<PathBuf, SystemTime>) -> usize {
        let mut evicted = 0;
        for (path, modified) in changed {
            let stale = self
                .entries
                .get(path)
                .map(|cached| cached.timestamp < *modified)
                .unwrap_or(false);
            if stale {
                self.entries.remove(path);
                tracing::debug!(path = %path.display(), "evicted cached resource");
                evicted += 1;
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ParseMode;
    use std::time::Duration;

    fn resource(path: &str) -> Arc<Resource> {
        Arc::new(Resource::new(
            PathBuf::from(path),
            String::new(),
            Default::default(),
            ParseMode::Parsed,
        ))
    }

    #[test]
    fn test_insert_and_get_by_path() {
        let mut cache = ResourceCache::new();
        cache.insert(resource("/a.scss"));
        assert!(cache.contains(Path::new("/a.scss")));
        assert_eq!(cache.get(Path::new("/a.scss")).unwrap().file, PathBuf::from("/a.scss"));
        assert!(cache.get(Path::new("/b.scss")).is_none());
    }

    #[test]
    fn test_invalidate_evicts_only_older_entries() {
        let mut cache = ResourceCache::new();
        let a = resource("/a.scss");
        let b = resource("/b.scss");
        cache.insert(a.clone());
        cache.insert(b.clone());

        let changed = HashMap::from([
            (PathBuf::from("/a.scss"), a.timestamp + Duration::from_secs(1)),
            (PathBuf::from("/b.scss"), b.timestamp - Duration::from_secs(1)),
            (PathBuf::from("/c.scss"), SystemTime::now()),
        ]);

        assert_eq!(cache.invalidate(&changed), 1);
        assert!(!cache.contains(Path::new("/a.scss")));
        assert!(cache.contains(Path::new("/b.scss")));
    }

    #[test]
    fn test_invalidate_same_timestamp_keeps_entry() {
        let mut cache = ResourceCache::new();
        let a = resource("/a.scss");
        cache.insert(a.clone());
        let changed = HashMap::from([(PathBuf::from("/a.scss"), a.timestamp)]);
        assert_eq!(cache.invalidate(&changed), 0);
        assert_eq!(cache.len(), 1);
    }
}
