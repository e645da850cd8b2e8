//! Local mirror of the last good snapshot.
//!
//! When the primary store can't be read, the mirror keeps the tracker
//! usable. The primary error still travels with the cached data so the
//! caller can tell the user and offer a retry.

use crate::state::{load_json, save_json};
use crate::store::RecordStore;
use crate::types::CycleData;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Mirror of the last snapshot read from the primary store
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache at `<data_dir>/cache/snapshot.json`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("cache").join("snapshot.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, data: &CycleData) -> Result<()> {
        save_json(&self.path, data)
    }

    /// The cached snapshot, or `None` if nothing has been mirrored
    pub fn load(&self) -> Result<Option<CycleData>> {
        load_json(&self.path)
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Result of a snapshot load that may have used the mirror
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub data: CycleData,
    /// Why the primary store couldn't be used, when the mirror was
    pub primary_error: Option<Error>,
}

impl LoadedSnapshot {
    pub fn is_stale(&self) -> bool {
        self.primary_error.is_some()
    }
}

/// Read the primary store, falling back to the mirror
///
/// On success the mirror is refreshed; a failure to refresh it is only
/// logged. If the primary fails and the mirror has data, that data is
/// returned along with the primary error. If both fail, the primary error
/// is returned.
pub fn load_with_fallback(
    store: &dyn RecordStore,
    cache: Option<&SnapshotCache>,
) -> Result<LoadedSnapshot> {
    let primary_error = match store.snapshot() {
        Ok(data) => {
            if let Some(cache) = cache {
                if let Err(e) = cache.save(&data) {
                    tracing::warn!("Failed to refresh snapshot cache {:?}: {}", cache.path(), e);
                }
            }
            return Ok(LoadedSnapshot {
                data,
                primary_error: None,
            });
        }
        Err(e) => e,
    };

    tracing::error!("Failed to load records: {}", primary_error);

    let Some(cache) = cache else {
        return Err(primary_error);
    };

    match cache.load() {
        Ok(Some(data)) => {
            tracing::warn!("Using cached snapshot from {:?}", cache.path());
            Ok(LoadedSnapshot {
                data,
                primary_error: Some(primary_error),
            })
        }
        Ok(None) => Err(primary_error),
        Err(e) => {
            tracing::warn!("Snapshot cache unusable: {}", e);
            Err(primary_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JournalStore;
    use crate::types::{CycleRecord, Flow, NoteEntry, SymptomEntry};

    /// Store whose reads always fail
    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn snapshot(&self) -> Result<CycleData> {
            Err(Error::Other("backend unavailable".into()))
        }
        fn add_cycle(&mut self, cycle: CycleRecord) -> Result<CycleRecord> {
            Ok(cycle)
        }
        fn replace_cycle(&mut self, cycle: CycleRecord) -> Result<CycleRecord> {
            Ok(cycle)
        }
        fn delete_cycle(&mut self, _id: &str) -> Result<()> {
            Ok(())
        }
        fn add_symptom(&mut self, entry: SymptomEntry) -> Result<SymptomEntry> {
            Ok(entry)
        }
        fn delete_symptom(&mut self, _id: &str) -> Result<()> {
            Ok(())
        }
        fn add_note(&mut self, note: NoteEntry) -> Result<NoteEntry> {
            Ok(note)
        }
        fn delete_note(&mut self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn sample_cycle() -> CycleRecord {
        CycleRecord::new("2025-01-01".parse().unwrap(), None, Flow::Light, None).unwrap()
    }

    #[test]
    fn test_primary_success_refreshes_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JournalStore::in_dir(temp_dir.path());
        let cache = SnapshotCache::in_dir(temp_dir.path());
        store.add_cycle(sample_cycle()).unwrap();

        let loaded = load_with_fallback(&store, Some(&cache)).unwrap();
        assert!(!loaded.is_stale());
        assert_eq!(loaded.data.cycles.len(), 1);
        assert_eq!(cache.load().unwrap(), Some(loaded.data));
    }

    #[test]
    fn test_falls_back_to_cache_with_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::in_dir(temp_dir.path());
        let cached = CycleData {
            cycles: vec![sample_cycle()],
            ..CycleData::default()
        };
        cache.save(&cached).unwrap();

        let loaded = load_with_fallback(&BrokenStore, Some(&cache)).unwrap();
        assert!(loaded.is_stale());
        assert_eq!(loaded.data, cached);
        assert!(loaded
            .primary_error
            .unwrap()
            .to_string()
            .contains("backend unavailable"));
    }

    #[test]
    fn test_error_when_no_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::in_dir(temp_dir.path());

        assert!(load_with_fallback(&BrokenStore, Some(&cache)).is_err());
        assert!(load_with_fallback(&BrokenStore, None).is_err());
    }

    #[test]
    fn test_clear_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::in_dir(temp_dir.path());
        cache.save(&CycleData::default()).unwrap();

        cache.clear().unwrap();
        assert_eq!(cache.load().unwrap(), None);
        cache.clear().unwrap();
    }
}
