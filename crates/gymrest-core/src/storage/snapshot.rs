//! Single-slot snapshot persistence.
//!
//! The persistence adapter holds exactly one rest timer snapshot per device,
//! behind a narrow get/set/clear interface. The slot supports atomic
//! replace-whole-value semantics only -- no partial-field writes -- so
//! cross-process readers never see a torn record.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::timer::RestTimerState;

/// Narrow accessor interface over the single snapshot slot.
///
/// The timer controller is the sole writer; everything else reads.
pub trait SnapshotStore {
    fn get(&self) -> Result<Option<RestTimerState>, StoreError>;
    fn set(&self, state: &RestTimerState) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn get(&self) -> Result<Option<RestTimerState>, StoreError> {
        (**self).get()
    }

    fn set(&self, state: &RestTimerState) -> Result<(), StoreError> {
        (**self).set(state)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// File-backed slot: one well-known JSON file in the shared data directory.
///
/// Writes go through a temp file followed by a rename, which is an atomic
/// replace on the platforms we care about.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Opens the store at the well-known slot path.
    pub fn open() -> Result<Self, StoreError> {
        Ok(Self {
            path: super::data_dir()?.join("rest_timer.json"),
        })
    }

    /// Opens the store at a custom path (embedding, tests).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn get(&self) -> Result<Option<RestTimerState>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::ReadFailed {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        let state: RestTimerState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    fn set(&self, state: &RestTimerState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, &json)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| StoreError::WriteFailed {
                path: self.path.clone(),
                source: e,
            })
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

/// In-memory slot for tests and embedding.
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<RestTimerState>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle: clones see the same slot.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn get(&self) -> Result<Option<RestTimerState>, StoreError> {
        Ok(self.slot.lock().expect("slot poisoned").clone())
    }

    fn set(&self, state: &RestTimerState) -> Result<(), StoreError> {
        *self.slot.lock().expect("slot poisoned") = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().expect("slot poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample() -> RestTimerState {
        RestTimerState::create(Uuid::new_v4(), "Leg Day", 0, 1, 120, None, None)
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::with_path(dir.path().join("rest_timer.json"));

        assert!(store.get().unwrap().is_none());

        let state = sample();
        store.set(&state).unwrap();
        assert_eq!(store.get().unwrap(), Some(state.clone()));

        // Overwrite replaces the whole slot.
        let replacement = sample();
        store.set(&replacement).unwrap();
        assert_eq!(store.get().unwrap(), Some(replacement));

        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn clear_on_empty_slot_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::with_path(dir.path().join("rest_timer.json"));
        store.clear().unwrap();
    }

    #[test]
    fn garbage_in_slot_reports_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rest_timer.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileSnapshotStore::with_path(path);
        assert!(matches!(store.get(), Err(StoreError::Json(_))));
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::with_path(dir.path().join("rest_timer.json"));
        store.set(&sample()).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("rest_timer.json")]);
    }

    #[test]
    fn memory_store_shares_slot_across_handles() {
        let store = MemorySnapshotStore::shared();
        let other = Arc::clone(&store);
        let state = sample();
        store.set(&state).unwrap();
        assert_eq!(other.get().unwrap(), Some(state));
        other.clear().unwrap();
        assert!(store.get().unwrap().is_none());
    }
}
