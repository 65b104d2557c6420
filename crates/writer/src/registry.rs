//! Process-wide registry of staged temp files

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

static GLOBAL: TempRegistry = TempRegistry::new();

/// Temp files that exist on disk but have not been renamed into place.
///
/// A path is added right after it is allocated and removed right after its
/// rename succeeds. `sweep` unlinks whatever is left.
#[derive(Debug, Default)]
pub struct TempRegistry {
    paths: Mutex<BTreeSet<PathBuf>>,
}

impl TempRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            paths: Mutex::new(BTreeSet::new()),
        }
    }

    /// The registry shared by every batch in this process
    #[must_use]
    pub fn global() -> &'static TempRegistry {
        &GLOBAL
    }

    // A panic while holding the lock cannot leave the set half-updated.
    fn lock(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, path: PathBuf) {
        self.lock().insert(path);
    }

    /// Returns whether the path was registered.
    pub fn unregister(&self, path: &Path) -> bool {
        self.lock().remove(path)
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Unlink every registered path and clear the registry.
    ///
    /// Unlink failures are ignored. Returns the number of files removed.
    pub fn sweep(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock());
        if drained.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for path in &drained {
            match std::fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "temp file not removed");
                }
            }
        }
        tracing::debug!(registered = drained.len(), removed, "swept temp registry");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_register_and_unregister() {
        let registry = TempRegistry::new();
        let path = PathBuf::from("/tmp/.batchwrite-a");

        registry.register(path.clone());
        assert!(registry.contains(&path));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(&path));
        assert!(!registry.unregister(&path));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_unlinks_and_clears() {
        let dir = tempdir().unwrap();
        let registry = TempRegistry::new();

        let present = dir.path().join("present");
        std::fs::write(&present, b"staged").unwrap();
        let missing = dir.path().join("missing");

        registry.register(present.clone());
        registry.register(missing);

        assert_eq!(registry.sweep(), 1);
        assert!(registry.is_empty());
        assert!(!present.exists());
    }

    #[test]
    fn test_sweep_of_empty_registry() {
        let registry = TempRegistry::new();
        assert_eq!(registry.sweep(), 0);
    }
}
