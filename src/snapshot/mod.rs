//! Raw page snapshots: one HTML file per fetched page, overwritten each run.
//!
//! The snapshots double as an offline input: `extract` re-parses them
//! without touching the network. A missing snapshot is its own error
//! variant so callers can tell "never fetched, go fetch" apart from a
//! real I/O failure.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Pages the pipeline snapshots to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Profile,
    Wishlist,
}

impl Page {
    pub fn file_name(self) -> &'static str {
        match self {
            Page::Profile => "profile.html",
            Page::Wishlist => "wishlist.html",
        }
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no snapshot at {0:?} (not fetched yet)")]
    Missing(PathBuf),
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn path(&self, page: Page) -> PathBuf {
        self.dir.join(page.file_name())
    }

    /// Overwrite the snapshot for `page`, creating the directory if needed.
    pub fn save(&self, page: Page, html: &str) -> Result<(), SnapshotError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(page);
        std::fs::write(&path, html)?;
        debug!("Snapshot written: {:?} ({} bytes)", path, html.len());
        Ok(())
    }

    pub fn load(&self, page: Page) -> Result<String, SnapshotError> {
        let path = self.path(page);
        match std::fs::read_to_string(&path) {
            Ok(html) => Ok(html),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SnapshotError::Missing(path)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> SnapshotStore {
        let dir = std::env::temp_dir().join(format!("siriust-etl-test-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        SnapshotStore::new(&dir)
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = temp_store("roundtrip");
        store.save(Page::Profile, "<html>профиль</html>").unwrap();
        assert_eq!(store.load(Page::Profile).unwrap(), "<html>профиль</html>");
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let store = temp_store("overwrite");
        store.save(Page::Wishlist, "old").unwrap();
        store.save(Page::Wishlist, "new").unwrap();
        assert_eq!(store.load(Page::Wishlist).unwrap(), "new");
    }

    #[test]
    fn missing_snapshot_is_distinguishable() {
        let store = temp_store("missing");
        match store.load(Page::Wishlist) {
            Err(SnapshotError::Missing(path)) => {
                assert!(path.ends_with("wishlist.html"));
            }
            other => panic!("expected Missing, got {:?}", other.map(|s| s.len())),
        }
    }
}
