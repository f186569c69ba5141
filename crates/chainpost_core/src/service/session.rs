//! Per-session context and codename persistence.
//!
//! # Responsibility
//! - Carry one courier session's resolved state through pickup/dropoff
//!   calls, replacing shared mutable globals.
//! - Persist the confirmed codename across the pickup-to-dropoff gap.
//!
//! # Invariants
//! - A `SessionContext` is owned by exactly one session handler and never
//!   shared between sessions.
//! - Codename persistence is best-effort; losing it degrades UX, never
//!   correctness.

use crate::model::delivery::Delivery;
use log::warn;
use std::cell::RefCell;
use std::io;
use std::path::PathBuf;

/// State for one courier session.
#[derive(Debug, Default, Clone)]
pub struct SessionContext {
    /// Normalized (lowercase) codename once entered or recalled.
    pub codename: Option<String>,
    /// The in-progress delivery once resolved at dropoff time.
    pub delivery: Option<Delivery>,
    /// The courier could not produce a usable codename.
    pub failed_codename: bool,
    /// The courier's location could not be read.
    pub failed_location: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the session from a previously persisted codename.
    pub fn recall(store: &dyn CodenameStore) -> Self {
        Self {
            codename: store.load(),
            ..Self::default()
        }
    }
}

/// Narrow persistence for the courier's codename between page loads.
pub trait CodenameStore {
    /// The persisted codename, if any. Read errors degrade to `None`.
    fn load(&self) -> Option<String>;
    fn store(&self, codename: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// File-backed store: one codename per file.
pub struct FsCodenameStore {
    path: PathBuf,
}

impl FsCodenameStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CodenameStore for FsCodenameStore {
    fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(
                    "event=codename_load_failed module=session path={} error={err}",
                    self.path.display()
                );
                None
            }
        }
    }

    fn store(&self, codename: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, codename)
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCodenameStore {
    slot: RefCell<Option<String>>,
}

impl MemoryCodenameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodenameStore for MemoryCodenameStore {
    fn load(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    fn store(&self, codename: &str) -> io::Result<()> {
        *self.slot.borrow_mut() = Some(codename.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CodenameStore, FsCodenameStore, MemoryCodenameStore, SessionContext};

    #[test]
    fn memory_store_round_trips_and_clears() {
        let store = MemoryCodenameStore::new();
        assert_eq!(store.load(), None);
        store.store("redmemo").unwrap();
        assert_eq!(store.load().as_deref(), Some("redmemo"));
        store.clear().unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn fs_store_survives_reconstruction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codename");

        let store = FsCodenameStore::new(&path);
        store.store("shadowtelegram").unwrap();

        let reopened = FsCodenameStore::new(&path);
        assert_eq!(reopened.load().as_deref(), Some("shadowtelegram"));

        let session = SessionContext::recall(&reopened);
        assert_eq!(session.codename.as_deref(), Some("shadowtelegram"));
    }

    #[test]
    fn fs_store_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCodenameStore::new(dir.path().join("absent"));
        assert_eq!(store.load(), None);
        store.clear().unwrap();
    }
}
