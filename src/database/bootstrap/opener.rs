use std::cell::Cell;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::lifecycle::OpenLifecycle;
use super::OpenState;
use crate::database::core::{
    SchemaStatus, SqliteStore, StoreError, StoreHandle, StoreOpenError,
};
use crate::database::migration::AppliedStep;

/// What an open did to get the store to the latest version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenReport {
    /// The store was materialized from the template by this open
    pub created: bool,
    pub from_version: u32,
    pub to_version: u32,
    pub applied_steps: Vec<AppliedStep>,
}

/// A store at the latest version, ready for use
#[derive(Debug)]
pub struct OpenedStore {
    pub store: SqliteStore,
    pub report: OpenReport,
}

impl OpenedStore {
    pub fn into_store(self) -> SqliteStore {
        self.store
    }
}

/// Opens stores by name inside one directory.
///
/// Concurrent opens of the same name are not serialized here; callers must
/// not start a second open of a name while one is in flight.
pub struct StoreOpener<L: OpenLifecycle> {
    dir: PathBuf,
    lifecycle: L,
    state: Cell<OpenState>,
}

impl<L: OpenLifecycle> StoreOpener<L> {
    pub fn new(dir: impl Into<PathBuf>, lifecycle: L) -> Self {
        Self {
            dir: dir.into(),
            lifecycle,
            state: Cell::new(OpenState::NotOpened),
        }
    }

    /// State of the most recent open
    pub fn state(&self) -> OpenState {
        self.state.get()
    }

    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Open `name`, creating it from the template if needed and migrating it
    /// to the latest version.
    pub fn open(&self, name: &str) -> Result<OpenedStore, StoreOpenError> {
        self.transition(OpenState::NotOpened);
        let path = self.store_path(name);
        match self.open_at(&path) {
            Ok(opened) => {
                self.transition(OpenState::Open);
                Ok(opened)
            }
            Err(e) => {
                warn!("open of {} failed: {}", path.display(), e);
                self.transition(OpenState::Failed);
                Err(e)
            }
        }
    }

    fn open_at(&self, path: &Path) -> Result<OpenedStore, StoreOpenError> {
        let created = if self.exists(path)? {
            false
        } else {
            self.transition(OpenState::TemplateFetching);
            self.lifecycle.on_create(path)?;
            true
        };

        if created {
            self.transition(OpenState::Creating);
        }
        let store = SqliteStore::open(path).map_err(|source| StoreOpenError::StoreOpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let from_version = store
            .version()
            .map_err(|source| StoreOpenError::StoreOpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        let latest = self.lifecycle.latest_version();
        if from_version > latest {
            close_quietly(store);
            return Err(StoreOpenError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: from_version,
                supported: latest,
            });
        }

        let mut applied_steps = Vec::new();
        if from_version < latest {
            self.transition(OpenState::Migrating);
            match self.lifecycle.on_upgrade(&store, from_version, latest) {
                Ok(steps) => applied_steps = steps,
                Err(e) => {
                    close_quietly(store);
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.lifecycle.on_open(&store) {
            close_quietly(store);
            return Err(e);
        }

        info!(
            created,
            from = from_version,
            to = latest,
            "opened store {}",
            path.display()
        );
        Ok(OpenedStore {
            store,
            report: OpenReport {
                created,
                from_version,
                to_version: latest,
                applied_steps,
            },
        })
    }

    /// Whether a usable store file is at `path`. A file that reads as
    /// version 0 is left over from an aborted creation and is removed.
    fn exists(&self, path: &Path) -> Result<bool, StoreOpenError> {
        if !path.exists() {
            return Ok(false);
        }
        let version = read_version(path)?;
        if version > 0 {
            return Ok(true);
        }
        warn!(
            "{} reads as version 0, discarding it and starting over",
            path.display()
        );
        remove_store_files(path).map_err(|e| {
            StoreOpenError::creation_aborted(path, "cannot remove unversioned store", e)
        })?;
        Ok(false)
    }

    /// Where `name` stands relative to the latest version, without changing it
    pub fn status(&self, name: &str) -> Result<SchemaStatus, StoreOpenError> {
        let path = self.store_path(name);
        if !path.exists() {
            return Ok(SchemaStatus::Missing);
        }
        let version = read_version(&path)?;
        Ok(SchemaStatus::classify(version, self.lifecycle.latest_version()))
    }

    /// Remove `name` and its journal files. Returns whether the store existed.
    pub fn delete_store(&self, name: &str) -> std::io::Result<bool> {
        let path = self.store_path(name);
        let existed = path.exists();
        remove_store_files(&path)?;
        if existed {
            info!("deleted store {}", path.display());
        }
        Ok(existed)
    }

    fn transition(&self, state: OpenState) {
        debug!(from = ?self.state.get(), to = ?state, "open state");
        self.state.set(state);
    }
}

fn read_version(path: &Path) -> Result<u32, StoreOpenError> {
    let failed = |source: StoreError| StoreOpenError::StoreOpenFailed {
        path: path.to_path_buf(),
        source,
    };
    let store = SqliteStore::open_unconfigured(path).map_err(failed)?;
    let version = store.version().map_err(failed)?;
    store.close().map_err(failed)?;
    Ok(version)
}

fn remove_store_files(path: &Path) -> std::io::Result<()> {
    let mut candidates = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        candidates.push(PathBuf::from(name));
    }
    for candidate in candidates {
        match std::fs::remove_file(&candidate) {
            Ok(()) => debug!("removed {}", candidate.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn close_quietly(store: SqliteStore) {
    if let Err(e) = store.close() {
        warn!("closing store failed: {}", e);
    }
}
