//! Catalog database
//!
//! The persistent catalog: cloud connections, vaults, and the update-check
//! state. [`CatalogDatabase`] opens the store through the bootstrap sequence,
//! so a handle obtained from it is always at the latest schema version.

mod cloud;
mod update_check;
mod vault;

pub use cloud::{CloudRecord, CloudRepository, CloudType};
pub use update_check::{UpdateCheckRecord, UpdateCheckRepository};
pub use vault::{VaultRecord, VaultRepository};

use std::path::Path;

use tracing::info;

use crate::database::bootstrap::{CatalogLifecycle, OpenReport, OpenedStore, StoreOpener};
use crate::database::core::{SqliteStore, StoreHandle, StoreOpenError};

/// Default file name of the catalog store
pub const DEFAULT_STORE_NAME: &str = "catalog.db";

/// The catalog store at its latest schema
pub struct CatalogDatabase {
    store: SqliteStore,
    report: OpenReport,
}

impl CatalogDatabase {
    /// Open (creating and migrating as needed) the store at `path`
    pub fn open(path: &Path, lifecycle: CatalogLifecycle) -> Result<Self, StoreOpenError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string());
        let opener = StoreOpener::new(dir, lifecycle);
        Ok(Self::from_opened(opener.open(&name)?))
    }

    /// Open `{data_dir}/catalog.db`
    pub fn open_in_dir(data_dir: &Path, lifecycle: CatalogLifecycle) -> Result<Self, StoreOpenError> {
        Self::open(&data_dir.join(DEFAULT_STORE_NAME), lifecycle)
    }

    pub fn from_opened(opened: OpenedStore) -> Self {
        let OpenedStore { store, report } = opened;
        if report.created {
            info!("created catalog store at version {}", report.to_version);
        }
        Self { store, report }
    }

    /// What the open did
    pub fn report(&self) -> &OpenReport {
        &self.report
    }

    pub fn clouds(&self) -> CloudRepository<'_> {
        CloudRepository::new(&self.store)
    }

    pub fn vaults(&self) -> VaultRepository<'_> {
        VaultRepository::new(&self.store)
    }

    pub fn update_check(&self) -> UpdateCheckRepository<'_> {
        UpdateCheckRepository::new(&self.store)
    }

    /// The underlying handle (for queries that span repositories)
    pub fn handle(&self) -> &dyn StoreHandle {
        &self.store
    }

    pub fn into_store(self) -> SqliteStore {
        self.store
    }
}
