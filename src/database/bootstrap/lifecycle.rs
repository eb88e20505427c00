//! The hooks a [`StoreOpener`](super::StoreOpener) drives

use std::path::Path;

use tracing::info;

use super::template::{materialize, TemplateProvider};
use crate::database::core::{StoreHandle, StoreOpenError};
use crate::database::external::{CredentialCryptor, SettingsStore};
use crate::database::migration::{run_path, AppliedStep, MigrationContext, Migrations};

/// What happens at each point of an open.
///
/// Implemented once by [`CatalogLifecycle`]. Anything that needs to observe or
/// intercept an open wraps a lifecycle and forwards to it.
pub trait OpenLifecycle {
    /// Newest schema version this lifecycle can bring a store to
    fn latest_version(&self) -> u32;

    /// Materialize a fresh store at `path`. On failure the file must be absent
    /// or read as version 0.
    fn on_create(&self, path: &Path) -> Result<(), StoreOpenError>;

    /// Bring a store from `from` to `to`
    fn on_upgrade(
        &self,
        handle: &dyn StoreHandle,
        from: u32,
        to: u32,
    ) -> Result<Vec<AppliedStep>, StoreOpenError>;

    /// Called once the store is at the latest version
    fn on_open(&self, _handle: &dyn StoreHandle) -> Result<(), StoreOpenError> {
        Ok(())
    }
}

/// The catalog's lifecycle: template creation followed by the migration chain
pub struct CatalogLifecycle {
    template: Box<dyn TemplateProvider>,
    migrations: Migrations,
    cryptor: Box<dyn CredentialCryptor>,
    settings: Box<dyn SettingsStore>,
}

impl CatalogLifecycle {
    pub fn new(
        template: Box<dyn TemplateProvider>,
        cryptor: Box<dyn CredentialCryptor>,
        settings: Box<dyn SettingsStore>,
    ) -> Self {
        Self {
            template,
            migrations: Migrations::catalog(),
            cryptor,
            settings,
        }
    }

    /// Replace the migration chain
    pub fn with_migrations(mut self, migrations: Migrations) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn migrations(&self) -> &Migrations {
        &self.migrations
    }

    pub fn settings(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }
}

impl OpenLifecycle for CatalogLifecycle {
    fn latest_version(&self) -> u32 {
        self.migrations.latest_version()
    }

    fn on_create(&self, path: &Path) -> Result<(), StoreOpenError> {
        materialize(self.template.as_ref(), path)
    }

    fn on_upgrade(
        &self,
        handle: &dyn StoreHandle,
        from: u32,
        to: u32,
    ) -> Result<Vec<AppliedStep>, StoreOpenError> {
        info!(from, to, "upgrading store");
        let path = self
            .migrations
            .path(from)
            .map_err(|source| StoreOpenError::NoMigrationPath { from, source })?;
        let ctx = MigrationContext {
            handle,
            cryptor: self.cryptor.as_ref(),
            settings: self.settings.as_ref(),
        };
        run_path(&ctx, path)
    }
}
