//! Catalog schema definitions
//!
//! The store is never created by the engine's default empty-schema path. A
//! version-1 template is materialized instead; this module defines that
//! template and can write it out, and reports where an existing store stands
//! relative to the newest schema.

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use super::error::{StoreError, StoreResult};
use super::handle::StoreHandle;

/// Schema version every template carries
pub const TEMPLATE_VERSION: u32 = 1;

/// Table names shared by the template, the migration chain and the repositories
pub struct Tables;

impl Tables {
    pub const CLOUD: &'static str = "CLOUD_ENTITY";
    pub const VAULT: &'static str = "VAULT_ENTITY";
    pub const UPDATE_CHECK: &'static str = "UPDATE_CHECK_ENTITY";
}

/// Schema definitions for the version-1 template
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the cloud connections table
    pub const CLOUD_TABLE: &'static str = r#"
        CREATE TABLE CLOUD_ENTITY (
            _id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            TYPE TEXT NOT NULL,
            ACCESS_TOKEN TEXT,
            WEBDAV_URL TEXT,
            USERNAME TEXT
        );
    "#;

    /// SQL for creating the vaults table
    pub const VAULT_TABLE: &'static str = r#"
        CREATE TABLE VAULT_ENTITY (
            _id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            FOLDER_CLOUD_ID INTEGER,
            FOLDER_PATH TEXT,
            FOLDER_NAME TEXT NOT NULL,
            CLOUD_TYPE TEXT NOT NULL,
            PASSWORD TEXT,
            CONSTRAINT FK_FOLDER_CLOUD_ID_CLOUD_ENTITY
                FOREIGN KEY (FOLDER_CLOUD_ID) REFERENCES CLOUD_ENTITY(_id) ON DELETE SET NULL
        );
    "#;

    /// Default clouds every fresh store starts with
    pub const DEFAULT_CLOUDS: &'static [(i64, &'static str)] = &[
        (1, "DROPBOX"),
        (2, "GOOGLE_DRIVE"),
        (3, "ONEDRIVE"),
        (4, "LOCAL"),
    ];
}

/// Write the version-1 template to `path`.
///
/// The file must not exist yet. It is written with a rollback journal so the
/// result is one self-contained file that can be shipped and copied as is.
pub fn write_template(path: &Path) -> StoreResult<()> {
    if path.exists() {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }

    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=DELETE;")?;

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(SchemaDefinitions::CLOUD_TABLE)?;
    tx.execute_batch(SchemaDefinitions::VAULT_TABLE)?;
    for (id, cloud_type) in SchemaDefinitions::DEFAULT_CLOUDS {
        tx.execute(
            "INSERT INTO CLOUD_ENTITY (_id, TYPE) VALUES (?1, ?2)",
            rusqlite::params![id, cloud_type],
        )?;
    }
    tx.pragma_update(None, "user_version", TEMPLATE_VERSION)?;
    tx.commit()?;

    conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
    info!("wrote version {} template to {}", TEMPLATE_VERSION, path.display());
    Ok(())
}

/// The version-1 template as raw bytes.
pub fn template_bytes() -> StoreResult<Vec<u8>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("template.db");
    write_template(&path)?;
    Ok(std::fs::read(&path)?)
}

/// Status of a store's schema relative to the newest version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// No store file exists
    Missing,

    /// A file exists but reads as version 0 (an aborted creation)
    NotInitialized,

    /// Schema is at the newest version
    Current { version: u32 },

    /// Schema needs migration from an older version
    NeedsMigration { from: u32, to: u32 },

    /// Store was written by a newer schema (incompatible)
    Incompatible {
        database_version: u32,
        required_version: u32,
    },
}

impl SchemaStatus {
    /// Classify a store by its version against `latest`.
    pub fn classify(version: u32, latest: u32) -> Self {
        match version {
            0 => SchemaStatus::NotInitialized,
            v if v == latest => SchemaStatus::Current { version: v },
            v if v < latest => SchemaStatus::NeedsMigration { from: v, to: latest },
            v => SchemaStatus::Incompatible {
                database_version: v,
                required_version: latest,
            },
        }
    }

    /// Check an open handle against `latest`.
    pub fn check(handle: &dyn StoreHandle, latest: u32) -> StoreResult<Self> {
        Ok(Self::classify(handle.version()?, latest))
    }
}

impl std::fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaStatus::Missing => write!(f, "missing"),
            SchemaStatus::NotInitialized => write!(f, "not initialized"),
            SchemaStatus::Current { version } => write!(f, "current (v{})", version),
            SchemaStatus::NeedsMigration { from, to } => {
                write!(f, "needs migration (v{} -> v{})", from, to)
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => write!(
                f,
                "incompatible (v{}, newest supported v{})",
                database_version, required_version
            ),
        }
    }
}
