//! Database module
//!
//! This module provides all store functionality for the catalog, organized into:
//!
//! - **core**: the `StoreHandle` primitives, the SQLite adapter, the template
//!   schema and the error taxonomy
//! - **sql**: validated builders producing SQL plus positional arguments
//! - **migration**: the ordered version chain and its runner
//! - **bootstrap**: template-based creation and the open sequence
//! - **mapping**: a `StoreHandle` decorator that rewrites SQL before delegating
//! - **catalog**: typed repositories over the migrated store
//! - **external**: credential cryptor and settings store seams
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── handle      # StoreHandle / PreparedStatement traits
//! │   ├── connection  # rusqlite-backed SqliteStore
//! │   ├── schema      # Version-1 template schema, SchemaStatus
//! │   └── error       # StoreError, StoreOpenError, ...
//! │
//! ├── sql/            # Query, insert, update, delete and DDL builders
//! │
//! ├── migration/      # Schema evolution
//! │   ├── steps       # The catalog's steps 1 -> 13
//! │   └── runner      # Per-step transactions, recovery
//! │
//! ├── bootstrap/      # Opening
//! │   ├── template    # Template providers, atomic materialization
//! │   ├── lifecycle   # on_create / on_upgrade / on_open hooks
//! │   └── opener      # The open state machine
//! │
//! ├── mapping/        # SQL-rewriting proxy
//! │
//! └── catalog/        # Clouds, vaults, update check
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use vault_catalog::database::{CatalogDatabase, CatalogLifecycle, BytesTemplate};
//! use vault_catalog::database::external::{IdentityCryptor, InMemorySettings};
//!
//! let lifecycle = CatalogLifecycle::new(
//!     Box::new(BytesTemplate::builtin()?),
//!     Box::new(IdentityCryptor),
//!     Box::new(InMemorySettings::new()),
//! );
//! let db = CatalogDatabase::open_in_dir("~/.vault-catalog".as_ref(), lifecycle)?;
//!
//! for cloud in db.clouds().all()? {
//!     println!("{} {}", cloud.id, cloud.cloud_type);
//! }
//! ```
//!
//! ## Mapping proxy
//!
//! ```rust,ignore
//! use vault_catalog::database::MappingStore;
//!
//! let store = MappingStore::new(db.into_store(), |sql: &str| format!("{} -- traced", sql));
//! store.exec_sql("DELETE FROM VAULT_ENTITY")?;
//! ```

pub mod bootstrap;
pub mod catalog;
pub mod core;
pub mod external;
pub mod mapping;
pub mod migration;
pub mod sql;

// Store primitives
pub use core::{
    BoundArgument, ContentValues, PreparedStatement, SchemaStatus, SqliteStore, StoreError,
    StoreHandle, StoreOpenError, StoreResult,
};

// Opening
pub use bootstrap::{
    BytesTemplate, CatalogLifecycle, FileTemplate, OpenLifecycle, OpenReport, OpenState,
    OpenedStore, StoreOpener, TemplateProvider,
};

// Migrations
pub use migration::{AppliedStep, MigrationStep, Migrations};

// Mapping proxy
pub use mapping::{MappingStore, SqlMapping, ALWAYS_TRUE};

// Catalog
pub use catalog::{CatalogDatabase, CloudRecord, CloudType, VaultRecord, DEFAULT_STORE_NAME};

