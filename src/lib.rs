#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Vault Catalog - an embedded catalog store for vaults and cloud connections
//!
//! The catalog keeps cloud connections, vaults and update-check state in a
//! single SQLite file. This crate owns how that file comes to exist and how it
//! evolves:
//!
//! - new stores are materialized from a prebuilt version-1 template rather
//!   than created by the engine
//! - every open walks the store forward through an ordered chain of
//!   migration steps, one transaction per step
//! - a mapping proxy can rewrite every SQL string before it reaches the store
//!
//! It can be used as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `database` | Store, migrations, bootstrap, mapping proxy, config | `rusqlite`, `tempfile` |
//! | `display` | Table formatting with `tabled` for the binary | `tabled` |
//! | `cli` | The `vault-catalog` binary | All above + `clap`, `tracing-subscriber` |
//!
//! ## Choosing Features
//!
//! ```toml
//! # Library only
//! vault-catalog = { version = "0.4", default-features = false, features = ["database"] }
//!
//! # Default (CLI binary)
//! vault-catalog = "0.4"
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: All store functionality
//!   - `core`: store primitives, the SQLite adapter, schema and errors
//!   - `sql`: statement builders
//!   - `migration`: the version chain and runner
//!   - `bootstrap`: template creation and the open sequence
//!   - `mapping`: the SQL-rewriting proxy
//!   - `catalog`: repositories over the migrated store
//!
//! - **[`config`]**: Configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vault_catalog::{CatalogConfig, CatalogDatabase};
//!
//! let config = CatalogConfig::new(&None)?;
//! let db = CatalogDatabase::open(&config.store_path(), config.lifecycle()?)?;
//!
//! println!(
//!     "v{}: {} steps applied",
//!     db.report().to_version,
//!     db.report().applied_steps.len()
//! );
//! for vault in db.vaults().all()? {
//!     println!("{} {}", vault.position, vault.name);
//! }
//! ```

#[cfg(feature = "database")]
pub mod config;
#[cfg(feature = "database")]
pub mod database;

// =============================================================================
// Configuration (requires the store it points at)
// =============================================================================

#[cfg(feature = "database")]
pub use config::CatalogConfig;

// Shared store info types (used by the status and open commands)
#[cfg(feature = "database")]
pub use config::{format_size, get_store_info, StoreInfo};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

#[cfg(feature = "database")]
pub use database::{
    BytesTemplate, CatalogDatabase, CatalogLifecycle, FileTemplate, MappingStore, Migrations,
    OpenReport, SchemaStatus, SqlMapping, SqliteStore, StoreHandle, StoreOpenError, StoreOpener,
};
