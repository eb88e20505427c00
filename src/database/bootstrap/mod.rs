//! Store bootstrap
//!
//! Opening a store moves through a fixed sequence of states:
//!
//! ```text
//! NotOpened ─▶ TemplateFetching ─▶ Creating ─▶ Migrating ─▶ Open
//!     │               │                │           │
//!     └───────────────┴────────────────┴───────────┴──▶ Failed
//! ```
//!
//! A store that does not exist yet is never created by the engine. The
//! lifecycle's `on_create` copies a prebuilt version-1 template into place
//! instead, and the store then migrates from version 1 like any other.
//! Existing stores skip straight to `Migrating` (or to `Open` when already
//! current).
//!
//! # Usage
//!
//! ```rust,ignore
//! use vault_catalog::database::bootstrap::{BytesTemplate, CatalogLifecycle, StoreOpener};
//! use vault_catalog::database::external::{IdentityCryptor, InMemorySettings};
//!
//! let lifecycle = CatalogLifecycle::new(
//!     Box::new(BytesTemplate::builtin()?),
//!     Box::new(IdentityCryptor),
//!     Box::new(InMemorySettings::new()),
//! );
//! let opener = StoreOpener::new("~/.vault-catalog", lifecycle);
//! let opened = opener.open("catalog.db")?;
//! println!("{} steps applied", opened.report.applied_steps.len());
//! ```

mod lifecycle;
mod opener;
mod template;

pub use lifecycle::{CatalogLifecycle, OpenLifecycle};
pub use opener::{OpenReport, OpenedStore, StoreOpener};
pub use template::{materialize, BytesTemplate, FileTemplate, TemplateProvider};

/// Where an open currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    NotOpened,
    TemplateFetching,
    Creating,
    Migrating,
    Open,
    Failed,
}

impl std::fmt::Display for OpenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpenState::NotOpened => "not opened",
            OpenState::TemplateFetching => "fetching template",
            OpenState::Creating => "creating",
            OpenState::Migrating => "migrating",
            OpenState::Open => "open",
            OpenState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
