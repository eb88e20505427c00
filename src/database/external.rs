//! Collaborators some migration steps need from outside the store
//!
//! - [`CredentialCryptor`] re-encrypts stored secrets when a column's
//!   representation changes
//! - [`SettingsStore`] receives state that moves out of the store

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::database::core::{CryptorError, SettingsError};

/// Opaque encryption of stored credentials
pub trait CredentialCryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptorError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptorError>;

    /// Whether `encrypt` actually changes the representation. Steps that write
    /// encrypted columns refuse to run when it does not.
    fn encrypts(&self) -> bool {
        true
    }
}

/// Leaves credentials unchanged. Only meant for tooling that inspects stores
/// whose secrets are never read back. Migrations that encrypt existing
/// credentials fail with it rather than stamp plaintext as encrypted.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCryptor;

impl CredentialCryptor for IdentityCryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptorError> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptorError> {
        Ok(ciphertext.to_string())
    }

    fn encrypts(&self) -> bool {
        false
    }
}

/// Simple key/value settings
pub trait SettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// Settings held in memory
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: RefCell<BTreeMap<String, String>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for InMemorySettings {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings persisted as a flat JSON object, rewritten on every `set`
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: RefCell<BTreeMap<String, String>>,
}

impl JsonFileSettings {
    /// Load settings from `path`; a missing file starts out empty
    pub fn open(path: &Path) -> Result<Self, SettingsError> {
        let values = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            values: RefCell::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&*self.values.borrow())?;
        std::fs::write(&self.path, content)?;
        debug!("saved settings to {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.persist()
    }
}
