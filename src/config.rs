use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::database::bootstrap::{
    BytesTemplate, CatalogLifecycle, FileTemplate, StoreOpener, TemplateProvider,
};
use crate::database::core::SchemaStatus;
use crate::database::external::{IdentityCryptor, JsonFileSettings};

pub struct CatalogConfig {
    /// Path to the directory holding the catalog store and settings
    pub data_dir: String,

    /// File name of the store inside `data_dir`
    pub store_name: String,

    /// Prebuilt version-1 template to create new stores from. The built-in
    /// template is used when unset.
    pub template_path: Option<String>,

    /// File name of the settings file inside `data_dir`
    pub settings_file: String,
}

const EMPTY_CONFIG: &str = r#"### vault-catalog configuration file

### directory holding the catalog store and settings
# data_dir = "~/.vault-catalog"

### store file name inside data_dir
# store_name = "catalog.db"

### prebuilt version-1 template used to create new stores
# template_path = "/path/to/template.db"

### settings file name inside data_dir
# settings_file = "settings.json"
"#;

const DEFAULT_STORE_NAME: &str = "catalog.db";
const DEFAULT_SETTINGS_FILE: &str = "settings.json";

impl Default for CatalogConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.vault-catalog", home_dir),
            store_name: DEFAULT_STORE_NAME.to_string(),
            template_path: None,
            settings_file: DEFAULT_SETTINGS_FILE.to_string(),
        }
    }
}

impl CatalogConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<CatalogConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.vault-catalog/vault-catalog.toml
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();
        let catalog_dir = format!("{}/.vault-catalog", home_dir.as_str());

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(catalog_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create vault-catalog directory: {}", e))?;
                let p = format!("{}/vault-catalog.toml", catalog_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Environment overrides, e.g. `VAULT_CATALOG_DATA_DIR=/tmp/catalog`
        builder = builder.add_source(config::Environment::with_prefix("VAULT_CATALOG"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config, &catalog_dir)
    }

    fn from_map(config: &HashMap<String, String>, default_dir: &str) -> Result<CatalogConfig> {
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => default_dir.to_string(),
        };
        std::fs::create_dir_all(data_dir.as_str())
            .map_err(|e| anyhow!("Unable to create data directory {}: {}", data_dir, e))?;

        let store_name = config
            .get("store_name")
            .cloned()
            .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string());
        if store_name.contains('/') || store_name.contains('\\') {
            return Err(anyhow!(
                "store_name must be a file name, not a path: {}",
                store_name
            ));
        }

        let template_path = config
            .get("template_path")
            .filter(|p| !p.trim().is_empty())
            .map(|p| expand_home(p));

        let settings_file = config
            .get("settings_file")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SETTINGS_FILE.to_string());

        Ok(CatalogConfig {
            data_dir,
            store_name,
            template_path,
            settings_file,
        })
    }

    /// Get the path to the catalog store file
    pub fn store_path(&self) -> PathBuf {
        Path::new(self.data_dir.trim_end_matches('/')).join(&self.store_name)
    }

    /// Get the path to the settings file
    pub fn settings_path(&self) -> PathBuf {
        Path::new(self.data_dir.trim_end_matches('/')).join(&self.settings_file)
    }

    /// Template new stores are created from
    pub fn template(&self) -> Result<Box<dyn TemplateProvider>> {
        match &self.template_path {
            Some(path) => Ok(Box::new(FileTemplate::new(path))),
            None => {
                let builtin = BytesTemplate::builtin()
                    .map_err(|e| anyhow!("Failed to build the built-in template: {}", e))?;
                Ok(Box::new(builtin))
            }
        }
    }

    /// Lifecycle for stores opened with this configuration.
    ///
    /// Credentials are passed through unchanged: this crate ships no cipher,
    /// so tooling that needs real encryption builds its own lifecycle.
    pub fn lifecycle(&self) -> Result<CatalogLifecycle> {
        let settings = JsonFileSettings::open(&self.settings_path()).map_err(|e| {
            anyhow!(
                "Failed to load settings {}: {}",
                self.settings_path().display(),
                e
            )
        })?;
        Ok(CatalogLifecycle::new(
            self.template()?,
            Box::new(IdentityCryptor),
            Box::new(settings),
        ))
    }

    /// Opener rooted at the data directory
    pub fn opener(&self) -> Result<StoreOpener<CatalogLifecycle>> {
        Ok(StoreOpener::new(
            self.data_dir.trim_end_matches('/'),
            self.lifecycle()?,
        ))
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let template = self
            .template_path
            .clone()
            .unwrap_or_else(|| "(built-in)".to_string());
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("Store Path:         {}", self.store_path().display()),
            format!("Template:           {}", template),
            format!("Settings Path:      {}", self.settings_path().display()),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.vault-catalog/vault-catalog.toml", home_dir)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

// =============================================================================
// Store info (shared by the status and open commands)
// =============================================================================

/// Information about the catalog store file
#[derive(Debug, Serialize, Clone)]
pub struct StoreInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    pub latest_version: u32,
    pub pending_steps: usize,
}

/// Inspect the configured store without opening or migrating it
pub fn get_store_info(config: &CatalogConfig) -> Result<StoreInfo> {
    let opener = config.opener()?;
    let path = config.store_path();
    let exists = path.exists();
    let size_bytes = if exists {
        std::fs::metadata(&path).ok().map(|m| m.len())
    } else {
        None
    };

    let latest_version = opener.lifecycle().migrations().latest_version();
    let status = opener
        .status(&config.store_name)
        .map_err(|e| anyhow!("Failed to read store status: {}", e))?;
    let schema_version = match status {
        SchemaStatus::Missing => None,
        SchemaStatus::NotInitialized => Some(0),
        SchemaStatus::Current { version } => Some(version),
        SchemaStatus::NeedsMigration { from, .. } => Some(from),
        SchemaStatus::Incompatible {
            database_version, ..
        } => Some(database_version),
    };
    let pending_steps = match status {
        SchemaStatus::NeedsMigration { from, .. } => opener
            .lifecycle()
            .migrations()
            .path(from)
            .map(|p| p.len())
            .unwrap_or(0),
        _ => 0,
    };

    Ok(StoreInfo {
        path: path.to_string_lossy().to_string(),
        exists,
        size_bytes,
        status: status.to_string(),
        schema_version,
        latest_version,
        pending_steps,
    })
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
