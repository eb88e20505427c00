use clap::Args;
use serde::Serialize;
use vault_catalog::{format_size, get_store_info, CatalogConfig, StoreInfo};

use super::{fail, print_json};

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// Also print the configuration summary
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct StatusInfo {
    config_file: String,
    data_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    store: StoreInfo,
}

pub fn run(config: &CatalogConfig, args: StatusArgs, json: bool) {
    let store = match get_store_info(config) {
        Ok(info) => info,
        Err(e) => fail(e),
    };

    let info = StatusInfo {
        config_file: CatalogConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        template: config.template_path.clone(),
        store,
    };

    if json {
        print_json(&info);
        return;
    }

    if args.verbose {
        println!("Configuration");
        println!("=============\n");
        println!("  Config file:        {}", info.config_file);
        for line in config.summary().lines() {
            println!("  {}", line);
        }
        println!();
    }

    println!("Catalog Store:");
    println!("  Path:           {}", info.store.path);
    println!(
        "  Status:         {}",
        if info.store.exists {
            "exists"
        } else {
            "not created"
        }
    );
    if let Some(size) = info.store.size_bytes {
        println!("  Size:           {}", format_size(size));
    }
    println!("  Schema:         {}", info.store.status);
    if let Some(version) = info.store.schema_version {
        println!("  Version:        v{}", version);
    }
    println!("  Latest:         v{}", info.store.latest_version);
    if info.store.pending_steps > 0 {
        println!(
            "  Pending:        {} step(s), applied on next open",
            info.store.pending_steps
        );
    }
}
