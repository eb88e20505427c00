use clap::Args;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use vault_catalog::database::catalog::CloudType;
use vault_catalog::{CatalogConfig, CatalogDatabase};

use super::{fail, print_json};

/// Arguments for the Vaults command
#[derive(Args)]
pub struct VaultsArgs {
    /// Only list vaults stored in this cloud connection
    #[clap(long)]
    pub cloud_id: Option<i64>,

    /// Output to markdown table instead of a pretty table
    #[clap(short, long)]
    pub markdown: bool,
}

/// Arguments for the Clouds command
#[derive(Args)]
pub struct CloudsArgs {
    /// Only list connections of this type, e.g. webdav or s3
    #[clap(short = 't', long = "type")]
    pub cloud_type: Option<CloudType>,

    /// Output to markdown table instead of a pretty table
    #[clap(short, long)]
    pub markdown: bool,
}

#[derive(Tabled)]
struct VaultRow {
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Cloud")]
    cloud: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Format")]
    format: String,
}

#[derive(Tabled)]
struct CloudRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Type")]
    cloud_type: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Credentials")]
    credentials: &'static str,
}

fn or_dash<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn open_catalog(config: &CatalogConfig) -> CatalogDatabase {
    let lifecycle = match config.lifecycle() {
        Ok(l) => l,
        Err(e) => fail(e),
    };
    match CatalogDatabase::open(&config.store_path(), lifecycle) {
        Ok(db) => db,
        Err(e) => fail(format!(
            "failed to open {}: {}",
            config.store_path().display(),
            e
        )),
    }
}

fn print_table<T: Tabled>(rows: Vec<T>, markdown: bool) {
    match markdown {
        true => println!("{}", Table::new(rows).with(Style::markdown())),
        false => println!("{}", Table::new(rows).with(Style::rounded())),
    }
}

pub fn run_vaults(config: &CatalogConfig, args: VaultsArgs, json: bool) {
    let db = open_catalog(config);
    let vaults = match args.cloud_id {
        Some(id) => db.vaults().for_cloud(id),
        None => db.vaults().all(),
    };
    let vaults = match vaults {
        Ok(v) => v,
        Err(e) => fail(format!("failed to read vaults: {}", e)),
    };

    if json {
        for vault in &vaults {
            print_json(vault);
        }
        return;
    }
    if vaults.is_empty() {
        println!("No vaults.");
        return;
    }

    let rows = vaults
        .iter()
        .map(|v| VaultRow {
            position: or_dash(&v.position),
            id: v.id,
            name: v.name.clone(),
            cloud: match v.cloud_id {
                Some(id) => format!("{} ({})", v.cloud_type, id),
                None => v.cloud_type.clone(),
            },
            path: or_dash(&v.path),
            format: or_dash(&v.format),
        })
        .collect();
    print_table::<VaultRow>(rows, args.markdown);
}

pub fn run_clouds(config: &CatalogConfig, args: CloudsArgs, json: bool) {
    let db = open_catalog(config);
    let clouds = match args.cloud_type {
        Some(t) => db.clouds().by_type(t),
        None => db.clouds().all(),
    };
    let clouds = match clouds {
        Ok(c) => c,
        Err(e) => fail(format!("failed to read cloud connections: {}", e)),
    };

    if json {
        for cloud in &clouds {
            print_json(cloud);
        }
        return;
    }
    if clouds.is_empty() {
        println!("No cloud connections.");
        return;
    }

    let rows = clouds
        .iter()
        .map(|c| CloudRow {
            id: c.id,
            cloud_type: c.cloud_type.clone(),
            url: or_dash(&c.url),
            username: or_dash(&c.username),
            credentials: if c.has_access_token { "stored" } else { "-" },
        })
        .collect();
    print_table::<CloudRow>(rows, args.markdown);
}
