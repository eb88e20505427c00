use clap::Args;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use vault_catalog::database::{StoreError, StoreOpenError};
use vault_catalog::CatalogConfig;

use super::{fail, print_json};

/// Arguments for the Open command
#[derive(Args)]
pub struct OpenArgs {
    /// Output to markdown table instead of a pretty table
    #[clap(short, long)]
    pub markdown: bool,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "From")]
    from: u32,
    #[tabled(rename = "To")]
    to: u32,
    #[tabled(rename = "Description")]
    description: &'static str,
    #[tabled(rename = "Recovered")]
    recovered: bool,
}

pub fn run(config: &CatalogConfig, args: OpenArgs, json: bool) {
    let opener = match config.opener() {
        Ok(o) => o,
        Err(e) => fail(e),
    };

    let opened = match opener.open(&config.store_name) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("ERROR: failed to open {}: {}", config.store_path().display(), e);
            if e.suggests_reset() {
                eprintln!("The store cannot be read. Run `vault-catalog reset --yes` to recreate it.");
            }
            match e {
                StoreOpenError::UnsupportedVersion { .. } => {
                    eprintln!("The store was written by a newer release; upgrade vault-catalog.")
                }
                StoreOpenError::MigrationFailed {
                    source: StoreError::Cryptor(_),
                    ..
                } => eprintln!(
                    "Stored credentials must be re-encrypted by the application that owns them; \
                     this tool cannot upgrade the store past that step."
                ),
                _ => {}
            }
            std::process::exit(1);
        }
    };

    let report = &opened.report;
    if json {
        print_json(report);
        return;
    }

    println!("Store:     {}", config.store_path().display());
    println!(
        "Created:   {}",
        if report.created { "yes (from template)" } else { "no" }
    );
    println!("Version:   v{} -> v{}", report.from_version, report.to_version);

    if report.applied_steps.is_empty() {
        println!("No migrations applied.");
        return;
    }

    let rows: Vec<StepRow> = report
        .applied_steps
        .iter()
        .map(|s| StepRow {
            from: s.from,
            to: s.to,
            description: s.description,
            recovered: s.recovered,
        })
        .collect();
    match args.markdown {
        true => println!("{}", Table::new(rows).with(Style::markdown())),
        false => println!("{}", Table::new(rows).with(Style::rounded())),
    }
}
