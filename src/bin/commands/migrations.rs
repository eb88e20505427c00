use clap::Args;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use vault_catalog::Migrations;

use super::print_json;

/// Arguments for the Migrations command
#[derive(Args)]
pub struct MigrationsArgs {
    /// Output to markdown table instead of a pretty table
    #[clap(short, long)]
    pub markdown: bool,
}

#[derive(Tabled, Serialize)]
struct MigrationRow {
    #[tabled(rename = "From")]
    from: u32,
    #[tabled(rename = "To")]
    to: u32,
    #[tabled(rename = "Description")]
    description: &'static str,
    #[tabled(rename = "Recoverable")]
    recoverable: bool,
}

pub fn run(args: MigrationsArgs, json: bool) {
    let migrations = Migrations::catalog();
    let rows: Vec<MigrationRow> = migrations
        .steps()
        .iter()
        .map(|step| MigrationRow {
            from: step.from_version(),
            to: step.to_version(),
            description: step.description(),
            recoverable: step.is_recoverable(),
        })
        .collect();

    if json {
        for row in &rows {
            print_json(row);
        }
        return;
    }

    match args.markdown {
        true => println!("{}", Table::new(rows).with(Style::markdown())),
        false => println!("{}", Table::new(rows).with(Style::rounded())),
    }
    println!(
        "{} steps, v{} -> v{}",
        migrations.len(),
        migrations.first_version(),
        migrations.latest_version()
    );
}
