use clap::{Parser, Subcommand};
use tracing::Level;
use vault_catalog::CatalogConfig;

mod commands;

use commands::catalog::{CloudsArgs, VaultsArgs};
use commands::migrations::MigrationsArgs;
use commands::open::OpenArgs;
use commands::reset::ResetArgs;
use commands::status::StatusArgs;
use commands::template::TemplateArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.vault-catalog/vault-catalog.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output as JSON objects
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the catalog store, creating it from the template and migrating as needed.
    Open(OpenArgs),

    /// Show where the store lives and how its schema compares to the newest version.
    Status(StatusArgs),

    /// Write the built-in version-1 template to a file.
    Template(TemplateArgs),

    /// List the migration chain.
    Migrations(MigrationsArgs),

    /// List vaults in the catalog.
    Vaults(VaultsArgs),

    /// List cloud connections in the catalog.
    Clouds(CloudsArgs),

    /// Delete the store and its journal files.
    Reset(ResetArgs),
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level INFO or higher.
            .with_max_level(Level::INFO)
            .init();
    }

    let config = match CatalogConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Open(args) => commands::open::run(&config, args, cli.json),
        Commands::Status(args) => commands::status::run(&config, args, cli.json),
        Commands::Template(args) => commands::template::run(args),
        Commands::Migrations(args) => commands::migrations::run(args, cli.json),
        Commands::Vaults(args) => commands::catalog::run_vaults(&config, args, cli.json),
        Commands::Clouds(args) => commands::catalog::run_clouds(&config, args, cli.json),
        Commands::Reset(args) => commands::reset::run(&config, args),
    }
}
