use clap::Args;
use vault_catalog::CatalogConfig;

use super::fail;

/// Arguments for the Reset command
#[derive(Args)]
pub struct ResetArgs {
    /// Confirm deleting the store. All vault and cloud entries are lost.
    #[clap(long)]
    pub yes: bool,
}

pub fn run(config: &CatalogConfig, args: ResetArgs) {
    let path = config.store_path();
    if !args.yes {
        eprintln!(
            "This deletes {} and everything in it. Re-run with --yes to confirm.",
            path.display()
        );
        std::process::exit(1);
    }

    let opener = match config.opener() {
        Ok(o) => o,
        Err(e) => fail(e),
    };
    match opener.delete_store(&config.store_name) {
        Ok(true) => println!("deleted {}", path.display()),
        Ok(false) => println!("nothing to delete at {}", path.display()),
        Err(e) => fail(format!("unable to delete {}: {}", path.display(), e)),
    }
}
