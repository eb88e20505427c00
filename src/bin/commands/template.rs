use clap::Args;
use std::path::PathBuf;
use vault_catalog::database::core::{write_template, TEMPLATE_VERSION};

use super::fail;

/// Arguments for the Template command
#[derive(Args)]
pub struct TemplateArgs {
    /// Output file for the template
    #[clap(name = "OUT")]
    pub out: PathBuf,

    /// Overwrite the output file if it exists
    #[clap(short, long)]
    pub force: bool,
}

pub fn run(args: TemplateArgs) {
    let TemplateArgs { out, force } = args;

    if out.exists() {
        if !force {
            fail(format!(
                "{} already exists, pass --force to overwrite",
                out.display()
            ));
        }
        if let Err(e) = std::fs::remove_file(&out) {
            fail(format!("unable to remove {}: {}", out.display(), e));
        }
    }

    if let Err(e) = write_template(&out) {
        fail(format!("unable to write template: {}", e));
    }
    println!("wrote version {} template to {}", TEMPLATE_VERSION, out.display());
}
