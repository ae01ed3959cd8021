//! `rwogp register` command - add a component to its mother table

use console::style;
use miette::Result;

use crate::cli::helpers::{load_config, parse_kind};
use crate::cli::GlobalOpts;
use crate::ingest::SqliteStore;

#[derive(clap::Args, Debug)]
pub struct RegisterArgs {
    /// Component type (baseplates, hexaboards, protomodules, modules)
    #[arg(value_name = "TYPE")]
    pub kind: String,

    /// Component name(s), e.g. 320MLF3WXCM0001
    #[arg(required = true)]
    pub names: Vec<String>,
}

pub fn run(args: RegisterArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let kind = parse_kind(&args.kind)?;
    let mut store = SqliteStore::open(&config.database())?;
    let table = kind.table().mother_table;

    for name in &args.names {
        let added = store.register(kind, name, config.institution())?;
        if global.quiet {
            continue;
        }
        if added {
            println!(
                "{} Registered {} in {}",
                style("✓").green(),
                style(name).cyan(),
                table
            );
        } else {
            println!(
                "{} {} is already registered in {}",
                style("→").blue(),
                style(name).cyan(),
                table
            );
        }
    }
    Ok(())
}
