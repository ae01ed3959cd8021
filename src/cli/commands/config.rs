//! `rwogp config` command - write, show and locate configuration

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs;
use std::path::PathBuf;

use crate::cli::helpers::load_config;
use crate::cli::GlobalOpts;
use crate::core::config::LOCAL_CONFIG_FILE;
use crate::core::Config;
use crate::schema::TemplateGenerator;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a commented config file with the current values
    Init(InitArgs),

    /// Show the resolved configuration as YAML
    Show,

    /// Show paths to configuration files
    Path,
}

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing file
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Write the global (user) config instead of ./rwogp.yaml
    #[arg(long, short = 'g')]
    pub global: bool,
}

pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Init(args) => run_init(args, global),
        ConfigCommands::Show => run_show(global),
        ConfigCommands::Path => run_path(global),
    }
}

fn run_init(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let target: PathBuf = if args.global {
        Config::global_config_path()
            .ok_or_else(|| miette::miette!("Cannot determine the user config directory"))?
    } else {
        PathBuf::from(LOCAL_CONFIG_FILE)
    };

    if target.exists() && !args.force {
        return Err(miette::miette!(
            help = "Pass --force to overwrite it",
            "{} already exists",
            target.display()
        ));
    }

    let config = load_config(global)?;
    let text = TemplateGenerator::new()?.generate_config(&config)?;

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).into_diagnostic()?;
    }
    fs::write(&target, text).into_diagnostic()?;

    if !global.quiet {
        println!(
            "{} Wrote {}",
            style("✓").green(),
            style(target.display()).cyan()
        );
    }
    Ok(())
}

fn run_show(global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?.resolved();
    let yaml = serde_yml::to_string(&config).into_diagnostic()?;
    print!("{yaml}");
    Ok(())
}

fn run_path(global: &GlobalOpts) -> Result<()> {
    let mut paths: Vec<(&str, Option<PathBuf>)> = vec![
        ("Global", Config::global_config_path()),
        ("Local", Some(PathBuf::from(LOCAL_CONFIG_FILE))),
    ];
    if let Some(explicit) = &global.config {
        paths.push(("Explicit", Some(explicit.clone())));
    }

    for (label, path) in paths {
        match path {
            Some(p) => {
                let marker = if p.exists() {
                    style("(exists)").green()
                } else {
                    style("(not found)").dim()
                };
                println!("{:<9} {} {}", format!("{label}:"), p.display(), marker);
            }
            None => println!("{:<9} {}", format!("{label}:"), style("unavailable").dim()),
        }
    }
    Ok(())
}
