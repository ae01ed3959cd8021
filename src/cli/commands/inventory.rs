//! `rwogp inventory` command - inspect and edit the upload inventory

use clap::Subcommand;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{load_config, parse_kind, truncate_str};
use crate::cli::GlobalOpts;
use crate::core::{Config, InventoryTracker, SurveyScanner};
use crate::entities::ComponentKind;

#[derive(Subcommand, Debug)]
pub enum InventoryCommands {
    /// List files already uploaded
    Show(FilterArgs),

    /// List files a run would upload and entries missing on disk
    Diff(FilterArgs),

    /// Forget every upload of one component type so they are ingested again
    Clear(ClearArgs),

    /// Drop entries whose files are gone from disk
    Prune,
}

#[derive(clap::Args, Debug)]
pub struct FilterArgs {
    /// Only this component type
    #[arg(long = "type", short = 't')]
    pub kind: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ClearArgs {
    /// Component type to clear; prompts when omitted
    pub kind: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(cmd: InventoryCommands, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    match cmd {
        InventoryCommands::Show(args) => run_show(&config, args),
        InventoryCommands::Diff(args) => run_diff(&config, args),
        InventoryCommands::Clear(args) => run_clear(&config, args, global),
        InventoryCommands::Prune => run_prune(&config, global),
    }
}

fn scanner(config: &Config) -> SurveyScanner {
    SurveyScanner::new(config.survey_dir(), config.extensions())
}

fn filter_of(args: &FilterArgs) -> Result<Option<ComponentKind>> {
    args.kind.as_deref().map(parse_kind).transpose()
}

fn run_show(config: &Config, args: FilterArgs) -> Result<()> {
    let filter = filter_of(&args)?;
    let tracker = InventoryTracker::load(config.inventory_path())?;

    if tracker.is_first_run() {
        println!(
            "{} No inventory at {} yet",
            style("→").blue(),
            tracker.path().display()
        );
        return Ok(());
    }

    let mut builder = Builder::default();
    builder.push_record(["Folder", "File"]);
    let mut count = 0;
    for (folder, files) in tracker.known() {
        if filter.is_some_and(|k| !k.folder().eq_ignore_ascii_case(folder)) {
            continue;
        }
        for file in files {
            builder.push_record([folder.clone(), truncate_str(file, 60)]);
            count += 1;
        }
    }

    if count == 0 {
        println!("{} No uploaded files", style("→").blue());
    } else {
        println!("{}", builder.build().with(Style::markdown()));
        println!("\n{} {} file(s)", style("✓").green(), style(count).cyan());
    }
    Ok(())
}

fn run_diff(config: &Config, args: FilterArgs) -> Result<()> {
    let filter = filter_of(&args)?;
    let tracker = InventoryTracker::load(config.inventory_path())?;
    let snapshot = scanner(config).scan(filter.map(|k| k.folder()))?;
    let delta = tracker.diff(&snapshot, filter.map(|k| k.folder()));

    if delta.is_empty() {
        println!("{} Inventory matches the survey directory", style("✓").green());
        return Ok(());
    }

    for (folder, file) in delta.added_files() {
        println!("{} {}/{}", style("+").green(), folder, file);
    }
    for (folder, files) in &delta.removed {
        for file in files {
            println!("{} {}/{}", style("-").red(), folder, file);
        }
    }
    println!(
        "\n{} new, {} missing on disk",
        style(delta.added_count()).green(),
        style(delta.removed_count()).red()
    );
    Ok(())
}

fn run_clear(config: &Config, args: ClearArgs, global: &GlobalOpts) -> Result<()> {
    let interactive = !global.batch && console::user_attended();
    let kind = match args.kind.as_deref() {
        Some(value) => parse_kind(value)?,
        None if interactive => {
            let names: Vec<&str> = ComponentKind::ALL.iter().map(|k| k.folder()).collect();
            let choice = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Component type to clear")
                .items(&names)
                .default(0)
                .interact()
                .into_diagnostic()?;
            ComponentKind::ALL[choice]
        }
        None => {
            return Err(miette::miette!(
                help = "Pass the component type, e.g. `rwogp inventory clear modules`",
                "No component type given"
            ))
        }
    };

    if !args.yes && interactive {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Forget every uploaded {} survey? They will be uploaded again on the next run",
                kind
            ))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !proceed {
            println!("{} Cancelled", style("→").blue());
            return Ok(());
        }
    }

    let mut tracker = InventoryTracker::load(config.inventory_path())?;
    let removed = tracker.clear(kind.folder())?;
    if !global.quiet {
        println!(
            "{} Cleared {} {} entr{}",
            style("✓").green(),
            style(removed).cyan(),
            kind,
            if removed == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

fn run_prune(config: &Config, global: &GlobalOpts) -> Result<()> {
    let mut tracker = InventoryTracker::load(config.inventory_path())?;
    let snapshot = scanner(config).scan(None)?;
    let removed = tracker.prune(&snapshot)?;
    if !global.quiet {
        println!(
            "{} Pruned {} missing file(s)",
            style("✓").green(),
            style(removed).cyan()
        );
    }
    Ok(())
}
