//! `rwogp run` command - ingest every new survey report

use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{load_config, parse_kind, prompt_port};
use crate::cli::GlobalOpts;
use crate::core::InventoryTracker;
use crate::ingest::{BatchOutcome, FileFailure, IngestionOrchestrator, NoVisuals, SqliteStore};

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Only ingest one component type (baseplates, hexaboards, protomodules, modules)
    #[arg(long = "type", short = 't')]
    pub kind: Option<String>,
}

pub fn run(args: RunArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let filter = args.kind.as_deref().map(parse_kind).transpose()?;

    let inventory = InventoryTracker::load(config.inventory_path())?;
    let mut store = SqliteStore::open(&config.database())?;
    let mut port = prompt_port(global);
    let visuals = NoVisuals;

    let mut orchestrator =
        IngestionOrchestrator::new(&config, inventory, &mut store, port.as_mut(), &visuals);
    let run_id = orchestrator.run_id();
    let outcome = orchestrator.run(filter.map(|k| k.folder()))?;

    if !global.quiet {
        print_outcome(&outcome, &run_id.to_string());
    }

    if outcome.is_clean() {
        return Ok(());
    }
    match outcome.first_failure {
        Some(failure) => Err(miette::Report::new(failure.error).wrap_err(format!(
            "Run halted at {}/{} while {}; {} file(s) left for the next run",
            failure.folder,
            failure.file,
            failure.stage,
            outcome.not_attempted.len()
        ))),
        None => Err(miette::miette!(
            "{} survey file(s) rejected",
            outcome.rejected.len()
        )),
    }
}

fn print_outcome(outcome: &BatchOutcome, run_id: &str) {
    if outcome.baselined > 0 {
        println!(
            "{} Recorded {} existing file(s) as already uploaded",
            style("→").blue(),
            style(outcome.baselined).cyan()
        );
        return;
    }

    if outcome.missing_on_disk > 0 {
        println!(
            "{} {} inventoried file(s) no longer on disk (see `rwogp inventory prune`)",
            style("!").yellow(),
            outcome.missing_on_disk
        );
    }

    if !outcome.succeeded.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Folder", "File", "Component", "Center (mm)", "Angle (deg)", "QC"]);
        for s in &outcome.succeeded {
            let (center, angle, qc) = match &s.alignment {
                Some(a) => (
                    format!("{:.3}", a.center_offset),
                    format!("{:.3}", a.angle_offset),
                    a.qc_class().to_string(),
                ),
                None => ("-".to_string(), "-".to_string(), "-".to_string()),
            };
            builder.push_record([
                s.folder.clone(),
                s.file.clone(),
                s.component.clone(),
                center,
                angle,
                qc,
            ]);
        }
        println!("{}", builder.build().with(Style::markdown()));
        println!();
    }

    for failure in &outcome.rejected {
        print_failure("✗", failure);
    }
    if let Some(failure) = &outcome.first_failure {
        print_failure("■", failure);
        for (folder, file) in &outcome.not_attempted {
            println!("  {} {}/{}", style("·").dim(), folder, file);
        }
    }

    println!(
        "{} Run {}: {} uploaded, {} rejected{}",
        if outcome.is_clean() {
            style("✓").green()
        } else {
            style("✗").red()
        },
        style(run_id).dim(),
        style(outcome.succeeded.len()).green(),
        style(outcome.rejected.len()).red(),
        if outcome.first_failure.is_some() {
            ", halted"
        } else {
            ""
        }
    );
}

fn print_failure(marker: &str, failure: &FileFailure) {
    println!(
        "{} {}/{} ({}): {}",
        style(marker).red(),
        failure.folder,
        failure.file,
        failure.stage,
        failure.error
    );
}
