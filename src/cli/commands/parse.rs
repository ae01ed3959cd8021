//! `rwogp parse` command - parse one report without uploading it

use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs;
use std::path::PathBuf;

use crate::cli::helpers::{kind_from_path, load_config, parse_kind, prompt_port};
use crate::cli::GlobalOpts;
use crate::survey::{ArtifactWriter, ReportParser};

#[derive(clap::Args, Debug)]
pub struct ParseArgs {
    /// Survey report to parse
    pub file: PathBuf,

    /// Output root (default: the configured parsed directory)
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Component type; inferred from the report's folder when omitted
    #[arg(long = "type", short = 't')]
    pub kind: Option<String>,
}

pub fn run(args: ParseArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let kind = match args.kind.as_deref() {
        Some(value) => parse_kind(value)?,
        None => kind_from_path(&args.file).ok_or_else(|| {
            miette::miette!(
                help = "Pass --type, or keep the report under a component folder",
                "Cannot tell the component type of {}",
                args.file.display()
            )
        })?,
    };

    let raw = fs::read_to_string(&args.file)
        .into_diagnostic()
        .map_err(|e| e.wrap_err(format!("Cannot read {}", args.file.display())))?;

    let mut port = prompt_port(global);
    let report = ReportParser::default().parse(&raw, port.as_mut())?;

    let out = args.out.unwrap_or_else(|| config.parsed_dir());
    let writer = ArtifactWriter::new(out, config.backup_dir());
    let paths = writer.write(kind.folder(), &report)?;

    if !global.quiet {
        let h = &report.header;
        println!(
            "{} Parsed {} ({} {} {}, tray {} {}) with {} feature(s)",
            style("✓").green(),
            style(&h.component_id).cyan(),
            h.geometry,
            h.density,
            kind,
            h.tray_no,
            h.position,
            report.features.len()
        );
        println!("   {}", style(paths.meta.display()).dim());
        println!("   {}", style(paths.features.display()).dim());
    }
    Ok(())
}
