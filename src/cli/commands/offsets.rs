//! `rwogp offsets` command - placement of one assembled part on its tray

use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs;
use std::path::PathBuf;

use crate::alignment::{compute_offsets, AlignmentCell, FiducialSet, QcClass, TrayCatalog};
use crate::cli::helpers::{kind_from_path, load_config, parse_kind, prompt_port};
use crate::cli::GlobalOpts;
use crate::survey::ReportParser;

#[derive(clap::Args, Debug)]
pub struct OffsetsArgs {
    /// Survey report of a protomodule or module
    pub file: PathBuf,

    /// Component type; inferred from the report's folder when omitted
    #[arg(long = "type", short = 't')]
    pub kind: Option<String>,
}

pub fn run(args: OffsetsArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let kind = match args.kind.as_deref() {
        Some(value) => parse_kind(value)?,
        None => kind_from_path(&args.file).ok_or_else(|| {
            miette::miette!(
                help = "Pass --type protomodules or --type modules",
                "Cannot tell the component type of {}",
                args.file.display()
            )
        })?,
    };
    let part = kind.part_kind().ok_or_else(|| {
        miette::miette!("{kind} are not assembled on a tray and have no placement offsets")
    })?;

    let raw = fs::read_to_string(&args.file)
        .into_diagnostic()
        .map_err(|e| e.wrap_err(format!("Cannot read {}", args.file.display())))?;
    let mut port = prompt_port(global);
    let report = ReportParser::default().parse(&raw, port.as_mut())?;
    let h = &report.header;

    let mut trays = TrayCatalog::new(config.tray_dir());
    let (hole, slot) = trays.pins(h.tray_no, h.geometry, h.density, h.position)?;
    let fiducials = FiducialSet::from_features(&report.features);
    let result = compute_offsets(
        hole,
        slot,
        &fiducials,
        AlignmentCell {
            geometry: h.geometry,
            density: h.density,
            position: h.position,
            kind: part,
        },
    )?;

    let qc = result.qc_class();
    let qc_styled = match qc {
        QcClass::Green => style(qc.to_string()).green(),
        QcClass::Yellow => style(qc.to_string()).yellow(),
        QcClass::Red => style(qc.to_string()).red(),
    };

    println!(
        "{}",
        style(format!("{} on tray {} {}", h.component_id, h.tray_no, h.position))
            .bold()
            .underlined()
    );
    println!("  Fiducials:     {}", fiducials.count());
    println!("  Center offset: {:.3} mm", result.center_offset);
    println!("  Angle offset:  {:.3} deg", result.angle_offset);
    println!(
        "  X / Y offset:  {} / {} um",
        result.x_offset_um(),
        result.y_offset_um()
    );
    println!("  QC:            {qc_styled}");
    Ok(())
}
