//! `rwogp validate` command - check metadata YAML against the embedded schema

use console::style;
use miette::Result;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::cli::helpers::load_config;
use crate::cli::GlobalOpts;
use crate::schema::validator::is_meta_file;
use crate::schema::{MetaError, SchemaRegistry, Validator};

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Files or directories to validate (default: the parsed output directory)
    #[arg()]
    pub paths: Vec<PathBuf>,

    /// Stop at the first invalid file
    #[arg(long)]
    pub fail_fast: bool,

    /// Show summary only, don't show individual errors
    #[arg(long)]
    pub summary: bool,
}

/// Validation statistics
#[derive(Default)]
struct ValidationStats {
    files_checked: usize,
    files_passed: usize,
    files_failed: usize,
    total_errors: usize,
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let roots = if args.paths.is_empty() {
        vec![load_config(global)?.parsed_dir()]
    } else {
        args.paths.clone()
    };
    let files = expand_paths(&roots);
    let validator = Validator::new(&SchemaRegistry::default())?;
    let mut stats = ValidationStats::default();

    println!(
        "{} Validating {} file(s)...\n",
        style("→").blue(),
        files.len()
    );

    for path in &files {
        stats.files_checked += 1;
        match validator.validate_file(path) {
            Ok(()) => {
                stats.files_passed += 1;
                if !args.summary {
                    println!("{} {}", style("✓").green(), path.display());
                }
            }
            Err(e) => {
                stats.files_failed += 1;
                let count = match &e {
                    MetaError::Invalid(v) => v.violation_count(),
                    _ => 1,
                };
                stats.total_errors += count;

                if !args.summary {
                    println!(
                        "{} {} - {} error(s)",
                        style("✗").red(),
                        path.display(),
                        count
                    );
                    let report = miette::Report::new(e);
                    println!("{report:?}");
                }

                if args.fail_fast {
                    break;
                }
            }
        }
    }

    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Validation Summary").bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  Files checked:  {}", style(stats.files_checked).cyan());
    println!("  Files passed:   {}", style(stats.files_passed).green());
    println!("  Files failed:   {}", style(stats.files_failed).red());
    println!("  Total errors:   {}", style(stats.total_errors).red());

    if stats.files_failed > 0 {
        return Err(miette::miette!(
            "{} of {} file(s) failed validation",
            stats.files_failed,
            stats.files_checked
        ));
    }
    Ok(())
}

/// Expand directories into their metadata files; explicit files are kept as given
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| is_meta_file(p)),
            );
        } else {
            files.push(path.clone());
        }
    }
    files
}
