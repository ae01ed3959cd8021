use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rwogp::cli::commands;
use rwogp::cli::{Cli, Commands};
use rwogp::core::{init_logging, LogConfig};

fn main() -> Result<()> {
    // Terminate quietly on a closed pipe (`rwogp inventory show | head`)
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(&LogConfig::for_cli(global.verbose, global.quiet)).into_diagnostic()?;

    match cli.command {
        Commands::Run(args) => commands::run::run(args, &global),
        Commands::Inventory(cmd) => commands::inventory::run(cmd, &global),
        Commands::Parse(args) => commands::parse::run(args, &global),
        Commands::Offsets(args) => commands::offsets::run(args, &global),
        Commands::Validate(args) => commands::validate::run(args, &global),
        Commands::Register(args) => commands::register::run(args, &global),
        Commands::Config(cmd) => commands::config::run(cmd, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
