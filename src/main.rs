use clap::Parser;
use miette::Result;
use clt::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Install miette's fancy error handler for beautiful diagnostics
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

    match cli.command {
        Commands::Init(args) => clt::cli::commands::init::run(args),
        Commands::Req(cmd) => clt::cli::commands::req::run(cmd),
        Commands::Validate(args) => clt::cli::commands::validate::run(args),
        Commands::Link(cmd) => clt::cli::commands::link::run(cmd),
        Commands::Trace(cmd) => clt::cli::commands::trace::run(cmd),
    }
}
