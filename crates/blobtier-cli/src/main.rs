use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();
    commands::run_command(cli)
}

/// `RUST_LOG` when set, else `warn`. `--verbose` raises the floor to `debug`.
fn log_filter(verbose: bool) -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if verbose {
        filter.add_directive(tracing::Level::DEBUG.into())
    } else {
        filter
    }
}
