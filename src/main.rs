use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use relay_rig::{cli, host, slave};

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.cmd {
        cli::Cmd::Slave(opts) => slave::run(opts),
        cli::Cmd::Host(opts) => host::run(opts),
    }
}
