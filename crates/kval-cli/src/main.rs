//! # kval CLI entry point
//!
//! Parses arguments, sets up logging and runs one validation pass.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kval_cli::{run, Settings, ValidateArgs, EXIT_ERROR};

/// Validate Kubernetes manifests against their OpenAPI schemas, offline.
#[derive(Parser, Debug)]
#[command(name = "kval", about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    args: ValidateArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("kval starting");

    let result = Settings::resolve(&cli.args).and_then(|settings| {
        run(&settings, &mut std::io::stdout().lock(), &mut std::io::stderr().lock())
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
