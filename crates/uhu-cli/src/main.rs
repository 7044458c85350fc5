//! UHU CLI entry point

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uhu_cli::{Cli, ExitCode, Settings};

fn main() -> std::process::ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load config from --config, UHU_CONFIG, or the platform default
    let settings = match Settings::resolve(cli.config.as_deref(), &cli.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::for_error(&anyhow::Error::from(e)).to_exit_code();
        }
    };

    // Initialize logging (--debug and --verbose already folded into the level)
    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli.run(settings).to_exit_code()
}
