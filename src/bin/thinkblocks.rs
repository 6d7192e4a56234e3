//! thinkblocks CLI binary.

use clap::Parser;
use std::process;
use thinkblocks::cli::{exit_code, map_error, Cli, RunContext, EXIT_CLIENT_ERROR};
use thinkblocks::config::ConfigLoader;
use thinkblocks::error::ApiError;
use thinkblocks::logging::{init_logging, LoggingConfig};
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = match build_logging_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", map_error(&e));
            process::exit(EXIT_CLIENT_ERROR);
        }
    };
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!(command = cli.command.name(), "thinkblocks starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            eprintln!("{}", map_error(&e));
            process::exit(exit_code(&e));
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{}", map_error(&e));
            process::exit(exit_code(&e));
        }
    }
}

/// Logging config from the config file, overridden by CLI flags. Logging is
/// off unless `--verbose` or a `--log-*` flag asks for it.
fn build_logging_config(cli: &Cli) -> Result<LoggingConfig, ApiError> {
    let wants_logs = cli.verbose
        || cli.log_level.is_some()
        || cli.log_output.is_some()
        || cli.log_file.is_some();
    if !wants_logs {
        return Ok(LoggingConfig {
            level: "off".to_string(),
            ..LoggingConfig::default()
        });
    }

    // A broken config is reported by the command itself; logging falls back to defaults.
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path).map(|c| c.logging),
        None => ConfigLoader::load(&cli.workspace).map(|c| c.logging),
    }
    .unwrap_or_default();

    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.parse()?;
    }
    if let Some(output) = &cli.log_output {
        config.output = output.parse()?;
    }
    if let Some(file) = &cli.log_file {
        config.file = file.clone();
    }
    config.validate().map_err(ApiError::Configuration)?;
    Ok(config)
}
