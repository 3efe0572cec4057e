//! host-service-discovery
//!
//! One-shot service discovery with tracing logging.
//! This is the main entry point that resolves configuration, runs a
//! discovery pass and handles subcommands.

mod commands;

use clap::Parser;
use host_service_discovery::cli::{Args, Commands, LogLevel};
use host_service_discovery::config::{resolve_config, show_config, validate_effective_config, Config};
use host_service_discovery::output::render_processes;
use host_service_discovery::Collector;
use tracing::{error, info, Level};

use commands::{command_check, command_config, command_tree};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(level: LogLevel) {
    let log_level = match level {
        LogLevel::Off => return,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    // stdout carries the inventory, logs go to stderr
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to validate the resolved configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(
    resolved: Result<Config, Box<dyn std::error::Error>>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolved?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Runs one discovery pass and prints the summary and the valid processes.
fn run_discovery(config: &Config, summary_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut collector = Collector::new(config)?;
    if let Err(e) = collector.generate() {
        error!("Discovery failed: {}", e);
        return Err(e.into());
    }

    if summary_only {
        print!("{}", collector.describe());
        return Ok(());
    }

    eprint!("{}", collector.describe());
    let processes = collector.valid_processes();
    println!("{}", render_processes(&processes, config.output_format())?);
    Ok(())
}

/// Main application entry point.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // The config file may set the log level; a broken one is reported below
    let resolved = resolve_config(&args);
    let log_level = match &resolved {
        Ok(config) => config.log_level(),
        Err(_) => args.log_level.unwrap_or_default(),
    };
    setup_logging(log_level);

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolved?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    if let Some(command) = &args.command {
        // Generating a config file must work even when the current one is broken
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), format.clone(), *commented);
        }

        let config = load_validated_config(resolved)?;

        return match command {
            Commands::Check => command_check(&config),
            Commands::Tree => command_tree(&config),
            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    let config = load_validated_config(resolved)?;
    run_discovery(&config, args.summary_only)
}
