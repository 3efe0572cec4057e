//! CLI arguments and subcommands for host-service-discovery.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use crate::kernel::KernelCheckMode;
use crate::process::IgnoreMode;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log level options for CLI parsing and the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Rendering of the discovered process list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "host-service-discovery",
    about = "Discover service processes on a Linux host",
    long_about = "Discover service processes on a Linux host.\n\n\
                  Takes one snapshot of the process table and drops kernel threads, \
                  container-runtime shims with everything they spawned, and processes \
                  matching configured ignore rules. What remains is printed as the \
                  service inventory.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides log_level from the config file) [default: warn]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Proc filesystem to scan
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Name of the container shim process
    #[arg(long)]
    pub shim_thread: Option<String>,

    /// Additional ignored process names (comma-separated)
    #[arg(long)]
    pub ignored_threads: Option<String>,

    /// How unprefixed ignore entries are matched (match, regex)
    #[arg(long)]
    pub ignore_mode: Option<IgnoreMode>,

    /// Kernel thread detection method (stat, script, none)
    #[arg(long)]
    pub kernel_check: Option<KernelCheckMode>,

    /// Path of the generated kernel thread check script
    #[arg(long)]
    pub kernel_check_script: Option<PathBuf>,

    /// Timeout per kernel check script invocation in milliseconds
    #[arg(long)]
    pub kernel_check_timeout_ms: Option<u64>,

    /// Read processes from a JSON snapshot instead of the proc filesystem
    #[arg(short = 's', long)]
    pub snapshot_file: Option<PathBuf>,

    /// Output format for the valid process list
    #[arg(short = 'o', long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Print only the partition summary
    #[arg(long)]
    pub summary_only: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Print the process trees below each shim
    Tree,
}
