//! Configuration management for host-service-discovery.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel, OutputFormat};
use crate::error::DiscoveryError;
use crate::kernel::KernelCheckMode;
use crate::process::IgnoreMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const DEFAULT_SHIM_THREAD: &str = "containerd-shim-runc-v2";
pub const DEFAULT_KERNEL_CHECK_SCRIPT: &str = "/tmp/check_kernel_thread.sh";
pub const DEFAULT_KERNEL_CHECK_TIMEOUT_MS: u64 = 2000;

/// Configuration for one discovery pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Mount point of the proc filesystem to scan
    #[serde(alias = "procRoot")]
    pub proc_root: Option<PathBuf>,

    /// Name of the container-runtime shim process
    #[serde(alias = "shimThread")]
    pub shim_thread: Option<String>,

    /// Process names (or patterns) that are never services
    #[serde(alias = "ignoredThreads", default)]
    pub ignored_threads: Vec<String>,

    /// "match" | "regex": how unprefixed ignored_threads entries are read
    #[serde(alias = "ignoreMode")]
    pub ignore_mode: Option<IgnoreMode>,

    /// "stat" | "script" | "none"
    #[serde(alias = "kernelCheckMode")]
    pub kernel_check_mode: Option<KernelCheckMode>,

    /// Where the kernel-thread helper script is generated (script mode)
    #[serde(alias = "kernelThreadCheckScript")]
    pub kernel_thread_check_script: Option<PathBuf>,

    /// Upper bound for one helper script invocation
    #[serde(alias = "kernelCheckTimeoutMs")]
    pub kernel_check_timeout_ms: Option<u64>,

    /// Replay processes from a JSON file instead of reading the proc root
    #[serde(alias = "snapshotFile")]
    pub snapshot_file: Option<PathBuf>,

    // Output
    pub output_format: Option<OutputFormat>,
    #[serde(alias = "logLevel")]
    pub log_level: Option<LogLevel>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            shim_thread: Some(DEFAULT_SHIM_THREAD.to_string()),
            ignored_threads: Vec::new(),
            ignore_mode: Some(IgnoreMode::Match),
            kernel_check_mode: Some(KernelCheckMode::Stat),
            kernel_thread_check_script: Some(PathBuf::from(DEFAULT_KERNEL_CHECK_SCRIPT)),
            kernel_check_timeout_ms: Some(DEFAULT_KERNEL_CHECK_TIMEOUT_MS),
            snapshot_file: None,
            output_format: Some(OutputFormat::Json),
            log_level: Some(LogLevel::Warn),
        }
    }
}

impl Config {
    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn shim_thread(&self) -> &str {
        self.shim_thread.as_deref().unwrap_or(DEFAULT_SHIM_THREAD)
    }

    pub fn ignore_mode(&self) -> IgnoreMode {
        self.ignore_mode.unwrap_or_default()
    }

    pub fn kernel_check_mode(&self) -> KernelCheckMode {
        self.kernel_check_mode.unwrap_or_default()
    }

    pub fn kernel_thread_check_script(&self) -> PathBuf {
        self.kernel_thread_check_script
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_KERNEL_CHECK_SCRIPT))
    }

    pub fn kernel_check_timeout(&self) -> Duration {
        Duration::from_millis(
            self.kernel_check_timeout_ms
                .unwrap_or(DEFAULT_KERNEL_CHECK_TIMEOUT_MS),
        )
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format.unwrap_or_default()
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level.unwrap_or_default()
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), DiscoveryError> {
    if cfg.shim_thread().trim().is_empty() {
        return Err(DiscoveryError::Config("shim_thread must not be empty".into()));
    }

    if cfg.ignored_threads.iter().any(|s| s.trim().is_empty()) {
        return Err(DiscoveryError::Config(
            "ignored_threads must not contain empty entries".into(),
        ));
    }

    // Surface bad patterns here rather than mid-run
    crate::process::IgnoreRules::compile(&cfg.ignored_threads, cfg.ignore_mode())?;

    if cfg.kernel_check_mode() == KernelCheckMode::Script {
        if cfg.kernel_check_timeout_ms == Some(0) {
            return Err(DiscoveryError::Config(
                "kernel_check_timeout_ms must be greater than zero".into(),
            ));
        }
        let script = cfg.kernel_thread_check_script();
        if script.as_os_str().is_empty() || script.is_dir() {
            return Err(DiscoveryError::Config(format!(
                "kernel_thread_check_script '{}' is not a file path",
                script.display()
            )));
        }
    }

    if let Some(snapshot) = &cfg.snapshot_file {
        if !snapshot.exists() {
            return Err(DiscoveryError::Config(format!(
                "snapshot_file not found: {}",
                snapshot.display()
            )));
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(shim) = &args.shim_thread {
        config.shim_thread = Some(shim.clone());
    }

    // Comma-separated ignore entries extend the configured list
    if let Some(ignored) = &args.ignored_threads {
        config.ignored_threads.extend(
            ignored
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );
    }
    if let Some(mode) = args.ignore_mode {
        config.ignore_mode = Some(mode);
    }

    if let Some(mode) = args.kernel_check {
        config.kernel_check_mode = Some(mode);
    }
    if let Some(script) = &args.kernel_check_script {
        config.kernel_thread_check_script = Some(script.clone());
    }
    if let Some(timeout) = args.kernel_check_timeout_ms {
        config.kernel_check_timeout_ms = Some(timeout);
    }

    if let Some(snapshot) = &args.snapshot_file {
        config.snapshot_file = Some(snapshot.clone());
    }
    if let Some(format) = args.output {
        config.output_format = Some(format);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level);
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            // Try default locations
            let defaults = [
                "/etc/host-service-discovery/config.yaml",
                "/etc/host-service-discovery/config.yml",
                "/etc/host-service-discovery/config.json",
                "./config.yaml",
                "./config.yml",
                "./host-service-discovery.yaml",
            ];

            match defaults.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, &path)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config content, choosing the format by file extension (YAML by default).
pub fn parse_config(content: &str, path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Renders configuration in requested format
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
