//! Error types for host-service-discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that abort a discovery pass or reject a configuration.
///
/// Per-process failures (a process exiting mid-scan, a helper invocation that
/// times out) never surface here; they degrade to a default classification.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The process table itself could not be listed.
    #[error("Failed to read process table at {path}: {source}")]
    ProcTable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The kernel-thread helper script could not be materialized.
    #[error("Failed to write kernel thread check script {path}: {source}")]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An ignore rule is not a valid regular expression.
    #[error("Invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
