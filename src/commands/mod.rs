//! CLI command implementations for host-service-discovery.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `tree`: Shim process tree listing

pub mod check;
pub mod config;
pub mod tree;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use tree::command_tree;
