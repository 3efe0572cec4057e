//! Host Service Discovery Library
//!
//! Takes a one-shot snapshot of the Linux process table and separates the
//! service processes an operator cares about from infrastructure: kernel
//! threads, container-runtime shims together with everything they spawned,
//! and processes matched by configured ignore rules.
//!
//! # Usage
//!
//! ```no_run
//! use host_service_discovery::{Collector, Config};
//!
//! let mut config = Config::default();
//! config.ignored_threads = vec!["sshd".into(), "regex:^systemd".into()];
//!
//! let mut collector = Collector::new(&config)?;
//! collector.generate()?;
//! println!("{}", collector.describe());
//!
//! for process in collector.valid_processes() {
//!     println!("{} (pid {}) ports {:?}", process.name, process.pid, process.ports);
//! }
//! # Ok::<(), host_service_discovery::DiscoveryError>(())
//! ```

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod kernel;
pub mod output;
pub mod process;
pub mod tree;

// Re-export main types for convenience
pub use collector::{Collector, Snapshot, Summary};
pub use config::Config;
pub use error::{DiscoveryError, Result};
pub use kernel::{KernelCheckMode, KernelThreadProbe};
pub use process::{Pid, Process, Processes};
pub use tree::Tree;
