//! Process-related modules for enumeration and name-based classification.
//!
//! This module provides:
//! - `model`: the `Process` record
//! - `stat`: parsing of /proc/<pid>/stat
//! - `sockets`: socket inode to port resolution
//! - `scanner`: process discovery under a proc root
//! - `ignore`: name-based ignore rules

pub mod ignore;
pub mod model;
pub mod scanner;
pub mod sockets;
pub mod stat;

// Re-export commonly used types
pub use ignore::{IgnoreMode, IgnoreRules};
pub use model::{Pid, Process, Processes};
pub use scanner::{list_pids, resolve_name, ProcScanner, ProcessSource, StaticSource};
pub use sockets::{SocketEntry, SocketTable, Transport};
pub use stat::{parse_stat, read_stat, ProcStat, PF_KTHREAD};
