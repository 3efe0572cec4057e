//! The `Process` record produced by one discovery pass.

use serde::{Deserialize, Serialize};

/// Process identifier as used by the Linux kernel (`pid_t`).
pub type Pid = i32;

/// A single process as seen in one snapshot of the process table.
///
/// Field names serialize in PascalCase (`Name`, `Pid`, `Ppid`, ...) so the
/// rendered inventory stays compatible with existing consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Process {
    pub name: String,
    pub pid: Pid,
    /// May point at a process that already exited.
    pub ppid: Pid,
    #[serde(default)]
    pub sockets: Vec<String>,
    #[serde(default)]
    pub executable_path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub ports: Vec<u32>,
    /// Never filled in by the scanner; reserved for container enrichment.
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub container_image: Option<String>,
}

/// Ordered collection of processes.
pub type Processes = Vec<Process>;

impl Process {
    /// Minimal record with just identity fields set.
    pub fn new(pid: Pid, ppid: Pid, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pid,
            ppid,
            ..Default::default()
        }
    }
}
