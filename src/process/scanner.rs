//! Process scanning utilities for discovering and reading process entries from /proc.
//!
//! The scanner works against a configurable proc root so that it can be
//! pointed at a host mount (`/host/proc`) or at a fake tree in tests.

use crate::error::{DiscoveryError, Result};
use crate::process::model::{Pid, Process, Processes};
use crate::process::sockets::{resolve_sockets, socket_inodes, SocketTable};
use crate::process::stat::read_stat;
use ahash::AHashMap as HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Longest command name the kernel keeps in `comm` (TASK_COMM_LEN - 1).
pub const COMM_MAX_LEN: usize = 15;

/// Source of a process table snapshot.
pub trait ProcessSource {
    /// Enumerates every visible process.
    ///
    /// Failing to read the table as a whole is an error; processes that
    /// vanish while being inspected are left out.
    fn scan(&mut self) -> Result<Processes>;
}

/// Lists numeric entries under `root`, ascending.
pub fn list_pids(root: &Path) -> std::result::Result<Vec<Pid>, std::io::Error> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(v) => v,
            None => continue,
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if let Ok(pid) = name.parse::<Pid>() {
            out.push(pid);
        }
    }
    out.sort_unstable();
    Ok(out)
}

/// Reads `cmdline` as a NUL-separated argument vector.
pub fn read_cmdline(proc_path: &Path) -> Vec<String> {
    match fs::read(proc_path.join("cmdline")) {
        Ok(content) => content
            .split(|&b| b == 0u8)
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Resolves the `exe` link; empty for kernel threads and foreign processes.
pub fn read_executable_path(proc_path: &Path) -> String {
    fs::read_link(proc_path.join("exe"))
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Full process name.
///
/// `comm` is cut at 15 bytes, which turns `containerd-shim-runc-v2` into
/// `containerd-shim`. When the name is at that limit and the basename of
/// argv[0] extends it, the basename is used instead.
pub fn resolve_name(comm: &str, args: &[String]) -> String {
    if comm.len() >= COMM_MAX_LEN {
        if let Some(argv0) = args.first() {
            if let Some(base) = Path::new(argv0).file_name().and_then(|s| s.to_str()) {
                if base.starts_with(comm) {
                    return base.to_string();
                }
            }
        }
    }
    comm.to_string()
}

/// Live scanner over a proc filesystem.
pub struct ProcScanner {
    root: PathBuf,
    /// Socket tables keyed by network namespace link (`net:[4026531992]`).
    socket_tables: HashMap<String, SocketTable>,
}

impl ProcScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            socket_tables: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Socket table of the namespace `proc_path` lives in, loaded once per namespace.
    fn socket_table_for(&mut self, proc_path: &Path) -> &SocketTable {
        let key = fs::read_link(proc_path.join("ns").join("net"))
            .ok()
            .and_then(|p| p.to_str().map(str::to_string))
            .unwrap_or_default();
        let root = &self.root;

        self.socket_tables.entry(key).or_insert_with_key(|key| {
            let own = (!key.is_empty())
                .then(|| SocketTable::load(&proc_path.join("net")).ok())
                .flatten();
            match own {
                Some(table) => table,
                None => SocketTable::load(&root.join("net")).unwrap_or_else(|e| {
                    warn!("No socket tables for namespace '{}': {}", key, e);
                    SocketTable::default()
                }),
            }
        })
    }

    /// Reads one process. `None` when the process is gone or its stat is unreadable.
    pub fn read_process(&mut self, pid: Pid) -> Option<Process> {
        let proc_path = self.root.join(pid.to_string());

        let stat = match read_stat(&proc_path) {
            Ok(s) => s,
            Err(e) => {
                debug!("Skipping pid {}: {}", pid, e);
                return None;
            }
        };

        let args = read_cmdline(&proc_path);
        let inodes = socket_inodes(&proc_path);
        let sockets = if inodes.is_empty() {
            Default::default()
        } else {
            resolve_sockets(&inodes, self.socket_table_for(&proc_path))
        };

        Some(Process {
            name: resolve_name(&stat.comm, &args),
            pid,
            ppid: stat.ppid,
            sockets: sockets.sockets,
            executable_path: read_executable_path(&proc_path),
            args,
            ports: sockets.ports,
            container_name: None,
            container_image: None,
        })
    }
}

impl ProcessSource for ProcScanner {
    fn scan(&mut self) -> Result<Processes> {
        let pids = list_pids(&self.root).map_err(|source| DiscoveryError::ProcTable {
            path: self.root.clone(),
            source,
        })?;
        // Namespaces and their sockets change between passes.
        self.socket_tables.clear();

        let total = pids.len();
        let processes: Processes = pids
            .into_iter()
            .filter_map(|pid| self.read_process(pid))
            .collect();

        debug!(
            "Scanned {} of {} process entries under {}",
            processes.len(),
            total,
            self.root.display()
        );
        Ok(processes)
    }
}

/// Replays a fixed process list, e.g. one loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    processes: Processes,
}

impl StaticSource {
    pub fn new(processes: Processes) -> Self {
        Self { processes }
    }

    /// Loads a JSON array of `Process` records.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| DiscoveryError::ProcTable {
            path: path.to_path_buf(),
            source,
        })?;
        let processes: Processes = serde_json::from_str(&content).map_err(|e| {
            DiscoveryError::Config(format!("Invalid snapshot file {}: {}", path.display(), e))
        })?;
        Ok(Self::new(processes))
    }
}

impl ProcessSource for StaticSource {
    fn scan(&mut self) -> Result<Processes> {
        Ok(self.processes.clone())
    }
}
