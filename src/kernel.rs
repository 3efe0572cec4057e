//! Kernel-thread detection.
//!
//! A process is a kernel thread when `PF_KTHREAD` (0x00200000) is set in the
//! flags field of its stat line. Two probes answer that question: one reads
//! the stat file in process, the other generates a small shell helper once
//! per run and invokes it for every pid. Any failure to answer counts as
//! "not a kernel thread".

use crate::error::{DiscoveryError, Result};
use crate::process::{read_stat, Pid};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Answers "is this pid a kernel thread?".
pub trait KernelThreadProbe {
    /// One-time setup before the first query of a pass.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Never fails; an unanswerable query yields `false`.
    fn is_kernel_thread(&self, pid: Pid) -> bool;

    fn name(&self) -> &'static str;
}

/// Which probe the collector uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelCheckMode {
    /// Read the stat flags in process.
    #[default]
    Stat,
    /// Generate the helper script and spawn it per pid.
    Script,
    /// Treat nothing as a kernel thread (replayed snapshots).
    None,
}

impl FromStr for KernelCheckMode {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stat" => Ok(KernelCheckMode::Stat),
            "script" => Ok(KernelCheckMode::Script),
            "none" => Ok(KernelCheckMode::None),
            other => Err(DiscoveryError::Config(format!(
                "Invalid kernel_check_mode '{}', expected 'stat', 'script' or 'none'",
                other
            ))),
        }
    }
}

impl fmt::Display for KernelCheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelCheckMode::Stat => write!(f, "stat"),
            KernelCheckMode::Script => write!(f, "script"),
            KernelCheckMode::None => write!(f, "none"),
        }
    }
}

/// Reads `<root>/<pid>/stat` directly.
#[derive(Debug, Clone)]
pub struct StatFlagsProbe {
    root: PathBuf,
}

impl StatFlagsProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl KernelThreadProbe for StatFlagsProbe {
    fn is_kernel_thread(&self, pid: Pid) -> bool {
        match read_stat(&self.root.join(pid.to_string())) {
            Ok(stat) => stat.is_kernel_thread(),
            Err(e) => {
                debug!("Kernel check for pid {} failed: {}", pid, e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "stat"
    }
}

/// Never reports a kernel thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProbe;

impl KernelThreadProbe for NoopProbe {
    fn is_kernel_thread(&self, _pid: Pid) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// How often a running helper invocation is checked for exit.
const SCRIPT_POLL_INTERVAL: Duration = Duration::from_millis(2);

const SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
# Prints YES when the given pid is a kernel thread (PF_KTHREAD set in stat flags).
[ -n "$1" ] || exit 2
read -r line < "@PROC_ROOT@/$1/stat"
[ -n "$line" ] || exit 1
# Fields after the command name: state ppid pgrp session tty_nr tpgid flags ...
rest=${line##*") "}
set -- $rest
flags=$7

if [ $(( flags & 0x00200000 )) -ne 0 ]; then
    echo 'YES'
else
    echo 'NO'
fi
"#;

/// Body of the helper script for a given proc root.
pub fn script_body(proc_root: &Path) -> String {
    SCRIPT_TEMPLATE.replace("@PROC_ROOT@", &proc_root.to_string_lossy())
}

/// Generates the helper script in `prepare` and runs it once per pid.
#[derive(Debug, Clone)]
pub struct ScriptProbe {
    script_path: PathBuf,
    proc_root: PathBuf,
    timeout: Duration,
}

impl ScriptProbe {
    pub fn new(
        script_path: impl Into<PathBuf>,
        proc_root: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            script_path: script_path.into(),
            proc_root: proc_root.into(),
            timeout,
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

impl KernelThreadProbe for ScriptProbe {
    fn prepare(&mut self) -> Result<()> {
        fs::write(&self.script_path, script_body(&self.proc_root)).map_err(|source| {
            DiscoveryError::ScriptWrite {
                path: self.script_path.clone(),
                source,
            }
        })?;
        info!(
            "Kernel thread check script written to {}",
            self.script_path.display()
        );
        Ok(())
    }

    fn is_kernel_thread(&self, pid: Pid) -> bool {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg(&self.script_path).arg(pid.to_string());

        match run_with_timeout(cmd, self.timeout) {
            Ok(output) => output.contains("YES"),
            Err(reason) => {
                debug!("Kernel check script for pid {} failed: {}", pid, reason);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "script"
    }
}

/// Runs `cmd` and returns its stdout, killing it once `timeout` elapses.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> std::result::Result<String, String> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("spawn failed: {}", e))?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("timed out after {:?}", timeout));
            }
            Ok(None) => std::thread::sleep(SCRIPT_POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(format!("wait failed: {}", e));
            }
        }
    };

    if !status.success() {
        return Err(format!("exited with {}", status));
    }

    let mut output = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout
            .read_to_string(&mut output)
            .map_err(|e| format!("reading output failed: {}", e))?;
    }
    Ok(output)
}
