//! Parsing of `/proc/<pid>/stat`.
//!
//! Only the leading fields needed for classification are decoded: the
//! command name, state, parent pid and the per-process flags word.

use crate::process::model::Pid;
use std::fs;
use std::path::Path;

/// Kernel-thread bit of the stat flags field (`PF_KTHREAD`).
pub const PF_KTHREAD: u32 = 0x0020_0000;

/// Leading fields of a stat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStat {
    pub pid: Pid,
    pub comm: String,
    pub state: char,
    pub ppid: Pid,
    pub flags: u32,
}

impl ProcStat {
    pub fn is_kernel_thread(&self) -> bool {
        self.flags & PF_KTHREAD == PF_KTHREAD
    }
}

/// Parse the content of a stat file.
///
/// `comm` may itself contain spaces and parentheses, so it is taken as
/// everything between the first `(` and the last `)`.
pub fn parse_stat(content: &str) -> Result<ProcStat, std::io::Error> {
    let open = content
        .find('(')
        .ok_or_else(|| std::io::Error::other("Invalid stat format: missing '('"))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| std::io::Error::other("Invalid stat format: missing ')'"))?;
    if close < open {
        return Err(std::io::Error::other("Invalid stat format"));
    }

    let pid: Pid = content[..open]
        .trim()
        .parse()
        .map_err(|_| std::io::Error::other("Failed to parse pid field"))?;
    let comm = content[open + 1..close].to_string();

    // state ppid pgrp session tty_nr tpgid flags ...
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if rest.len() < 7 {
        return Err(std::io::Error::other("Invalid stat format"));
    }

    let state = rest[0].chars().next().unwrap_or('?');
    let ppid: Pid = rest[1]
        .parse()
        .map_err(|_| std::io::Error::other("Failed to parse ppid field"))?;
    let flags: u32 = rest[6]
        .parse()
        .map_err(|_| std::io::Error::other("Failed to parse flags field"))?;

    Ok(ProcStat {
        pid,
        comm,
        state,
        ppid,
        flags,
    })
}

/// Read and parse `<proc_path>/stat`.
pub fn read_stat(proc_path: &Path) -> Result<ProcStat, std::io::Error> {
    let content = fs::read_to_string(proc_path.join("stat"))?;
    parse_stat(&content)
}
