//! One-shot process classification.
//!
//! The [`Collector`] takes a snapshot of the process table and partitions it:
//!
//! - **kernel**: kernel threads
//! - **shim**: processes named like the configured container shim
//! - **shim descendants**: the shims plus every process below them
//! - **ignored by name**: processes matching an ignore rule
//! - **valid**: everything else, i.e. the services
//!
//! The first three "ignored" sources may overlap; `valid` is computed as a
//! set difference and is disjoint from all of them.

use crate::config::Config;
use crate::error::Result;
use crate::kernel::{KernelCheckMode, KernelThreadProbe, NoopProbe, ScriptProbe, StatFlagsProbe};
use crate::process::{IgnoreRules, Pid, Process, ProcScanner, ProcessSource, StaticSource};
use crate::tree::Tree;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// Partition sizes of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub kernel: usize,
    pub shim: usize,
    pub shim_descendants: usize,
    pub ignored_by_name: usize,
    pub ignored: usize,
    pub valid: usize,
}

/// Result of one classification pass. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    all: BTreeMap<Pid, Process>,
    kernel: BTreeSet<Pid>,
    shim: BTreeSet<Pid>,
    shim_descendants: BTreeSet<Pid>,
    ignored_by_name: BTreeSet<Pid>,
    ignored: BTreeSet<Pid>,
    valid: BTreeSet<Pid>,
    tree: Tree,
}

impl Snapshot {
    /// Classifies `processes`.
    ///
    /// `probe` must already be prepared.
    pub fn classify(
        processes: Vec<Process>,
        shim_thread: &str,
        rules: &IgnoreRules,
        probe: &dyn KernelThreadProbe,
    ) -> Self {
        let all: BTreeMap<Pid, Process> = processes.into_iter().map(|p| (p.pid, p)).collect();

        let shim: BTreeSet<Pid> = all
            .values()
            .filter(|p| p.name == shim_thread)
            .map(|p| p.pid)
            .collect();

        let roots: Vec<(Pid, Pid)> = shim.iter().map(|pid| (*pid, all[pid].ppid)).collect();
        let nodes: Vec<(Pid, Pid)> = all.values().map(|p| (p.pid, p.ppid)).collect();
        let tree = Tree::new(&roots, &nodes);
        let shim_descendants: BTreeSet<Pid> = tree.traverse().into_iter().collect();

        let kernel: BTreeSet<Pid> = all
            .keys()
            .copied()
            .filter(|pid| probe.is_kernel_thread(*pid))
            .collect();

        let ignored_by_name: BTreeSet<Pid> = all
            .values()
            .filter(|p| rules.is_ignored(&p.name))
            .map(|p| p.pid)
            .collect();

        let ignored: BTreeSet<Pid> = kernel
            .iter()
            .chain(shim_descendants.iter())
            .chain(ignored_by_name.iter())
            .copied()
            .collect();

        let valid: BTreeSet<Pid> = all
            .keys()
            .copied()
            .filter(|pid| !ignored.contains(pid))
            .collect();

        Self {
            all,
            kernel,
            shim,
            shim_descendants,
            ignored_by_name,
            ignored,
            valid,
            tree,
        }
    }

    pub fn all(&self) -> &BTreeMap<Pid, Process> {
        &self.all
    }

    pub fn kernel_ids(&self) -> &BTreeSet<Pid> {
        &self.kernel
    }

    pub fn shim_ids(&self) -> &BTreeSet<Pid> {
        &self.shim
    }

    /// Shim processes and everything below them.
    pub fn shim_descendant_ids(&self) -> &BTreeSet<Pid> {
        &self.shim_descendants
    }

    pub fn ignored_by_name_ids(&self) -> &BTreeSet<Pid> {
        &self.ignored_by_name
    }

    /// Union of kernel, shim-descendant and ignored-by-name ids.
    pub fn ignored_ids(&self) -> &BTreeSet<Pid> {
        &self.ignored
    }

    pub fn valid_ids(&self) -> &BTreeSet<Pid> {
        &self.valid
    }

    /// Shim forest the shim-descendant set was computed from.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.all.get(&pid)
    }

    pub fn valid_processes(&self) -> Vec<&Process> {
        self.valid.iter().filter_map(|pid| self.all.get(pid)).collect()
    }

    /// Names of the processes in `ids`, in id order.
    pub fn names<'a>(&'a self, ids: &'a BTreeSet<Pid>) -> Vec<&'a str> {
        ids.iter()
            .filter_map(|pid| self.all.get(pid))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            total: self.all.len(),
            kernel: self.kernel.len(),
            shim: self.shim.len(),
            shim_descendants: self.shim_descendants.len(),
            ignored_by_name: self.ignored_by_name.len(),
            ignored: self.ignored.len(),
            valid: self.valid.len(),
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = |f: &mut fmt::Formatter<'_>, label: &str, ids: &BTreeSet<Pid>| {
            writeln!(
                f,
                "{:<18}{:>5}  {}",
                label,
                ids.len(),
                self.names(ids).join(", ")
            )
        };

        writeln!(f, "{:<18}{:>5}", "Total:", self.all.len())?;
        line(f, "Kernel:", &self.kernel)?;
        line(f, "Shim:", &self.shim)?;
        line(f, "Shim descendants:", &self.shim_descendants)?;
        line(f, "Ignored by name:", &self.ignored_by_name)?;
        writeln!(f, "{:<18}{:>5}", "Ignored (total):", self.ignored.len())?;
        line(f, "Valid:", &self.valid)
    }
}

/// Runs discovery passes with a fixed configuration.
pub struct Collector {
    config: Config,
    rules: IgnoreRules,
    source: Box<dyn ProcessSource>,
    probe: Box<dyn KernelThreadProbe>,
    snapshot: Option<Snapshot>,
}

impl Collector {
    /// Builds a collector reading the configured proc root with the
    /// configured kernel probe. Fails on invalid ignore patterns.
    ///
    /// With `snapshot_file` set the replayed processes are not live on this
    /// host, so no kernel thread check runs regardless of `kernel_check_mode`.
    pub fn new(config: &Config) -> Result<Self> {
        if let Some(path) = &config.snapshot_file {
            debug!(
                "Replaying processes from {}, kernel thread check disabled",
                path.display()
            );
            return Self::with_parts(
                config,
                Box::new(StaticSource::from_json_file(path)?),
                Box::new(NoopProbe),
            );
        }

        let probe: Box<dyn KernelThreadProbe> = match config.kernel_check_mode() {
            KernelCheckMode::Stat => Box::new(StatFlagsProbe::new(config.proc_root())),
            KernelCheckMode::Script => Box::new(ScriptProbe::new(
                config.kernel_thread_check_script(),
                config.proc_root(),
                config.kernel_check_timeout(),
            )),
            KernelCheckMode::None => Box::new(NoopProbe),
        };

        Self::with_parts(
            config,
            Box::new(ProcScanner::new(config.proc_root())),
            probe,
        )
    }

    /// Builds a collector around an explicit process source and probe.
    pub fn with_parts(
        config: &Config,
        source: Box<dyn ProcessSource>,
        probe: Box<dyn KernelThreadProbe>,
    ) -> Result<Self> {
        let rules = IgnoreRules::compile(&config.ignored_threads, config.ignore_mode())?;
        Ok(Self {
            config: config.clone(),
            rules,
            source,
            probe,
            snapshot: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Performs one snapshot-and-classify pass.
    ///
    /// On error no snapshot is kept, including one from an earlier pass.
    pub fn generate(&mut self) -> Result<&Snapshot> {
        self.snapshot = None;
        let start = Instant::now();

        let processes = self.source.scan()?;
        debug!("Enumerated {} processes", processes.len());

        self.probe.prepare()?;
        let snapshot = Snapshot::classify(
            processes,
            self.config.shim_thread(),
            &self.rules,
            self.probe.as_ref(),
        );

        let summary = snapshot.summary();
        info!(
            total = summary.total,
            kernel = summary.kernel,
            shim = summary.shim,
            shim_descendants = summary.shim_descendants,
            ignored_by_name = summary.ignored_by_name,
            valid = summary.valid,
            probe = self.probe.name(),
            "Discovery pass completed in {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(self.snapshot.insert(snapshot))
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Valid processes of the last successful pass; empty before one.
    pub fn valid_processes(&self) -> Vec<&Process> {
        self.snapshot
            .as_ref()
            .map(Snapshot::valid_processes)
            .unwrap_or_default()
    }

    /// Human-readable partition summary.
    pub fn describe(&self) -> String {
        match &self.snapshot {
            Some(s) => s.to_string(),
            None => "No snapshot collected".to_string(),
        }
    }
}
