//! Integration tests for the collector.
//!
//! These tests build fake proc trees in temporary directories and run full
//! discovery passes over them.

use host_service_discovery::kernel::{KernelCheckMode, NoopProbe};
use host_service_discovery::process::StaticSource;
use host_service_discovery::{Collector, Config, DiscoveryError, Pid, Process};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const PF_KTHREAD: u32 = 0x0020_0000;

/// Helper to write one process directory into a fake proc root.
fn add_process(root: &Path, pid: Pid, ppid: Pid, comm: &str, argv: &[&str], flags: u32) {
    let dir = root.join(pid.to_string());
    fs::create_dir_all(&dir).expect("create pid dir");
    fs::write(
        dir.join("stat"),
        format!("{pid} ({comm}) S {ppid} {pid} {pid} 0 -1 {flags} 0 0 0 0 0 0 0 0 20 0 1 0 100 0 0\n"),
    )
    .expect("write stat");

    let mut cmdline = Vec::new();
    for arg in argv {
        cmdline.extend_from_slice(arg.as_bytes());
        cmdline.push(0);
    }
    fs::write(dir.join("cmdline"), cmdline).expect("write cmdline");
}

/// Builds the reference process table:
/// init, a containerd shim with two generations below it, and sshd.
fn reference_proc_root() -> TempDir {
    let dir = tempdir().expect("Failed to create temp dir");
    let root = dir.path();
    add_process(root, 1, 0, "init", &["/sbin/init"], 0x0040_0100);
    add_process(
        root,
        100,
        1,
        "containerd-shim",
        &["/usr/bin/containerd-shim-runc-v2", "-namespace", "moby"],
        0x0040_0100,
    );
    add_process(root, 101, 100, "app-a", &["/app/a"], 0x0040_0100);
    add_process(root, 102, 101, "worker", &["/app/worker"], 0x0040_0100);
    add_process(root, 200, 1, "sshd", &["/usr/sbin/sshd", "-D"], 0x0040_0100);
    dir
}

fn config_for(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.proc_root = Some(root.to_path_buf());
    cfg.ignored_threads = vec!["sshd".into()];
    cfg
}

fn ids(list: &[Pid]) -> BTreeSet<Pid> {
    list.iter().copied().collect()
}

#[test]
fn test_reference_scenario() {
    let dir = reference_proc_root();
    let mut collector = Collector::new(&config_for(dir.path())).expect("collector");
    let snap = collector.generate().expect("generate succeeds");

    assert_eq!(snap.all().len(), 5);
    assert!(snap.kernel_ids().is_empty());
    assert_eq!(snap.shim_ids(), &ids(&[100]));
    assert_eq!(snap.shim_descendant_ids(), &ids(&[100, 101, 102]));
    assert_eq!(snap.ignored_by_name_ids(), &ids(&[200]));
    assert_eq!(snap.valid_ids(), &ids(&[1]));

    let valid = collector.valid_processes();
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0].name, "init");
    assert_eq!(valid[0].args, vec!["/sbin/init".to_string()]);
}

#[test]
fn test_partitions_cover_snapshot_and_exclude_valid() {
    let dir = reference_proc_root();
    add_process(dir.path(), 2, 0, "kthreadd", &[], 0x0020_8040);
    add_process(dir.path(), 3, 2, "rcu_gp", &[], 0x0420_8060 | PF_KTHREAD);
    add_process(dir.path(), 300, 1, "nginx", &["nginx"], 0x0040_0100);
    // parent 999 exited before the snapshot
    add_process(dir.path(), 400, 999, "orphan", &["orphan"], 0x0040_0100);

    let mut collector = Collector::new(&config_for(dir.path())).expect("collector");
    let snap = collector.generate().expect("generate succeeds");

    assert_eq!(snap.kernel_ids(), &ids(&[2, 3]));
    assert_eq!(snap.valid_ids(), &ids(&[1, 300, 400]));

    for pid in snap.valid_ids() {
        assert!(!snap.kernel_ids().contains(pid));
        assert!(!snap.shim_descendant_ids().contains(pid));
        assert!(!snap.ignored_by_name_ids().contains(pid));
    }

    let covered: BTreeSet<Pid> = snap
        .valid_ids()
        .iter()
        .chain(snap.kernel_ids())
        .chain(snap.shim_descendant_ids())
        .chain(snap.ignored_by_name_ids())
        .copied()
        .collect();
    let all: BTreeSet<Pid> = snap.all().keys().copied().collect();
    assert_eq!(covered, all);
}

#[test]
fn test_empty_process_table() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut collector = Collector::new(&config_for(dir.path())).expect("collector");
    let summary = collector.generate().expect("empty table is fine").summary();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.valid, 0);
    assert_eq!(summary.ignored, 0);
    assert!(collector.valid_processes().is_empty());
}

#[test]
fn test_missing_proc_root_fails() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut collector =
        Collector::new(&config_for(&dir.path().join("gone"))).expect("collector");

    assert!(matches!(
        collector.generate(),
        Err(DiscoveryError::ProcTable { .. })
    ));
    assert!(collector.snapshot().is_none());
}

#[test]
fn test_unwritable_script_path_fails_generate() {
    let dir = reference_proc_root();
    let mut cfg = config_for(dir.path());
    cfg.kernel_check_mode = Some(KernelCheckMode::Script);
    cfg.kernel_thread_check_script = Some(dir.path().join("no-such-dir").join("check.sh"));

    let mut collector = Collector::new(&cfg).expect("collector");
    let err = collector.generate().err().expect("script write must fail");
    assert!(matches!(err, DiscoveryError::ScriptWrite { .. }));
    assert!(collector.snapshot().is_none());
    assert!(collector.valid_processes().is_empty());
}

#[test]
fn test_script_mode_detects_kernel_threads() {
    let dir = reference_proc_root();
    add_process(dir.path(), 2, 0, "kthreadd", &[], 0x0020_8040);

    let script_dir = tempdir().expect("Failed to create temp dir");
    let mut cfg = config_for(dir.path());
    cfg.kernel_check_mode = Some(KernelCheckMode::Script);
    cfg.kernel_thread_check_script = Some(script_dir.path().join("check.sh"));

    let mut collector = Collector::new(&cfg).expect("collector");
    let snap = collector.generate().expect("generate succeeds");

    assert_eq!(snap.kernel_ids(), &ids(&[2]));
    assert_eq!(snap.valid_ids(), &ids(&[1]));
    assert!(script_dir.path().join("check.sh").exists());
}

#[test]
fn test_regex_ignore_rules() {
    let dir = reference_proc_root();
    add_process(dir.path(), 500, 1, "systemd-journal", &[], 0x0040_0100);
    add_process(dir.path(), 501, 1, "systemd-udevd", &[], 0x0040_0100);

    let mut cfg = config_for(dir.path());
    cfg.ignored_threads = vec!["sshd".into(), "regex:^systemd-".into()];

    let mut collector = Collector::new(&cfg).expect("collector");
    let snap = collector.generate().expect("generate succeeds");
    assert_eq!(snap.ignored_by_name_ids(), &ids(&[200, 500, 501]));
    assert_eq!(snap.valid_ids(), &ids(&[1]));
}

#[test]
fn test_ports_are_resolved_from_socket_tables() {
    let dir = reference_proc_root();
    add_process(dir.path(), 300, 1, "nginx", &["nginx"], 0x0040_0100);

    let fd = dir.path().join("300").join("fd");
    fs::create_dir_all(&fd).unwrap();
    std::os::unix::fs::symlink("socket:[5001]", fd.join("6")).unwrap();
    std::os::unix::fs::symlink("socket:[5002]", fd.join("7")).unwrap();
    std::os::unix::fs::symlink("socket:[5003]", fd.join("8")).unwrap();

    let net = dir.path().join("net");
    fs::create_dir_all(&net).unwrap();
    fs::write(
        net.join("tcp"),
        "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
         \x20  0: 00000000:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 5001 1 0000000000000000 100 0 0 10 0\n\
         \x20  1: 0100007F:0050 0100007F:D431 01 00000000:00000000 00:00000000 00000000     0        0 5002 1 0000000000000000 20 4 30 10 -1\n",
    )
    .unwrap();
    // 5003 is a unix socket: present in no tcp/udp table

    let mut collector = Collector::new(&config_for(dir.path())).expect("collector");
    let snap = collector.generate().expect("generate succeeds");

    let nginx = snap.process(300).expect("nginx discovered");
    assert_eq!(nginx.ports, vec![80, 54321]);
    assert_eq!(nginx.sockets.len(), 2);
    assert!(snap.valid_ids().contains(&300));
}

#[test]
fn test_generate_replaces_previous_snapshot() {
    let dir = reference_proc_root();
    let mut collector = Collector::new(&config_for(dir.path())).expect("collector");
    assert_eq!(collector.generate().unwrap().summary().total, 5);

    add_process(dir.path(), 600, 1, "redis-server", &["redis-server"], 0x0040_0100);
    assert_eq!(collector.generate().unwrap().summary().total, 6);
    assert!(collector.describe().contains("redis-server"));
}

#[test]
fn test_static_source_with_explicit_parts() {
    let processes = vec![
        Process::new(1, 0, "init"),
        Process::new(100, 1, "containerd-shim-runc-v2"),
        Process::new(101, 100, "app-a"),
        Process::new(102, 101, "worker"),
        Process::new(200, 1, "sshd"),
    ];
    let mut collector = Collector::with_parts(
        &config_for(&PathBuf::from("/nonexistent")),
        Box::new(StaticSource::new(processes)),
        Box::new(NoopProbe),
    )
    .expect("collector");

    let snap = collector.generate().expect("generate succeeds");
    assert_eq!(snap.valid_ids(), &ids(&[1]));
    assert_eq!(snap.tree().traverse(), vec![100, 101, 102]);
}

#[test]
fn test_snapshot_file_skips_live_kernel_check() {
    // pid 2 is a kernel thread in the proc root, but a service in the replay
    let dir = tempdir().expect("Failed to create temp dir");
    add_process(dir.path(), 2, 0, "kthreadd", &[], 0x0020_8040);

    let replay = dir.path().join("replay.json");
    fs::write(
        &replay,
        r#"[{"Name":"init","Pid":1,"Ppid":0},{"Name":"nginx","Pid":2,"Ppid":1}]"#,
    )
    .expect("write replay");

    let mut cfg = config_for(dir.path());
    cfg.snapshot_file = Some(replay);
    cfg.kernel_check_mode = Some(KernelCheckMode::Stat);

    let mut collector = Collector::new(&cfg).expect("collector");
    let snap = collector.generate().expect("generate succeeds");

    assert!(snap.kernel_ids().is_empty());
    assert_eq!(snap.valid_ids(), &ids(&[1, 2]));
    assert_eq!(snap.process(2).map(|p| p.name.as_str()), Some("nginx"));
}
