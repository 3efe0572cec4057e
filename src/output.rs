//! Rendering of discovery results.

use crate::cli::OutputFormat;
use crate::collector::Snapshot;
use crate::process::Process;
use serde::Serialize;
use std::fmt::Write as _;

/// Pretty JSON with four-space indentation.
pub fn to_pretty_json<T: Serialize + ?Sized>(
    value: &T,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

/// Renders a process list in the requested format.
pub fn render_processes(
    processes: &[&Process],
    format: OutputFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let out = match format {
        OutputFormat::Json => to_pretty_json(processes)?,
        OutputFormat::Yaml => serde_yaml::to_string(processes)?,
    };
    Ok(out)
}

/// Indented listing of every shim tree in the snapshot.
pub fn render_tree(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for (pid, depth) in snapshot.tree().traverse_with_depth() {
        let name = snapshot.process(pid).map(|p| p.name.as_str()).unwrap_or("?");
        let _ = writeln!(out, "{}{} {}", "  ".repeat(depth), pid, name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::NoopProbe;
    use crate::process::IgnoreRules;

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let p = Process::new(1, 0, "init");
        let json = to_pretty_json(&vec![&p]).unwrap();
        assert!(json.starts_with("[\n    {\n        \"Name\": \"init\""));
    }

    #[test]
    fn test_pretty_json_keeps_non_ascii_names() {
        let p = Process::new(9, 1, "dienst-ü");
        let json = to_pretty_json(&p).unwrap();
        assert!(json.contains("\"Name\": \"dienst-ü\""));
    }

    #[test]
    fn test_render_empty_list() {
        assert_eq!(render_processes(&[], OutputFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn test_render_yaml() {
        let p = Process::new(7, 1, "redis-server");
        let yaml = render_processes(&[&p], OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("Name: redis-server"));
        assert!(yaml.contains("Pid: 7"));
    }

    #[test]
    fn test_render_tree_indents_by_depth() {
        let list = vec![
            Process::new(1, 0, "init"),
            Process::new(100, 1, "containerd-shim-runc-v2"),
            Process::new(101, 100, "app"),
            Process::new(102, 101, "worker"),
        ];
        let snap = Snapshot::classify(
            list,
            "containerd-shim-runc-v2",
            &IgnoreRules::default(),
            &NoopProbe,
        );
        assert_eq!(
            render_tree(&snap),
            "100 containerd-shim-runc-v2\n  101 app\n    102 worker\n"
        );
    }
}
