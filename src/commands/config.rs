//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use host_service_discovery::cli::ConfigFormat;
use host_service_discovery::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("host-service-discovery.yaml"),
    };

    let content = match format {
        ConfigFormat::Yaml => {
            let mut content = render_config(&config, ConfigFormat::Yaml)?;
            if commented {
                content = add_config_comments(content);
            }
            content
        }
        other => render_config(&config, other)?,
    };

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Host Service Discovery Configuration
# ====================================
#
# Process Table
# -------------
# proc_root: "/proc"                    # Proc filesystem to scan (e.g. /host/proc in a container)
# snapshot_file: null                   # Replay a JSON process list instead of scanning
#
# Container Shims
# ---------------
# shim_thread: "containerd-shim-runc-v2"  # Shims and all their descendants are not services
#
# Ignore Rules
# ------------
# ignored_threads: []                   # Names never reported as services
#                                       #   "sshd"            exact name
#                                       #   "regex:^kworker"  regular expression search
#                                       #   "match:bash"      exact name, even in regex mode
# ignore_mode: "match"                  # How unprefixed entries are read: match or regex
#
# Kernel Thread Detection
# -----------------------
# kernel_check_mode: "stat"             # stat (in process), script (helper per pid), none
# kernel_thread_check_script: "/tmp/check_kernel_thread.sh"  # Generated in script mode
# kernel_check_timeout_ms: 2000         # Per-invocation timeout in script mode
#
# Output
# ------
# output_format: "json"                 # json or yaml
# log_level: "warn"                     # off, error, warn, info, debug, trace (--log-level wins)
"#;

    format!("{comments}\n{yaml}")
}
