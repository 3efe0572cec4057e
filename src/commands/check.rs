//! Check command implementation.
//!
//! Validates system requirements and configuration.

use nix::unistd::geteuid;

use host_service_discovery::config::{validate_effective_config, Config};
use host_service_discovery::kernel::{KernelCheckMode, KernelThreadProbe, ScriptProbe};
use host_service_discovery::process::{list_pids, read_stat, SocketTable};

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Host Service Discovery - System Check");
    println!("========================================");

    let mut all_ok = true;
    let proc_root = config.proc_root();

    // Privileges
    println!("\n👤 Checking privileges...");
    if geteuid().is_root() {
        println!("   ✅ Running as root (uid=0)");
    } else {
        println!("   ⚠️  Not running as root - executable paths and sockets of other users' processes will be missing");
    }

    // Process table
    if config.snapshot_file.is_some() {
        println!("\n📁 Snapshot file configured, skipping proc filesystem checks");
    } else {
        println!("\n📁 Checking {} ...", proc_root.display());
        match list_pids(&proc_root) {
            Ok(pids) if pids.is_empty() => {
                println!("   ❌ No process entries found");
                all_ok = false;
            }
            Ok(pids) => {
                println!("   ✅ Can list {} process entries", pids.len());
                let readable = pids
                    .iter()
                    .filter(|pid| read_stat(&proc_root.join(pid.to_string())).is_ok())
                    .count();
                println!("   ✅ Can read stat of {} processes", readable);
            }
            Err(e) => {
                println!("   ❌ Cannot read process table: {}", e);
                all_ok = false;
            }
        }

        match SocketTable::load(&proc_root.join("net")) {
            Ok(table) => println!("   ✅ Socket tables readable ({} sockets)", table.len()),
            Err(e) => println!("   ⚠️  Socket tables not readable, ports will be empty: {}", e),
        }
    }

    // Kernel thread probe
    println!("\n🧵 Checking kernel thread detection ({})...", config.kernel_check_mode());
    if config.kernel_check_mode() == KernelCheckMode::Script {
        let mut probe = ScriptProbe::new(
            config.kernel_thread_check_script(),
            &proc_root,
            config.kernel_check_timeout(),
        );
        match probe.prepare() {
            Ok(()) => {
                println!("   ✅ Script written to {}", probe.script_path().display());
                // pid 2 is kthreadd on every Linux host
                if probe.is_kernel_thread(2) {
                    println!("   ✅ Script detects kthreadd as kernel thread");
                } else {
                    println!("   ⚠️  Script did not detect kthreadd (pid 2) as kernel thread");
                }
            }
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    } else {
        println!("   ✅ No helper script required");
    }

    // Configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
            println!("   ├─ Shim process: {}", config.shim_thread());
            println!(
                "   └─ Ignore rules: {} ({} mode)",
                config.ignored_threads.len(),
                config.ignore_mode()
            );
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
