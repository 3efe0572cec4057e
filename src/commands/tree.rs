//! Tree command implementation.
//!
//! Prints every shim process together with the processes below it.

use host_service_discovery::config::Config;
use host_service_discovery::output::render_tree;
use host_service_discovery::Collector;

/// Lists the shim process trees of one discovery pass.
pub fn command_tree(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut collector = Collector::new(config)?;
    let snapshot = collector.generate()?;

    if snapshot.shim_ids().is_empty() {
        println!("No '{}' processes found", config.shim_thread());
        return Ok(());
    }

    print!("{}", render_tree(snapshot));
    println!(
        "\n{} shim processes, {} processes in their trees",
        snapshot.shim_ids().len(),
        snapshot.shim_descendant_ids().len()
    );
    Ok(())
}
