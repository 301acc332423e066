//! `second status`: Probe dependencies and print the composite.

use second_agent::ServiceState;
use std::path::Path;

use crate::wiring;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let status = wiring::health(&config)?.check().await;

    println!("Second: {}", status.composite.as_str());
    println!("==================");
    println!("  Model:        {}", config.ollama.model);
    println!("  LLM timeout:  {}s", config.ollama.timeout_secs);
    println!("  Routing:      {:?}", config.routing.mode);
    println!("  History:      {} turns (in-memory)", config.history.max_turns);
    println!();
    for (name, state) in &status.services {
        let mark = if *state == ServiceState::Up { "✅" } else { "❌" };
        let note = if config.health.informational.contains(name) {
            " (informational)"
        } else {
            ""
        };
        println!("  {mark} {name}: {}{note}", state.as_str());
    }

    let config_file = second_config::AppConfig::config_dir().join("config.toml");
    if config_path.is_none() && !config_file.exists() {
        println!("\n  ⚠️  No config file — using defaults (see `second config --default`)");
    }
    Ok(())
}
