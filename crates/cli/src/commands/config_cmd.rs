//! `second config`: Show configuration.

use second_config::AppConfig;
use std::path::Path;

pub fn show(config_path: Option<&Path>, default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = super::load_config(config_path)?;
    print!("{}", config.redacted_toml());

    if let Err(e) = config.require_bot_token() {
        eprintln!("\n⚠️  {e}");
    }
    println!(
        "\n# ~{} prompt tokens planned of num_ctx {}",
        config.planned_prompt_tokens(),
        config.ollama.num_ctx
    );
    Ok(())
}
