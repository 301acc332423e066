//! `second ask`: One message through the pipeline, printed to stdout.

use second_agent::Inbound;
use std::path::Path;
use std::time::Duration;

use crate::wiring;

pub async fn run(
    config_path: Option<&Path>,
    message: &str,
    chat: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let services = wiring::build(&config)?;

    let reply = services
        .responder
        .respond(&Inbound::new(chat, "0", message))
        .await;
    println!("{reply}");

    // The exchange is written in the background; give it a chance to land.
    services.persistence.drain(Duration::from_secs(10)).await;
    Ok(())
}
