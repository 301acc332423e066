//! `second run`: Start the bot.

use second_agent::{Bot, BotSettings};
use second_channels::{TelegramChannel, TelegramConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::wiring;

/// Upper bound on waiting for background writes at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let telegram = TelegramConfig::from_app(&config)?;
    if telegram.allowed_users.is_empty() {
        warn!("AUTHORIZED_USER_ID is not set; every sender will be refused");
    }

    info!("Starting Second...");
    info!(authorized_user = %config.telegram.authorized_user_id, "Access");

    let services = wiring::build(&config)?;
    let channel = Arc::new(TelegramChannel::new(telegram));
    let health = services.health.with_informational_probe(channel.clone());
    let bot = Bot::new(
        channel,
        services.responder,
        services.history,
        services.persistence.clone(),
        health,
        BotSettings::from_config(&config),
    );

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        on_signal.cancel();
    });

    println!("Second is running. Press Ctrl+C to stop.");
    bot.run(shutdown).await?;

    if !services.persistence.drain(DRAIN_TIMEOUT).await {
        warn!("Exiting with background writes still pending");
    }
    info!("Stopped");
    Ok(())
}
