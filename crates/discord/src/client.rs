//! Builds the serenity client with songbird registered.

use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    serenity::Client,
    songbird::{Config, SerenityInit, Songbird},
    tether_config::{ConnectConfig, TetherConfig},
    tether_keeper::KeeperHandle,
    tracing::info,
};

use crate::{error::Result, handler::TetherHandler, platform::SongbirdPlatform};

/// A built but not yet started Discord client plus the voice platform
/// backed by it.
pub struct DiscordRuntime {
    pub client: Client,
    pub platform: Arc<SongbirdPlatform>,
}

/// Build the client. Gateway events are forwarded to `handle`.
pub async fn build_client(config: &TetherConfig, handle: KeeperHandle) -> Result<DiscordRuntime> {
    let manager = Songbird::serenity_from_config(voice_config(&config.connect));
    let client = Client::builder(config.token.expose_secret(), TetherHandler::intents())
        .event_handler(TetherHandler::new(handle))
        .register_songbird_with(Arc::clone(&manager))
        .await?;

    let platform = Arc::new(SongbirdPlatform::new(
        manager,
        Arc::clone(&client.cache),
        config.connect.timeout,
    ));
    info!("discord client built");
    Ok(DiscordRuntime { client, platform })
}

/// Voice manager settings. songbird bounds each join by its own gateway
/// timeout, so it must match the configured connect timeout.
fn voice_config(connect: &ConnectConfig) -> Config {
    Config::default().gateway_timeout(Some(connect.timeout))
}
