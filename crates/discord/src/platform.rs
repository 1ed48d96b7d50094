//! [`VoicePlatform`] backed by songbird.

use std::{num::NonZeroU64, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    serenity::{
        all::{ChannelId, ChannelType, GuildId},
        cache::Cache,
    },
    songbird::{Songbird, error::JoinError},
    tether_keeper::{ConnectRequest, PlatformError, SessionView, VoicePlatform, platform::Result},
    tracing::{debug, warn},
};

use crate::error::from_join_error;

pub struct SongbirdPlatform {
    manager: Arc<Songbird>,
    cache: Arc<Cache>,
    /// The gateway timeout `manager` was configured with.
    join_timeout: Duration,
}

impl SongbirdPlatform {
    pub fn new(manager: Arc<Songbird>, cache: Arc<Cache>, join_timeout: Duration) -> Self {
        Self {
            manager,
            cache,
            join_timeout,
        }
    }

    /// Check the guild is cached and the channel is a voice channel in it.
    fn resolve(
        &self,
        guild_id: NonZeroU64,
        channel_id: NonZeroU64,
    ) -> Result<(GuildId, ChannelId)> {
        let guild = GuildId::new(guild_id.get());
        let channel = ChannelId::new(channel_id.get());
        let Some(cached) = self.cache.guild(guild) else {
            return Err(PlatformError::GuildUnavailable(guild_id));
        };
        match cached.channels.get(&channel) {
            Some(c) if matches!(c.kind, ChannelType::Voice | ChannelType::Stage) => {
                Ok((guild, channel))
            },
            Some(c) => {
                warn!(channel_id = %channel_id, kind = ?c.kind, "target is not a voice channel");
                Err(PlatformError::ChannelUnavailable(channel_id))
            },
            None => Err(PlatformError::ChannelUnavailable(channel_id)),
        }
    }
}

#[async_trait]
impl VoicePlatform for SongbirdPlatform {
    async fn session(&self, guild_id: NonZeroU64) -> Result<Option<SessionView>> {
        let Some(call) = self.manager.get(GuildId::new(guild_id.get())) else {
            return Ok(None);
        };
        let call = call.lock().await;
        Ok(Some(SessionView {
            channel_id: call.current_channel().map(|c| c.0),
            transport_connected: call.current_connection().is_some(),
        }))
    }

    async fn connect(&self, request: ConnectRequest) -> Result<()> {
        let (guild, channel) = self.resolve(request.guild_id, request.channel_id)?;
        let call = self
            .manager
            .join(guild, channel)
            .await
            .map_err(|e| from_join_error(e, request.timeout))?;
        if request.self_deaf {
            let mut call = call.lock().await;
            if let Err(e) = call.deafen(true).await {
                warn!(error = %e, "failed to self-deafen");
            }
        }
        debug!(channel_id = %request.channel_id, "songbird join completed");
        Ok(())
    }

    async fn move_to(&self, guild_id: NonZeroU64, channel_id: NonZeroU64) -> Result<()> {
        let (guild, channel) = self.resolve(guild_id, channel_id)?;
        // Joining another channel in the same guild moves the existing call.
        self.manager
            .join(guild, channel)
            .await
            .map(|_| ())
            .map_err(|e| from_join_error(e, self.join_timeout))
    }

    async fn disconnect(&self, guild_id: NonZeroU64, force: bool) -> Result<()> {
        let guild = GuildId::new(guild_id.get());
        let result = if force {
            self.manager.remove(guild).await
        } else {
            self.manager.leave(guild).await
        };
        match result {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(from_join_error(e, self.join_timeout)),
        }
    }
}
