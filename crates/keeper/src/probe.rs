//! Read-only view of the current connection state.

use std::{fmt, num::NonZeroU64};

use {tether_config::Target, tracing::debug};

use crate::platform::{self, VoicePlatform};

/// Connection state derived from one probe. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session object exists for the guild.
    Disconnected,
    /// A live session in the given channel.
    Connected(NonZeroU64),
    /// A session handle exists but its transport is gone. Needs a forced
    /// cleanup before reconnecting.
    Stale(Option<NonZeroU64>),
}

impl ConnectionState {
    /// `true` only for a live session in `channel_id`.
    #[must_use]
    pub fn is_connected_to(&self, channel_id: NonZeroU64) -> bool {
        matches!(self, Self::Connected(c) if *c == channel_id)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected(c) => write!(f, "connected({c})"),
            Self::Stale(Some(c)) => write!(f, "stale({c})"),
            Self::Stale(None) => write!(f, "stale"),
        }
    }
}

/// Ask the platform for the target guild's session and classify it.
pub async fn probe(
    platform: &dyn VoicePlatform,
    target: &Target,
) -> platform::Result<ConnectionState> {
    let state = match platform.session(target.guild_id).await? {
        None => ConnectionState::Disconnected,
        Some(view) => match view.channel_id {
            Some(channel) if view.transport_connected => ConnectionState::Connected(channel),
            channel => ConnectionState::Stale(channel),
        },
    };
    debug!(guild_id = %target.guild_id, %state, "probed voice session");
    Ok(state)
}
