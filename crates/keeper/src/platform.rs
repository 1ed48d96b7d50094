//! The seam between the keeper and the platform client.
//!
//! Implementations wrap a real voice client (see `tether-discord`); tests use
//! an in-memory script.

use std::{error::Error as StdError, num::NonZeroU64, time::Duration};

use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, PlatformError>;

/// The platform client's view of a voice session in one guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionView {
    /// Channel the session believes it is in.
    pub channel_id: Option<NonZeroU64>,
    /// Whether the underlying transport reports a live connection.
    pub transport_connected: bool,
}

impl SessionView {
    #[must_use]
    pub fn connected(channel_id: NonZeroU64) -> Self {
        Self {
            channel_id: Some(channel_id),
            transport_connected: true,
        }
    }

    #[must_use]
    pub fn defunct(channel_id: Option<NonZeroU64>) -> Self {
        Self {
            channel_id,
            transport_connected: false,
        }
    }
}

/// Parameters of a fresh join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRequest {
    pub guild_id: NonZeroU64,
    pub channel_id: NonZeroU64,
    pub timeout: Duration,
    pub self_deaf: bool,
}

/// Typed failures reported by a platform client.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The voice connection was closed by the remote side with a close code.
    #[error("voice connection closed abnormally (code {code}): {reason}")]
    AbnormalClosure { code: u16, reason: String },

    /// The client is already connected or has a join in progress.
    #[error("already connected or a voice operation is in progress")]
    AlreadyConnecting,

    #[error("voice operation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("guild {0} is not available")]
    GuildUnavailable(NonZeroU64),

    #[error("channel {0} is not available")]
    ChannelUnavailable(NonZeroU64),

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{message}")]
    Message { message: String },
}

impl PlatformError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn abnormal_closure(code: u16, reason: impl Into<String>) -> Self {
        Self::AbnormalClosure {
            code,
            reason: reason.into(),
        }
    }
}

/// Voice capabilities the keeper needs from a platform client.
///
/// None of these are retried by the implementation; retry policy belongs to
/// the keeper.
#[async_trait]
pub trait VoicePlatform: Send + Sync {
    /// Look up the current voice session in `guild_id`. Must not create or
    /// mutate any session.
    async fn session(&self, guild_id: NonZeroU64) -> Result<Option<SessionView>>;

    /// Join `request.channel_id` from scratch.
    async fn connect(&self, request: ConnectRequest) -> Result<()>;

    /// Move an established session to another channel in the same guild.
    async fn move_to(&self, guild_id: NonZeroU64, channel_id: NonZeroU64) -> Result<()>;

    /// Leave the guild's voice session. `force` also discards the local
    /// session handle, which is what a defunct session needs.
    async fn disconnect(&self, guild_id: NonZeroU64, force: bool) -> Result<()>;
}
