//! A single connect or move attempt, with its outcome classified.

use std::{fmt, sync::Arc, time::Duration};

use {
    tether_config::{ConnectConfig, Target},
    tracing::{debug, info, warn},
};

use crate::{
    platform::{self, ConnectRequest, PlatformError, VoicePlatform},
    probe::ConnectionState,
};

/// Classified result of one attempt. Platform errors never escape the
/// connector; they all end up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    AlreadyConnected,
    TransientError(String),
    /// Abnormal closure with one of the configured signature codes.
    SignatureFailure(u16),
    UnknownError(String),
}

impl AttemptOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::AlreadyConnected)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::AlreadyConnected => write!(f, "already connected"),
            Self::TransientError(reason) => write!(f, "transient error: {reason}"),
            Self::SignatureFailure(code) => write!(f, "signature failure (code {code})"),
            Self::UnknownError(reason) => write!(f, "unknown error: {reason}"),
        }
    }
}

/// Performs connect/move attempts against a platform client.
pub struct Connector {
    platform: Arc<dyn VoicePlatform>,
    config: ConnectConfig,
}

impl Connector {
    pub fn new(platform: Arc<dyn VoicePlatform>, config: ConnectConfig) -> Self {
        Self { platform, config }
    }

    /// Bring the session from `current` to a live session in the target
    /// channel.
    ///
    /// Does nothing when already in the target channel. A stale session is
    /// force-disconnected first; a failure there is logged and ignored.
    pub async fn connect_or_move(
        &self,
        target: &Target,
        current: &ConnectionState,
    ) -> AttemptOutcome {
        let result = match *current {
            ConnectionState::Connected(channel) if channel == target.channel_id => {
                return AttemptOutcome::AlreadyConnected;
            },
            ConnectionState::Connected(channel) => {
                info!(from = %channel, to = %target.channel_id, "moving to target channel");
                self.bounded(self.platform.move_to(target.guild_id, target.channel_id))
                    .await
            },
            ConnectionState::Stale(channel) => {
                info!(channel = ?channel.map(|c| c.get()), "cleaning up stale voice session");
                let cleanup = self.platform.disconnect(target.guild_id, true);
                if let Err(e) = self.bounded(cleanup).await {
                    warn!(error = %e, "stale session cleanup failed");
                }
                self.fresh_connect(target).await
            },
            ConnectionState::Disconnected => self.fresh_connect(target).await,
        };

        match result {
            Ok(()) => AttemptOutcome::Success,
            Err(e) => self.classify(e),
        }
    }

    async fn fresh_connect(&self, target: &Target) -> platform::Result<()> {
        info!(channel = %target.channel_id, "connecting to voice channel");
        let request = ConnectRequest {
            guild_id: target.guild_id,
            channel_id: target.channel_id,
            timeout: self.config.timeout,
            self_deaf: self.config.self_deaf,
        };
        self.bounded(self.platform.connect(request)).await
    }

    async fn bounded(
        &self,
        op: impl Future<Output = platform::Result<()>>,
    ) -> platform::Result<()> {
        let limit: Duration = self.config.timeout;
        tokio::time::timeout(limit, op)
            .await
            .unwrap_or(Err(PlatformError::TimedOut(limit)))
    }

    /// Map a platform error onto an attempt outcome.
    #[must_use]
    pub fn classify(&self, err: PlatformError) -> AttemptOutcome {
        debug!(error = %err, "classifying voice error");
        match err {
            PlatformError::AbnormalClosure { code, .. }
                if self.config.signature_codes.contains(&code) =>
            {
                AttemptOutcome::SignatureFailure(code)
            },
            e @ (PlatformError::AbnormalClosure { .. }
            | PlatformError::AlreadyConnecting
            | PlatformError::TimedOut(_)
            | PlatformError::GuildUnavailable(_)
            | PlatformError::ChannelUnavailable(_)) => {
                AttemptOutcome::TransientError(e.to_string())
            },
            e @ (PlatformError::External { .. } | PlatformError::Message { .. }) => {
                AttemptOutcome::UnknownError(e.to_string())
            },
        }
    }
}
