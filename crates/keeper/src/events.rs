//! Voice state notifications from the platform's event stream.
//!
//! These are observe-only: they are logged and may wake the maintenance loop
//! early, but never start a connection themselves.

use std::num::NonZeroU64;

use tracing::{debug, info};

use crate::keeper::KeeperHandle;

/// A voice state update as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceStateChange {
    pub guild_id: Option<NonZeroU64>,
    pub user_id: NonZeroU64,
    /// Whether `user_id` is this client's own user.
    pub is_self: bool,
    pub before: Option<NonZeroU64>,
    pub after: Option<NonZeroU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceTransition {
    Joined(NonZeroU64),
    Left(NonZeroU64),
    Moved { from: NonZeroU64, to: NonZeroU64 },
    /// Mute/deafen and other updates that keep the channel.
    Unchanged,
}

impl VoiceStateChange {
    #[must_use]
    pub fn transition(&self) -> VoiceTransition {
        match (self.before, self.after) {
            (None, Some(to)) => VoiceTransition::Joined(to),
            (Some(from), None) => VoiceTransition::Left(from),
            (Some(from), Some(to)) if from != to => VoiceTransition::Moved { from, to },
            _ => VoiceTransition::Unchanged,
        }
    }
}

impl KeeperHandle {
    /// Log a voice state change and wake the loop if the client's own user
    /// just left the target channel.
    pub fn observe_voice_state(&self, change: &VoiceStateChange) {
        let target = self.target;
        if !change.is_self || change.guild_id.is_some_and(|g| g != target.guild_id) {
            return;
        }

        match change.transition() {
            VoiceTransition::Left(from) => {
                info!(
                    channel_id = %from,
                    "client left voice channel, maintenance loop will reconnect"
                );
                self.nudge();
            },
            VoiceTransition::Moved { from, to } if to != target.channel_id => {
                info!(
                    from = %from,
                    to = %to,
                    "client moved away from target channel, maintenance loop will move back"
                );
                self.nudge();
            },
            VoiceTransition::Moved { from, to } => {
                info!(from = %from, to = %to, "client moved into target channel");
            },
            VoiceTransition::Joined(channel) => {
                info!(channel_id = %channel, "client joined voice channel");
            },
            VoiceTransition::Unchanged => debug!("client voice state updated"),
        }
    }
}
