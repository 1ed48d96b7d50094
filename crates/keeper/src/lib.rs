//! Voice channel keeper.
//!
//! Keeps one client joined to one target voice channel. The [`Keeper`] owns
//! the maintenance loop: it probes the platform's view of the session,
//! connects or moves when needed, and spaces attempts with a backoff policy
//! that escalates to a long cooldown after repeated signature failures.
//! Everything platform specific sits behind [`VoicePlatform`].

pub mod connector;
pub mod error;
pub mod events;
pub mod guard;
pub mod keeper;
pub mod platform;
pub mod policy;
pub mod probe;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod testing;

pub use {
    connector::{AttemptOutcome, Connector},
    error::{Error, Result},
    events::{VoiceStateChange, VoiceTransition},
    guard::{ConnectGate, InstanceLock},
    keeper::{Keeper, KeeperHandle, Phase},
    platform::{ConnectRequest, PlatformError, SessionView, VoicePlatform},
    policy::{Decision, Jitter, NoJitter, Policy, PolicyState, UniformJitter},
    probe::{ConnectionState, probe},
    tether_config::{ConnectConfig, InstanceGuardSpec, PolicyConfig, Target},
};
