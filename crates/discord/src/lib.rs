//! Discord voice platform for the keeper.
//!
//! Wraps a serenity client with a songbird voice manager, implements
//! [`tether_keeper::VoicePlatform`] on top of it, and forwards gateway events
//! to the keeper handle.

pub mod client;
pub mod error;
pub mod handler;
pub mod platform;

pub use {
    client::{DiscordRuntime, build_client},
    error::{Error, Result},
    handler::TetherHandler,
    platform::SongbirdPlatform,
};
