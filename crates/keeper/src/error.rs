use crate::platform::PlatformError;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Another process already holds the single-instance resource.
    #[error("another instance is already running (holding {resource})")]
    InstanceConflict { resource: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl Error {
    #[must_use]
    pub fn instance_conflict(resource: impl std::fmt::Display) -> Self {
        Self::InstanceConflict {
            resource: resource.to_string(),
        }
    }
}
