/// Crate-wide result type for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required variable is absent or empty.
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },

    /// A variable is present but cannot be used.
    #[error("invalid value for {name} ({value:?}): {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Error {
    #[must_use]
    pub fn invalid(
        name: &'static str,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Invalid {
            name,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
