//! Cross-field validation of a loaded configuration.
//!
//! Parsing already rejects malformed values; this pass catches combinations
//! that parse fine but cannot work together, and flags suspicious tuning.

use std::time::Duration;

use crate::{
    error::Error,
    loader::{
        BASE_BACKOFF_VAR, CONNECT_TIMEOUT_VAR, COOLDOWN_SLICE_VAR, COOLDOWN_VAR,
        FAULT_DELAY_VAR, POLL_INTERVAL_VAR, SIGNATURE_THRESHOLD_VAR,
    },
    schema::TetherConfig,
};

/// Poll intervals below this hammer the platform for no benefit.
const MIN_SENSIBLE_POLL: Duration = Duration::from_secs(2);

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Environment variable the diagnostic is attached to.
    pub variable: &'static str,
    pub value: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Convert the first error diagnostic into a configuration error.
    #[must_use]
    pub fn into_error(self) -> Option<Error> {
        self.diagnostics
            .into_iter()
            .find(|d| d.severity == Severity::Error)
            .map(|d| Error::invalid(d.variable, d.value, d.message))
    }

    fn push(
        &mut self,
        severity: Severity,
        variable: &'static str,
        value: impl std::fmt::Debug,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            variable,
            value: format!("{value:?}"),
            message: message.into(),
        });
    }
}

/// Validate a loaded configuration.
#[must_use]
pub fn validate(config: &TetherConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let policy = &config.policy;

    if policy.poll_interval.is_zero() {
        result.push(
            Severity::Error,
            POLL_INTERVAL_VAR,
            policy.poll_interval,
            "poll interval must be non-zero",
        );
    } else if policy.poll_interval < MIN_SENSIBLE_POLL {
        result.push(
            Severity::Warning,
            POLL_INTERVAL_VAR,
            policy.poll_interval,
            "very short poll interval",
        );
    }

    if policy.base_backoff.is_zero() {
        result.push(
            Severity::Error,
            BASE_BACKOFF_VAR,
            policy.base_backoff,
            "base backoff must be non-zero",
        );
    }
    if policy.base_backoff > policy.max_backoff {
        result.push(
            Severity::Error,
            BASE_BACKOFF_VAR,
            policy.base_backoff,
            format!(
                "base backoff exceeds max backoff ({}s)",
                policy.max_backoff.as_secs()
            ),
        );
    }

    if policy.signature_threshold == 0 {
        result.push(
            Severity::Error,
            SIGNATURE_THRESHOLD_VAR,
            policy.signature_threshold,
            "threshold must be at least 1",
        );
    }

    if policy.cooldown.is_zero() {
        result.push(
            Severity::Error,
            COOLDOWN_VAR,
            policy.cooldown,
            "cooldown must be non-zero",
        );
    } else if policy.cooldown < policy.max_backoff {
        result.push(
            Severity::Warning,
            COOLDOWN_VAR,
            policy.cooldown,
            "cooldown is shorter than the max backoff",
        );
    }

    if policy.cooldown_slice.is_zero() {
        result.push(
            Severity::Error,
            COOLDOWN_SLICE_VAR,
            policy.cooldown_slice,
            "cooldown slice must be non-zero",
        );
    }

    if policy.fault_delay.is_zero() {
        result.push(
            Severity::Error,
            FAULT_DELAY_VAR,
            policy.fault_delay,
            "fault delay must be non-zero",
        );
    }

    if config.connect.timeout.is_zero() {
        result.push(
            Severity::Error,
            CONNECT_TIMEOUT_VAR,
            config.connect.timeout,
            "connect timeout must be non-zero",
        );
    }

    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use secrecy::Secret;

    use {
        super::*,
        crate::schema::{ConnectConfig, InstanceGuardSpec, PolicyConfig, Target},
    };

    fn config() -> TetherConfig {
        TetherConfig {
            token: Secret::new("t".into()),
            target: Target::new(NonZeroU64::MIN, NonZeroU64::MIN),
            policy: PolicyConfig::default(),
            connect: ConnectConfig::default(),
            instance_guard: InstanceGuardSpec::Port(47000),
        }
    }

    #[test]
    fn defaults_are_clean() {
        let result = validate(&config());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn zero_poll_interval_is_an_error() {
        let mut cfg = config();
        cfg.policy.poll_interval = Duration::ZERO;
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert!(matches!(
            result.into_error(),
            Some(Error::Invalid {
                name: POLL_INTERVAL_VAR,
                ..
            })
        ));
    }

    #[test]
    fn short_cooldown_is_only_a_warning() {
        let mut cfg = config();
        cfg.policy.cooldown = Duration::from_secs(30);
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].severity, Severity::Warning);
        assert_eq!(result.diagnostics[0].variable, COOLDOWN_VAR);
    }

    #[test]
    fn zero_threshold_is_an_error() {
        let mut cfg = config();
        cfg.policy.signature_threshold = 0;
        assert!(validate(&cfg).has_errors());
    }
}
