//! Backoff and cooldown policy.
//!
//! [`Policy::next`] is a pure function of the previous state, the latest
//! outcome, the current instant and a jitter sample. Ordinary failures back
//! off exponentially. Repeated signature failures escalate to a long
//! cooldown during which no attempt is made at all.

use std::time::Duration;

use {rand::Rng, tether_config::PolicyConfig, tokio::time::Instant};

use crate::connector::AttemptOutcome;

/// Attempt history carried between loop iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyState {
    /// Backoff the next ordinary failure waits (before jitter).
    pub current_backoff: Duration,
    /// Signature failures since the last success or cooldown.
    pub consecutive_signature_failures: u32,
    pub cooldown_until: Option<Instant>,
}

impl PolicyState {
    #[must_use]
    pub fn baseline(config: &PolicyConfig) -> Self {
        Self {
            current_backoff: config.base_backoff,
            consecutive_signature_failures: 0,
            cooldown_until: None,
        }
    }

    /// Time left in an active cooldown, if any.
    #[must_use]
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }
}

/// What the loop should do after recording an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub wait: Duration,
    pub state: PolicyState,
    /// This outcome started a cooldown.
    pub cooldown_started: bool,
}

/// Source of the random component added to backoff waits.
pub trait Jitter: Send + Sync {
    /// A sample in `0..=max`.
    fn sample(&mut self, max: Duration) -> Duration;
}

/// Uniform jitter with millisecond resolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformJitter;

impl Jitter for UniformJitter {
    fn sample(&mut self, max: Duration) -> Duration {
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

/// Always zero. Makes waits deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn sample(&mut self, _max: Duration) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug, Clone)]
pub struct Policy {
    config: PolicyConfig,
}

impl Policy {
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    #[must_use]
    pub fn initial_state(&self) -> PolicyState {
        PolicyState::baseline(&self.config)
    }

    /// Record `outcome` and compute the next wait. `jitter` is clamped to the
    /// configured maximum.
    #[must_use]
    pub fn next(
        &self,
        state: &PolicyState,
        outcome: &AttemptOutcome,
        now: Instant,
        jitter: Duration,
    ) -> Decision {
        let mut state = *state;
        if state.cooldown_remaining(now).is_none() {
            state.cooldown_until = None;
        }

        match outcome {
            AttemptOutcome::Success | AttemptOutcome::AlreadyConnected => Decision {
                wait: self.config.poll_interval,
                state: PolicyState {
                    cooldown_until: state.cooldown_until,
                    ..self.initial_state()
                },
                cooldown_started: false,
            },
            AttemptOutcome::TransientError(_) | AttemptOutcome::UnknownError(_) => {
                self.back_off(state, jitter)
            },
            AttemptOutcome::SignatureFailure(_) => {
                state.consecutive_signature_failures += 1;
                if state.consecutive_signature_failures < self.config.signature_threshold {
                    return self.back_off(state, jitter);
                }
                Decision {
                    wait: self.config.cooldown.min(self.config.cooldown_slice),
                    state: PolicyState {
                        current_backoff: self.config.base_backoff,
                        consecutive_signature_failures: 0,
                        cooldown_until: Some(now + self.config.cooldown),
                    },
                    cooldown_started: true,
                }
            },
        }
    }

    fn back_off(&self, mut state: PolicyState, jitter: Duration) -> Decision {
        let wait = state.current_backoff.min(self.config.max_backoff)
            + jitter.min(self.config.max_jitter);
        state.current_backoff = state
            .current_backoff
            .saturating_mul(2)
            .min(self.config.max_backoff);
        Decision {
            wait,
            state,
            cooldown_started: false,
        }
    }
}
