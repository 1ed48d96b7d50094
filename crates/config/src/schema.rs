//! Typed configuration structs.

use std::{fmt, num::NonZeroU64, path::PathBuf, time::Duration};

use secrecy::Secret;

/// The (guild, channel) pair the keeper must stay joined to.
///
/// Both ids are non-zero by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub guild_id: NonZeroU64,
    pub channel_id: NonZeroU64,
}

impl Target {
    #[must_use]
    pub fn new(guild_id: NonZeroU64, channel_id: NonZeroU64) -> Self {
        Self {
            guild_id,
            channel_id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.channel_id)
    }
}

/// Timing parameters for the backoff/cooldown policy and the loop cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Sleep between probes while correctly connected.
    pub poll_interval: Duration,
    /// Backoff after the first failure, and after any success.
    pub base_backoff: Duration,
    /// Upper bound for the doubling backoff.
    pub max_backoff: Duration,
    /// Upper bound of the uniform jitter added to each backoff wait.
    pub max_jitter: Duration,
    /// Consecutive signature failures that trigger a cooldown.
    pub signature_threshold: u32,
    /// Length of the long cooldown.
    pub cooldown: Duration,
    /// Longest single sleep while cooling, so shutdown stays responsive.
    pub cooldown_slice: Duration,
    /// Delay after an unexpected fault inside one loop iteration.
    pub fault_delay: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            max_jitter: Duration::from_secs(2),
            signature_threshold: 3,
            cooldown: Duration::from_secs(600),
            cooldown_slice: Duration::from_secs(30),
            fault_delay: Duration::from_secs(5),
        }
    }
}

/// Parameters of a single connect/move attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectConfig {
    pub timeout: Duration,
    pub self_deaf: bool,
    /// Abnormal-closure codes classified as signature failures.
    pub signature_codes: Vec<u16>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            self_deaf: true,
            signature_codes: vec![4006],
        }
    }
}

/// Which OS-level resource guards against a second process instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceGuardSpec {
    /// Exclusive advisory lock on a file.
    LockFile(PathBuf),
    /// Exclusive bind of a loopback TCP port.
    Port(u16),
}

impl InstanceGuardSpec {
    /// Lock file in the temp dir, one per target.
    #[must_use]
    pub fn default_for(target: &Target) -> Self {
        Self::LockFile(std::env::temp_dir().join(format!(
            "tether-{}-{}.lock",
            target.guild_id, target.channel_id
        )))
    }
}

impl fmt::Display for InstanceGuardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockFile(path) => write!(f, "file:{}", path.display()),
            Self::Port(port) => write!(f, "port:{port}"),
        }
    }
}

/// Fully loaded configuration.
#[derive(Clone)]
pub struct TetherConfig {
    /// Bot credential.
    pub token: Secret<String>,
    pub target: Target,
    pub policy: PolicyConfig,
    pub connect: ConnectConfig,
    pub instance_guard: InstanceGuardSpec,
}

impl fmt::Debug for TetherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TetherConfig")
            .field("token", &"[REDACTED]")
            .field("target", &self.target)
            .field("policy", &self.policy)
            .field("connect", &self.connect)
            .field("instance_guard", &self.instance_guard)
            .finish()
    }
}
