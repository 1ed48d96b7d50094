//! The maintenance loop.

use std::{fmt, sync::Arc, time::Duration};

use {
    tether_config::{ConnectConfig, PolicyConfig, Target},
    tokio::{
        sync::{Notify, watch},
        time::Instant,
    },
    tokio_util::sync::CancellationToken,
    tracing::{Instrument, debug, error, info, info_span, warn},
};

use crate::{
    connector::{AttemptOutcome, Connector},
    guard::ConnectGate,
    platform::{self, VoicePlatform},
    policy::{Decision, Jitter, Policy, PolicyState, UniformJitter},
    probe::probe,
};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the platform client to become ready.
    Starting,
    Idle,
    Probing,
    Connecting,
    Cooling,
    ShuttingDown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Connecting => "connecting",
            Self::Cooling => "cooling",
            Self::ShuttingDown => "shutting_down",
        };
        f.write_str(s)
    }
}

/// Narrow, cloneable handle to a keeper for the rest of the process.
///
/// Event handlers use it to report readiness and voice state changes; the
/// binary uses it to request shutdown. Nothing reachable from here starts a
/// connection.
#[derive(Clone)]
pub struct KeeperHandle {
    pub(crate) target: Target,
    shutdown: CancellationToken,
    pub(crate) nudge: Arc<Notify>,
    ready: Arc<watch::Sender<bool>>,
    phase: Arc<watch::Sender<Phase>>,
    gate: ConnectGate,
}

impl KeeperHandle {
    #[must_use]
    pub fn new(target: Target) -> Self {
        Self::with_gate(target, ConnectGate::new())
    }

    /// Share an existing gate, so that other connect paths serialize with
    /// this keeper.
    #[must_use]
    pub fn with_gate(target: Target, gate: ConnectGate) -> Self {
        Self {
            target,
            shutdown: CancellationToken::new(),
            nudge: Arc::new(Notify::new()),
            ready: Arc::new(watch::Sender::new(false)),
            phase: Arc::new(watch::Sender::new(Phase::Starting)),
            gate,
        }
    }

    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    /// Set the lifecycle flag. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// The platform client is ready; the loop may start probing.
    pub fn mark_ready(&self) {
        self.ready.send_if_modified(|ready| !std::mem::replace(ready, true));
    }

    /// Wake the loop from a steady-state sleep. Ignored while backing off,
    /// cooling or mid-iteration; nothing is stored for later.
    pub fn nudge(&self) {
        self.nudge.notify_waiters();
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    #[must_use]
    pub fn gate(&self) -> ConnectGate {
        self.gate.clone()
    }
}

/// How long to sleep, and whether a nudge may cut the sleep short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pause {
    duration: Duration,
    wake_on_nudge: bool,
}

impl Pause {
    fn steady(duration: Duration) -> Self {
        Self {
            duration,
            wake_on_nudge: true,
        }
    }

    fn fixed(duration: Duration) -> Self {
        Self {
            duration,
            wake_on_nudge: false,
        }
    }
}

/// Owns the loop's state. Run it with [`Keeper::run`].
pub struct Keeper {
    handle: KeeperHandle,
    platform: Arc<dyn VoicePlatform>,
    connector: Connector,
    policy: Policy,
    state: PolicyState,
    jitter: Box<dyn Jitter>,
}

impl Keeper {
    pub fn new(
        handle: KeeperHandle,
        platform: Arc<dyn VoicePlatform>,
        policy: PolicyConfig,
        connect: ConnectConfig,
    ) -> Self {
        let policy = Policy::new(policy);
        Self {
            handle,
            connector: Connector::new(Arc::clone(&platform), connect),
            platform,
            state: policy.initial_state(),
            policy,
            jitter: Box::new(UniformJitter),
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: impl Jitter + 'static) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    #[must_use]
    pub fn policy_state(&self) -> &PolicyState {
        &self.state
    }

    /// Run until shutdown is requested, then leave the channel.
    pub async fn run(mut self) {
        let span = info_span!(
            "keeper",
            guild_id = %self.handle.target.guild_id,
            channel_id = %self.handle.target.channel_id
        );
        async move {
            if self.wait_ready().await {
                info!("maintenance loop started");
                let shutdown = self.handle.shutdown.clone();
                loop {
                    if shutdown.is_cancelled() {
                        break;
                    }
                    // An in-flight attempt is abandoned on shutdown so the
                    // loop can still leave the channel.
                    let result = tokio::select! {
                        res = self.iterate() => res,
                        () = shutdown.cancelled() => {
                            debug!("shutdown requested mid-iteration");
                            break;
                        },
                    };
                    let pause = match result {
                        Ok(pause) => pause,
                        Err(e) => {
                            error!(error = %e, "maintenance iteration failed");
                            Pause::fixed(self.policy.config().fault_delay)
                        },
                    };
                    if !self.sleep(pause).await {
                        break;
                    }
                }
            }
            self.set_phase(Phase::ShuttingDown);
            self.leave().await;
            info!("maintenance loop stopped");
        }
        .instrument(span)
        .await;
    }

    async fn wait_ready(&self) -> bool {
        let mut ready = self.handle.ready.subscribe();
        tokio::select! {
            res = ready.wait_for(|r| *r) => res.is_ok(),
            () = self.handle.shutdown.cancelled() => false,
        }
    }

    /// One pass: cool, or probe and (re)connect if needed.
    async fn iterate(&mut self) -> platform::Result<Pause> {
        let target = self.handle.target;

        if let Some(remaining) = self.state.cooldown_remaining(Instant::now()) {
            self.set_phase(Phase::Cooling);
            let slice = remaining.min(self.policy.config().cooldown_slice);
            debug!(
                remaining_secs = remaining.as_secs(),
                "cooling down, skipping connection check"
            );
            return Ok(Pause::fixed(slice));
        }

        self.set_phase(Phase::Probing);
        let observed = probe(self.platform.as_ref(), &target).await?;
        if observed.is_connected_to(target.channel_id) {
            let decision = self.record(AttemptOutcome::AlreadyConnected);
            self.set_phase(Phase::Idle);
            return Ok(Pause::steady(decision.wait));
        }

        self.set_phase(Phase::Connecting);
        let outcome = {
            let _permit = self.handle.gate.acquire().await;
            // Another path may have connected while we waited for the gate.
            let current = probe(self.platform.as_ref(), &target).await?;
            self.connector.connect_or_move(&target, &current).await
        };

        let steady = outcome.is_success();
        let decision = self.record(outcome);
        self.set_phase(Phase::Idle);
        Ok(if steady {
            Pause::steady(decision.wait)
        } else {
            Pause::fixed(decision.wait)
        })
    }

    fn record(&mut self, outcome: AttemptOutcome) -> Decision {
        let jitter = self.jitter.sample(self.policy.config().max_jitter);
        let decision = self.policy.next(&self.state, &outcome, Instant::now(), jitter);

        match &outcome {
            AttemptOutcome::Success => {
                info!(channel_id = %self.handle.target.channel_id, "joined target voice channel");
            },
            AttemptOutcome::AlreadyConnected => debug!("already in target voice channel"),
            AttemptOutcome::TransientError(reason) => warn!(
                reason = %reason,
                retry_in_ms = decision.wait.as_millis() as u64,
                "voice connect attempt failed"
            ),
            AttemptOutcome::SignatureFailure(code) => warn!(
                code,
                consecutive = self.state.consecutive_signature_failures + 1,
                retry_in_ms = decision.wait.as_millis() as u64,
                "voice connection rejected with signature close code"
            ),
            AttemptOutcome::UnknownError(reason) => error!(
                reason = %reason,
                retry_in_ms = decision.wait.as_millis() as u64,
                "voice connect attempt failed unexpectedly"
            ),
        }
        if decision.cooldown_started {
            warn!(
                cooldown_secs = self.policy.config().cooldown.as_secs(),
                "repeated signature failures, suspending connection attempts"
            );
        }

        self.state = decision.state;
        decision
    }

    /// Sleep for `pause`. Returns `false` if shutdown was requested.
    async fn sleep(&self, pause: Pause) -> bool {
        tokio::select! {
            () = self.handle.shutdown.cancelled() => false,
            () = tokio::time::sleep(pause.duration) => true,
            () = self.handle.nudge.notified(), if pause.wake_on_nudge => {
                debug!("woken early by voice state change");
                true
            },
        }
    }

    async fn leave(&self) {
        let guild_id = self.handle.target.guild_id;
        let timeout = self.policy.config().fault_delay;
        match tokio::time::timeout(timeout, self.platform.disconnect(guild_id, false)).await {
            Ok(Ok(())) => info!("left voice channel"),
            Ok(Err(e)) => debug!(error = %e, "disconnect on shutdown failed"),
            Err(_) => debug!("disconnect on shutdown timed out"),
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.handle.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            debug!(from = %current, to = %phase, "phase change");
            *current = phase;
            true
        });
    }
}
