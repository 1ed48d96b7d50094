//! In-memory platform used by the unit tests.

use std::{
    collections::VecDeque,
    num::NonZeroU64,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::platform::{ConnectRequest, PlatformError, Result, SessionView, VoicePlatform};

pub fn id(n: u64) -> NonZeroU64 {
    NonZeroU64::new(n).unwrap()
}

pub fn target(guild: u64, channel: u64) -> tether_config::Target {
    tether_config::Target::new(id(guild), id(channel))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Session,
    Connect(NonZeroU64),
    Move(NonZeroU64),
    Disconnect { force: bool },
}

#[derive(Default)]
struct Script {
    session: Option<SessionView>,
    session_errors: VecDeque<PlatformError>,
    connect_errors: VecDeque<PlatformError>,
    move_errors: VecDeque<PlatformError>,
    disconnect_errors: VecDeque<PlatformError>,
    calls: Vec<Call>,
    last_request: Option<ConnectRequest>,
}

/// Platform whose answers are scripted up front. Successful connects and
/// moves update the session the next probe sees.
#[derive(Default)]
pub struct ScriptedPlatform {
    script: Mutex<Script>,
    op_delay: Mutex<Duration>,
    disconnect_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedPlatform {
    pub fn new(session: Option<SessionView>) -> Self {
        let platform = Self::default();
        platform.script.lock().unwrap().session = session;
        platform
    }

    pub fn with_op_delay(self, delay: Duration) -> Self {
        *self.op_delay.lock().unwrap() = delay;
        self
    }

    pub fn with_disconnect_delay(self, delay: Duration) -> Self {
        *self.disconnect_delay.lock().unwrap() = delay;
        self
    }

    pub fn set_session(&self, session: Option<SessionView>) {
        self.script.lock().unwrap().session = session;
    }

    pub fn session_view(&self) -> Option<SessionView> {
        self.script.lock().unwrap().session
    }

    pub fn fail_session(&self, err: PlatformError) {
        self.script.lock().unwrap().session_errors.push_back(err);
    }

    pub fn fail_connect(&self, err: PlatformError) {
        self.script.lock().unwrap().connect_errors.push_back(err);
    }

    pub fn fail_move(&self, err: PlatformError) {
        self.script.lock().unwrap().move_errors.push_back(err);
    }

    pub fn fail_disconnect(&self, err: PlatformError) {
        self.script.lock().unwrap().disconnect_errors.push_back(err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn last_request(&self) -> Option<ConnectRequest> {
        self.script.lock().unwrap().last_request
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.script.lock().unwrap().calls.push(call);
    }

    async fn network_op(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.op_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoicePlatform for ScriptedPlatform {
    async fn session(&self, _guild_id: NonZeroU64) -> Result<Option<SessionView>> {
        self.record(Call::Session);
        let mut script = self.script.lock().unwrap();
        match script.session_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(script.session),
        }
    }

    async fn connect(&self, request: ConnectRequest) -> Result<()> {
        self.record(Call::Connect(request.channel_id));
        self.script.lock().unwrap().last_request = Some(request);
        self.network_op().await;
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script.connect_errors.pop_front() {
            return Err(err);
        }
        if script.session.is_some_and(|s| s.transport_connected) {
            return Err(PlatformError::AlreadyConnecting);
        }
        script.session = Some(SessionView::connected(request.channel_id));
        Ok(())
    }

    async fn move_to(&self, _guild_id: NonZeroU64, channel_id: NonZeroU64) -> Result<()> {
        self.record(Call::Move(channel_id));
        self.network_op().await;
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script.move_errors.pop_front() {
            return Err(err);
        }
        script.session = Some(SessionView::connected(channel_id));
        Ok(())
    }

    async fn disconnect(&self, _guild_id: NonZeroU64, force: bool) -> Result<()> {
        self.record(Call::Disconnect { force });
        let delay = *self.disconnect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script.disconnect_errors.pop_front() {
            return Err(err);
        }
        script.session = None;
        Ok(())
    }
}
