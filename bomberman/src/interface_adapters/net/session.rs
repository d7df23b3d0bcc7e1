// Client side of a transport session: the identity handshake and the
// steady-state control/snapshot exchange loop.

use crate::domain::snapshot::{ControlRecord, WorldSnapshot};
use crate::domain::{Transport, TransportError};
use crate::interface_adapters::net::transport::WsTransport;
use crate::interface_adapters::protocol::{ClientMessage, ServerMessage};
use crate::interface_adapters::utils::throttle::{LOG_THROTTLE, should_log};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;

pub const FRAME_DELAY: Duration = Duration::from_millis(16);
pub const RETRY_BACKOFF: Duration = Duration::from_millis(100);
const IDENTITY_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Pause between exchanges.
    pub frame_delay: Duration,
    /// Pause after a transient fault.
    pub retry_backoff: Duration,
    pub identity_timeout: Duration,
    /// How long one exchange waits for its snapshot before counting as a
    /// transient fault.
    pub reply_timeout: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            frame_delay: FRAME_DELAY,
            retry_backoff: RETRY_BACKOFF,
            identity_timeout: IDENTITY_TIMEOUT,
            reply_timeout: REPLY_TIMEOUT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid host address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("transport handshake failed: {0}")]
    Handshake(String),
    #[error("connection closed before an identity was assigned")]
    ClosedBeforeIdentity,
    #[error("no identity received within {0:?}")]
    IdentityTimeout(Duration),
    #[error("failed to read identity: {0}")]
    IdentityRead(TransportError),
    #[error("failed to decode identity: {0}")]
    IdentityDecode(String),
}

type CloseCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct CloseHook {
    callback: Option<CloseCallback>,
    remote_closed: bool,
    fired: bool,
}

struct Shared {
    closing: AtomicBool,
    close_notify: Notify,
    hook: Mutex<CloseHook>,
}

impl Shared {
    fn hook(&self) -> std::sync::MutexGuard<'_, CloseHook> {
        self.hook.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Runs the registered callback at most once, outside the lock.
    fn remote_closed(&self) {
        let callback = {
            let mut hook = self.hook();
            hook.remote_closed = true;
            match hook.callback.take() {
                Some(cb) => {
                    hook.fired = true;
                    Some(cb)
                }
                None => None,
            }
        };
        if let Some(cb) = callback {
            cb();
        }
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}

/// A live connection to a host.
pub struct Session {
    participant_id: String,
    control_tx: watch::Sender<ControlRecord>,
    snapshot_rx: watch::Receiver<Option<Arc<WorldSnapshot>>>,
    latency_ms: Arc<AtomicU32>,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Connects to `address` (`host:port` or a full `ws://` URL), waits for the
    /// identity frame and starts the exchange loop.
    pub async fn connect(address: &str, display_name: &str) -> Result<Self, ConnectionError> {
        Self::connect_with(address, display_name, SessionTiming::default()).await
    }

    pub async fn connect_with(
        address: &str,
        display_name: &str,
        timing: SessionTiming,
    ) -> Result<Self, ConnectionError> {
        let url = session_url(address, display_name)?;
        let transport = WsTransport::connect(&url)
            .await
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
        Self::establish(transport, timing).await
    }

    /// Reads the identity frame from an already connected transport, then
    /// spawns the exchange loop on the current runtime.
    pub async fn establish<T>(mut transport: T, timing: SessionTiming) -> Result<Self, ConnectionError>
    where
        T: Transport + 'static,
    {
        let participant_id =
            match tokio::time::timeout(timing.identity_timeout, read_identity(&mut transport)).await {
                Ok(Ok(id)) => id,
                Ok(Err(err)) => {
                    transport.close().await;
                    return Err(err);
                }
                Err(_) => {
                    transport.close().await;
                    return Err(ConnectionError::IdentityTimeout(timing.identity_timeout));
                }
            };
        info!(%participant_id, "identity assigned");
        Ok(Self::start(transport, participant_id, timing))
    }

    fn start<T>(transport: T, participant_id: String, timing: SessionTiming) -> Self
    where
        T: Transport + 'static,
    {
        let (control_tx, control_rx) = watch::channel(ControlRecord::default());
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let latency_ms = Arc::new(AtomicU32::new(0));
        let shared = Arc::new(Shared {
            closing: AtomicBool::new(false),
            close_notify: Notify::new(),
            hook: Mutex::new(CloseHook::default()),
        });

        let span = info_span!("session", participant_id = %participant_id);
        let task = tokio::spawn(
            exchange_loop(
                transport,
                shared.clone(),
                control_rx,
                snapshot_tx,
                latency_ms.clone(),
                timing,
            )
            .instrument(span),
        );

        Self {
            participant_id,
            control_tx,
            snapshot_rx,
            latency_ms,
            shared,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Control record sent on the next exchange.
    pub fn set_control(&self, control: ControlRecord) {
        self.control_tx.send_replace(control);
    }

    pub fn latest_snapshot(&self) -> Option<Arc<WorldSnapshot>> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<Option<Arc<WorldSnapshot>>> {
        self.snapshot_rx.clone()
    }

    /// Round trip of the most recent exchange.
    pub fn latency(&self) -> Duration {
        Duration::from_millis(u64::from(self.latency_ms.load(Ordering::Relaxed)))
    }

    /// Registers the callback run when the host or the transport ends the
    /// session. A local `close()` never runs it. Registering after the
    /// session already ended runs it straight away.
    pub fn on_close(&self, callback: impl FnOnce() + Send + 'static) {
        let run_now = {
            let mut hook = self.shared.hook();
            if hook.remote_closed {
                !std::mem::replace(&mut hook.fired, true)
            } else {
                hook.callback = Some(Box::new(callback));
                return;
            }
        };
        if run_now {
            callback();
        }
    }

    /// Stops the exchange loop and closes the transport. Safe to call more
    /// than once and from any thread.
    pub fn close(&self) {
        if !self.shared.closing.swap(true, Ordering::AcqRel) {
            // A stored permit wakes the loop even if it is not waiting yet.
            self.shared.close_notify.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closing() || self.shared.hook().remote_closed
    }

    /// Closes the session and waits for the exchange loop to finish.
    pub async fn shutdown(&self) {
        self.close();
        let task = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "session task ended abnormally");
            }
        }
    }

    /// Waits for the exchange loop to end on its own.
    pub async fn finished(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "session task ended abnormally");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn session_url(address: &str, display_name: &str) -> Result<Url, ConnectionError> {
    let raw = if address.contains("://") {
        address.to_string()
    } else {
        format!("ws://{address}")
    };
    let mut url = Url::parse(&raw).map_err(|e| ConnectionError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/ws");
    }
    url.query_pairs_mut().append_pair("name", display_name);
    Ok(url)
}

async fn read_identity<T: Transport>(transport: &mut T) -> Result<String, ConnectionError> {
    let text = match transport.recv_text().await {
        Ok(text) => text,
        Err(TransportError::Closed(_)) => return Err(ConnectionError::ClosedBeforeIdentity),
        Err(err) => return Err(ConnectionError::IdentityRead(err)),
    };
    match serde_json::from_str::<ServerMessage>(&text) {
        Ok(ServerMessage::Identity { participant_id }) => Ok(participant_id),
        Ok(other) => Err(ConnectionError::IdentityDecode(format!(
            "expected identity, got {}",
            message_kind(&other)
        ))),
        Err(err) => Err(ConnectionError::IdentityDecode(err.to_string())),
    }
}

fn message_kind(msg: &ServerMessage) -> &'static str {
    match msg {
        ServerMessage::Identity { .. } => "identity",
        ServerMessage::Snapshot(_) => "snapshot",
    }
}

// One write, one read.
async fn exchange<T: Transport>(
    transport: &mut T,
    control: ControlRecord,
    latency_ms: Option<u32>,
    reply_timeout: Duration,
) -> Result<(WorldSnapshot, Duration), TransportError> {
    let frame = serde_json::to_string(&ClientMessage::Control {
        control,
        latency_ms,
    })
    .map_err(|e| TransportError::Transient(format!("encode control: {e}")))?;

    let sent_at = Instant::now();
    transport.send_text(frame).await?;
    match tokio::time::timeout(reply_timeout, read_snapshot(transport)).await {
        Ok(snapshot) => snapshot.map(|snapshot| (snapshot, sent_at.elapsed())),
        Err(_) => Err(TransportError::Transient(format!(
            "no snapshot within {reply_timeout:?}"
        ))),
    }
}

async fn read_snapshot<T: Transport>(transport: &mut T) -> Result<WorldSnapshot, TransportError> {
    loop {
        let text = transport.recv_text().await?;
        match serde_json::from_str::<ServerMessage>(&text) {
            Ok(ServerMessage::Snapshot(snapshot)) => return Ok(snapshot),
            Ok(ServerMessage::Identity { .. }) => debug!("repeated identity ignored"),
            Err(err) => return Err(TransportError::Transient(format!("decode snapshot: {err}"))),
        }
    }
}

enum Outcome {
    Exchanged(WorldSnapshot, Duration),
    Closed(TransportError),
    Retry(TransportError),
}

async fn exchange_loop<T: Transport>(
    mut transport: T,
    shared: Arc<Shared>,
    control_rx: watch::Receiver<ControlRecord>,
    snapshot_tx: watch::Sender<Option<Arc<WorldSnapshot>>>,
    latency_ms: Arc<AtomicU32>,
    timing: SessionTiming,
) {
    let mut last_rtt: Option<u32> = None;
    let mut last_fault_log = Instant::now() - LOG_THROTTLE;
    let mut exchanges: u64 = 0;
    let mut faults: u64 = 0;

    loop {
        if shared.is_closing() {
            break;
        }
        let control = *control_rx.borrow();

        let outcome = tokio::select! {
            biased;
            _ = shared.close_notify.notified() => break,
            res = AssertUnwindSafe(exchange(&mut transport, control, last_rtt, timing.reply_timeout)).catch_unwind() => {
                match res {
                    Ok(Ok((snapshot, rtt))) => Outcome::Exchanged(snapshot, rtt),
                    Ok(Err(err)) if err.is_closed() => Outcome::Closed(err),
                    Ok(Err(err)) => Outcome::Retry(err),
                    // A panic inside the codec or transport costs one iteration.
                    Err(_) => Outcome::Retry(TransportError::Transient(
                        "panic during exchange".to_string(),
                    )),
                }
            }
        };

        let pause = match outcome {
            Outcome::Exchanged(snapshot, rtt) => {
                exchanges += 1;
                let rtt_ms = u32::try_from(rtt.as_millis()).unwrap_or(u32::MAX);
                last_rtt = Some(rtt_ms);
                latency_ms.store(rtt_ms, Ordering::Relaxed);
                snapshot_tx.send_replace(Some(Arc::new(snapshot)));
                timing.frame_delay
            }
            Outcome::Closed(err) => {
                info!(error = %err, exchanges, faults, "session closed by remote");
                shared.remote_closed();
                return;
            }
            Outcome::Retry(err) => {
                faults += 1;
                if should_log(&mut last_fault_log) {
                    warn!(error = %err, faults, "transient session fault; retrying");
                }
                timing.retry_backoff
            }
        };

        tokio::select! {
            biased;
            _ = shared.close_notify.notified() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    transport.close().await;
    info!(exchanges, faults, "session closed locally");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface_adapters::protocol::encode_snapshot;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    enum Step {
        Text(String),
        // Arrives after the given delay.
        Late(Duration, String),
        Fail(TransportError),
        Panic,
    }

    #[derive(Default)]
    struct Counters {
        sends: AtomicUsize,
        recvs: AtomicUsize,
        closes: AtomicUsize,
        sent: Mutex<Vec<String>>,
    }

    // Replays `steps` for reads; blocks forever once they run out.
    struct ScriptedTransport {
        steps: VecDeque<Step>,
        counters: Arc<Counters>,
    }

    impl ScriptedTransport {
        fn new(steps: Vec<Step>) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            (
                Self {
                    steps: steps.into(),
                    counters: counters.clone(),
                },
                counters,
            )
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.counters.sends.fetch_add(1, Ordering::SeqCst);
            self.counters.sent.lock().expect("sent frames").push(text);
            Ok(())
        }

        async fn recv_text(&mut self) -> Result<String, TransportError> {
            self.counters.recvs.fetch_add(1, Ordering::SeqCst);
            match self.steps.pop_front() {
                Some(Step::Text(text)) => Ok(text),
                Some(Step::Late(delay, text)) => {
                    tokio::time::sleep(delay).await;
                    Ok(text)
                }
                Some(Step::Fail(err)) => Err(err),
                Some(Step::Panic) => panic!("decoder blew up"),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn identity() -> Step {
        Step::Text(r#"{"type":"Identity","data":{"participant_id":"p-1"}}"#.to_string())
    }

    fn snapshot(level: &str) -> Step {
        Step::Text(encode_snapshot(&WorldSnapshot::lobby(level)).expect("encode"))
    }

    fn timing() -> SessionTiming {
        SessionTiming {
            frame_delay: Duration::from_millis(1),
            retry_backoff: Duration::from_millis(1),
            identity_timeout: Duration::from_secs(1),
            reply_timeout: Duration::from_secs(1),
        }
    }

    async fn first_snapshot(session: &Session) -> Arc<WorldSnapshot> {
        let mut rx = session.snapshots();
        let seen = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.is_some()))
            .await
            .expect("timed out")
            .expect("session gone");
        seen.clone().expect("snapshot")
    }

    #[tokio::test]
    async fn when_identity_arrives_first_then_session_adopts_it() {
        let (transport, _) = ScriptedTransport::new(vec![identity(), snapshot("level1")]);
        let session = Session::establish(transport, timing()).await.expect("session");

        assert_eq!(session.participant_id(), "p-1");
        assert_eq!(first_snapshot(&session).await.level_id, "level1");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn when_connection_closes_before_identity_then_connect_fails() {
        let (transport, counters) =
            ScriptedTransport::new(vec![Step::Fail(TransportError::Closed("bye".into()))]);
        let err = Session::establish(transport, timing()).await.err().expect("error");

        assert!(matches!(err, ConnectionError::ClosedBeforeIdentity));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn when_first_frame_is_not_an_identity_then_connect_fails() {
        let (transport, _) = ScriptedTransport::new(vec![snapshot("level1")]);
        let err = Session::establish(transport, timing()).await.err().expect("error");

        assert!(matches!(err, ConnectionError::IdentityDecode(_)));
    }

    #[tokio::test]
    async fn when_remote_closes_then_callback_fires_once_and_io_stops() {
        let (transport, counters) = ScriptedTransport::new(vec![
            identity(),
            snapshot("level1"),
            Step::Fail(TransportError::Closed("abnormal closure".into())),
        ]);
        let session = Session::establish(transport, timing()).await.expect("session");
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = fired.clone();
        session.on_close(move || {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        });

        session.finished().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // Identity read, then two exchanges; nothing after the closure.
        assert_eq!(counters.recvs.load(Ordering::SeqCst), 3);
        assert_eq!(counters.sends.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
        assert!(session.is_closed());

        session.close();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn when_callback_registers_after_remote_close_then_it_runs_immediately() {
        let (transport, _) = ScriptedTransport::new(vec![
            identity(),
            Step::Fail(TransportError::Closed("gone".into())),
        ]);
        let session = Session::establish(transport, timing()).await.expect("session");
        session.finished().await;

        let fired = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let fired_cb = fired.clone();
            session.on_close(move || {
                fired_cb.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn when_faults_are_transient_then_loop_keeps_exchanging() {
        let (transport, _) = ScriptedTransport::new(vec![
            identity(),
            Step::Fail(TransportError::Transient("hiccup".into())),
            Step::Text("{not json".to_string()),
            Step::Panic,
            snapshot("level2"),
        ]);
        let session = Session::establish(transport, timing()).await.expect("session");

        assert_eq!(first_snapshot(&session).await.level_id, "level2");
        assert!(!session.is_closed());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn when_closed_locally_then_transport_closes_and_callback_stays_silent() {
        let (transport, counters) = ScriptedTransport::new(vec![identity()]);
        let session = Session::establish(transport, timing()).await.expect("session");
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = fired.clone();
        session.on_close(move || {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        });

        // The loop is parked in a read that never completes.
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.close();
        session.close();
        session.shutdown().await;

        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn when_snapshot_is_slow_then_latency_reflects_the_round_trip() {
        let delay = Duration::from_millis(40);
        let (transport, counters) = ScriptedTransport::new(vec![
            identity(),
            Step::Late(delay, encode_snapshot(&WorldSnapshot::lobby("level1")).expect("encode")),
            snapshot("level1"),
        ]);
        let session = Session::establish(transport, timing()).await.expect("session");
        first_snapshot(&session).await;

        assert!(session.latency() >= delay);

        // The next control frame reports the measured round trip to the host.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while counters.sends.load(Ordering::SeqCst) < 2 {
            assert!(tokio::time::Instant::now() < deadline, "second exchange never started");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let second = counters.sent.lock().expect("sent frames")[1].clone();
        match serde_json::from_str::<ClientMessage>(&second).expect("control frame") {
            ClientMessage::Control { latency_ms, .. } => {
                assert!(latency_ms.is_some_and(|ms| u128::from(ms) >= delay.as_millis()));
            }
        }
        session.shutdown().await;
    }

    #[tokio::test]
    async fn when_reply_never_arrives_then_exchange_gives_up_and_resends() {
        let (transport, counters) = ScriptedTransport::new(vec![identity()]);
        let timing = SessionTiming {
            reply_timeout: Duration::from_millis(20),
            ..timing()
        };
        let session = Session::establish(transport, timing).await.expect("session");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while counters.sends.load(Ordering::SeqCst) < 3 {
            assert!(tokio::time::Instant::now() < deadline, "exchange stayed parked on its read");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!session.is_closed());
        assert!(session.latest_snapshot().is_none());
        session.shutdown().await;
    }

    #[test]
    fn when_address_is_host_port_then_url_targets_ws_route_with_name() {
        let url = session_url("127.0.0.1:8080", "Ann Lee").expect("url");
        assert_eq!(url.as_str(), "ws://127.0.0.1:8080/ws?name=Ann+Lee");

        let url = session_url("ws://example.com:9000/custom", "x").expect("url");
        assert_eq!(url.path(), "/custom");
    }
}
