//! The session state machine.
//!
//! One logical session exists per process. The manager owns a background
//! task that connects the transport, drains its event stream, persists
//! credential updates, and reconnects with bounded exponential backoff.
//! Only a logged-out close is terminal; exhausting the reconnect budget
//! parks the session in `Degraded` until an operator restarts it.

use relay_core::{
    config::SessionConfig,
    event::{CloseReason, ConnectionEvent, TransportEvent},
    message::InboundMessage,
    session::{PairingArtifact, SessionStatus},
    traits::{CredentialStore, Transport},
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Reconnection budget and backoff shape.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_secs: u64,
    pub max_secs: u64,
}

impl From<&SessionConfig> for ReconnectPolicy {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            max_attempts: cfg.max_reconnect_attempts,
            base_secs: cfg.reconnect_base_secs,
            max_secs: cfg.reconnect_max_secs,
        }
    }
}

/// How a drained event stream came to an end.
enum StreamEnd {
    /// The transport reported a close with a reason.
    Closed(CloseReason),
    /// The stream ended without a close event. Treated as a lost connection.
    Ended,
    /// The inbound message receiver was dropped; the gateway is shutting down.
    ReceiverGone,
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    phone_number: Option<String>,
    policy: ReconnectPolicy,
    status: Mutex<SessionStatus>,
    artifact: Mutex<Option<PairingArtifact>>,
    task: Mutex<Option<JoinHandle<()>>>,
    msg_tx: mpsc::Sender<InboundMessage>,
}

impl SessionManager {
    /// Create a manager and the inbound message stream it feeds.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        phone_number: Option<String>,
        policy: ReconnectPolicy,
    ) -> (Arc<Self>, mpsc::Receiver<InboundMessage>) {
        let (msg_tx, msg_rx) = mpsc::channel(64);
        let manager = Arc::new(Self {
            transport,
            credentials,
            phone_number,
            policy,
            status: Mutex::new(SessionStatus::Idle),
            artifact: Mutex::new(None),
            task: Mutex::new(None),
            msg_tx,
        });
        (manager, msg_rx)
    }

    /// Start the session task. Idempotent: a second call while the session
    /// is running changes nothing.
    pub fn start(self: &Arc<Self>) -> SessionStatus {
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        let alive = task.as_ref().is_some_and(|t| !t.is_finished());
        if alive && self.status().is_running() {
            return self.status();
        }
        if let Some(stale) = task.take() {
            stale.abort();
        }
        self.set_status(SessionStatus::Connecting);
        self.set_artifact(None);
        *task = Some(tokio::spawn(self.clone().run_loop()));
        self.status()
    }

    /// Stop the session task and return to `Idle`.
    pub async fn stop(&self) {
        let handle = {
            let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
            task.take()
        };
        if let Some(handle) = handle {
            handle.abort();
        }
        if let Err(e) = self.transport.disconnect().await {
            warn!("Transport disconnect failed: {e}");
        }
        self.set_artifact(None);
        self.set_status(SessionStatus::Idle);
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// The current pairing artifact, if the session is waiting on one.
    pub fn pairing_artifact(&self) -> Option<PairingArtifact> {
        self.artifact
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn set_status(&self, next: SessionStatus) {
        let mut current = self.status.lock().unwrap_or_else(|p| p.into_inner());
        if *current != next {
            info!("Session status: {} -> {}", *current, next);
            *current = next;
        }
    }

    fn set_artifact(&self, artifact: Option<PairingArtifact>) {
        *self.artifact.lock().unwrap_or_else(|p| p.into_inner()) = artifact;
    }

    async fn run_loop(self: Arc<Self>) {
        let mut attempts: u32 = 0;
        let mut backoff_secs = self.policy.base_secs;

        loop {
            self.set_status(SessionStatus::Connecting);
            match self.transport.connect().await {
                Ok(mut events) => {
                    self.maybe_request_pairing_code().await;
                    let (opened, end) = self.drain(&mut events).await;
                    if opened {
                        attempts = 0;
                        backoff_secs = self.policy.base_secs;
                    }
                    match end {
                        StreamEnd::ReceiverGone => return,
                        StreamEnd::Closed(reason) if reason.is_terminal() => {
                            warn!("Session logged out; not reconnecting");
                            self.set_artifact(None);
                            self.set_status(SessionStatus::Closed);
                            return;
                        }
                        StreamEnd::Closed(reason) => {
                            warn!("Connection closed: {reason:?}");
                        }
                        StreamEnd::Ended => {
                            warn!("Transport event stream ended");
                        }
                    }
                }
                Err(e) => {
                    warn!("Transport connect failed: {e}");
                }
            }

            attempts += 1;
            if attempts >= self.policy.max_attempts {
                error!(
                    "Giving up after {attempts} failed connection attempts; session degraded"
                );
                self.set_artifact(None);
                self.set_status(SessionStatus::Degraded);
                return;
            }

            info!("Reconnecting in {backoff_secs}s (attempt {attempts})");
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            backoff_secs = (backoff_secs * 2).min(self.policy.max_secs);
        }
    }

    /// An unregistered session with a configured phone number pairs by code
    /// instead of waiting for a QR scan.
    async fn maybe_request_pairing_code(&self) {
        let Some(phone) = &self.phone_number else {
            return;
        };
        let registered = matches!(
            self.credentials.load().await,
            Ok(Some(creds)) if creds.registered
        );
        if registered {
            return;
        }
        match self.transport.request_pairing_code(phone).await {
            Ok(code) => {
                info!("Pairing code issued for {phone}");
                self.set_artifact(Some(PairingArtifact::PairCode(code)));
                self.set_status(SessionStatus::AwaitingPairCode);
            }
            Err(e) => warn!("Pairing code request failed: {e}"),
        }
    }

    /// Process events until the stream ends. Returns whether the connection
    /// reached `Open` and how the stream terminated.
    async fn drain(
        &self,
        events: &mut mpsc::Receiver<TransportEvent>,
    ) -> (bool, StreamEnd) {
        let mut opened = false;
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connection(ConnectionEvent::Open) => {
                    opened = true;
                    self.set_artifact(None);
                    self.set_status(SessionStatus::Open);
                }
                TransportEvent::Connection(ConnectionEvent::Qr { data }) => {
                    if self.status() != SessionStatus::Open {
                        self.set_artifact(Some(PairingArtifact::Qr(data)));
                        self.set_status(SessionStatus::AwaitingQr);
                    }
                }
                TransportEvent::Connection(ConnectionEvent::PairCode { code }) => {
                    if self.status() != SessionStatus::Open {
                        self.set_artifact(Some(PairingArtifact::PairCode(code)));
                        self.set_status(SessionStatus::AwaitingPairCode);
                    }
                }
                TransportEvent::Connection(ConnectionEvent::Closed { reason }) => {
                    return (opened, StreamEnd::Closed(reason));
                }
                TransportEvent::Credentials(creds) => {
                    // Persistence failure must not take the session down.
                    if let Err(e) = self.credentials.save(&creds).await {
                        error!("Failed to persist credentials: {e}");
                    }
                }
                TransportEvent::Message(msg) => {
                    if self.msg_tx.send(msg).await.is_err() {
                        return (opened, StreamEnd::ReceiverGone);
                    }
                }
            }
        }
        (opened, StreamEnd::Ended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::error::RelayError;
    use relay_core::message::OutboundPayload;
    use relay_core::session::Credentials;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Events served by one `connect()` call. When `hold` is set the stream
    /// stays open after the scripted events, simulating a live connection.
    struct Script {
        events: Vec<TransportEvent>,
        hold: bool,
    }

    struct ScriptedTransport {
        scripts: Mutex<VecDeque<Script>>,
        connects: AtomicUsize,
        pair_requests: Mutex<Vec<String>>,
        held: Mutex<Vec<mpsc::Sender<TransportEvent>>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                connects: AtomicUsize::new(0),
                pair_requests: Mutex::new(Vec::new()),
                held: Mutex::new(Vec::new()),
            })
        }

        fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, RelayError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| RelayError::Transport("bridge unreachable".into()))?;
            let (tx, rx) = mpsc::channel(16);
            for event in script.events {
                tx.send(event).await.unwrap();
            }
            if script.hold {
                self.held.lock().unwrap().push(tx);
            }
            Ok(rx)
        }

        async fn send(&self, _: &str, _: &OutboundPayload) -> Result<(), RelayError> {
            Ok(())
        }

        async fn react(&self, _: &str, _: &str, _: &str) -> Result<(), RelayError> {
            Ok(())
        }

        async fn request_pairing_code(&self, phone: &str) -> Result<String, RelayError> {
            self.pair_requests.lock().unwrap().push(phone.to_string());
            Ok("ABCD-1234".to_string())
        }

        async fn disconnect(&self) -> Result<(), RelayError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockCredentialStore {
        saved: Mutex<Option<Credentials>>,
    }

    #[async_trait]
    impl CredentialStore for MockCredentialStore {
        async fn load(&self) -> Result<Option<Credentials>, RelayError> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn save(&self, credentials: &Credentials) -> Result<(), RelayError> {
            *self.saved.lock().unwrap() = Some(credentials.clone());
            Ok(())
        }
    }

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            base_secs: 0,
            max_secs: 0,
        }
    }

    fn open() -> TransportEvent {
        TransportEvent::Connection(ConnectionEvent::Open)
    }

    fn closed(reason: CloseReason) -> TransportEvent {
        TransportEvent::Connection(ConnectionEvent::Closed { reason })
    }

    async fn wait_for(check: impl Fn() -> bool) {
        for _ in 0..400 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never reached");
    }

    #[tokio::test]
    async fn test_logged_out_close_is_terminal() {
        let transport = ScriptedTransport::new(vec![Script {
            events: vec![open(), closed(CloseReason::LoggedOut)],
            hold: false,
        }]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, _rx) =
            SessionManager::new(transport.clone(), store, None, fast_policy(10));

        session.start();
        wait_for(|| session.status() == SessionStatus::Closed).await;
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_close_reconnects() {
        let transport = ScriptedTransport::new(vec![
            Script {
                events: vec![open(), closed(CloseReason::ConnectionLost)],
                hold: false,
            },
            Script {
                events: vec![open()],
                hold: true,
            },
        ]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, _rx) =
            SessionManager::new(transport.clone(), store, None, fast_policy(10));

        session.start();
        wait_for(|| transport.connect_count() == 2 && session.status() == SessionStatus::Open)
            .await;
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let transport = ScriptedTransport::new(vec![Script {
            events: vec![open()],
            hold: true,
        }]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, _rx) =
            SessionManager::new(transport.clone(), store, None, fast_policy(10));

        session.start();
        wait_for(|| session.status() == SessionStatus::Open).await;
        session.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(session.status(), SessionStatus::Open);
    }

    #[tokio::test]
    async fn test_qr_artifact_surfaces() {
        let transport = ScriptedTransport::new(vec![Script {
            events: vec![TransportEvent::Connection(ConnectionEvent::Qr {
                data: "2@qr-blob".into(),
            })],
            hold: true,
        }]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, _rx) =
            SessionManager::new(transport, store, None, fast_policy(10));

        session.start();
        wait_for(|| session.status() == SessionStatus::AwaitingQr).await;
        assert_eq!(
            session.pairing_artifact(),
            Some(PairingArtifact::Qr("2@qr-blob".into()))
        );
    }

    #[tokio::test]
    async fn test_artifact_cleared_on_open() {
        let transport = ScriptedTransport::new(vec![Script {
            events: vec![
                TransportEvent::Connection(ConnectionEvent::Qr {
                    data: "2@qr-blob".into(),
                }),
                open(),
            ],
            hold: true,
        }]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, _rx) =
            SessionManager::new(transport, store, None, fast_policy(10));

        session.start();
        wait_for(|| session.status() == SessionStatus::Open).await;
        assert_eq!(session.pairing_artifact(), None);
    }

    #[tokio::test]
    async fn test_degraded_after_exhausted_attempts() {
        // No scripts: every connect fails.
        let transport = ScriptedTransport::new(vec![]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, _rx) =
            SessionManager::new(transport.clone(), store, None, fast_policy(3));

        session.start();
        wait_for(|| session.status() == SessionStatus::Degraded).await;
        assert_eq!(transport.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_credentials_persisted_from_stream() {
        let transport = ScriptedTransport::new(vec![Script {
            events: vec![
                open(),
                TransportEvent::Credentials(Credentials {
                    registered: true,
                    material: serde_json::json!({"noise_key": "abc"}),
                }),
            ],
            hold: true,
        }]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, _rx) =
            SessionManager::new(transport, store.clone(), None, fast_policy(10));

        session.start();
        wait_for(|| {
            store
                .saved
                .lock()
                .unwrap()
                .as_ref()
                .is_some_and(|c| c.registered)
        })
        .await;
    }

    #[tokio::test]
    async fn test_pairing_code_requested_when_unregistered() {
        let transport = ScriptedTransport::new(vec![Script {
            events: vec![],
            hold: true,
        }]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, _rx) = SessionManager::new(
            transport.clone(),
            store,
            Some("15551234567".into()),
            fast_policy(10),
        );

        session.start();
        wait_for(|| session.status() == SessionStatus::AwaitingPairCode).await;
        assert_eq!(
            session.pairing_artifact(),
            Some(PairingArtifact::PairCode("ABCD-1234".into()))
        );
        assert_eq!(
            transport.pair_requests.lock().unwrap().as_slice(),
            ["15551234567"]
        );
    }

    #[tokio::test]
    async fn test_registered_session_skips_pairing_code() {
        let transport = ScriptedTransport::new(vec![Script {
            events: vec![open()],
            hold: true,
        }]);
        let store = Arc::new(MockCredentialStore::default());
        *store.saved.lock().unwrap() = Some(Credentials {
            registered: true,
            material: serde_json::Value::Null,
        });
        let (session, _rx) = SessionManager::new(
            transport.clone(),
            store,
            Some("15551234567".into()),
            fast_policy(10),
        );

        session.start();
        wait_for(|| session.status() == SessionStatus::Open).await;
        assert!(transport.pair_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stop_returns_to_idle() {
        let transport = ScriptedTransport::new(vec![Script {
            events: vec![open()],
            hold: true,
        }]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, _rx) =
            SessionManager::new(transport, store, None, fast_policy(10));

        session.start();
        wait_for(|| session.status() == SessionStatus::Open).await;
        session.stop().await;
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.pairing_artifact(), None);
    }

    #[tokio::test]
    async fn test_inbound_messages_forwarded() {
        let transport = ScriptedTransport::new(vec![Script {
            events: vec![
                open(),
                TransportEvent::Message(InboundMessage::new("123@chat", "hello")),
            ],
            hold: true,
        }]);
        let store = Arc::new(MockCredentialStore::default());
        let (session, mut rx) =
            SessionManager::new(transport, store, None, fast_policy(10));

        session.start();
        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.conversation_id, "123@chat");
        assert_eq!(msg.text, "hello");
    }
}
