//! Desktop pairing coordinator
//!
//! Owns exactly one pairing attempt: generates the session id, connects to
//! the relay, subscribes to the session's topic, exposes the QR payload, and
//! waits for the approval. Terminal states are `Approved` and `Failed`; a
//! retry discards this coordinator and starts a brand-new one with a fresh
//! session id. Sessions are never resumed.

use handoff_core::credentials::{CredentialStore, Credentials};
use handoff_core::protocol::{login_topic, ApprovalMessage};
use handoff_core::qr;
use handoff_core::session::{PairingSession, PairingStatus, SessionId};
use handoff_transport::RelayChannel;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Events surfaced to the embedding UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// Relay connect in flight
    Connecting { session_id: SessionId },
    /// Subscribed; the QR payload is ready to render
    QrReady {
        session_id: SessionId,
        payload: String,
    },
    /// Approval received and credentials persisted; navigate by role
    Approved { role: String, display_name: String },
    /// Terminal failure; the UI must offer a retry that starts a new session
    Failed { reason: String },
}

/// Cancellation handle for one coordinator
///
/// Cancelling is the unmount path: it is idempotent, safe in any state, and
/// guarantees the underlying connection is torn down without any further
/// events reaching the UI.
#[derive(Clone)]
pub struct CancelHandle {
    cancel_tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

/// Drives one login-handoff attempt to `Approved` or `Failed`
pub struct PairingCoordinator {
    session: PairingSession,
    relay: Arc<dyn RelayChannel>,
    store: Arc<dyn CredentialStore>,
    event_tx: mpsc::Sender<PairingEvent>,
    cancel_rx: watch::Receiver<bool>,
}

impl PairingCoordinator {
    /// Create a coordinator with a fresh session
    ///
    /// Returns the coordinator, the event stream for the UI, and the handle
    /// the UI must fire on unmount.
    pub fn new(
        relay: Arc<dyn RelayChannel>,
        store: Arc<dyn CredentialStore>,
    ) -> (Self, mpsc::Receiver<PairingEvent>, CancelHandle) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let coordinator = Self {
            session: PairingSession::new(),
            relay,
            store,
            event_tx,
            cancel_rx,
        };
        (coordinator, event_rx, CancelHandle { cancel_tx })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session.session_id
    }

    pub fn status(&self) -> PairingStatus {
        self.session.status
    }

    /// Run the attempt to completion
    ///
    /// Suspends on the relay connect and on the wait for the approval
    /// message; cancellation wins every race and tears the connection down
    /// without emitting further events.
    pub async fn run(mut self) -> PairingStatus {
        let session_id = self.session.session_id.clone();
        info!("Pairing attempt started, session {}", session_id);

        self.emit(PairingEvent::Connecting {
            session_id: session_id.clone(),
        })
        .await;

        // Single connect attempt; failure is terminal for this session
        let mut conn = tokio::select! {
            result = self.relay.connect() => match result {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Relay connect failed: {}", e);
                    return self.fail(e.to_string()).await;
                }
            },
            _ = cancelled(&mut self.cancel_rx) => {
                debug!("Cancelled before connect completed");
                return self.session.status;
            }
        };

        if let Err(e) = conn.subscribe(&login_topic(&session_id)).await {
            warn!("Relay subscribe failed: {}", e);
            conn.disconnect().await;
            return self.fail(e.to_string()).await;
        }

        self.session.status = PairingStatus::Ready;
        self.emit(PairingEvent::QrReady {
            session_id: session_id.clone(),
            payload: qr::encode_login_session(&session_id),
        })
        .await;

        // Wait for the one approval; malformed bodies are noise, not errors
        let approval = loop {
            tokio::select! {
                body = conn.next_message() => match body {
                    Some(body) => match ApprovalMessage::parse(&body) {
                        Some(approval) => break approval,
                        None => continue,
                    },
                    None => {
                        conn.disconnect().await;
                        return self.fail("relay connection closed".to_string()).await;
                    }
                },
                _ = cancelled(&mut self.cancel_rx) => {
                    debug!("Cancelled while waiting for approval");
                    conn.disconnect().await;
                    return self.session.status;
                }
            }
        };

        conn.disconnect().await;

        let display_name = approval.display_name();
        let credentials = Credentials::new(&approval.auth_token, &approval.role, &display_name);
        if let Err(e) = self.store.set(credentials).await {
            warn!("Failed to persist credentials: {}", e);
            return self.fail(e.to_string()).await;
        }

        self.session.status = PairingStatus::Approved;
        info!("Pairing approved for role {}", approval.role);
        self.emit(PairingEvent::Approved {
            role: approval.role,
            display_name,
        })
        .await;
        self.session.status
    }

    async fn fail(&mut self, reason: String) -> PairingStatus {
        self.session.status = PairingStatus::Failed;
        self.emit(PairingEvent::Failed { reason }).await;
        self.session.status
    }

    async fn emit(&self, event: PairingEvent) {
        // A departed UI is not an error; the attempt just winds down
        let _ = self.event_tx.send(event).await;
    }
}

/// Resolves once cancellation has been requested
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    while !*cancel_rx.borrow() {
        if cancel_rx.changed().await.is_err() {
            // All handles dropped without cancelling; never resolves
            std::future::pending::<()>().await;
        }
    }
}
