//! Mobile approval flow
//!
//! Routes each decoded scan to exactly one side effect: an enrollment
//! payload adopts the embedded credential locally with no network call; a
//! login-session payload issues a single approval request to the
//! authorization service. At most one operation is in flight per flow
//! instance; scans arriving while one is processing are dropped, which keeps
//! rapid repeated scans of the same code from producing duplicate approvals.

use crate::scanner::{CameraSource, ScannerSession};
use handoff_core::credentials::{CredentialStore, Credentials};
use handoff_core::qr::{self, ScanPayload};
use handoff_core::session::SessionId;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Cool-down before the flow resumes scanning after a failure, in milliseconds
pub const FAILURE_COOLDOWN_MS: u64 = 1500;

/// Approval request errors
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The authorization service refused the session (expired, unknown, ...)
    #[error("Approval rejected: {0}")]
    Rejected(String),
    #[error("Network error: {0}")]
    Network(String),
}

/// Narrow contract with the authorization service
///
/// The service itself publishes the approval to the relay topic; the mobile
/// device only receives the acknowledgement.
#[async_trait::async_trait]
pub trait ApprovalApi: Send + Sync {
    async fn approve(&self, session_id: &SessionId) -> Result<(), ApprovalError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalRequest<'a> {
    session_id: &'a str,
}

/// HTTP client for the approval endpoint
pub struct HttpApprovalApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpApprovalApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    /// Attach the device's bearer token to approval requests
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[async_trait::async_trait]
impl ApprovalApi for HttpApprovalApi {
    async fn approve(&self, session_id: &SessionId) -> Result<(), ApprovalError> {
        let url = format!("{}/api/login/approvals", self.base_url);
        let mut request = self.client.post(&url).json(&ApprovalRequest {
            session_id: session_id.as_str(),
        });
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApprovalError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ApprovalError::Rejected(response.status().to_string()))
        }
    }
}

/// Flow states; `Success` is terminal, `Failure` auto-resumes to `Scanning`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Scanning,
    Processing,
    Success,
    Failure,
}

/// State changes surfaced to the embedding UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A scan was accepted and its side effect is in flight
    Processing { payload: String },
    /// Enrollment credential adopted locally; no network call was made
    Enrolled,
    /// Login session approved by the authorization service
    Approved { session_id: SessionId },
    /// The side effect failed; scanning resumes after the cool-down
    Failed { reason: String },
    /// Back to scanning after a failure cool-down
    Rescanning,
}

/// Drives the scan screen: one scan, one side effect, then done or retry
pub struct ApprovalFlow {
    api: Arc<dyn ApprovalApi>,
    store: Arc<dyn CredentialStore>,
    state: ScanState,
    cooldown: Duration,
    event_tx: mpsc::Sender<ScanEvent>,
}

impl ApprovalFlow {
    pub fn new(
        api: Arc<dyn ApprovalApi>,
        store: Arc<dyn CredentialStore>,
    ) -> (Self, mpsc::Receiver<ScanEvent>) {
        let (event_tx, event_rx) = mpsc::channel(16);
        (
            Self {
                api,
                store,
                state: ScanState::Scanning,
                cooldown: Duration::from_millis(FAILURE_COOLDOWN_MS),
                event_tx,
            },
            event_rx,
        )
    }

    /// Shorten the failure cool-down (tests)
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Run until a scan succeeds or the scanner goes away
    ///
    /// Returns the final state: `Success` after a completed side effect, or
    /// the state current when the feed ended or idled out (the camera is
    /// released on every exit path).
    pub async fn run<S: CameraSource>(mut self, scanner: &mut ScannerSession<S>) -> ScanState {
        loop {
            let payload = match scanner.next_decode().await {
                Some(payload) => payload,
                None => {
                    scanner.stop();
                    return self.state;
                }
            };

            self.state = ScanState::Processing;
            self.emit(ScanEvent::Processing {
                payload: payload.clone(),
            })
            .await;

            match qr::decode(&payload) {
                ScanPayload::Enrollment { token } => {
                    // Token is self-contained; claims arrive with later requests
                    let credentials = Credentials::new(token, "", "");
                    match self.store.set(credentials).await {
                        Ok(()) => {
                            info!("Enrollment credential adopted");
                            self.state = ScanState::Success;
                            self.emit(ScanEvent::Enrolled).await;
                            scanner.stop();
                            return self.state;
                        }
                        Err(e) => {
                            warn!("Failed to persist enrollment credential: {}", e);
                            self.fail_and_resume(scanner, e.to_string()).await;
                        }
                    }
                }
                ScanPayload::LoginSession { session_id } => {
                    match self.api.approve(&session_id).await {
                        Ok(()) => {
                            info!("Approved login session {}", session_id);
                            self.state = ScanState::Success;
                            self.emit(ScanEvent::Approved { session_id }).await;
                            scanner.stop();
                            return self.state;
                        }
                        Err(e) => {
                            warn!("Approval failed: {}", e);
                            self.fail_and_resume(scanner, e.to_string()).await;
                        }
                    }
                }
            }
        }
    }

    /// Failure cool-down, then back to scanning with mid-flight scans dropped
    async fn fail_and_resume<S: CameraSource>(
        &mut self,
        scanner: &mut ScannerSession<S>,
        reason: String,
    ) {
        self.state = ScanState::Failure;
        self.emit(ScanEvent::Failed { reason }).await;

        tokio::time::sleep(self.cooldown).await;

        // Scans made while processing or cooling down must not dispatch
        while scanner.try_next_decode().is_some() {}

        self.state = ScanState::Scanning;
        self.emit(ScanEvent::Rescanning).await;
    }

    async fn emit(&self, event: ScanEvent) {
        let _ = self.event_tx.send(event).await;
    }
}
