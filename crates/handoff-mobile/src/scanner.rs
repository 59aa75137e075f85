//! Camera scanner session
//!
//! The camera is exclusively owned by the active scanner and must be
//! released on every exit path. The QR image decoder itself is external;
//! a `CameraFeed` yields already-decoded strings. A battery-saving idle
//! timeout stops the feed if nothing is scanned within a bounded window,
//! re-armed only by explicit user action.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Bounded window without a scan before the camera is stopped, in seconds
pub const IDLE_TIMEOUT_SECS: u64 = 60;

/// Scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Terminal for the scan screen; no automatic retry
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),
}

/// Opens the platform camera and its decoder
///
/// Opening is where permission denial surfaces: `open` fails with
/// [`ScanError::PermissionDenied`] and the scan screen treats that as
/// terminal, unlike a failed decode which auto-resumes. `open` is called
/// again on [`ScannerSession::resume`], so implementations must be able to
/// reopen after an earlier feed was stopped.
#[async_trait::async_trait]
pub trait CameraSource: Send {
    type Feed: CameraFeed;

    async fn open(&mut self) -> Result<Self::Feed, ScanError>;
}

/// Source of decoded QR strings from a live camera
#[async_trait::async_trait]
pub trait CameraFeed: Send {
    /// Wait for the next decoded string; `None` once the feed has ended
    async fn next_decode(&mut self) -> Option<String>;

    /// Non-blocking poll, used to drop scans queued behind an in-flight
    /// operation
    fn try_next_decode(&mut self) -> Option<String>;

    /// Release the camera tracks; idempotent
    fn stop(&mut self);
}

/// Handle the platform camera callback pushes decoded strings through
///
/// The bridge survives feed restarts: each [`ChannelCameraSource::open`]
/// attaches a fresh channel, so pushes always reach the currently active
/// feed and are dropped when no feed is live.
#[derive(Clone, Default)]
pub struct CameraBridge {
    decode_tx: Arc<Mutex<Option<mpsc::Sender<String>>>>,
}

impl CameraBridge {
    /// Deliver one decoded string to the active feed
    ///
    /// Returns false when no feed is live (stopped or not yet opened).
    pub async fn push(&self, payload: impl Into<String>) -> bool {
        let sender = self.decode_tx.lock().unwrap().clone();
        match sender {
            Some(sender) => sender.send(payload.into()).await.is_ok(),
            None => false,
        }
    }

    /// Signal that the camera is gone; the active feed ends
    pub fn detach(&self) {
        self.decode_tx.lock().unwrap().take();
    }

    fn attach(&self, sender: mpsc::Sender<String>) {
        *self.decode_tx.lock().unwrap() = Some(sender);
    }
}

/// Channel-backed camera source bridging a platform camera callback
pub struct ChannelCameraSource {
    bridge: CameraBridge,
}

impl ChannelCameraSource {
    pub fn new() -> (CameraBridge, Self) {
        let bridge = CameraBridge::default();
        (bridge.clone(), Self { bridge })
    }
}

#[async_trait::async_trait]
impl CameraSource for ChannelCameraSource {
    type Feed = ChannelCameraFeed;

    async fn open(&mut self) -> Result<ChannelCameraFeed, ScanError> {
        let (decode_tx, feed) = ChannelCameraFeed::new();
        self.bridge.attach(decode_tx);
        Ok(feed)
    }
}

/// One live channel of decoded strings
pub struct ChannelCameraFeed {
    decode_rx: mpsc::Receiver<String>,
    stopped: bool,
}

impl ChannelCameraFeed {
    /// Create a feed and the sender half the camera callback pushes into
    pub fn new() -> (mpsc::Sender<String>, Self) {
        let (decode_tx, decode_rx) = mpsc::channel(16);
        (
            decode_tx,
            Self {
                decode_rx,
                stopped: false,
            },
        )
    }
}

#[async_trait::async_trait]
impl CameraFeed for ChannelCameraFeed {
    async fn next_decode(&mut self) -> Option<String> {
        if self.stopped {
            return None;
        }
        self.decode_rx.recv().await
    }

    fn try_next_decode(&mut self) -> Option<String> {
        if self.stopped {
            return None;
        }
        self.decode_rx.try_recv().ok()
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.decode_rx.close();
            debug!("Camera feed stopped");
        }
    }
}

/// Exclusive owner of one camera with the idle timeout applied
pub struct ScannerSession<S: CameraSource> {
    source: S,
    feed: Option<S::Feed>,
    idle_timeout: Duration,
}

impl<S: CameraSource> ScannerSession<S> {
    /// Open the camera and start scanning
    ///
    /// Permission denial surfaces here and is terminal for the screen.
    pub async fn start(source: S) -> Result<Self, ScanError> {
        Self::start_with_idle_timeout(source, Duration::from_secs(IDLE_TIMEOUT_SECS)).await
    }

    pub async fn start_with_idle_timeout(
        mut source: S,
        idle_timeout: Duration,
    ) -> Result<Self, ScanError> {
        let feed = source.open().await?;
        Ok(Self {
            source,
            feed: Some(feed),
            idle_timeout,
        })
    }

    /// Whether the camera is currently streaming
    pub fn is_active(&self) -> bool {
        self.feed.is_some()
    }

    /// Next decoded string, or `None` when the feed ended or the idle
    /// window elapsed (in both cases the camera has been released)
    pub async fn next_decode(&mut self) -> Option<String> {
        let feed = self.feed.as_mut()?;
        match tokio::time::timeout(self.idle_timeout, feed.next_decode()).await {
            Ok(Some(payload)) => Some(payload),
            Ok(None) => {
                debug!("Camera feed ended");
                self.stop();
                None
            }
            Err(_) => {
                info!("No scan within idle window, stopping camera");
                self.stop();
                None
            }
        }
    }

    /// Non-blocking poll for scans queued during an in-flight operation
    pub fn try_next_decode(&mut self) -> Option<String> {
        self.feed.as_mut()?.try_next_decode()
    }

    /// Reopen the camera after an idle stop; only ever driven by explicit
    /// user action. Denial on reopen is terminal, same as on start.
    pub async fn resume(&mut self) -> Result<(), ScanError> {
        if self.feed.is_none() {
            self.feed = Some(self.source.open().await?);
            info!("Camera resumed");
        }
        Ok(())
    }

    /// Release the camera; idempotent, safe on every exit path
    pub fn stop(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.stop();
        }
    }
}

impl<S: CameraSource> Drop for ScannerSession<S> {
    fn drop(&mut self) {
        if self.feed.is_some() {
            warn!("Scanner session dropped while camera active, releasing");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source whose opens are counted and scripted to fail
    struct DeniedSource {
        attempts: Arc<AtomicUsize>,
        deny_from_attempt: usize,
    }

    impl DeniedSource {
        fn denying_from(deny_from_attempt: usize) -> Self {
            Self {
                attempts: Arc::new(AtomicUsize::new(0)),
                deny_from_attempt,
            }
        }
    }

    #[async_trait::async_trait]
    impl CameraSource for DeniedSource {
        type Feed = ChannelCameraFeed;

        async fn open(&mut self) -> Result<ChannelCameraFeed, ScanError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.deny_from_attempt {
                return Err(ScanError::PermissionDenied);
            }
            let (_decode_tx, feed) = ChannelCameraFeed::new();
            Ok(feed)
        }
    }

    #[tokio::test]
    async fn test_feed_delivers_decodes() {
        let (bridge, source) = ChannelCameraSource::new();
        let mut session = ScannerSession::start(source).await.unwrap();

        assert!(bridge.push("payload-1").await);
        assert_eq!(session.next_decode().await.unwrap(), "payload-1");
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_permission_denial_is_terminal() {
        // Unlike a failed decode, denial never retries: one open attempt,
        // no session to resume
        let source = DeniedSource::denying_from(1);
        let attempts = source.attempts.clone();

        let result = ScannerSession::start(source).await;
        assert!(matches!(result, Err(ScanError::PermissionDenied)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_idle_timeout_stops_camera() {
        let (_bridge, source) = ChannelCameraSource::new();
        let mut session =
            ScannerSession::start_with_idle_timeout(source, Duration::from_millis(10))
                .await
                .unwrap();

        assert!(session.next_decode().await.is_none());
        assert!(!session.is_active());

        // Stopped camera yields nothing until explicitly resumed
        assert!(session.next_decode().await.is_none());
    }

    #[tokio::test]
    async fn test_resume_reopens_camera() {
        let (bridge, source) = ChannelCameraSource::new();
        let mut session =
            ScannerSession::start_with_idle_timeout(source, Duration::from_millis(10))
                .await
                .unwrap();

        assert!(session.next_decode().await.is_none());
        assert!(!session.is_active());

        session.resume().await.unwrap();
        assert!(session.is_active());

        // The bridge reaches the fresh feed
        assert!(bridge.push("after-resume").await);
        assert_eq!(session.next_decode().await.unwrap(), "after-resume");
    }

    #[tokio::test]
    async fn test_resume_surfaces_revoked_permission() {
        let source = DeniedSource::denying_from(2);
        let attempts = source.attempts.clone();
        let mut session =
            ScannerSession::start_with_idle_timeout(source, Duration::from_millis(10))
                .await
                .unwrap();

        assert!(session.next_decode().await.is_none());

        let result = session.resume().await;
        assert!(matches!(result, Err(ScanError::PermissionDenied)));
        assert!(!session.is_active());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resume_while_active_is_a_no_op() {
        let (_bridge, source) = ChannelCameraSource::new();
        let mut session = ScannerSession::start(source).await.unwrap();

        session.resume().await.unwrap();
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (_bridge, source) = ChannelCameraSource::new();
        let mut session = ScannerSession::start(source).await.unwrap();
        session.stop();
        session.stop();
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_detached_bridge_ends_feed() {
        let (bridge, source) = ChannelCameraSource::new();
        let mut session = ScannerSession::start(source).await.unwrap();

        bridge.detach();
        assert!(session.next_decode().await.is_none());
        assert!(!session.is_active());
        assert!(!bridge.push("late").await);
    }

    #[tokio::test]
    async fn test_try_next_drains_queued_scans() {
        let (bridge, source) = ChannelCameraSource::new();
        let mut session = ScannerSession::start(source).await.unwrap();

        bridge.push("a").await;
        bridge.push("b").await;

        assert_eq!(session.try_next_decode().unwrap(), "a");
        assert_eq!(session.try_next_decode().unwrap(), "b");
        assert!(session.try_next_decode().is_none());
    }
}
