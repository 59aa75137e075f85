//! Handoff Mobile - Scanner-side flows
//!
//! The mobile device is the actor in the handoff protocol: it scans a QR
//! code, routes the decoded string, and performs exactly one side effect per
//! scan (a remote approval request or local credential adoption). The same
//! scanner also serves inventory lookups through the external classification
//! service.

pub mod approval;
pub mod classify;
pub mod scanner;

pub use approval::{
    ApprovalApi, ApprovalError, ApprovalFlow, HttpApprovalApi, ScanEvent, ScanState,
    FAILURE_COOLDOWN_MS,
};
pub use classify::{
    route_next_scan, ClassifyError, HttpScanClassifier, InventoryRoute, ScanClassifier,
};
pub use scanner::{
    CameraBridge, CameraFeed, CameraSource, ChannelCameraFeed, ChannelCameraSource, ScanError,
    ScannerSession, IDLE_TIMEOUT_SECS,
};
