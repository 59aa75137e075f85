//! Handoff Core - Shared types for QR login handoff and device enrollment
//!
//! This crate provides the foundational types used across all Handoff components:
//! session identifiers, the QR payload codec, the approval wire protocol, and
//! the injected credential store capability.

pub mod credentials;
pub mod protocol;
pub mod qr;
pub mod session;

pub use credentials::{
    CredentialError, CredentialResult, CredentialStore, Credentials, FileCredentialStore,
    MemoryCredentialStore,
};
pub use protocol::{login_topic, ApprovalMessage, ScanClassification};
pub use qr::{render_png, RenderError, ScanPayload, SETUP_MARKER};
pub use session::{PairingSession, PairingStatus, SessionId};
