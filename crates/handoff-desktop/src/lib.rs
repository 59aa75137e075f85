//! Handoff Desktop - Pairing coordinator and enrollment producer
//!
//! The desktop side of the handoff protocol is purely a listener: it renders
//! a QR code and waits on a relay topic for the approval published after the
//! mobile device scans it. The enrollment producer is the one-directional
//! counterpart for linking a new mobile device to an already signed-in
//! account.

pub mod coordinator;
pub mod enrollment;

pub use coordinator::{CancelHandle, PairingCoordinator, PairingEvent};
pub use enrollment::{EnrollmentError, EnrollmentPresenter};
