//! Device enrollment producer
//!
//! The one-directional variant of pairing: an authenticated desktop embeds
//! its own bearer token in a QR payload for a new mobile device to adopt.
//! There is no confirmation channel and no remote invalidation after the
//! scan; rendering the code is fire-and-forget. The embedded credential is
//! the same long-lived token the desktop holds, so the code must be treated
//! as secret while on screen.

use handoff_core::credentials::CredentialStore;
use handoff_core::qr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Enrollment errors
#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("No signed-in account to enroll from")]
    NotSignedIn,
    #[error("QR rendering failed: {0}")]
    Render(#[from] qr::RenderError),
}

/// Produces the "link a device" QR payload from the stored credentials
pub struct EnrollmentPresenter {
    store: Arc<dyn CredentialStore>,
}

impl EnrollmentPresenter {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// The scannable enrollment payload for the current account
    pub async fn qr_payload(&self) -> Result<String, EnrollmentError> {
        let credentials = self
            .store
            .get()
            .await
            .ok_or(EnrollmentError::NotSignedIn)?;

        info!("Rendering enrollment code for {}", credentials.display_name);
        Ok(qr::encode_enrollment(&credentials.auth_token))
    }

    /// The enrollment payload rendered as a PNG of roughly `size` pixels
    pub async fn qr_png(&self, size: u32) -> Result<Vec<u8>, EnrollmentError> {
        let payload = self.qr_payload().await?;
        Ok(qr::render_png(&payload, size)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::credentials::{Credentials, MemoryCredentialStore};
    use handoff_core::qr::{decode, ScanPayload};

    #[tokio::test]
    async fn test_payload_embeds_stored_token() {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .set(Credentials::new("bearer-xyz", "MANAGER", "Ann Lee"))
            .await
            .unwrap();

        let presenter = EnrollmentPresenter::new(store);
        let payload = presenter.qr_payload().await.unwrap();

        assert_eq!(
            decode(&payload),
            ScanPayload::Enrollment {
                token: "bearer-xyz".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_requires_signed_in_account() {
        let presenter = EnrollmentPresenter::new(Arc::new(MemoryCredentialStore::new()));
        let result = presenter.qr_payload().await;
        assert!(matches!(result, Err(EnrollmentError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_png_rendering() {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .set(Credentials::new("bearer-xyz", "CLERK", "Bo"))
            .await
            .unwrap();

        let presenter = EnrollmentPresenter::new(store);
        let png = presenter.qr_png(240).await.unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
