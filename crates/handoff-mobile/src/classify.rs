//! Scan classification contract
//!
//! Inventory screens share the scanner with the login flow. Resolving an
//! arbitrary scanned code into a business entity (purchase order, product,
//! both, or neither) is the job of an external service, consumed here
//! through a narrow request/response contract and nothing more.

use crate::scanner::{CameraSource, ScannerSession};
use handoff_core::protocol::ScanClassification;
use thiserror::Error;
use tracing::debug;

/// Classification errors
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Classification request failed: {0}")]
    Request(String),
    #[error("Malformed classification response: {0}")]
    Malformed(String),
}

/// External resolution of a scanned code into a business entity
#[async_trait::async_trait]
pub trait ScanClassifier: Send + Sync {
    async fn classify(&self, code: &str) -> Result<ScanClassification, ClassifyError>;
}

/// HTTP client for the classification endpoint
pub struct HttpScanClassifier {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpScanClassifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[async_trait::async_trait]
impl ScanClassifier for HttpScanClassifier {
    async fn classify(&self, code: &str) -> Result<ScanClassification, ClassifyError> {
        let url = format!("{}/api/scans/classify", self.base_url);
        let mut request = self.client.get(&url).query(&[("code", code)]);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassifyError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassifyError::Request(response.status().to_string()));
        }

        let classification = response
            .json::<ScanClassification>()
            .await
            .map_err(|e| ClassifyError::Malformed(e.to_string()))?;

        debug!("Code classified as {:?}", classification);
        Ok(classification)
    }
}

/// Typed destination for an inventory scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryRoute {
    /// Open the purchase-order screen
    PurchaseOrder { order_id: String },
    /// Open the product screen
    Product { product_id: String },
    /// The code matched both; the user picks
    Disambiguate {
        order_id: String,
        product_id: String,
    },
    /// Nothing matched; keep the raw code for display
    NotFound { code: String },
}

/// Resolve the next scanned code into a routing decision
///
/// Shares the scanner with the login flow: one decode is consumed, sent to
/// the classification service, and mapped read-only onto a route. Returns
/// `Ok(None)` once the scanner has stopped (feed ended or idled out).
pub async fn route_next_scan<S: CameraSource>(
    classifier: &dyn ScanClassifier,
    scanner: &mut ScannerSession<S>,
) -> Result<Option<InventoryRoute>, ClassifyError> {
    let code = match scanner.next_decode().await {
        Some(code) => code,
        None => return Ok(None),
    };

    let route = match classifier.classify(&code).await? {
        ScanClassification::PurchaseOrder { order_id } => {
            InventoryRoute::PurchaseOrder { order_id }
        }
        ScanClassification::Product { product_id } => InventoryRoute::Product { product_id },
        ScanClassification::Ambiguous {
            order_id,
            product_id,
        } => InventoryRoute::Disambiguate {
            order_id,
            product_id,
        },
        ScanClassification::Unknown => InventoryRoute::NotFound { code },
    };
    Ok(Some(route))
}
