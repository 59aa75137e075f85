//! Wire protocol shapes
//!
//! The relay carries exactly one interesting message per pairing attempt: the
//! approval published by the authorization service once the mobile device has
//! approved the session. Field names follow the wire's camelCase convention.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Relay topic for one pairing attempt (case-sensitive, one per session)
pub fn login_topic(session_id: &SessionId) -> String {
    format!("login/{session_id}")
}

/// Approval delivered over the relay topic upon mobile approval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalMessage {
    /// Opaque bearer credential minted for the approving account
    pub auth_token: String,
    /// Role claim used for post-login routing
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ApprovalMessage {
    /// Parse a raw relay message body
    ///
    /// Malformed bodies (bad JSON, missing or empty `authToken`) yield `None`
    /// and are treated as noise by the coordinator: the subscription stays
    /// open awaiting a well-formed message.
    pub fn parse(body: &str) -> Option<Self> {
        match serde_json::from_str::<ApprovalMessage>(body) {
            Ok(msg) if !msg.auth_token.is_empty() => Some(msg),
            Ok(_) => {
                warn!("Approval message missing authToken, ignoring");
                None
            }
            Err(e) => {
                warn!("Malformed approval message, ignoring: {}", e);
                None
            }
        }
    }

    /// Display name assembled from the optional name claims
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Result of resolving a scanned code against the business inventory
///
/// Produced by an external classification service and consumed read-only by
/// the mobile scan routing; the entity screens themselves live elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScanClassification {
    /// The code resolved to a purchase order
    #[serde(rename_all = "camelCase")]
    PurchaseOrder { order_id: String },
    /// The code resolved to a product
    #[serde(rename_all = "camelCase")]
    Product { product_id: String },
    /// The code matched both entity kinds; the caller must disambiguate
    #[serde(rename_all = "camelCase")]
    Ambiguous {
        order_id: String,
        product_id: String,
    },
    /// The code matched nothing
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_topic_convention() {
        let id = SessionId::from_raw("abc123");
        assert_eq!(login_topic(&id), "login/abc123");
    }

    #[test]
    fn test_parse_well_formed_approval() {
        let msg = ApprovalMessage::parse(
            r#"{"authToken":"t1","role":"MANAGER","firstName":"Ann","lastName":"Lee"}"#,
        )
        .unwrap();
        assert_eq!(msg.auth_token, "t1");
        assert_eq!(msg.role, "MANAGER");
        assert_eq!(msg.display_name(), "Ann Lee");
    }

    #[test]
    fn test_parse_without_names() {
        let msg = ApprovalMessage::parse(r#"{"authToken":"t2","role":"CLERK"}"#).unwrap();
        assert_eq!(msg.display_name(), "");
    }

    #[test]
    fn test_missing_auth_token_is_malformed() {
        assert!(ApprovalMessage::parse(r#"{"role":"MANAGER"}"#).is_none());
        assert!(ApprovalMessage::parse(r#"{"authToken":"","role":"MANAGER"}"#).is_none());
    }

    #[test]
    fn test_bad_json_is_malformed() {
        assert!(ApprovalMessage::parse("not json").is_none());
        assert!(ApprovalMessage::parse("").is_none());
    }

    #[test]
    fn test_classification_tags() {
        let json = r#"{"kind":"purchaseOrder","orderId":"po-7"}"#;
        let c: ScanClassification = serde_json::from_str(json).unwrap();
        assert_eq!(
            c,
            ScanClassification::PurchaseOrder {
                order_id: "po-7".to_string()
            }
        );
    }
}
