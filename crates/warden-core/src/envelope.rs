use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::ActionType;

/// Fixed `source` field on every request the Core emits.
pub const REQUEST_SOURCE: &str = "core";

/// A signed action request, Core → Gateway.
///
/// `signature` is the hex HMAC-SHA256 over
/// `id|timestamp|action|canonical(payload)`; the receiver rejects on
/// mismatch before the request reaches any business logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: ActionType,
    pub payload: Map<String, Value>,
    pub source: String,
    pub signature: String,
}

/// Response to a prior [`ActionRequest`], correlated by `request_id`.
/// Responses with no matching pending request are dropped, never
/// errored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
    /// Signature or envelope validation failed.
    Rejected,
    RequiresApproval,
    Blocked,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Rejected => "rejected",
            Self::RequiresApproval => "requires_approval",
            Self::Blocked => "blocked",
        }
    }
}

impl ActionResponse {
    pub fn ok(request_id: Uuid, data: Value, audit_ref: Option<String>) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            status: ResponseStatus::Ok,
            data: Some(data),
            error: None,
            audit_ref,
        }
    }

    pub fn failure(request_id: Uuid, status: ResponseStatus, error: impl Into<String>) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            status,
            data: None,
            error: Some(error.into()),
            audit_ref: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_wire_field_names() {
        let req = ActionRequest {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action: ActionType::EmailRead,
            payload: Map::new(),
            source: REQUEST_SOURCE.into(),
            signature: "00".into(),
        };
        let v: Value = serde_json::to_value(&req).unwrap();
        assert_eq!(v["action"], "email_read");
        assert_eq!(v["source"], "core");
        assert!(v["signature"].is_string());
    }

    #[test]
    fn response_omits_empty_optionals() {
        let resp = ActionResponse::failure(Uuid::new_v4(), ResponseStatus::Blocked, "nope");
        let v: Value = serde_json::to_value(&resp).unwrap();
        assert!(v.get("data").is_none());
        assert!(v.get("audit_ref").is_none());
        assert_eq!(v["status"], "blocked");
    }
}
