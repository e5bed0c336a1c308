use chrono::{DateTime, Utc};
use ring::digest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use warden_core::ActionType;
use warden_store::AuditRow;

/// Which side of an exchange an entry documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDirection {
    Request,
    Response,
}

/// One immutable audit record. `metadata` must already be masked by
/// the caller; the payload itself is only ever present as a one-way
/// hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: ActionType,
    pub direction: AuditDirection,
    pub status: String,
    pub payload_hash: String,
    pub signature: String,
    pub metadata: Value,
}

impl AuditEntry {
    pub fn new(
        action: ActionType,
        direction: AuditDirection,
        status: impl Into<String>,
        payload_hash: String,
        signature: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            direction,
            status: status.into(),
            payload_hash,
            signature: signature.into(),
            metadata,
        }
    }

    pub(crate) fn to_row(&self) -> AuditRow {
        AuditRow {
            id: self.id.to_string(),
            timestamp: self.timestamp.to_rfc3339(),
            action: self.action.as_str().to_string(),
            direction: match self.direction {
                AuditDirection::Request => "request".into(),
                AuditDirection::Response => "response".into(),
            },
            status: self.status.clone(),
            payload_hash: self.payload_hash.clone(),
            signature: self.signature.clone(),
            metadata: self.metadata.to_string(),
        }
    }
}

impl AuditDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

/// One-way SHA-256 digest of a payload's canonical form — the only
/// trace of the payload the trail keeps.
pub fn payload_digest(payload: &Map<String, Value>) -> String {
    let canonical = warden_codec::canonical_json(&Value::Object(payload.clone()));
    let hash = digest::digest(&digest::SHA256, canonical.as_bytes());
    hex::encode(hash.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digest_is_stable_across_key_order() {
        let a = match json!({"x": 1, "y": 2}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let b = match json!({"y": 2, "x": 1}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert_eq!(payload_digest(&a), payload_digest(&b));
        assert_eq!(payload_digest(&a).len(), 64);
    }

    #[test]
    fn digest_changes_with_content() {
        let a = match json!({"x": 1}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let b = match json!({"x": 2}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert_ne!(payload_digest(&a), payload_digest(&b));
    }
}
