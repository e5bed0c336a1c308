use chrono::{DateTime, SecondsFormat, Utc};
use ring::hmac;
use serde_json::{Map, Value};
use std::path::Path;
use uuid::Uuid;

use warden_core::{ActionRequest, ActionType, Result, WardenError};

/// Required key length. The secret is provisioned out-of-band and
/// shared between Core and Gateway; rotation is a drop-in swap of
/// the key material.
pub const KEY_BYTES: usize = 32;

/// Env var consulted when no key file is given.
pub const KEY_ENV: &str = "WARDEN_SIGNING_KEY";

/// HMAC-SHA256 signing key for the IPC channel.
pub struct SigningKey {
    key: hmac::Key,
}

impl SigningKey {
    /// Build a key from raw bytes. Exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_BYTES {
            return Err(WardenError::Key(format!(
                "signing key must be {KEY_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, bytes),
        })
    }

    /// Build a key from a hex string (64 hex chars).
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| WardenError::Key(format!("signing key is not valid hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Load the key from a hex-encoded file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WardenError::Key(format!("cannot read {}: {e}", path.display())))?;
        Self::from_hex(&raw)
    }

    /// Load from a file if given, else from `WARDEN_SIGNING_KEY`.
    pub fn load_or_env(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }
        match std::env::var(KEY_ENV) {
            Ok(v) => Self::from_hex(&v),
            Err(_) => Err(WardenError::Key(format!(
                "no signing key file configured and {KEY_ENV} is not set"
            ))),
        }
    }

    /// Sign the canonical concatenation `id|timestamp|action|payload`.
    /// Returns the lowercase hex tag.
    pub fn sign(
        &self,
        id: &Uuid,
        timestamp: &DateTime<Utc>,
        action: ActionType,
        payload: &Map<String, Value>,
    ) -> String {
        let message = signing_message(id, timestamp, action, payload);
        let tag = hmac::sign(&self.key, message.as_bytes());
        hex::encode(tag.as_ref())
    }

    /// Constant-time verification of a hex signature.
    pub fn verify(
        &self,
        id: &Uuid,
        timestamp: &DateTime<Utc>,
        action: ActionType,
        payload: &Map<String, Value>,
        signature: &str,
    ) -> bool {
        let Ok(tag) = hex::decode(signature) else {
            return false;
        };
        let message = signing_message(id, timestamp, action, payload);
        hmac::verify(&self.key, message.as_bytes(), &tag).is_ok()
    }

    /// Verify a full request envelope.
    pub fn verify_request(&self, req: &ActionRequest) -> bool {
        self.verify(
            &req.id,
            &req.timestamp,
            req.action,
            &req.payload,
            &req.signature,
        )
    }
}

/// The exact byte string the HMAC covers. The timestamp is rendered
/// at microsecond precision so signer and verifier derive identical
/// bytes from the parsed envelope.
fn signing_message(
    id: &Uuid,
    timestamp: &DateTime<Utc>,
    action: ActionType,
    payload: &Map<String, Value>,
) -> String {
    format!(
        "{id}|{}|{}|{}",
        timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        action.as_str(),
        crate::canonical_json(&Value::Object(payload.clone()))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32]).unwrap()
    }

    fn payload() -> Map<String, Value> {
        match json!({"to": "a@example.com", "subject": "hi"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn sign_then_verify() {
        let k = key();
        let id = Uuid::new_v4();
        let ts = Utc::now();
        let sig = k.sign(&id, &ts, ActionType::EmailSend, &payload());
        assert!(k.verify(&id, &ts, ActionType::EmailSend, &payload(), &sig));
    }

    #[test]
    fn any_field_change_breaks_the_signature() {
        let k = key();
        let id = Uuid::new_v4();
        let ts = Utc::now();
        let sig = k.sign(&id, &ts, ActionType::EmailSend, &payload());

        assert!(!k.verify(&Uuid::new_v4(), &ts, ActionType::EmailSend, &payload(), &sig));
        assert!(!k.verify(
            &id,
            &(ts + chrono::Duration::microseconds(1)),
            ActionType::EmailSend,
            &payload(),
            &sig
        ));
        assert!(!k.verify(&id, &ts, ActionType::EmailDraft, &payload(), &sig));
        let mut tampered = payload();
        tampered.insert("subject".into(), json!("HI"));
        assert!(!k.verify(&id, &ts, ActionType::EmailSend, &tampered, &sig));
    }

    #[test]
    fn flipping_one_signature_bit_fails() {
        let k = key();
        let id = Uuid::new_v4();
        let ts = Utc::now();
        let sig = k.sign(&id, &ts, ActionType::WebFetch, &payload());
        let mut bytes = hex::decode(&sig).unwrap();
        bytes[0] ^= 0x01;
        let flipped = hex::encode(bytes);
        assert!(!k.verify(&id, &ts, ActionType::WebFetch, &payload(), &flipped));
    }

    #[test]
    fn payload_key_order_does_not_matter() {
        let k = key();
        let id = Uuid::new_v4();
        let ts = Utc::now();
        let a = match json!({"x": 1, "y": 2}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let b = match json!({"y": 2, "x": 1}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let sig = k.sign(&id, &ts, ActionType::WebFetch, &a);
        assert!(k.verify(&id, &ts, ActionType::WebFetch, &b, &sig));
    }

    #[test]
    fn non_hex_signature_is_rejected_not_a_panic() {
        let k = key();
        assert!(!k.verify(
            &Uuid::new_v4(),
            &Utc::now(),
            ActionType::WebFetch,
            &Map::new(),
            "not hex at all"
        ));
    }

    #[test]
    fn wrong_key_length_is_an_error() {
        assert!(SigningKey::from_bytes(&[0u8; 16]).is_err());
    }

    #[test]
    fn key_loads_from_hex_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipc.key");
        std::fs::write(&path, hex::encode([9u8; 32])).unwrap();
        let k = SigningKey::load(&path).unwrap();
        let id = Uuid::new_v4();
        let ts = Utc::now();
        let sig = k.sign(&id, &ts, ActionType::LocationRead, &Map::new());
        assert!(k.verify(&id, &ts, ActionType::LocationRead, &Map::new(), &sig));
    }
}
