use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use warden_core::{Result, WardenError};
use warden_store::{AuditRow, Store};

use crate::entry::{AuditDirection, AuditEntry};

/// Operational summary of the trail, cheap enough for a status
/// endpoint. Contains no payload material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyStatus {
    pub entry_count: u64,
    pub last_entry_at: Option<DateTime<Utc>>,
}

/// Append-only audit trail over the store.
pub struct AuditTrail {
    store: Arc<Store>,
}

impl AuditTrail {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Append an entry. Entries are immutable once written.
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.store.append_audit(&entry.to_row())
    }

    /// Best-effort append: a failed audit write must never block or
    /// fail the action it documents, but it is surfaced loudly.
    pub fn record(&self, entry: &AuditEntry) {
        if let Err(e) = self.append(entry) {
            error!(
                action = %entry.action,
                direction = entry.direction.as_str(),
                error = %e,
                "audit write failed; continuing without it"
            );
        }
    }

    /// Recent entries, newest first.
    pub fn recent(&self, limit: usize, offset: usize) -> Result<Vec<AuditEntry>> {
        self.store
            .recent_audit(limit, offset)?
            .iter()
            .map(entry_from_row)
            .collect()
    }

    /// Entries with `from <= timestamp < to`.
    pub fn range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<AuditEntry>> {
        self.store
            .audit_range(&from.to_rfc3339(), &to.to_rfc3339())?
            .iter()
            .map(entry_from_row)
            .collect()
    }

    pub fn count(&self) -> Result<u64> {
        self.store.audit_count()
    }

    pub fn privacy_status(&self) -> Result<PrivacyStatus> {
        let last_entry_at = match self.store.last_audit_timestamp()? {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| WardenError::Audit(format!("bad timestamp {raw:?}: {e}")))?,
            ),
            None => None,
        };
        Ok(PrivacyStatus {
            entry_count: self.store.audit_count()?,
            last_entry_at,
        })
    }
}

fn entry_from_row(row: &AuditRow) -> Result<AuditEntry> {
    Ok(AuditEntry {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| WardenError::Audit(format!("bad audit id {:?}: {e}", row.id)))?,
        timestamp: DateTime::parse_from_rfc3339(&row.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| WardenError::Audit(format!("bad timestamp {:?}: {e}", row.timestamp)))?,
        action: row
            .action
            .parse()
            .map_err(|_| WardenError::Audit(format!("unknown action {:?}", row.action)))?,
        direction: match row.direction.as_str() {
            "request" => AuditDirection::Request,
            "response" => AuditDirection::Response,
            other => {
                return Err(WardenError::Audit(format!("unknown direction {other:?}")));
            }
        },
        status: row.status.clone(),
        payload_hash: row.payload_hash.clone(),
        signature: row.signature.clone(),
        metadata: serde_json::from_str(&row.metadata).unwrap_or(serde_json::Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::payload_digest;
    use serde_json::{json, Map};
    use warden_core::ActionType;

    fn entry(action: ActionType, status: &str) -> AuditEntry {
        AuditEntry::new(
            action,
            AuditDirection::Request,
            status,
            payload_digest(&Map::new()),
            "sig",
            json!({"note": "masked"}),
        )
    }

    #[test]
    fn append_then_read_back() {
        let trail = AuditTrail::new(Arc::new(Store::open_in_memory().unwrap()));
        let e = entry(ActionType::EmailRead, "ok");
        trail.append(&e).unwrap();

        let recent = trail.recent(10, 0).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, e.id);
        assert_eq!(recent[0].action, ActionType::EmailRead);
        assert_eq!(recent[0].metadata["note"], "masked");
        assert_eq!(trail.count().unwrap(), 1);
    }

    #[test]
    fn record_swallows_write_failures() {
        let trail = AuditTrail::new(Arc::new(Store::open_in_memory().unwrap()));
        let e = entry(ActionType::WebFetch, "ok");
        trail.append(&e).unwrap();
        // Same id again: the unique constraint fails, record shrugs.
        trail.record(&e);
        assert_eq!(trail.count().unwrap(), 1);
    }

    #[test]
    fn privacy_status_reports_latest_entry() {
        let trail = AuditTrail::new(Arc::new(Store::open_in_memory().unwrap()));
        let status = trail.privacy_status().unwrap();
        assert_eq!(status.entry_count, 0);
        assert!(status.last_entry_at.is_none());

        trail.append(&entry(ActionType::WebFetch, "ok")).unwrap();
        let status = trail.privacy_status().unwrap();
        assert_eq!(status.entry_count, 1);
        assert!(status.last_entry_at.is_some());
    }

    #[test]
    fn range_is_half_open() {
        let trail = AuditTrail::new(Arc::new(Store::open_in_memory().unwrap()));
        let e = entry(ActionType::WebFetch, "ok");
        trail.append(&e).unwrap();
        let hits = trail
            .range(e.timestamp, e.timestamp + chrono::Duration::seconds(1))
            .unwrap();
        assert_eq!(hits.len(), 1);
        let misses = trail
            .range(
                e.timestamp - chrono::Duration::seconds(2),
                e.timestamp - chrono::Duration::seconds(1),
            )
            .unwrap();
        assert!(misses.is_empty());
    }
}
