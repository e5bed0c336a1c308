//! # warden-store
//!
//! SQLite persistence for the mediation layer: per-domain autonomy
//! tiers, escalation prompts, and the append-only audit log. One
//! connection behind a mutex, WAL mode, atomic single-row upserts.
//! Engines deal in typed enums; this crate stores their string
//! forms and hands back raw rows.

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use warden_core::{Result, WardenError};

/// A raw escalation prompt row.
#[derive(Debug, Clone)]
pub struct PromptRow {
    pub id: String,
    pub prompt_type: String,
    pub domain: String,
    pub action_type: String,
    pub consecutive_approvals: i64,
    pub message: String,
    /// JSON array of action names shown as a preview.
    pub preview_actions: String,
    pub created_at: String,
    pub expires_at: String,
    pub status: String,
    pub responded_at: Option<String>,
}

/// A raw audit log row. Metadata is pre-masked JSON; nothing
/// sensitive ever reaches this struct.
#[derive(Debug, Clone)]
pub struct AuditRow {
    pub id: String,
    pub timestamp: String,
    pub action: String,
    pub direction: String,
    pub status: String,
    pub payload_hash: String,
    pub signature: String,
    pub metadata: String,
}

/// The shared store handle.
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening warden store");

        let conn = Connection::open(path).map_err(|e| WardenError::Store(e.to_string()))?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| WardenError::Store(e.to_string()))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS autonomy_tiers (
                domain TEXT PRIMARY KEY,
                tier TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS escalation_prompts (
                id TEXT PRIMARY KEY,
                prompt_type TEXT NOT NULL,
                domain TEXT NOT NULL,
                action_type TEXT NOT NULL,
                consecutive_approvals INTEGER NOT NULL,
                message TEXT NOT NULL,
                preview_actions TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                responded_at TEXT
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                action TEXT NOT NULL,
                direction TEXT NOT NULL,
                status TEXT NOT NULL,
                payload_hash TEXT NOT NULL,
                signature TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            );

            CREATE INDEX IF NOT EXISTS idx_prompts_key
                ON escalation_prompts(domain, prompt_type, created_at);
            CREATE INDEX IF NOT EXISTS idx_prompts_status
                ON escalation_prompts(status);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp
                ON audit_log(timestamp);
            ",
        )
        .map_err(|e| WardenError::Store(e.to_string()))?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    // ── Autonomy tiers ─────────────────────────────────────────

    /// Upsert the tier for a domain. Last write wins.
    pub fn upsert_tier(&self, domain: &str, tier: &str) -> Result<()> {
        let db = self.db.lock();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO autonomy_tiers (domain, tier, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(domain) DO UPDATE SET
                tier = excluded.tier,
                updated_at = excluded.updated_at",
            rusqlite::params![domain, tier, now],
        )
        .map_err(|e| WardenError::Store(e.to_string()))?;
        Ok(())
    }

    /// Persisted tier for a domain, if any override exists.
    pub fn get_tier(&self, domain: &str) -> Result<Option<String>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT tier FROM autonomy_tiers WHERE domain = ?1")
            .map_err(|e| WardenError::Store(e.to_string()))?;
        let tier = stmt
            .query_row(rusqlite::params![domain], |row| row.get::<_, String>(0))
            .ok();
        Ok(tier)
    }

    /// All persisted (domain, tier) overrides.
    pub fn all_tiers(&self) -> Result<Vec<(String, String)>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT domain, tier FROM autonomy_tiers ORDER BY domain")
            .map_err(|e| WardenError::Store(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| WardenError::Store(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ── Escalation prompts ─────────────────────────────────────

    pub fn insert_prompt(&self, prompt: &PromptRow) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO escalation_prompts
                (id, prompt_type, domain, action_type, consecutive_approvals,
                 message, preview_actions, created_at, expires_at, status, responded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                prompt.id,
                prompt.prompt_type,
                prompt.domain,
                prompt.action_type,
                prompt.consecutive_approvals,
                prompt.message,
                prompt.preview_actions,
                prompt.created_at,
                prompt.expires_at,
                prompt.status,
                prompt.responded_at,
            ],
        )
        .map_err(|e| WardenError::Store(e.to_string()))?;
        Ok(())
    }

    pub fn get_prompt(&self, id: &str) -> Result<Option<PromptRow>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(&format!(
                "SELECT {PROMPT_COLUMNS} FROM escalation_prompts WHERE id = ?1"
            ))
            .map_err(|e| WardenError::Store(e.to_string()))?;
        let row = stmt
            .query_row(rusqlite::params![id], prompt_from_row)
            .ok();
        Ok(row)
    }

    /// Prompts for a (domain, prompt type) key, newest first.
    pub fn prompts_for(&self, domain: &str, prompt_type: &str) -> Result<Vec<PromptRow>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(&format!(
                "SELECT {PROMPT_COLUMNS} FROM escalation_prompts
                 WHERE domain = ?1 AND prompt_type = ?2
                 ORDER BY created_at DESC"
            ))
            .map_err(|e| WardenError::Store(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params![domain, prompt_type], prompt_from_row)
            .map_err(|e| WardenError::Store(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// All prompts currently marked pending, oldest first. Lazy
    /// expiry is the engine's job; this is the raw read.
    pub fn pending_prompts(&self) -> Result<Vec<PromptRow>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(&format!(
                "SELECT {PROMPT_COLUMNS} FROM escalation_prompts
                 WHERE status = 'pending'
                 ORDER BY created_at ASC"
            ))
            .map_err(|e| WardenError::Store(e.to_string()))?;
        let rows = stmt
            .query_map([], prompt_from_row)
            .map_err(|e| WardenError::Store(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn update_prompt_status(
        &self,
        id: &str,
        status: &str,
        responded_at: Option<&str>,
    ) -> Result<()> {
        let db = self.db.lock();
        let changed = db
            .execute(
                "UPDATE escalation_prompts SET status = ?2, responded_at = ?3 WHERE id = ?1",
                rusqlite::params![id, status, responded_at],
            )
            .map_err(|e| WardenError::Store(e.to_string()))?;
        if changed == 0 {
            return Err(WardenError::PromptNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Accept a prompt and set the target tier in one transaction,
    /// so tier and prompt status can never disagree.
    pub fn accept_prompt(&self, id: &str, domain: &str, tier: &str) -> Result<()> {
        let mut db = self.db.lock();
        let now = chrono::Utc::now().to_rfc3339();
        let tx = db
            .transaction()
            .map_err(|e| WardenError::Store(e.to_string()))?;
        let changed = tx
            .execute(
                "UPDATE escalation_prompts
                 SET status = 'accepted', responded_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![id, now],
            )
            .map_err(|e| WardenError::Store(e.to_string()))?;
        if changed == 0 {
            return Err(WardenError::PromptNotFound(id.to_string()));
        }
        tx.execute(
            "INSERT INTO autonomy_tiers (domain, tier, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(domain) DO UPDATE SET
                tier = excluded.tier,
                updated_at = excluded.updated_at",
            rusqlite::params![domain, tier, now],
        )
        .map_err(|e| WardenError::Store(e.to_string()))?;
        tx.commit().map_err(|e| WardenError::Store(e.to_string()))?;
        Ok(())
    }

    // ── Audit log ──────────────────────────────────────────────

    /// Append an audit row. Rows are immutable once written; there
    /// is deliberately no update path.
    pub fn append_audit(&self, row: &AuditRow) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO audit_log
                (id, timestamp, action, direction, status, payload_hash, signature, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                row.id,
                row.timestamp,
                row.action,
                row.direction,
                row.status,
                row.payload_hash,
                row.signature,
                row.metadata,
            ],
        )
        .map_err(|e| WardenError::Store(e.to_string()))?;
        Ok(())
    }

    /// Recent audit rows, newest first, with pagination.
    pub fn recent_audit(&self, limit: usize, offset: usize) -> Result<Vec<AuditRow>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log
                 ORDER BY timestamp DESC LIMIT ?1 OFFSET ?2"
            ))
            .map_err(|e| WardenError::Store(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::params![limit as i64, offset as i64],
                audit_from_row,
            )
            .map_err(|e| WardenError::Store(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Audit rows whose timestamp falls in `[from, to)`.
    pub fn audit_range(&self, from: &str, to: &str) -> Result<Vec<AuditRow>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY timestamp ASC"
            ))
            .map_err(|e| WardenError::Store(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params![from, to], audit_from_row)
            .map_err(|e| WardenError::Store(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn audit_count(&self) -> Result<u64> {
        let db = self.db.lock();
        let count: i64 = db
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(|e| WardenError::Store(e.to_string()))?;
        Ok(count as u64)
    }

    pub fn last_audit_timestamp(&self) -> Result<Option<String>> {
        let db = self.db.lock();
        let ts = db
            .query_row(
                "SELECT timestamp FROM audit_log ORDER BY timestamp DESC LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .ok();
        Ok(ts)
    }
}

const PROMPT_COLUMNS: &str = "id, prompt_type, domain, action_type, consecutive_approvals, \
     message, preview_actions, created_at, expires_at, status, responded_at";

const AUDIT_COLUMNS: &str =
    "id, timestamp, action, direction, status, payload_hash, signature, metadata";

fn prompt_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PromptRow> {
    Ok(PromptRow {
        id: row.get(0)?,
        prompt_type: row.get(1)?,
        domain: row.get(2)?,
        action_type: row.get(3)?,
        consecutive_approvals: row.get(4)?,
        message: row.get(5)?,
        preview_actions: row.get(6)?,
        created_at: row.get(7)?,
        expires_at: row.get(8)?,
        status: row.get(9)?,
        responded_at: row.get(10)?,
    })
}

fn audit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRow> {
    Ok(AuditRow {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        action: row.get(2)?,
        direction: row.get(3)?,
        status: row.get(4)?,
        payload_hash: row.get(5)?,
        signature: row.get(6)?,
        metadata: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(id: &str, domain: &str) -> PromptRow {
        PromptRow {
            id: id.into(),
            prompt_type: "guardian_to_partner".into(),
            domain: domain.into(),
            action_type: "email_draft".into(),
            consecutive_approvals: 10,
            message: "msg".into(),
            preview_actions: "[]".into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            expires_at: chrono::Utc::now().to_rfc3339(),
            status: "pending".into(),
            responded_at: None,
        }
    }

    #[test]
    fn tier_upsert_is_last_write_wins() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_tier("email").unwrap().is_none());
        store.upsert_tier("email", "guardian").unwrap();
        store.upsert_tier("email", "partner").unwrap();
        assert_eq!(store.get_tier("email").unwrap().unwrap(), "partner");
        assert_eq!(store.all_tiers().unwrap().len(), 1);
    }

    #[test]
    fn accept_prompt_sets_tier_and_status_atomically() {
        let store = Store::open_in_memory().unwrap();
        store.insert_prompt(&prompt("p1", "email")).unwrap();
        store.accept_prompt("p1", "email", "partner").unwrap();
        assert_eq!(store.get_tier("email").unwrap().unwrap(), "partner");
        assert_eq!(store.get_prompt("p1").unwrap().unwrap().status, "accepted");
    }

    #[test]
    fn accept_unknown_prompt_changes_nothing() {
        let store = Store::open_in_memory().unwrap();
        let err = store.accept_prompt("nope", "email", "partner");
        assert!(err.is_err());
        assert!(store.get_tier("email").unwrap().is_none());
    }

    #[test]
    fn accept_already_resolved_prompt_is_an_error() {
        let store = Store::open_in_memory().unwrap();
        store.insert_prompt(&prompt("p1", "email")).unwrap();
        store
            .update_prompt_status("p1", "dismissed", Some("2026-01-01T00:00:00Z"))
            .unwrap();
        assert!(store.accept_prompt("p1", "email", "partner").is_err());
        assert!(store.get_tier("email").unwrap().is_none());
    }

    #[test]
    fn audit_rows_paginate_newest_first() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .append_audit(&AuditRow {
                    id: format!("a{i}"),
                    timestamp: format!("2026-01-0{}T00:00:00Z", i + 1),
                    action: "email_read".into(),
                    direction: "request".into(),
                    status: "ok".into(),
                    payload_hash: "h".into(),
                    signature: "s".into(),
                    metadata: "{}".into(),
                })
                .unwrap();
        }
        assert_eq!(store.audit_count().unwrap(), 5);
        let page = store.recent_audit(2, 1).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, "a3");
        assert_eq!(page[1].id, "a2");
        assert_eq!(
            store.last_audit_timestamp().unwrap().unwrap(),
            "2026-01-05T00:00:00Z"
        );
        let range = store
            .audit_range("2026-01-02T00:00:00Z", "2026-01-04T00:00:00Z")
            .unwrap();
        assert_eq!(range.len(), 2);
    }
}
