//! # warden-audit
//!
//! The append-only audit trail and its masking helpers. Entries
//! carry only a one-way payload hash and pre-masked metadata;
//! masking happens before anything reaches [`AuditTrail::append`],
//! never after. Writes are best-effort relative to the action they
//! document: a failed write is surfaced in the logs but never blocks
//! the action.

pub mod entry;
pub mod masking;
pub mod trail;

pub use entry::{AuditDirection, AuditEntry, payload_digest};
pub use trail::{AuditTrail, PrivacyStatus};
