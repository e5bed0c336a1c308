use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::ActionType;

/// Approval history for one action type, maintained by the
/// execution layer and fed here read-only. Any rejection resets
/// `consecutive_approvals` at the source; this crate never mutates
/// a pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPattern {
    pub action_type: ActionType,
    /// Optional sub-classification, e.g. a recipient group or
    /// calendar name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub consecutive_approvals: u32,
    pub total_approvals: u32,
    pub total_rejections: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_approval_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rejection_at: Option<DateTime<Utc>>,
    /// Threshold the execution layer uses for per-action
    /// auto-execute; carried through for prompt copy.
    pub auto_execute_threshold: u32,
}

impl ApprovalPattern {
    /// Label used in prompt preview lists: the action name, plus
    /// the subtype when present.
    pub fn label(&self) -> String {
        match &self.subtype {
            Some(sub) => format!("{} ({sub})", self.action_type),
            None => self.action_type.to_string(),
        }
    }
}
