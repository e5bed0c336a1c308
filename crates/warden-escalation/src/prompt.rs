use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use warden_core::{ActionType, AutonomyTier, Domain, Result, WardenError};
use warden_store::PromptRow;

/// Which tier transition a prompt proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    GuardianToPartner,
    PartnerToAlterEgo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    Pending,
    Accepted,
    Dismissed,
    Expired,
}

/// A proposal to loosen one domain's autonomy tier, shown to the
/// user with the concrete pattern that earned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPrompt {
    pub id: Uuid,
    pub prompt_type: PromptType,
    pub domain: Domain,
    pub action_type: ActionType,
    pub consecutive_approvals: u32,
    pub message: String,
    pub preview_actions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: PromptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl PromptType {
    /// Tier the domain must currently be at for this prompt to make
    /// sense.
    pub fn required_tier(&self) -> AutonomyTier {
        match self {
            Self::GuardianToPartner => AutonomyTier::Guardian,
            Self::PartnerToAlterEgo => AutonomyTier::Partner,
        }
    }

    /// Tier an accepted prompt moves the domain to.
    pub fn target_tier(&self) -> AutonomyTier {
        match self {
            Self::GuardianToPartner => AutonomyTier::Partner,
            Self::PartnerToAlterEgo => AutonomyTier::AlterEgo,
        }
    }

    /// How long a dismissal suppresses new prompts of this type for
    /// the same domain.
    pub fn cooldown(&self) -> Duration {
        match self {
            Self::GuardianToPartner => Duration::days(7),
            Self::PartnerToAlterEgo => Duration::days(14),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuardianToPartner => "guardian_to_partner",
            Self::PartnerToAlterEgo => "partner_to_alter_ego",
        }
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptType {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "guardian_to_partner" => Ok(Self::GuardianToPartner),
            "partner_to_alter_ego" => Ok(Self::PartnerToAlterEgo),
            other => Err(WardenError::Escalation(format!(
                "unknown prompt type: {other}"
            ))),
        }
    }
}

impl PromptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Dismissed => "dismissed",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for PromptStatus {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "dismissed" => Ok(Self::Dismissed),
            "expired" => Ok(Self::Expired),
            other => Err(WardenError::Escalation(format!(
                "unknown prompt status: {other}"
            ))),
        }
    }
}

impl EscalationPrompt {
    /// Whether `expires_at` has passed (for a still-pending prompt).
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PromptStatus::Pending && self.expires_at <= now
    }

    pub(crate) fn to_row(&self) -> PromptRow {
        PromptRow {
            id: self.id.to_string(),
            prompt_type: self.prompt_type.as_str().to_string(),
            domain: self.domain.as_str().to_string(),
            action_type: self.action_type.as_str().to_string(),
            consecutive_approvals: i64::from(self.consecutive_approvals),
            message: self.message.clone(),
            preview_actions: serde_json::to_string(&self.preview_actions)
                .unwrap_or_else(|_| "[]".into()),
            created_at: self.created_at.to_rfc3339(),
            expires_at: self.expires_at.to_rfc3339(),
            status: self.status.as_str().to_string(),
            responded_at: self.responded_at.map(|t| t.to_rfc3339()),
        }
    }

    pub(crate) fn from_row(row: &PromptRow) -> Result<Self> {
        let parse_ts = |s: &str| -> Result<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| WardenError::Escalation(format!("bad timestamp {s:?}: {e}")))
        };
        Ok(Self {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| WardenError::Escalation(format!("bad prompt id {:?}: {e}", row.id)))?,
            prompt_type: row.prompt_type.parse()?,
            domain: row
                .domain
                .parse()
                .map_err(|_| WardenError::Escalation(format!("unknown domain {:?}", row.domain)))?,
            action_type: row.action_type.parse().map_err(|_| {
                WardenError::Escalation(format!("unknown action {:?}", row.action_type))
            })?,
            consecutive_approvals: row.consecutive_approvals.max(0) as u32,
            message: row.message.clone(),
            preview_actions: serde_json::from_str(&row.preview_actions).unwrap_or_default(),
            created_at: parse_ts(&row.created_at)?,
            expires_at: parse_ts(&row.expires_at)?,
            status: row.status.parse()?,
            responded_at: match &row.responded_at {
                Some(s) => Some(parse_ts(s)?),
                None => None,
            },
        })
    }
}
