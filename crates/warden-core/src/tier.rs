use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-domain trust level chosen by the user.
///
/// - **Guardian**: every action requires confirmation, whatever its
///   risk.
/// - **Partner**: routine reads and writes run on their own; execute
///   actions still ask first.
/// - **AlterEgo**: everything runs on its own except the permanent
///   sensitive-execute carve-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyTier {
    Guardian,
    Partner,
    AlterEgo,
}

/// Outcome of the decision matrix for a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AutoApprove,
    RequiresApproval,
    Blocked,
}

impl AutonomyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guardian => "guardian",
            Self::Partner => "partner",
            Self::AlterEgo => "alter_ego",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Guardian => "Every action requires confirmation",
            Self::Partner => "Reads and writes run autonomously, execute actions ask first",
            Self::AlterEgo => "Fully autonomous except permanently protected actions",
        }
    }
}

impl fmt::Display for AutonomyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutonomyTier {
    type Err = crate::WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guardian" => Ok(Self::Guardian),
            "partner" => Ok(Self::Partner),
            "alter_ego" => Ok(Self::AlterEgo),
            other => Err(crate::WardenError::Config(format!(
                "unknown autonomy tier: {other}"
            ))),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AutoApprove => "auto_approve",
            Self::RequiresApproval => "requires_approval",
            Self::Blocked => "blocked",
        })
    }
}
