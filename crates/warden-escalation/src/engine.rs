use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use warden_autonomy::DecisionEngine;
use warden_core::{AutonomyTier, Domain, Event, Result, WardenError};
use warden_store::Store;

use crate::pattern::ApprovalPattern;
use crate::prompt::{EscalationPrompt, PromptStatus, PromptType};

/// Consecutive approvals required before proposing guardian→partner.
pub const GUARDIAN_TO_PARTNER_STREAK: u32 = 10;
/// Consecutive approvals required before proposing partner→alter_ego.
pub const PARTNER_TO_ALTER_EGO_STREAK: u32 = 5;
/// Total approvals required before proposing partner→alter_ego.
pub const PARTNER_TO_ALTER_EGO_TOTAL: u32 = 14;
/// A guardian→partner streak only counts while the latest approval
/// is this fresh; dormant domains never escalate off stale history.
pub const APPROVAL_RECENCY_DAYS: i64 = 30;
/// How long a pending prompt waits for an answer before expiring.
pub const PROMPT_TTL_HOURS: i64 = 72;

/// Proposes tier escalations from approval patterns, one open
/// question per (domain, transition) at a time.
pub struct EscalationEngine {
    store: Arc<Store>,
    decisions: Arc<DecisionEngine>,
    assistant_name: String,
}

impl EscalationEngine {
    pub fn new(store: Arc<Store>, decisions: Arc<DecisionEngine>, assistant_name: String) -> Self {
        Self {
            store,
            decisions,
            assistant_name,
        }
    }

    /// Scan approval patterns and create prompts for every
    /// (domain, transition) that qualifies and is not already being
    /// asked about or cooling down from a dismissal.
    ///
    /// When several patterns in one domain qualify at once, the
    /// first creates the prompt and gates the rest; the prompt names
    /// the pattern that triggered it.
    pub fn check_for_escalations(
        &self,
        patterns: &[ApprovalPattern],
    ) -> Result<Vec<EscalationPrompt>> {
        let now = Utc::now();
        self.expire_overdue(now)?;

        let mut created = Vec::new();
        let mut claimed: HashSet<(Domain, PromptType)> = HashSet::new();

        for pattern in patterns {
            let domain = pattern.action_type.domain();
            let tier = self.decisions.domain_tier(domain);

            let Some(prompt_type) = qualifying_transition(pattern, tier, now) else {
                continue;
            };
            if claimed.contains(&(domain, prompt_type)) {
                continue;
            }
            if self.has_active_or_cooling(domain, prompt_type, now)? {
                debug!(%domain, transition = %prompt_type, "escalation suppressed by active prompt or cooldown");
                continue;
            }

            let prompt = self.build_prompt(pattern, domain, prompt_type, now);
            self.store.insert_prompt(&prompt.to_row())?;
            info!(
                prompt_id = %prompt.id,
                %domain,
                transition = %prompt_type,
                streak = pattern.consecutive_approvals,
                "escalation prompt created"
            );
            self.decisions.events().publish(Event::EscalationCreated {
                prompt_id: prompt.id,
                domain,
            });
            claimed.insert((domain, prompt_type));
            created.push(prompt);
        }

        Ok(created)
    }

    /// Record the user's answer. Accepting moves the domain to the
    /// target tier in the same transaction that resolves the prompt;
    /// dismissing starts the per-transition cooldown.
    pub fn record_response(&self, prompt_id: Uuid, accepted: bool) -> Result<EscalationPrompt> {
        let id = prompt_id.to_string();
        let row = self
            .store
            .get_prompt(&id)?
            .ok_or_else(|| WardenError::PromptNotFound(id.clone()))?;
        let prompt = EscalationPrompt::from_row(&row)?;

        let now = Utc::now();
        if prompt.is_overdue(now) {
            self.store
                .update_prompt_status(&id, PromptStatus::Expired.as_str(), None)?;
            return Err(WardenError::Escalation(format!(
                "prompt {id} has expired"
            )));
        }
        if prompt.status != PromptStatus::Pending {
            return Err(WardenError::Escalation(format!(
                "prompt {id} is already {}",
                prompt.status.as_str()
            )));
        }

        if accepted {
            let target = prompt.prompt_type.target_tier();
            self.store
                .accept_prompt(&id, prompt.domain.as_str(), target.as_str())?;
            // Refresh the engine's view of the domain; this also
            // publishes TierChanged for subscribers.
            self.decisions.reload_domain(prompt.domain)?;
            info!(prompt_id = %prompt.id, domain = %prompt.domain, tier = %target, "escalation accepted");
        } else {
            self.store.update_prompt_status(
                &id,
                PromptStatus::Dismissed.as_str(),
                Some(&now.to_rfc3339()),
            )?;
            info!(prompt_id = %prompt.id, domain = %prompt.domain, "escalation dismissed, cooldown started");
        }

        self.decisions.events().publish(Event::EscalationResolved {
            prompt_id,
            accepted,
        });

        let row = self
            .store
            .get_prompt(&id)?
            .ok_or_else(|| WardenError::PromptNotFound(id))?;
        EscalationPrompt::from_row(&row)
    }

    /// Pending prompts, oldest first. Overdue prompts are
    /// transitioned to expired (and persisted) before the list is
    /// returned, so nothing stale ever shows as active.
    pub fn active_prompts(&self) -> Result<Vec<EscalationPrompt>> {
        let now = Utc::now();
        self.expire_overdue(now)?;
        self.store
            .pending_prompts()?
            .iter()
            .map(EscalationPrompt::from_row)
            .collect()
    }

    /// Fetch one prompt, lazily expiring it first if overdue.
    pub fn prompt(&self, prompt_id: Uuid) -> Result<Option<EscalationPrompt>> {
        let id = prompt_id.to_string();
        let Some(row) = self.store.get_prompt(&id)? else {
            return Ok(None);
        };
        let mut prompt = EscalationPrompt::from_row(&row)?;
        if prompt.is_overdue(Utc::now()) {
            self.store
                .update_prompt_status(&id, PromptStatus::Expired.as_str(), None)?;
            prompt.status = PromptStatus::Expired;
        }
        Ok(Some(prompt))
    }

    /// Persist `expired` for every pending prompt past its deadline.
    fn expire_overdue(&self, now: DateTime<Utc>) -> Result<()> {
        for row in self.store.pending_prompts()? {
            let prompt = EscalationPrompt::from_row(&row)?;
            if prompt.is_overdue(now) {
                debug!(prompt_id = %prompt.id, "expiring overdue escalation prompt");
                self.store
                    .update_prompt_status(&row.id, PromptStatus::Expired.as_str(), None)?;
            }
        }
        Ok(())
    }

    /// True when a pending prompt exists for (domain, transition) or
    /// a dismissal of that pair is still cooling down.
    fn has_active_or_cooling(
        &self,
        domain: Domain,
        prompt_type: PromptType,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        for row in self.store.prompts_for(domain.as_str(), prompt_type.as_str())? {
            let prompt = EscalationPrompt::from_row(&row)?;
            match prompt.status {
                PromptStatus::Pending => return Ok(true),
                PromptStatus::Dismissed => {
                    if let Some(at) = prompt.responded_at {
                        if now - at < prompt_type.cooldown() {
                            return Ok(true);
                        }
                    }
                }
                PromptStatus::Accepted | PromptStatus::Expired => {}
            }
        }
        Ok(false)
    }

    fn build_prompt(
        &self,
        pattern: &ApprovalPattern,
        domain: Domain,
        prompt_type: PromptType,
        now: DateTime<Utc>,
    ) -> EscalationPrompt {
        let name = &self.assistant_name;
        let message = match prompt_type {
            PromptType::GuardianToPartner => format!(
                "{name} has handled {} {} requests in a row that you approved. \
                 Allow {name} to take care of routine {domain} actions on its own? \
                 You'll still be asked before anything runs externally.",
                pattern.consecutive_approvals,
                pattern.label(),
            ),
            PromptType::PartnerToAlterEgo => format!(
                "{name} has completed {} {domain} actions — including {} {} in a row — \
                 without a single rejection. Let {name} act fully autonomously in {domain}? \
                 Sensitive actions, like sending on your behalf, will always ask first.",
                pattern.total_approvals,
                pattern.consecutive_approvals,
                pattern.label(),
            ),
        };

        EscalationPrompt {
            id: Uuid::new_v4(),
            prompt_type,
            domain,
            action_type: pattern.action_type,
            consecutive_approvals: pattern.consecutive_approvals,
            message,
            preview_actions: vec![pattern.label()],
            created_at: now,
            expires_at: now + Duration::hours(PROMPT_TTL_HOURS),
            status: PromptStatus::Pending,
            responded_at: None,
        }
    }
}

/// Which transition, if any, this pattern qualifies the domain for.
fn qualifying_transition(
    pattern: &ApprovalPattern,
    tier: AutonomyTier,
    now: DateTime<Utc>,
) -> Option<PromptType> {
    match tier {
        AutonomyTier::Guardian => {
            let recent = pattern
                .last_approval_at
                .is_some_and(|at| now - at < Duration::days(APPROVAL_RECENCY_DAYS));
            (pattern.consecutive_approvals >= GUARDIAN_TO_PARTNER_STREAK && recent)
                .then_some(PromptType::GuardianToPartner)
        }
        AutonomyTier::Partner => (pattern.consecutive_approvals >= PARTNER_TO_ALTER_EGO_STREAK
            && pattern.total_approvals >= PARTNER_TO_ALTER_EGO_TOTAL
            && pattern.total_rejections == 0)
            .then_some(PromptType::PartnerToAlterEgo),
        AutonomyTier::AlterEgo => None,
    }
}
