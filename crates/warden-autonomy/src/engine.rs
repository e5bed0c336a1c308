use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use warden_core::{ActionType, AutonomyTier, Decision, Domain, Event, EventBus, Result, Risk};
use warden_store::Store;

/// Decides, per action, between auto-approval, human confirmation,
/// and a hard block.
///
/// Tier state is loaded from the store once and kept in memory, so
/// [`DecisionEngine::decide`] never touches I/O and has no error
/// path: the action tables are total and every domain resolves to a
/// tier (persisted override or configured default).
pub struct DecisionEngine {
    store: Arc<Store>,
    default_tier: AutonomyTier,
    tiers: RwLock<HashMap<Domain, AutonomyTier>>,
    blocked: RwLock<HashSet<ActionType>>,
    events: EventBus,
}

impl DecisionEngine {
    /// Build the engine, materializing persisted tier overrides.
    /// Rows with an unrecognized domain or tier are skipped with a
    /// warning rather than failing startup.
    pub fn new(store: Arc<Store>, default_tier: AutonomyTier, events: EventBus) -> Result<Self> {
        let mut tiers = HashMap::new();
        for (domain, tier) in store.all_tiers()? {
            match (domain.parse::<Domain>(), tier.parse::<AutonomyTier>()) {
                (Ok(d), Ok(t)) => {
                    tiers.insert(d, t);
                }
                _ => {
                    warn!(%domain, %tier, "skipping unrecognized tier row");
                }
            }
        }
        Ok(Self {
            store,
            default_tier,
            tiers: RwLock::new(tiers),
            blocked: RwLock::new(HashSet::new()),
            events,
        })
    }

    /// The decision matrix.
    ///
    /// - **guardian**: always requires approval, regardless of risk.
    /// - **partner**: read/write auto-approve; execute asks first.
    /// - **alter_ego**: auto-approve everything except the permanent
    ///   sensitive-execute carve-out, which always asks.
    ///
    /// Actions on the blocklist are refused before the tier matrix
    /// is consulted.
    pub fn decide(&self, action: ActionType) -> Decision {
        if self.blocked.read().contains(&action) {
            return Decision::Blocked;
        }

        match self.domain_tier(action.domain()) {
            AutonomyTier::Guardian => Decision::RequiresApproval,
            AutonomyTier::Partner => match action.risk() {
                Risk::Read | Risk::Write => Decision::AutoApprove,
                Risk::Execute => Decision::RequiresApproval,
            },
            AutonomyTier::AlterEgo => {
                if action.is_sensitive_execute() {
                    Decision::RequiresApproval
                } else {
                    Decision::AutoApprove
                }
            }
        }
    }

    /// Resolved tier for a domain: persisted override, else the
    /// configured default.
    pub fn domain_tier(&self, domain: Domain) -> AutonomyTier {
        self.tiers
            .read()
            .get(&domain)
            .copied()
            .unwrap_or(self.default_tier)
    }

    /// Persist a tier override, then update the cache and publish
    /// `TierChanged` synchronously. Last write wins.
    pub fn set_domain_tier(&self, domain: Domain, tier: AutonomyTier) -> Result<()> {
        self.store.upsert_tier(domain.as_str(), tier.as_str())?;
        self.tiers.write().insert(domain, tier);
        info!(%domain, %tier, "autonomy tier changed");
        self.events.publish(Event::TierChanged { domain, tier });
        Ok(())
    }

    /// Re-read one domain's tier from the store (used after an
    /// out-of-band write, e.g. an accepted escalation's transaction)
    /// and publish the change.
    pub fn reload_domain(&self, domain: Domain) -> Result<AutonomyTier> {
        let tier = match self.store.get_tier(domain.as_str())? {
            Some(raw) => raw.parse().unwrap_or(self.default_tier),
            None => self.default_tier,
        };
        self.tiers.write().insert(domain, tier);
        self.events.publish(Event::TierChanged { domain, tier });
        Ok(tier)
    }

    /// Resolved tiers for the fixed, closed list of domains —
    /// including domains with no action mappings yet.
    pub fn resolved_config(&self) -> Vec<(Domain, AutonomyTier)> {
        Domain::ALL
            .iter()
            .map(|d| (*d, self.domain_tier(*d)))
            .collect()
    }

    /// Replace the action blocklist.
    pub fn set_blocked_actions(&self, actions: impl IntoIterator<Item = ActionType>) {
        *self.blocked.write() = actions.into_iter().collect();
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}
