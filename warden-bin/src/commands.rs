use anyhow::{Context, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use warden_audit::AuditTrail;
use warden_autonomy::DecisionEngine;
use warden_codec::SigningKey;
use warden_config::{ConfigLoader, WardenConfig};
use warden_core::{ActionType, AutonomyTier, Domain, EventBus, WardenError};
use warden_escalation::EscalationEngine;
use warden_ipc::{ActionExecutor, GatewayDispatcher};
use warden_store::Store;

#[derive(Parser)]
#[command(name = "warden", version, about = "Signed action mediation for an assistant core")]
pub struct Cli {
    /// Path to warden.toml (default: ~/.warden/warden.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway daemon: accept signed requests and mediate them.
    Gateway {
        /// Override the listen address from the config.
        #[arg(long)]
        listen: Option<String>,
    },
    /// Show what the decision matrix says for one action.
    Decide {
        /// Action name, e.g. "email_send".
        action: String,
    },
    /// Show resolved autonomy tiers for every domain.
    Tiers,
    /// Set the autonomy tier for a domain.
    SetTier {
        /// Domain, e.g. "email".
        domain: String,
        /// Tier: guardian, partner, or alter_ego.
        tier: String,
    },
    /// Show recent audit entries.
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// List escalation prompts awaiting an answer.
    Escalations,
    /// Answer an escalation prompt.
    Respond {
        /// Prompt id.
        id: String,
        /// Accept the proposed tier change (default is dismiss).
        #[arg(long)]
        accept: bool,
    },
    /// Generate a signing key and write it hex-encoded to a file.
    Keygen {
        /// Destination path for the key file.
        path: PathBuf,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = ConfigLoader::load(self.config.as_deref())?;
        init_tracing(&config);

        match self.command {
            Commands::Gateway { listen } => run_gateway(&config, listen).await,
            Commands::Decide { action } => run_decide(&config, &action),
            Commands::Tiers => run_tiers(&config),
            Commands::SetTier { domain, tier } => run_set_tier(&config, &domain, &tier),
            Commands::Audit { limit, offset } => run_audit(&config, limit, offset),
            Commands::Escalations => run_escalations(&config),
            Commands::Respond { id, accept } => run_respond(&config, &id, accept),
            Commands::Keygen { path } => run_keygen(&path),
        }
    }
}

fn init_tracing(config: &WardenConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));
    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn open_store(config: &WardenConfig) -> anyhow::Result<Arc<Store>> {
    let path = config.store.resolved_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(Arc::new(Store::open(&path)?))
}

fn decision_engine(config: &WardenConfig, store: Arc<Store>) -> anyhow::Result<Arc<DecisionEngine>> {
    Ok(Arc::new(DecisionEngine::new(
        store,
        config.autonomy.default_tier,
        EventBus::default(),
    )?))
}

/// Placeholder executor for a gateway with no service adapters
/// wired in. Auto-approved actions still answer, with an error that
/// names the missing adapter.
struct UnconfiguredExecutor;

#[async_trait]
impl ActionExecutor for UnconfiguredExecutor {
    async fn execute(
        &self,
        action: ActionType,
        _payload: &Map<String, Value>,
    ) -> warden_core::Result<Value> {
        Err(WardenError::Ipc(format!(
            "no service adapter registered for {action}"
        )))
    }
}

async fn run_gateway(config: &WardenConfig, listen: Option<String>) -> anyhow::Result<()> {
    let key = SigningKey::load_or_env(config.ipc.signing_key_path.as_deref())?;
    let store = open_store(config)?;
    let decisions = decision_engine(config, Arc::clone(&store))?;
    let trail = Arc::new(AuditTrail::new(Arc::clone(&store)));

    let status = trail.privacy_status()?;
    info!(
        entries = status.entry_count,
        last_entry = ?status.last_entry_at,
        "audit trail ready"
    );

    let dispatcher = Arc::new(GatewayDispatcher::new(
        Arc::new(key),
        decisions,
        trail,
        Arc::new(UnconfiguredExecutor),
    ));

    let addr = listen.unwrap_or_else(|| config.ipc.listen.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "gateway listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        info!(%peer, "core connected");
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.serve_connection(socket).await {
                warn!(%peer, error = %e, "connection ended with error");
            }
        });
    }
}

fn run_decide(config: &WardenConfig, action: &str) -> anyhow::Result<()> {
    let action: ActionType = action.parse()?;
    let store = open_store(config)?;
    let decisions = decision_engine(config, store)?;
    let domain = action.domain();
    println!(
        "{action}: {} (domain {domain} at {}, {} risk)",
        decisions.decide(action),
        decisions.domain_tier(domain),
        action.risk(),
    );
    Ok(())
}

fn run_tiers(config: &WardenConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let decisions = decision_engine(config, store)?;
    for (domain, tier) in decisions.resolved_config() {
        println!("{domain:<12} {tier}");
    }
    Ok(())
}

fn run_set_tier(config: &WardenConfig, domain: &str, tier: &str) -> anyhow::Result<()> {
    let domain: Domain = domain.parse()?;
    let tier: AutonomyTier = tier.parse()?;
    let store = open_store(config)?;
    let decisions = decision_engine(config, store)?;
    decisions.set_domain_tier(domain, tier)?;
    println!("{domain} -> {tier}");
    Ok(())
}

fn run_audit(config: &WardenConfig, limit: usize, offset: usize) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let trail = AuditTrail::new(store);
    let entries = trail.recent(limit, offset)?;
    if entries.is_empty() {
        println!("no audit entries");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {:<9} {:<26} {:<18} {}",
            entry.timestamp.to_rfc3339(),
            entry.direction.as_str(),
            entry.action,
            entry.status,
            &entry.payload_hash[..16.min(entry.payload_hash.len())],
        );
    }
    Ok(())
}

fn escalation_engine(config: &WardenConfig) -> anyhow::Result<EscalationEngine> {
    let store = open_store(config)?;
    let decisions = decision_engine(config, Arc::clone(&store))?;
    Ok(EscalationEngine::new(
        store,
        decisions,
        config.assistant.name.clone(),
    ))
}

fn run_escalations(config: &WardenConfig) -> anyhow::Result<()> {
    let engine = escalation_engine(config)?;
    let prompts = engine.active_prompts()?;
    if prompts.is_empty() {
        println!("no pending escalations");
        return Ok(());
    }
    for p in prompts {
        println!("{}  [{} -> {}]", p.id, p.domain, p.prompt_type.target_tier());
        println!("  {}", p.message);
        println!("  expires {}", p.expires_at.to_rfc3339());
    }
    Ok(())
}

fn run_respond(config: &WardenConfig, id: &str, accept: bool) -> anyhow::Result<()> {
    let engine = escalation_engine(config)?;
    let prompt_id = uuid::Uuid::parse_str(id).context("prompt id must be a uuid")?;
    let prompt = engine.record_response(prompt_id, accept)?;
    if accept {
        println!(
            "{} is now at {} for {}",
            prompt.domain,
            prompt.prompt_type.target_tier(),
            config.assistant.name
        );
    } else {
        println!("dismissed; you won't be asked again soon");
    }
    Ok(())
}

fn run_keygen(path: &PathBuf) -> anyhow::Result<()> {
    use ring::rand::{SecureRandom, SystemRandom};

    if path.exists() {
        bail!("refusing to overwrite existing key at {}", path.display());
    }
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("system rng failed"))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, hex::encode(bytes))?;
    println!("wrote signing key to {}", path.display());
    Ok(())
}
