use thiserror::Error;

/// Unified error type for the entire Warden workspace.
#[derive(Error, Debug)]
pub enum WardenError {
    // ── Codec errors ───────────────────────────────────────────
    #[error("frame too large: declared {declared} bytes, max {max}")]
    FrameTooLarge { declared: usize, max: usize },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("signature verification failed for request {request_id}")]
    SignatureMismatch { request_id: String },

    #[error("signing key error: {0}")]
    Key(String),

    // ── IPC errors ─────────────────────────────────────────────
    #[error("ipc not connected")]
    NotConnected,

    #[error("request timed out after {secs}s: {action}")]
    Timeout { action: String, secs: u64 },

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("ipc error: {0}")]
    Ipc(String),

    // ── Engine errors ──────────────────────────────────────────
    #[error("escalation error: {0}")]
    Escalation(String),

    #[error("unknown escalation prompt: {0}")]
    PromptNotFound(String),

    #[error("audit error: {0}")]
    Audit(String),

    // ── Persistence / config errors ────────────────────────────
    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WardenError>;
