//! # warden-escalation
//!
//! Watches approval history and proposes loosening a domain's
//! autonomy tier when the user has approved the same kind of action
//! again and again. Dismissals start long cooldowns so the user is
//! never nagged; acceptance flips the tier atomically.

pub mod engine;
pub mod pattern;
pub mod prompt;

pub use engine::EscalationEngine;
pub use pattern::ApprovalPattern;
pub use prompt::{EscalationPrompt, PromptStatus, PromptType};
