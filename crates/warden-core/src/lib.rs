//! # warden-core
//!
//! Core types for the Warden mediation layer: the closed action
//! vocabulary with its domain/risk tables, autonomy tiers and
//! decisions, the signed wire envelopes, the unified error type,
//! and the tier-change event bus. Every other crate in the
//! workspace builds on this shared vocabulary.

pub mod action;
pub mod envelope;
pub mod error;
pub mod event;
pub mod tier;

pub use action::{ActionType, Domain, Risk};
pub use envelope::{ActionRequest, ActionResponse, ResponseStatus, REQUEST_SOURCE};
pub use error::{Result, WardenError};
pub use event::{Event, EventBus};
pub use tier::{AutonomyTier, Decision};
