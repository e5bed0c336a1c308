//! # warden-autonomy
//!
//! The Autonomy Decision Engine: a per-domain tier matrix deciding
//! whether an action runs on its own, asks the user first, or is
//! blocked outright. Tiers are persisted per domain and cached in
//! memory so `decide` stays a pure, synchronous function.

pub mod engine;

pub use engine::DecisionEngine;
