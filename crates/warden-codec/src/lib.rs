//! # warden-codec
//!
//! The wire codec for the Core–Gateway channel: 4-byte big-endian
//! length framing with a hard corruption guard, canonical JSON
//! payload serialization, and HMAC-SHA256 request signing with
//! constant-time verification.

pub mod canonical;
pub mod frame;
pub mod sign;

pub use canonical::canonical_json;
pub use frame::{FrameCodec, MAX_FRAME_BYTES};
pub use sign::SigningKey;
