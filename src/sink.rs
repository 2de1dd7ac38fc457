//! Structured attack event capture.
//!
//! Components:
//! - `event`: the immutable [`AttackEvent`] record and its payload types.
//! - `attack_sink`: the [`AttackEventSink`] serializing concurrent writers
//!   into one append-only per-day NDJSON store.

pub mod attack_sink;
pub mod event;

pub use attack_sink::AttackEventSink;
pub use event::{AttackEvent, EventData, ServiceKind};
