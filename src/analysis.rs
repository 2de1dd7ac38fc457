//! Offline aggregation over the per-day attack record files.

pub mod report;

pub use report::{export_csv, load_events, AttackReport};
