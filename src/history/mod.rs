//! Refresh history: a JSONL log of every cycle and its aggregation.

pub mod logger;
pub mod reporter;
