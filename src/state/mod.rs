//! State module for tracking crawl progress
//!
//! This module provides the mutable state owned by a single crawl run.
//!
//! # Components
//!
//! - `Watermark`: per-leaf timestamp boundaries persisted between runs
//! - `WatermarkAccumulator`: the newest listing accepted per leaf in this run
//! - `DedupGuard`: item identifiers already accepted in this run
//! - `LeafState`: in-order pagination progress of one leaf
//! - `RunState`: the start/finish lifecycle tying the above together

mod dedup;
mod leaf_state;
mod run_state;
mod watermark;

// Re-export main types
pub use dedup::DedupGuard;
pub use leaf_state::{LeafState, LeafStatus};
pub use run_state::RunState;
pub use watermark::{Watermark, WatermarkAccumulator};
