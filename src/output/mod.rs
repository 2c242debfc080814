//! Output module for run reporting
//!
//! This module handles:
//! - Recording run statistics while a crawl is in progress
//! - Printing the end-of-run summary

pub mod stats;

pub use stats::{print_statistics, RunStatistics};
