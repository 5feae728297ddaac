//! Domain types for budget-pacer
//!
//! This crate defines the vocabulary shared between the store, the core
//! engine and the service:
//! - Entities (brands, campaigns, spend logs, dayparting schedules)
//! - Admission verdicts and blocking reasons
//! - Status summaries for reporting

mod summary;
mod types;
mod verdict;

pub use summary::*;
pub use types::*;
pub use verdict::*;
