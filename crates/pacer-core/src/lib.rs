//! Budget and dayparting admission control for budget-pacer
//!
//! This crate contains:
//! - The budget accumulator (spend recording, resets, counter repair)
//! - The dayparting evaluator
//! - The admission decision engine (verdicts and status updates)
//! - Reconciliation jobs and the same-kind overlap guard
//! - Read-only status summaries
//! - Syncing configured brands and campaigns into the store

mod accumulator;
mod admission;
mod dayparting;
mod error;
mod reconcile;
mod scheduler;
mod seed;
mod summary;

#[cfg(test)]
mod test_support;

pub use accumulator::*;
pub use admission::*;
pub use dayparting::*;
pub use error::*;
pub use reconcile::*;
pub use scheduler::*;
pub use seed::*;
pub use summary::*;
