//! # Grid/Index Synchronization
//!
//! ## The Problem
//!
//! ```text
//! Simulation:  thousands of cell writes per tick
//! Queries:     need an index that agrees with the grid
//!
//! Re-index on every write:  O(writes) hash traffic per tick
//! Rebuild every tick:       O(area) per tick
//! ```
//!
//! ## The Solution: Deferred Reconciliation
//!
//! ```text
//! Tick N:
//!   writes land in the grid and mark cells dirty
//!   update() (or the first query) reconciles only the dirty cells
//! ```
//!
//! The index is stale between a write and the next reconciliation. It is
//! never stale when a query reads it.

mod connector;
mod metrics;

pub use connector::{Connector, GRID_TAG};
pub use metrics::SyncMetrics;
