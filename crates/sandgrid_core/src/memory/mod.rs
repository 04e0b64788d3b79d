//! # Memory Management
//!
//! Pooled allocation and usage accounting.
//!
//! ## Design Philosophy
//!
//! Memory that churns every tick comes from pools:
//! - Freed slots are reused before the pool grows
//! - Growth happens one chunk at a time
//! - Every byte is attributed to a tag in the [`AllocationMonitor`]

mod monitor;
mod pool;

pub use monitor::AllocationMonitor;
pub use pool::{PoolHandle, PooledAllocator};
