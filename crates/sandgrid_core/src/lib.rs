//! # SANDGRID Core
//!
//! Falling-sand world storage with a deferred spatial index:
//! - A dense grid that is the single source of truth for cell contents
//! - A bucketed spatial hash reconciled from the grid's dirty set
//! - Range, radius, box, k-nearest and density queries over the index
//! - Pooled index nodes with per-tag memory accounting
//!
//! ## Architecture Rules
//!
//! 1. **The grid is authoritative** - The index is derived and rebuildable
//! 2. **Writes are O(1)** - Indexing cost is paid once per dirty cell
//! 3. **Queries never see stale data** - Every query reconciles first
//!
//! ## Example
//!
//! ```rust,ignore
//! use sandgrid_core::{Connector, Particle, ParticleKind, Point};
//!
//! let mut world = Connector::new(256, 256);
//! world.add_particle(10, 10, Particle::from(ParticleKind::Sand))?;
//! world.update();
//! let nearest = world.query_k_nearest(Point::new(0.0, 0.0), 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod grid;
pub mod memory;
pub mod spatial;
pub mod sync;

pub use config::SyncConfig;
pub use error::{CoreError, CoreResult};
pub use grid::{Grid, GridId, Neighbor, Particle, ParticleKind, ParticleRef};
pub use memory::{AllocationMonitor, PoolHandle, PooledAllocator};
pub use spatial::{DenseRegion, Point, SpatialHash};
pub use sync::{Connector, SyncMetrics};
