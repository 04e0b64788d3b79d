//! # Particle Grid
//!
//! The dense, authoritative store of cell contents.
//!
//! ## Design Philosophy
//!
//! - Every cell always holds a value; empty is a value, not absence
//! - Writes are O(1) and record the cell in a dirty set
//! - Nothing here knows about the spatial index

mod dense;
mod dirty;
mod particle;

pub use dense::{Grid, GridId, Neighbor, ParticleRef};
pub use dirty::DirtyTracker;
pub use particle::{Particle, ParticleKind};
