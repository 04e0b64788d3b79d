//! # Spatial Index
//!
//! A derived, bucketed index over the grid's occupants and the range
//! queries that run on it.
//!
//! The index never owns particle data. It stores [`ParticleRef`] keys that
//! are resolved through the grid that issued them.
//!
//! [`ParticleRef`]: crate::grid::ParticleRef

mod hash;
pub mod query;

pub use hash::{BucketCoord, BucketEntries, SpatialHash, SPATIAL_HASH_TAG};
pub use query::{DenseRegion, Point};
