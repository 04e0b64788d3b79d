//! # Core Error Types
//!
//! All errors that can occur in the grid, index and allocator layers.
//!
//! A blocked move or a placement onto an occupied cell is NOT an error.
//! Those are expected outcomes in a physics tick and are reported as `false`.

use thiserror::Error;

/// Errors that can occur in the core engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Coordinate outside the grid extent. Never silently clamped.
    #[error("position ({x}, {y}) is out of bounds for a {width}x{height} grid")]
    OutOfBounds {
        /// Requested column.
        x: i64,
        /// Requested row.
        y: i64,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },

    /// A pool handle was freed twice or did not come from this pool.
    ///
    /// Pool corruption cannot be recovered from, so this is raised as a panic.
    #[error("allocator misuse in pool '{tag}': slot {slot} is {reason}")]
    AllocatorMisuse {
        /// Pool tag (element type).
        tag: String,
        /// Offending slot index.
        slot: usize,
        /// What was wrong with the handle.
        reason: &'static str,
    },

    /// Grid and spatial index disagree after a reconciliation pass.
    #[error("grid/index invariant violated at ({x}, {y}): {detail}")]
    InvariantViolation {
        /// Column of the offending cell.
        x: u32,
        /// Row of the offending cell.
        y: u32,
        /// Description of the disagreement.
        detail: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
