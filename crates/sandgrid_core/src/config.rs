//! # Synchronization Configuration
//!
//! Tunables for the connector, loaded once at startup.
//!
//! ```toml
//! cell_size = 16
//! area_radius = 1
//! pool_chunk_size = 1024
//! ```

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

/// Default spatial bucket edge length in grid cells.
pub const DEFAULT_CELL_SIZE: u32 = 16;

/// Default neighborhood radius (in cells) covered by `query_area`.
pub const DEFAULT_AREA_RADIUS: u32 = 1;

/// Default number of slots added each time a pool grows.
pub const DEFAULT_POOL_CHUNK_SIZE: usize = 1024;

/// Connector configuration.
///
/// Missing keys fall back to their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Edge length of a spatial hash bucket, in grid cells.
    pub cell_size: u32,
    /// Neighborhood radius, in grid cells, visited by `query_area`.
    pub area_radius: u32,
    /// Slots added to the index node pool per growth step.
    pub pool_chunk_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            area_radius: DEFAULT_AREA_RADIUS,
            pool_chunk_size: DEFAULT_POOL_CHUNK_SIZE,
        }
    }
}

impl SyncConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the text is not valid TOML,
    /// contains unknown keys, or fails validation.
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every tunable is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero bucket size or a zero
    /// pool chunk size.
    pub fn validate(&self) -> CoreResult<()> {
        if self.cell_size == 0 {
            tracing::warn!("rejecting config: cell_size must be positive");
            return Err(CoreError::InvalidConfig(
                "cell_size must be greater than zero".to_string(),
            ));
        }
        if self.pool_chunk_size == 0 {
            tracing::warn!("rejecting config: pool_chunk_size must be positive");
            return Err(CoreError::InvalidConfig(
                "pool_chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
