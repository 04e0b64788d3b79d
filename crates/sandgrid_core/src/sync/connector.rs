//! # Grid/Index Connector
//!
//! Binds the authoritative [`Grid`] to the derived [`SpatialHash`].
//!
//! ## Protocol
//!
//! ```text
//! add / move / remove ──► Grid (write + dirty mark)      O(1)
//!                              │
//! update / any query  ──► reconcile dirty cells ──► SpatialHash
//!                         O(dirty), never O(area)
//! ```
//!
//! Mutations never touch the index. Reconciliation walks the dirty set,
//! drops whatever stale entry a dirty cell had and re-inserts it if the
//! cell is occupied. Every query reconciles first, so no query observes a
//! stale index.

use std::collections::BTreeMap;
use std::time::Instant;

use super::metrics::SyncMetrics;
use crate::config::SyncConfig;
use crate::error::{CoreError, CoreResult};
use crate::grid::{Grid, Neighbor, Particle, ParticleKind, ParticleRef};
use crate::memory::AllocationMonitor;
use crate::spatial::{query, DenseRegion, Point, SpatialHash};

/// Monitor tag for grid cell storage.
pub const GRID_TAG: &str = "Grid";

/// The single entry point callers use to mutate and query the world.
///
/// # Example
///
/// ```rust,ignore
/// let mut connector = Connector::new(1000, 1000);
/// connector.add_particle(10, 10, Particle::from(ParticleKind::Sand))?;
/// connector.move_particle(10, 10, 10, 11);
/// connector.update();
/// let near = connector.query_radius(Point::new(10.0, 11.0), 3.0);
/// ```
#[derive(Debug)]
pub struct Connector {
    grid: Grid,
    index: SpatialHash,
    config: SyncConfig,
    metrics: SyncMetrics,
    monitor: AllocationMonitor,
}

impl Connector {
    /// Creates a connector with default configuration, reporting to the
    /// process-wide monitor.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::build(width, height, SyncConfig::default(), AllocationMonitor::global())
    }

    /// Creates a connector with explicit configuration and monitor.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidConfig`] if `config` fails validation.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn with_config(
        width: u32,
        height: u32,
        config: SyncConfig,
        monitor: AllocationMonitor,
    ) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self::build(width, height, config, monitor))
    }

    fn build(width: u32, height: u32, config: SyncConfig, monitor: AllocationMonitor) -> Self {
        let grid = Grid::new(width, height);
        let index =
            SpatialHash::with_cell_size(config.cell_size, config.pool_chunk_size, monitor.clone());
        monitor.track_allocation(GRID_TAG, grid.footprint_bytes());
        tracing::info!(
            width,
            height,
            cell_size = config.cell_size,
            "connector created"
        );

        Self {
            grid,
            index,
            config,
            metrics: SyncMetrics::default(),
            monitor,
        }
    }

    // =========================================================================
    // Query surface
    // =========================================================================

    /// Number of columns.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.grid.width()
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.grid.height()
    }

    /// True if `(x, y)` lies inside the grid.
    #[inline]
    #[must_use]
    pub fn is_valid_position(&self, x: i32, y: i32) -> bool {
        self.grid.is_valid_position(x, y)
    }

    /// True if `(x, y)` is inside the grid and unoccupied.
    ///
    /// Always current: reads the grid, not the index.
    #[inline]
    #[must_use]
    pub fn is_empty(&self, x: i32, y: i32) -> bool {
        self.grid.is_empty_at(x, y)
    }

    /// Current contents of `(x, y)`; `None` outside the grid.
    #[inline]
    #[must_use]
    pub fn get_particle(&self, x: i32, y: i32) -> Option<&Particle> {
        self.grid.get(x, y)
    }

    /// Moore neighbors of `(x, y)`: 8 inside, 5 on an edge, 3 in a corner.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfBounds`] if `(x, y)` is outside the grid.
    pub fn get_neighbors(&self, x: i32, y: i32) -> CoreResult<Vec<Neighbor>> {
        if !self.grid.is_valid_position(x, y) {
            return Err(self.grid.out_of_bounds_signed(x, y));
        }
        self.grid.neighbors(x.unsigned_abs(), y.unsigned_abs())
    }

    /// Visits every cell in row-major order.
    pub fn for_each_cell<F>(&self, visitor: F)
    where
        F: FnMut(u32, u32, &Particle),
    {
        self.grid.for_each_cell(visitor);
    }

    /// Read access to the authoritative grid.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Read access to the index. May be stale until the next reconciliation.
    #[must_use]
    pub const fn index(&self) -> &SpatialHash {
        &self.index
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Cells mutated since the last reconciliation.
    #[must_use]
    pub fn pending_sync(&self) -> usize {
        self.grid.dirty_count()
    }

    // =========================================================================
    // Mutation surface
    // =========================================================================

    /// Places `particle` at `(x, y)` if the cell is free.
    ///
    /// Returns `Ok(false)` without changing anything if the cell is occupied
    /// or `particle` is empty.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfBounds`] outside the grid.
    pub fn add_particle(&mut self, x: i32, y: i32, particle: Particle) -> CoreResult<bool> {
        let Some(current) = self.grid.get(x, y) else {
            return Err(self.grid.out_of_bounds_signed(x, y));
        };
        if !current.is_empty() || particle.is_empty() {
            return Ok(false);
        }
        self.grid.update(x.unsigned_abs(), y.unsigned_abs(), particle)?;
        Ok(true)
    }

    /// Moves an occupant to a free in-bounds cell.
    ///
    /// Returns `false` with no state change if the source is out of bounds
    /// or empty, or the destination is out of bounds or occupied. Never
    /// overwrites an occupant.
    pub fn move_particle(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        self.grid.move_particle(x1, y1, x2, y2)
    }

    /// Empties `(x, y)`. Returns `false` if it was out of bounds or empty.
    pub fn remove_particle(&mut self, x: i32, y: i32) -> bool {
        match self.grid.get(x, y) {
            Some(current) if !current.is_empty() => {}
            _ => return false,
        }
        self.grid
            .update(x.unsigned_abs(), y.unsigned_abs(), Particle::EMPTY)
            .is_ok()
    }

    /// Brush stroke: fills every free in-bounds cell within Euclidean
    /// distance `radius` of `(cx, cy)` with a `kind` particle at its default
    /// mass. Returns how many cells were filled.
    pub fn add_particles_in_radius(
        &mut self,
        cx: i32,
        cy: i32,
        radius: i32,
        kind: ParticleKind,
    ) -> usize {
        if radius < 0 || kind == ParticleKind::Empty {
            return 0;
        }
        let limit = i64::from(radius) * i64::from(radius);
        let mut placed = 0;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if i64::from(dx) * i64::from(dx) + i64::from(dy) * i64::from(dy) > limit {
                    continue;
                }
                let (Some(x), Some(y)) = (cx.checked_add(dx), cy.checked_add(dy)) else {
                    continue;
                };
                if self.add_particle(x, y, Particle::with_default_mass(kind)) == Ok(true) {
                    placed += 1;
                }
            }
        }
        placed
    }

    // =========================================================================
    // Lifecycle surface
    // =========================================================================

    /// Reconciles the index with every pending grid change.
    ///
    /// Returns the number of cells reconciled.
    pub fn update(&mut self) -> usize {
        self.batch_sync_dirty_states()
    }

    /// Reconciles the index with the grid's dirty set, then clears it.
    ///
    /// Cost is proportional to the number of distinct dirty cells.
    /// Returns the number of cells reconciled.
    pub fn batch_sync_dirty_states(&mut self) -> usize {
        let batch = self.grid.dirty_count();
        if batch == 0 {
            return 0;
        }

        let start = Instant::now();
        for &cell in self.grid.dirty_indices() {
            let entry = self.grid.ref_at_index(cell);
            let (x, y) = entry.position();
            self.index.remove(entry, x, y);
            if self.grid.at(x, y).is_ok_and(|p| !p.is_empty()) {
                self.index.insert(entry, x, y);
            }
        }
        self.grid.clear_dirty_states();

        let elapsed = start.elapsed();
        self.metrics.record(batch, elapsed);
        tracing::debug!(
            batch,
            micros = elapsed.as_micros() as u64,
            indexed = self.index.len(),
            "reconciled dirty cells"
        );
        batch
    }

    /// Empties the grid and the index and forgets pending changes.
    ///
    /// O(capacity): every cell is reset.
    pub fn clear(&mut self) {
        self.grid.reset();
        self.index.clear();
        tracing::info!(
            width = self.grid.width(),
            height = self.grid.height(),
            "connector cleared"
        );
    }

    // =========================================================================
    // Spatial queries (each reconciles first)
    // =========================================================================

    /// Occupants in the buckets covering the configured neighborhood
    /// around `(x, y)`. Bucket granularity. The neighborhood is clipped to
    /// the grid; a center outside it is not an error.
    pub fn query_area(&mut self, x: i32, y: i32) -> Vec<ParticleRef> {
        self.flush_pending();
        query::area(&self.index, x, y, self.config.area_radius)
    }

    /// Occupants within Euclidean distance `radius` of `center`.
    pub fn query_radius(&mut self, center: Point, radius: f32) -> Vec<ParticleRef> {
        self.flush_pending();
        query::radius(&self.index, center, radius)
    }

    /// Occupants inside the closed rectangle `[min, max]`.
    pub fn query_box(&mut self, min: Point, max: Point) -> Vec<ParticleRef> {
        self.flush_pending();
        query::boxed(&self.index, min, max)
    }

    /// Up to `k` occupants nearest to `point`, nearest first.
    pub fn query_k_nearest(&mut self, point: Point, k: usize) -> Vec<ParticleRef> {
        self.flush_pending();
        query::k_nearest(&self.index, point, k)
    }

    /// Buckets holding more than `threshold` occupants, densest first.
    pub fn query_dense_regions(&mut self, threshold: usize) -> Vec<DenseRegion> {
        self.flush_pending();
        query::dense_regions(&self.index, threshold)
    }

    /// Number of indexed occupants after reconciliation.
    pub fn occupant_count(&mut self) -> usize {
        self.flush_pending();
        self.index.len()
    }

    /// Reads the particle a query result refers to.
    #[must_use]
    pub fn resolve(&self, entry: ParticleRef) -> Option<&Particle> {
        self.grid.resolve(entry)
    }

    fn flush_pending(&mut self) {
        if self.grid.has_dirty() {
            self.batch_sync_dirty_states();
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Snapshot of reconciliation statistics.
    #[must_use]
    pub const fn metrics(&self) -> SyncMetrics {
        self.metrics
    }

    /// Zeroes reconciliation statistics.
    pub fn reset_metrics(&mut self) {
        self.metrics = SyncMetrics::default();
    }

    /// Bytes currently attributed in this connector's monitor.
    #[must_use]
    pub fn current_memory_usage(&self) -> usize {
        self.monitor.current_usage()
    }

    /// Highest attributed total seen by this connector's monitor.
    #[must_use]
    pub fn peak_memory_usage(&self) -> usize {
        self.monitor.peak_usage()
    }

    /// Per-tag usage snapshot from this connector's monitor.
    #[must_use]
    pub fn memory_allocation_map(&self) -> BTreeMap<String, usize> {
        self.monitor.allocation_map()
    }

    /// Handle to the monitor this connector reports to.
    #[must_use]
    pub fn monitor(&self) -> &AllocationMonitor {
        &self.monitor
    }

    /// Reconciles, then checks that every occupied cell has exactly one
    /// matching index entry and every empty cell has none.
    ///
    /// O(capacity). Intended for tests and tooling.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvariantViolation`] for the first disagreement found.
    pub fn verify_consistency(&mut self) -> CoreResult<()> {
        self.flush_pending();

        let mut occupied = 0usize;
        for cell in 0..self.grid.cell_count() {
            let (x, y) = self.grid.position_of(cell);
            let is_occupied = self.grid.at(x, y).is_ok_and(|p| !p.is_empty());
            let bucket = self.index.bucket_of(x, y);
            let entries = self
                .index
                .entries(bucket)
                .filter(|e| e.position() == (x, y) && e.grid() == self.grid.id())
                .count();
            let expected = usize::from(is_occupied);
            if entries != expected {
                return Err(self.violation(
                    x,
                    y,
                    format!("expected {expected} index entries, found {entries}"),
                ));
            }
            occupied += expected;
        }

        if occupied != self.index.len() {
            return Err(self.violation(
                0,
                0,
                format!(
                    "{} index entries for {occupied} occupied cells",
                    self.index.len()
                ),
            ));
        }
        Ok(())
    }

    fn violation(&self, x: u32, y: u32, detail: String) -> CoreError {
        let error = CoreError::InvariantViolation { x, y, detail };
        tracing::error!(%error, dirty = self.grid.dirty_count(), "grid and index disagree");
        error
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        self.monitor
            .track_deallocation(GRID_TAG, self.grid.footprint_bytes());
    }
}
