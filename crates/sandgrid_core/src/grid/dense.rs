//! # Dense Particle Grid
//!
//! The authoritative store: one [`Particle`] per cell, row-major, plus the
//! set of cells changed since the last reconciliation.

use std::sync::atomic::{AtomicU32, Ordering};

use super::dirty::DirtyTracker;
use super::particle::Particle;
use crate::error::{CoreError, CoreResult};

/// Source of unique grid ids.
static NEXT_GRID_ID: AtomicU32 = AtomicU32::new(0);

/// Identity of a [`Grid`], carried by every [`ParticleRef`] it issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct GridId(u32);

/// Non-owning handle to an occupied cell.
///
/// A lookup key only: the particle it denotes is read back through
/// [`Grid::resolve`], which rejects handles issued by a different grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParticleRef {
    grid: GridId,
    x: u32,
    y: u32,
}

impl ParticleRef {
    /// Grid that issued this handle.
    #[inline]
    #[must_use]
    pub const fn grid(self) -> GridId {
        self.grid
    }

    /// Column of the referenced cell.
    #[inline]
    #[must_use]
    pub const fn x(self) -> u32 {
        self.x
    }

    /// Row of the referenced cell.
    #[inline]
    #[must_use]
    pub const fn y(self) -> u32 {
        self.y
    }

    /// `(x, y)` of the referenced cell.
    #[inline]
    #[must_use]
    pub const fn position(self) -> (u32, u32) {
        (self.x, self.y)
    }
}

/// One entry of a Moore neighborhood.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbor {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Cell contents at the time of the call.
    pub particle: Particle,
}

/// Dense width×height particle storage.
///
/// # Example
///
/// ```rust,ignore
/// let mut grid = Grid::new(10, 10);
/// grid.update(5, 5, Particle::from(ParticleKind::Sand))?;
/// assert_eq!(grid.dirty_count(), 1);
/// ```
#[derive(Debug)]
pub struct Grid {
    id: GridId,
    width: u32,
    height: u32,
    /// Row-major cells, `width * height` long.
    cells: Box<[Particle]>,
    dirty: DirtyTracker,
}

impl Grid {
    /// Creates an all-empty grid with no dirty cells.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero or the cell count overflows `usize`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "Grid dimensions must be greater than zero");
        let len = (width as usize)
            .checked_mul(height as usize)
            .unwrap_or_else(|| panic!("Grid of {width}x{height} cells overflows usize"));

        Self {
            id: GridId(NEXT_GRID_ID.fetch_add(1, Ordering::Relaxed)),
            width,
            height,
            cells: vec![Particle::EMPTY; len].into_boxed_slice(),
            dirty: DirtyTracker::new(len),
        }
    }

    /// Identity stamped into every [`ParticleRef`] from this grid.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> GridId {
        self.id
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells.
    #[inline]
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Bytes held by the cell array.
    #[must_use]
    pub fn footprint_bytes(&self) -> usize {
        self.cells.len() * std::mem::size_of::<Particle>() + self.cells.len().div_ceil(8)
    }

    /// True if `(x, y)` lies inside the grid. Accepts negative input.
    #[inline]
    #[must_use]
    pub fn is_valid_position(&self, x: i32, y: i32) -> bool {
        u32::try_from(x).is_ok_and(|x| x < self.width)
            && u32::try_from(y).is_ok_and(|y| y < self.height)
    }

    /// Row-major index of `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfBounds`] outside the grid.
    #[inline]
    pub fn index_of(&self, x: u32, y: u32) -> CoreResult<usize> {
        if x >= self.width || y >= self.height {
            return Err(self.out_of_bounds(i64::from(x), i64::from(y)));
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    /// Inverse of [`Grid::index_of`]. `index` must be in range.
    #[inline]
    #[must_use]
    pub fn position_of(&self, index: usize) -> (u32, u32) {
        let width = self.width as usize;
        #[allow(clippy::cast_possible_truncation)]
        ((index % width) as u32, (index / width) as u32)
    }

    /// Overwrites a cell unconditionally and marks it dirty.
    ///
    /// Whether overwriting an occupant is allowed is the caller's policy.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfBounds`] if `x >= width || y >= height`.
    pub fn update(&mut self, x: u32, y: u32, particle: Particle) -> CoreResult<()> {
        let index = self.index_of(x, y)?;
        self.cells[index] = particle;
        self.dirty.mark_dirty(index);
        Ok(())
    }

    /// Reads a cell.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfBounds`] outside the grid.
    #[inline]
    pub fn at(&self, x: u32, y: u32) -> CoreResult<&Particle> {
        let index = self.index_of(x, y)?;
        Ok(&self.cells[index])
    }

    /// Mutable access to a cell. The cell is marked dirty up front, since
    /// any write through the reference may change occupancy.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfBounds`] outside the grid.
    pub fn at_mut(&mut self, x: u32, y: u32) -> CoreResult<&mut Particle> {
        let index = self.index_of(x, y)?;
        self.dirty.mark_dirty(index);
        Ok(&mut self.cells[index])
    }

    /// Signed-coordinate read; `None` outside the grid.
    #[inline]
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> Option<&Particle> {
        if !self.is_valid_position(x, y) {
            return None;
        }
        self.at(x.unsigned_abs(), y.unsigned_abs()).ok()
    }

    /// True if `(x, y)` is inside the grid and holds no occupant.
    #[inline]
    #[must_use]
    pub fn is_empty_at(&self, x: i32, y: i32) -> bool {
        self.get(x, y).is_some_and(Particle::is_empty)
    }

    /// Moves the occupant of `(x1, y1)` to `(x2, y2)`.
    ///
    /// Returns `false` without touching anything if either position is out
    /// of bounds, the source is empty, or the destination is occupied.
    /// On success the source becomes empty and both cells are dirty.
    pub fn move_particle(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        if !self.is_valid_position(x1, y1) || !self.is_valid_position(x2, y2) {
            return false;
        }
        let (x1, y1, x2, y2) = (
            x1.unsigned_abs(),
            y1.unsigned_abs(),
            x2.unsigned_abs(),
            y2.unsigned_abs(),
        );
        let (Ok(src), Ok(dst)) = (self.index_of(x1, y1), self.index_of(x2, y2)) else {
            return false;
        };
        if src == dst || self.cells[src].is_empty() || !self.cells[dst].is_empty() {
            return false;
        }

        self.cells[dst] = self.cells[src];
        self.cells[src] = Particle::EMPTY;
        self.dirty.mark_dirty(src);
        self.dirty.mark_dirty(dst);
        true
    }

    /// The in-bounds Moore neighbors of `(x, y)`, empties included.
    ///
    /// Interior cells have 8, edge cells 5, corner cells 3.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfBounds`] if `(x, y)` itself is outside the grid.
    pub fn neighbors(&self, x: u32, y: u32) -> CoreResult<Vec<Neighbor>> {
        self.index_of(x, y)?;
        let mut out = Vec::with_capacity(8);
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (Ok(nx), Ok(ny)) = (
                    u32::try_from(i64::from(x) + dx),
                    u32::try_from(i64::from(y) + dy),
                ) else {
                    continue;
                };
                if let Ok(index) = self.index_of(nx, ny) {
                    out.push(Neighbor {
                        x: nx,
                        y: ny,
                        particle: self.cells[index],
                    });
                }
            }
        }
        Ok(out)
    }

    /// Visits every cell in row-major order, empties included.
    pub fn for_each_cell<F>(&self, mut visitor: F)
    where
        F: FnMut(u32, u32, &Particle),
    {
        for (index, particle) in self.cells.iter().enumerate() {
            let (x, y) = self.position_of(index);
            visitor(x, y, particle);
        }
    }

    /// Number of non-empty cells. O(capacity).
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|p| !p.is_empty()).count()
    }

    /// Indices of cells changed since the last [`Grid::clear_dirty_states`].
    #[inline]
    #[must_use]
    pub fn dirty_indices(&self) -> &[usize] {
        self.dirty.indices()
    }

    /// Number of dirty cells.
    #[inline]
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.dirty_count()
    }

    /// True if any cell changed since the last clear.
    #[inline]
    #[must_use]
    pub fn has_dirty(&self) -> bool {
        self.dirty.has_dirty()
    }

    /// True if the cell at `index` is dirty.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self, index: usize) -> bool {
        self.dirty.is_dirty(index)
    }

    /// Forgets every dirty mark. Cell contents are untouched.
    pub fn clear_dirty_states(&mut self) {
        self.dirty.clear();
    }

    /// Empties every cell and forgets every dirty mark. O(capacity).
    pub fn reset(&mut self) {
        self.cells.fill(Particle::EMPTY);
        self.dirty.clear();
    }

    /// Handle to `(x, y)` stamped with this grid's id.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfBounds`] outside the grid.
    pub fn particle_ref(&self, x: u32, y: u32) -> CoreResult<ParticleRef> {
        self.index_of(x, y)?;
        Ok(ParticleRef { grid: self.id, x, y })
    }

    /// Handle for an index already known to be in range.
    pub(crate) fn ref_at_index(&self, index: usize) -> ParticleRef {
        let (x, y) = self.position_of(index);
        ParticleRef { grid: self.id, x, y }
    }

    /// Reads the particle a handle denotes; `None` for foreign handles.
    #[must_use]
    pub fn resolve(&self, handle: ParticleRef) -> Option<&Particle> {
        if handle.grid != self.id {
            return None;
        }
        self.at(handle.x, handle.y).ok()
    }

    fn out_of_bounds(&self, x: i64, y: i64) -> CoreError {
        CoreError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        }
    }

    /// Bounds error for signed caller coordinates.
    pub(crate) fn out_of_bounds_signed(&self, x: i32, y: i32) -> CoreError {
        self.out_of_bounds(i64::from(x), i64::from(y))
    }
}
