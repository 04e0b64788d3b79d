//! # Dirty Cell Tracking
//!
//! Records which cells changed since the last reconciliation pass.

/// Set of dirty cell indices.
///
/// A bitset answers membership in O(1) and deduplicates repeated marks; a
/// side list of the marked indices keeps iteration and clearing proportional
/// to the number of dirty cells rather than to grid area.
#[derive(Clone, Debug)]
pub struct DirtyTracker {
    /// Bitset: 1 = dirty, 0 = clean. 64 cells per u64.
    bits: Vec<u64>,
    /// Dirty indices in first-marked order.
    marked: Vec<usize>,
    /// Capacity in cells.
    capacity: usize,
}

impl DirtyTracker {
    /// Creates a tracker for `capacity` cells, all clean.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0u64; capacity.div_ceil(64)],
            marked: Vec::new(),
            capacity,
        }
    }

    /// Marks a cell index as dirty.
    ///
    /// # Performance
    ///
    /// O(1) - single bit operation.
    #[inline]
    pub fn mark_dirty(&mut self, index: usize) {
        debug_assert!(index < self.capacity, "Index out of bounds");
        let Some(word) = self.bits.get_mut(index / 64) else {
            return;
        };
        let mask = 1u64 << (index % 64);
        if *word & mask == 0 {
            *word |= mask;
            self.marked.push(index);
        }
    }

    /// Checks if a cell is dirty.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        (self.bits[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Returns the number of dirty cells.
    #[inline]
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.marked.len()
    }

    /// Checks if any cell is dirty.
    #[inline]
    #[must_use]
    pub fn has_dirty(&self) -> bool {
        !self.marked.is_empty()
    }

    /// Dirty indices, each exactly once, in no meaningful order.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.marked
    }

    /// Clears all dirty flags.
    ///
    /// # Performance
    ///
    /// O(d) where d = number of dirty cells.
    pub fn clear(&mut self) {
        for &index in &self.marked {
            self.bits[index / 64] = 0;
        }
        self.marked.clear();
    }
}
