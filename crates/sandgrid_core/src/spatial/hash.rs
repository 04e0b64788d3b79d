//! # Spatial Hash
//!
//! Buckets of [`ParticleRef`]s keyed by coarse cell coordinate.
//!
//! Each bucket is a singly linked list whose nodes live in a
//! [`PooledAllocator`], so the churn of a physics tick (remove here, insert
//! there) recycles nodes instead of hitting the global allocator.

use std::collections::HashMap;

use crate::config::{DEFAULT_CELL_SIZE, DEFAULT_POOL_CHUNK_SIZE};
use crate::grid::ParticleRef;
use crate::memory::{AllocationMonitor, PoolHandle, PooledAllocator};

/// Monitor tag for index nodes.
pub const SPATIAL_HASH_TAG: &str = "SpatialHash";

/// Coordinate of a bucket: `(x / cell_size, y / cell_size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketCoord {
    /// Bucket column.
    pub x: u32,
    /// Bucket row.
    pub y: u32,
}

impl BucketCoord {
    /// Creates a bucket coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// 64-bit key of this bucket.
    ///
    /// The packed coordinate goes through a bijective mixer, so distinct
    /// buckets never share a key.
    #[inline]
    #[must_use]
    pub const fn key(self) -> u64 {
        let mut z = ((self.x as u64) << 32) | self.y as u64;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

/// Linked-list node holding one entry.
#[derive(Debug)]
struct Node {
    entry: ParticleRef,
    next: Option<PoolHandle>,
}

#[derive(Debug)]
struct Bucket {
    coord: BucketCoord,
    head: Option<PoolHandle>,
    len: usize,
}

/// Bucketed index over occupied cells.
///
/// Stores references only; the grid remains the source of truth for
/// contents.
#[derive(Debug)]
pub struct SpatialHash {
    cell_size: u32,
    buckets: HashMap<u64, Bucket>,
    nodes: PooledAllocator<Node>,
    /// Total entries across all buckets.
    len: usize,
    /// Largest bucket column/row ever populated since the last clear.
    extent: Option<BucketCoord>,
}

impl SpatialHash {
    /// Creates an empty index with the default bucket size.
    #[must_use]
    pub fn new(monitor: AllocationMonitor) -> Self {
        Self::with_cell_size(DEFAULT_CELL_SIZE, DEFAULT_POOL_CHUNK_SIZE, monitor)
    }

    /// Creates an empty index with explicit bucket and node-chunk sizes.
    ///
    /// # Panics
    ///
    /// Panics if `cell_size` or `chunk_size` is zero.
    #[must_use]
    pub fn with_cell_size(cell_size: u32, chunk_size: usize, monitor: AllocationMonitor) -> Self {
        assert!(cell_size > 0, "Cell size must be greater than zero");
        Self {
            cell_size,
            buckets: HashMap::new(),
            nodes: PooledAllocator::with_tag(SPATIAL_HASH_TAG, chunk_size, monitor),
            len: 0,
            extent: None,
        }
    }

    /// Bucket edge length in grid cells.
    #[inline]
    #[must_use]
    pub const fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Bucket containing grid cell `(x, y)`.
    #[inline]
    #[must_use]
    pub const fn bucket_of(&self, x: u32, y: u32) -> BucketCoord {
        BucketCoord::new(x / self.cell_size, y / self.cell_size)
    }

    /// Key of the bucket containing `(x, y)`.
    #[inline]
    #[must_use]
    pub const fn hash_pos(&self, x: u32, y: u32) -> u64 {
        self.bucket_of(x, y).key()
    }

    /// Adds `entry` to the bucket of `(x, y)`.
    ///
    /// Not idempotent: inserting the same entry twice stores it twice.
    pub fn insert(&mut self, entry: ParticleRef, x: u32, y: u32) {
        let coord = self.bucket_of(x, y);
        let bucket = self.buckets.entry(coord.key()).or_insert(Bucket {
            coord,
            head: None,
            len: 0,
        });
        let node = self.nodes.allocate(Node {
            entry,
            next: bucket.head,
        });
        bucket.head = Some(node);
        bucket.len += 1;
        self.len += 1;

        self.extent = Some(match self.extent {
            Some(e) => BucketCoord::new(e.x.max(coord.x), e.y.max(coord.y)),
            None => coord,
        });
    }

    /// Removes one occurrence of `entry` from the bucket of `(x, y)`.
    ///
    /// Returns `false` (and changes nothing) if it is not there.
    pub fn remove(&mut self, entry: ParticleRef, x: u32, y: u32) -> bool {
        let key = self.bucket_of(x, y).key();
        let Some(bucket) = self.buckets.get_mut(&key) else {
            return false;
        };

        let mut prev: Option<PoolHandle> = None;
        let mut cursor = bucket.head;
        while let Some(handle) = cursor {
            let node = self.nodes.get(handle);
            debug_assert!(
                node.is_some(),
                "bucket of ({x}, {y}) links freed slot {}",
                handle.index()
            );
            let Some(node) = node else {
                tracing::error!(x, y, slot = handle.index(), "bucket links a freed node");
                return false;
            };
            let next = node.next;
            if node.entry == entry {
                match prev.and_then(|p| self.nodes.get_mut(p)) {
                    Some(prev_node) => prev_node.next = next,
                    None => bucket.head = next,
                }
                bucket.len -= 1;
                let emptied = bucket.len == 0;
                self.nodes.deallocate(handle);
                self.len -= 1;
                if emptied {
                    self.buckets.remove(&key);
                }
                return true;
            }
            prev = Some(handle);
            cursor = next;
        }
        false
    }

    /// All entries in the bucket of `(x, y)`.
    ///
    /// Bucket granularity: entries for other cells of the same bucket are
    /// included. Filter by position for exact-cell results.
    #[must_use]
    pub fn query(&self, x: u32, y: u32) -> Vec<ParticleRef> {
        self.entries(self.bucket_of(x, y)).collect()
    }

    /// Iterates over the entries of one bucket.
    #[must_use]
    pub fn entries(&self, coord: BucketCoord) -> BucketEntries<'_> {
        BucketEntries {
            nodes: &self.nodes,
            cursor: self.buckets.get(&coord.key()).and_then(|b| b.head),
        }
    }

    /// Number of entries in one bucket.
    #[must_use]
    pub fn bucket_len(&self, coord: BucketCoord) -> usize {
        self.buckets.get(&coord.key()).map_or(0, |b| b.len)
    }

    /// Every non-empty bucket with its entry count, in no particular order.
    pub fn buckets(&self) -> impl Iterator<Item = (BucketCoord, usize)> + '_ {
        self.buckets.values().map(|b| (b.coord, b.len))
    }

    /// Number of non-empty buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the index holds no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Upper bound on populated bucket coordinates, `None` when nothing
    /// has been inserted since the last clear.
    #[inline]
    #[must_use]
    pub const fn extent(&self) -> Option<BucketCoord> {
        self.extent
    }

    /// Drops every entry. Node chunks are kept for reuse.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.nodes.clear();
        self.len = 0;
        self.extent = None;
    }
}

/// Iterator over one bucket's entries.
pub struct BucketEntries<'a> {
    nodes: &'a PooledAllocator<Node>,
    cursor: Option<PoolHandle>,
}

impl Iterator for BucketEntries<'_> {
    type Item = ParticleRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.cursor?)?;
        self.cursor = node.next;
        Some(node.entry)
    }
}
