//! # Pool Allocator
//!
//! Fixed-size block allocator for objects that are frequently allocated and freed.

use std::sync::atomic::{AtomicU32, Ordering};

use super::monitor::AllocationMonitor;
use crate::error::CoreError;

/// Source of unique pool ids, used to reject foreign handles.
static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(0);

/// A single pool slot.
///
/// Free slots thread the free list through themselves.
#[derive(Debug)]
enum Slot<T> {
    /// Holds a live value.
    Occupied(T),
    /// Free; `next` is the next free slot, if any.
    Free { next: Option<usize> },
}

/// A growable pool allocator for fixed-size objects.
///
/// Storage is a list of equally sized chunks. Freed slots are linked into an
/// intrusive free list and reused before the pool grows again. Every live
/// element is attributed to the pool's tag in the [`AllocationMonitor`];
/// chunk growth is attributed to `<tag>::chunks`.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: PooledAllocator<Node> = PooledAllocator::new(AllocationMonitor::new());
///
/// // Allocate - O(1), grows by one chunk when the free list is empty
/// let handle = pool.allocate(Node::default());
///
/// // Free - O(1), slot goes back on the free list
/// let node = pool.deallocate(handle);
/// ```
#[derive(Debug)]
pub struct PooledAllocator<T> {
    /// Backing chunks, each exactly `chunk_size` slots.
    chunks: Vec<Box<[Slot<T>]>>,
    /// Head of the intrusive free list.
    free_head: Option<usize>,
    /// Slots per chunk.
    chunk_size: usize,
    /// Number of live allocations.
    allocated_count: usize,
    /// Identity used to validate handles.
    pool_id: u32,
    /// Monitor tag for live elements.
    tag: String,
    /// Monitor tag for reserved chunk memory.
    chunk_tag: String,
    /// Usage accounting.
    monitor: AllocationMonitor,
}

/// Handle to an allocated object in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    /// Owning pool.
    pool_id: u32,
    /// Index into the pool.
    index: usize,
}

impl PoolHandle {
    /// Slot index inside the owning pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

impl<T> PooledAllocator<T> {
    /// Bytes attributed per live element.
    const ELEMENT_BYTES: usize = std::mem::size_of::<T>();

    /// Creates an empty pool tagged with the element type name.
    ///
    /// No memory is reserved until the first allocation.
    #[must_use]
    pub fn new(monitor: AllocationMonitor) -> Self {
        Self::with_tag(std::any::type_name::<T>(), crate::config::DEFAULT_POOL_CHUNK_SIZE, monitor)
    }

    /// Creates an empty pool with an explicit monitor tag and chunk size.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    #[must_use]
    pub fn with_tag(tag: &str, chunk_size: usize, monitor: AllocationMonitor) -> Self {
        assert!(chunk_size > 0, "Chunk size must be greater than zero");

        Self {
            chunks: Vec::new(),
            free_head: None,
            chunk_size,
            allocated_count: 0,
            pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            tag: tag.to_string(),
            chunk_tag: format!("{tag}::chunks"),
            monitor,
        }
    }

    /// Returns the total number of slots currently backed by chunks.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.chunk_size
    }

    /// Returns the number of currently allocated objects.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity() - self.allocated_count
    }

    /// Returns the monitor tag for live elements.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Allocates a slot and stores the object.
    ///
    /// O(1). When no free slot remains, the pool grows by one chunk.
    pub fn allocate(&mut self, value: T) -> PoolHandle {
        let index = match self.free_head {
            Some(index) => index,
            None => self.grow(),
        };

        let slot = self.slot_mut(index);
        let next = match slot {
            Slot::Free { next } => *next,
            Slot::Occupied(_) => unreachable!("free list points at a live slot"),
        };
        *slot = Slot::Occupied(value);
        self.free_head = next;
        self.allocated_count += 1;
        self.monitor.track_allocation(&self.tag, Self::ELEMENT_BYTES);

        PoolHandle {
            pool_id: self.pool_id,
            index,
        }
    }

    /// Frees an allocated object and returns it.
    ///
    /// O(1). The slot becomes the new free-list head.
    ///
    /// # Panics
    ///
    /// Panics with [`CoreError::AllocatorMisuse`] if the handle belongs to
    /// another pool, is out of range, or was already freed.
    pub fn deallocate(&mut self, handle: PoolHandle) -> T {
        self.check_handle(handle);

        let free_head = self.free_head;
        let slot = std::mem::replace(self.slot_mut(handle.index), Slot::Free { next: free_head });
        let value = match slot {
            Slot::Occupied(value) => value,
            free @ Slot::Free { .. } => {
                // Restore the slot before reporting so the pool stays walkable.
                *self.slot_mut(handle.index) = free;
                self.misuse(handle.index, "already free");
            }
        };

        self.free_head = Some(handle.index);
        self.allocated_count -= 1;
        self.monitor.track_deallocation(&self.tag, Self::ELEMENT_BYTES);
        value
    }

    /// Gets a reference to an allocated object.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        if handle.pool_id != self.pool_id {
            return None;
        }
        match self.slot(handle.index)? {
            Slot::Occupied(value) => Some(value),
            Slot::Free { .. } => None,
        }
    }

    /// Gets a mutable reference to an allocated object.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        if handle.pool_id != self.pool_id || handle.index >= self.capacity() {
            return None;
        }
        match self.slot_mut(handle.index) {
            Slot::Occupied(value) => Some(value),
            Slot::Free { .. } => None,
        }
    }

    /// Frees every allocation while keeping the chunks for reuse.
    pub fn clear(&mut self) {
        let capacity = self.capacity();
        let chunk_size = self.chunk_size;
        for (chunk_index, chunk) in self.chunks.iter_mut().enumerate() {
            for (offset, slot) in chunk.iter_mut().enumerate() {
                let index = chunk_index * chunk_size + offset;
                let next = (index + 1 < capacity).then_some(index + 1);
                *slot = Slot::Free { next };
            }
        }
        self.free_head = (capacity > 0).then_some(0);
        self.monitor
            .track_deallocation(&self.tag, self.allocated_count * Self::ELEMENT_BYTES);
        self.allocated_count = 0;
    }

    /// Iterates over all allocated objects.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        let pool_id = self.pool_id;
        let chunk_size = self.chunk_size;
        self.chunks.iter().enumerate().flat_map(move |(chunk_index, chunk)| {
            chunk.iter().enumerate().filter_map(move |(offset, slot)| match slot {
                Slot::Occupied(value) => Some((
                    PoolHandle {
                        pool_id,
                        index: chunk_index * chunk_size + offset,
                    },
                    value,
                )),
                Slot::Free { .. } => None,
            })
        })
    }

    /// Adds one chunk, links it into the free list and returns its first slot.
    fn grow(&mut self) -> usize {
        let base = self.capacity();
        let old_head = self.free_head;
        let chunk_size = self.chunk_size;
        let chunk: Box<[Slot<T>]> = (0..chunk_size)
            .map(|offset| Slot::Free {
                next: if offset + 1 < chunk_size {
                    Some(base + offset + 1)
                } else {
                    old_head
                },
            })
            .collect();
        self.chunks.push(chunk);
        self.free_head = Some(base);

        let bytes = chunk_size * std::mem::size_of::<Slot<T>>();
        self.monitor.track_allocation(&self.chunk_tag, bytes);
        tracing::trace!(
            pool = %self.tag,
            chunks = self.chunks.len(),
            bytes,
            "pool grew by one chunk"
        );
        base
    }

    fn slot(&self, index: usize) -> Option<&Slot<T>> {
        self.chunks
            .get(index / self.chunk_size)
            .map(|chunk| &chunk[index % self.chunk_size])
    }

    /// Callers guarantee `index < capacity()`.
    fn slot_mut(&mut self, index: usize) -> &mut Slot<T> {
        let chunk_size = self.chunk_size;
        &mut self.chunks[index / chunk_size][index % chunk_size]
    }

    fn check_handle(&self, handle: PoolHandle) {
        if handle.pool_id != self.pool_id {
            self.misuse(handle.index, "owned by another pool");
        }
        if handle.index >= self.capacity() {
            self.misuse(handle.index, "out of range");
        }
    }

    fn misuse(&self, slot: usize, reason: &'static str) -> ! {
        let error = CoreError::AllocatorMisuse {
            tag: self.tag.clone(),
            slot,
            reason,
        };
        tracing::error!(%error, "pool corrupted by caller");
        panic!("{error}");
    }
}

impl<T> Drop for PooledAllocator<T> {
    fn drop(&mut self) {
        self.monitor
            .track_deallocation(&self.tag, self.allocated_count * Self::ELEMENT_BYTES);
        self.monitor.track_deallocation(
            &self.chunk_tag,
            self.chunks.len() * self.chunk_size * std::mem::size_of::<Slot<T>>(),
        );
    }
}
