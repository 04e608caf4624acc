//! Size class management for slab allocator

use super::block::Block;
use super::chunk::ChunkHandle;
use std::collections::TryReserveError;

/// Smallest usable class: 8-byte chunks
pub const POWER_SMALLEST: usize = 3;
/// Largest usable class: one chunk per slab
pub const POWER_LARGEST: usize = 20;
/// Bytes per slab
pub const POWER_BLOCK: usize = 1 << 20;
/// "No class" sentinel returned by [`resolve`]
pub const NO_CLASS: ClassId = 0;

/// First capacity of a free list or slab list
const INITIAL_LIST_CAPACITY: usize = 16;

/// Size class index; class `id` serves chunks of `2^id` bytes
pub type ClassId = usize;

/// Map a request size to its size class
///
/// Returns the exponent of the smallest power of two holding `size`,
/// raised to [`POWER_SMALLEST`]. Zero-sized requests and requests above
/// `2^POWER_LARGEST` get [`NO_CLASS`].
#[inline]
pub fn resolve(size: usize) -> ClassId {
    if size == 0 {
        return NO_CLASS;
    }

    let power = match size.checked_next_power_of_two() {
        Some(power) => power.trailing_zeros() as usize,
        None => return NO_CLASS,
    };

    let id = power.max(POWER_SMALLEST);
    if id > POWER_LARGEST {
        NO_CLASS
    } else {
        id
    }
}

/// Whether `id` names a class allocations can come from
pub fn is_usable(id: ClassId) -> bool {
    (POWER_SMALLEST..=POWER_LARGEST).contains(&id)
}

/// Make room for one more element: 16 slots at first, then double
///
/// Existing elements are untouched when the reservation fails.
pub(crate) fn reserve_geometric<T>(list: &mut Vec<T>) -> Result<(), TryReserveError> {
    if list.len() < list.capacity() {
        return Ok(());
    }

    let target = if list.capacity() == 0 {
        INITIAL_LIST_CAPACITY
    } else {
        list.capacity().saturating_mul(2)
    };
    list.try_reserve_exact(target - list.len())
}

/// Bookkeeping for one power-of-two size class
#[derive(Debug)]
pub struct SizeClass {
    /// Index of this size class
    pub id: ClassId,
    /// Bytes per chunk (`2^id`)
    pub chunk_size: usize,
    /// Chunks carved out of each slab
    pub chunks_per_slab: usize,
    /// Freed chunks, most recently freed last
    free_list: Vec<ChunkHandle>,
    /// Next never-served chunk of the newest slab
    bump_cursor: Option<ChunkHandle>,
    /// Chunks left behind the cursor
    bump_remaining: usize,
    /// Every slab acquired for this class
    slabs: Vec<Block>,
    /// One-based index of a slab earmarked for reclamation, zero if none
    reclaim_marker: usize,
}

impl SizeClass {
    /// Create an empty size class
    pub fn new(id: ClassId) -> Self {
        let chunk_size = 1usize << id;
        Self {
            id,
            chunk_size,
            chunks_per_slab: POWER_BLOCK / chunk_size,
            free_list: Vec::new(),
            bump_cursor: None,
            bump_remaining: 0,
            slabs: Vec::new(),
            reclaim_marker: 0,
        }
    }

    /// Reuse the most recently freed chunk
    pub(crate) fn pop_free(&mut self) -> Option<ChunkHandle> {
        self.free_list.pop()
    }

    /// Hand out the chunk under the bump cursor and advance it
    pub(crate) fn take_bump(&mut self) -> Option<ChunkHandle> {
        if self.bump_remaining == 0 {
            return None;
        }

        let chunk = self.bump_cursor.take()?;
        self.bump_remaining -= 1;
        if self.bump_remaining > 0 {
            // SAFETY: bump_remaining more chunks follow this one in the slab.
            self.bump_cursor = Some(unsafe { chunk.offset(self.chunk_size) });
        }
        Some(chunk)
    }

    /// Put a chunk on the free list
    ///
    /// Gives the chunk back if the list cannot grow.
    pub(crate) fn push_free(&mut self, chunk: ChunkHandle) -> Result<(), ChunkHandle> {
        if reserve_geometric(&mut self.free_list).is_err() {
            return Err(chunk);
        }
        self.free_list.push(chunk);
        Ok(())
    }

    /// Ensure the slab list can take one more slab without allocating
    pub(crate) fn reserve_slab(&mut self) -> Result<(), TryReserveError> {
        reserve_geometric(&mut self.slabs)
    }

    /// Register a freshly acquired slab and point the bump cursor at it
    ///
    /// Whatever was left of the previous slab's tail is abandoned.
    pub(crate) fn install_slab(&mut self, block: Block) {
        self.bump_cursor = Some(ChunkHandle::new(block.base()));
        self.bump_remaining = self.chunks_per_slab;
        self.slabs.push(block);
    }

    /// Empty the class, returning its slabs
    pub(crate) fn take_slabs(&mut self) -> Vec<Block> {
        self.free_list.clear();
        self.bump_cursor = None;
        self.bump_remaining = 0;
        self.reclaim_marker = 0;
        std::mem::take(&mut self.slabs)
    }

    /// Number of slabs acquired
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Base addresses of every slab, in acquisition order
    pub fn slab_bases(&self) -> impl Iterator<Item = usize> + '_ {
        self.slabs.iter().map(|b| b.base().as_ptr() as usize)
    }

    pub fn slab_capacity(&self) -> usize {
        self.slabs.capacity()
    }

    /// Number of chunks on the free list
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    pub fn free_capacity(&self) -> usize {
        self.free_list.capacity()
    }

    /// Chunks not yet served from the newest slab
    pub fn bump_remaining(&self) -> usize {
        self.bump_remaining
    }

    pub fn reclaim_marker(&self) -> usize {
        self.reclaim_marker
    }

    /// Total chunks across all slabs (including free)
    pub fn total_chunks(&self) -> usize {
        self.slabs.len() * self.chunks_per_slab
    }
}
