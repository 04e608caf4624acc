//! Slab allocator implementation

use super::block::{BlockSource, SystemBlocks};
use super::chunk::ChunkHandle;
use super::size_class::{
    is_usable, resolve, ClassId, SizeClass, NO_CLASS, POWER_BLOCK, POWER_LARGEST,
};
use super::stats::SlabStats;
use super::strategy::ChunkAllocator;
use crate::config::Strategy;
use crate::error::{Error, Result};
use crate::metrics;
use tracing::{debug, info, warn};

/// Power-of-two slab allocator
///
/// Owns one [`SizeClass`] per class id and every slab acquired for them.
/// Requests are served from the class free list first, then from the bump
/// cursor of the newest slab, and only then by growing a new slab.
/// Slabs stay claimed until the allocator is re-initialized or dropped.
pub struct SlabAllocator<S: BlockSource = SystemBlocks> {
    /// Size classes, indexed by class id (0..=POWER_LARGEST)
    classes: Vec<SizeClass>,
    /// Byte limit for slabs, zero for none
    memory_ceiling: usize,
    /// Bytes acquired so far
    memory_committed: usize,
    /// Where slabs come from
    source: S,
}

impl SlabAllocator<SystemBlocks> {
    /// Create a slab allocator backed by the global allocator
    ///
    /// # Arguments
    /// * `memory_ceiling` - Maximum bytes committed to slabs, 0 for unbounded
    pub fn new(memory_ceiling: usize) -> Self {
        Self::with_source(memory_ceiling, SystemBlocks)
    }
}

impl Default for SlabAllocator<SystemBlocks> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<S: BlockSource> SlabAllocator<S> {
    /// Create a slab allocator drawing slabs from `source`
    pub fn with_source(memory_ceiling: usize, source: S) -> Self {
        let mut allocator = Self {
            classes: Vec::new(),
            memory_ceiling: 0,
            memory_committed: 0,
            source,
        };
        allocator.init(memory_ceiling);
        allocator
    }

    /// Rebuild the class table and set a new ceiling
    ///
    /// Slabs acquired before are given back to the block source, so any
    /// handle issued before this call dangles afterwards.
    pub fn init(&mut self, memory_ceiling: usize) {
        self.release_slabs();

        self.classes = (0..=POWER_LARGEST).map(SizeClass::new).collect();
        self.memory_ceiling = memory_ceiling;
        self.memory_committed = 0;
        metrics::record_committed(0);

        info!(
            memory_ceiling,
            classes = self.classes.len(),
            "Initialized slab allocator"
        );
    }

    fn release_slabs(&mut self) {
        for class in &mut self.classes {
            for block in class.take_slabs() {
                self.source.release(block);
            }
        }
    }

    /// Size class for `size`; see [`resolve`]
    pub fn resolve(size: usize) -> ClassId {
        resolve(size)
    }

    /// Class table entry for `id`
    pub fn class(&self, id: ClassId) -> Option<&SizeClass> {
        self.classes.get(id)
    }

    /// All class table entries, indexed by id
    pub fn classes(&self) -> &[SizeClass] {
        &self.classes
    }

    pub fn memory_ceiling(&self) -> usize {
        self.memory_ceiling
    }

    pub fn memory_committed(&self) -> usize {
        self.memory_committed
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Acquire a new slab for class `id`
    ///
    /// Fails without touching any state if the ceiling would be exceeded.
    /// The slab list is grown before memory is acquired, so a slab is never
    /// acquired without a place to record it.
    pub fn grow(&mut self, id: ClassId) -> Result<()> {
        if !is_usable(id) {
            return Err(Error::InvalidClass(id));
        }

        let len = POWER_BLOCK;
        let over_budget = self
            .memory_committed
            .checked_add(len)
            .map_or(true, |total| total > self.memory_ceiling);
        if self.memory_ceiling != 0 && over_budget {
            warn!(
                class = id,
                committed = self.memory_committed,
                ceiling = self.memory_ceiling,
                "Memory ceiling reached"
            );
            metrics::record_failure("out_of_budget");
            return Err(Error::OutOfBudget {
                requested: len,
                committed: self.memory_committed,
                ceiling: self.memory_ceiling,
            });
        }

        let class = &mut self.classes[id];
        if let Err(e) = class.reserve_slab() {
            warn!(class = id, error = %e, "Slab list cannot grow");
            metrics::record_failure("allocation_failed");
            return Err(Error::AllocationFailed(format!(
                "slab list for class {} cannot grow: {}",
                id, e
            )));
        }

        let block = match self.source.acquire(len) {
            Some(block) => block,
            None => {
                warn!(class = id, len, "Underlying system refused a slab");
                metrics::record_failure("allocation_failed");
                return Err(Error::AllocationFailed(format!(
                    "no {} byte block for class {}",
                    len, id
                )));
            }
        };

        class.install_slab(block);
        self.memory_committed += len;

        debug!(
            class = id,
            slabs = class.slab_count(),
            committed = self.memory_committed,
            "Acquired slab"
        );
        metrics::record_slab(self.memory_committed);
        Ok(())
    }

    /// Allocate a chunk able to hold `size` bytes
    ///
    /// The same `size` must be passed to [`free`](Self::free) later.
    pub fn allocate(&mut self, size: usize) -> Result<ChunkHandle> {
        let id = resolve(size);
        if id == NO_CLASS {
            metrics::record_failure("unsupported_size");
            return Err(Error::UnsupportedSize(size));
        }

        if let Some(chunk) = self.classes[id].pop_free() {
            metrics::record_allocation("free_list");
            return Ok(chunk);
        }

        if self.classes[id].bump_remaining() == 0 {
            self.grow(id)?;
        }

        let chunk = self.classes[id].take_bump().ok_or_else(|| {
            Error::AllocationFailed(format!("class {} has no chunk after growing", id))
        })?;
        metrics::record_allocation("bump");
        Ok(chunk)
    }

    /// Put a chunk back on its class free list
    ///
    /// Sizes without a class are ignored. If the free list cannot grow the
    /// chunk is leaked and the list is left as it was.
    ///
    /// # Safety
    /// `chunk` must come from [`allocate`](Self::allocate) on this allocator
    /// since its last [`init`](Self::init), called with the same `size`.
    pub unsafe fn free(&mut self, chunk: ChunkHandle, size: usize) {
        let id = resolve(size);
        if id == NO_CLASS {
            return;
        }

        if let Err(chunk) = self.classes[id].push_free(chunk) {
            warn!(class = id, %chunk, "Free list cannot grow, chunk leaked");
            metrics::record_failure("free_list_full");
            return;
        }
        metrics::record_free();
    }

    /// Get statistics about the allocator
    pub fn stats(&self) -> SlabStats {
        SlabStats::collect(&self.classes, self.memory_committed)
    }

    /// `STAT` text report
    pub fn report(&self) -> String {
        self.stats().render()
    }
}

impl<S: BlockSource> Drop for SlabAllocator<S> {
    fn drop(&mut self) {
        self.release_slabs();
    }
}

impl<S: BlockSource> ChunkAllocator for SlabAllocator<S> {
    fn strategy(&self) -> Strategy {
        Strategy::Slab
    }

    fn init(&mut self, memory_ceiling: usize) {
        SlabAllocator::init(self, memory_ceiling)
    }

    fn allocate(&mut self, size: usize) -> Result<ChunkHandle> {
        SlabAllocator::allocate(self, size)
    }

    unsafe fn free(&mut self, chunk: ChunkHandle, size: usize) {
        SlabAllocator::free(self, chunk, size)
    }

    fn memory_committed(&self) -> usize {
        self.memory_committed
    }

    fn memory_ceiling(&self) -> usize {
        self.memory_ceiling
    }

    fn stats(&self) -> SlabStats {
        SlabAllocator::stats(self)
    }
}
