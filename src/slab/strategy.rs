//! Allocator strategies
//!
//! Callers program against [`ChunkAllocator`]; configuration decides whether
//! the slab engine or the system pass-through sits behind it.

use super::chunk::ChunkHandle;
use super::stats::SlabStats;
use crate::config::Strategy;
use crate::error::Result;

/// Size-based chunk allocator
pub trait ChunkAllocator: Send {
    /// Which strategy this is
    fn strategy(&self) -> Strategy;

    /// Reset all state and set a new memory ceiling (zero = unbounded)
    ///
    /// Handles issued before the reset must not be used afterwards.
    fn init(&mut self, memory_ceiling: usize);

    /// Allocate a chunk able to hold `size` bytes
    fn allocate(&mut self, size: usize) -> Result<ChunkHandle>;

    /// Return a chunk
    ///
    /// # Safety
    /// `chunk` must come from `allocate` on this allocator, after its last
    /// `init`, and `size` must be the size passed to that call.
    unsafe fn free(&mut self, chunk: ChunkHandle, size: usize);

    /// Bytes currently committed against the ceiling
    fn memory_committed(&self) -> usize;

    fn memory_ceiling(&self) -> usize;

    /// Consistent usage snapshot
    fn stats(&self) -> SlabStats;

    /// `STAT` text report
    fn report(&self) -> String {
        self.stats().render()
    }
}
