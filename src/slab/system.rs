//! Pass-through allocator
//!
//! Sends every request straight to the global allocator. Sizes are still
//! checked against the size classes so both strategies accept the same
//! requests, and the request size is charged against the memory ceiling.

use super::chunk::ChunkHandle;
use super::size_class::{resolve, NO_CLASS};
use super::stats::SlabStats;
use super::strategy::ChunkAllocator;
use crate::config::Strategy;
use crate::error::{Error, Result};
use crate::metrics;
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use tracing::{info, warn};

/// Alignment of pass-through chunks
const CHUNK_ALIGN: usize = 8;

/// Allocator that bypasses size classing
#[derive(Debug, Default)]
pub struct SystemAllocator {
    memory_ceiling: usize,
    memory_committed: usize,
}

impl SystemAllocator {
    pub fn new(memory_ceiling: usize) -> Self {
        Self {
            memory_ceiling,
            memory_committed: 0,
        }
    }

    fn layout(size: usize) -> Result<Layout> {
        Layout::from_size_align(size, CHUNK_ALIGN)
            .map_err(|e| Error::AllocationFailed(format!("bad layout for {} bytes: {}", size, e)))
    }
}

impl ChunkAllocator for SystemAllocator {
    fn strategy(&self) -> Strategy {
        Strategy::System
    }

    fn init(&mut self, memory_ceiling: usize) {
        self.memory_ceiling = memory_ceiling;
        self.memory_committed = 0;
        metrics::record_committed(0);
        info!(memory_ceiling, "Initialized system allocator");
    }

    fn allocate(&mut self, size: usize) -> Result<ChunkHandle> {
        if resolve(size) == NO_CLASS {
            metrics::record_failure("unsupported_size");
            return Err(Error::UnsupportedSize(size));
        }

        let committed = self.memory_committed + size;
        if self.memory_ceiling != 0 && committed > self.memory_ceiling {
            warn!(
                size,
                committed = self.memory_committed,
                ceiling = self.memory_ceiling,
                "Memory ceiling reached"
            );
            metrics::record_failure("out_of_budget");
            return Err(Error::OutOfBudget {
                requested: size,
                committed: self.memory_committed,
                ceiling: self.memory_ceiling,
            });
        }

        let layout = Self::layout(size)?;
        // SAFETY: resolve() rejected zero, so the layout is non-empty.
        let ptr = unsafe { alloc::alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            metrics::record_failure("allocation_failed");
            Error::AllocationFailed(format!("system allocator refused {} bytes", size))
        })?;

        self.memory_committed = committed;
        metrics::record_allocation("system");
        metrics::record_committed(committed);
        Ok(ChunkHandle::new(ptr))
    }

    unsafe fn free(&mut self, chunk: ChunkHandle, size: usize) {
        if resolve(size) == NO_CLASS {
            return;
        }
        let Ok(layout) = Self::layout(size) else {
            return;
        };

        self.memory_committed = self.memory_committed.saturating_sub(size);
        // SAFETY: the caller guarantees chunk came from allocate(size).
        alloc::dealloc(chunk.into_raw().as_ptr(), layout);
        metrics::record_free();
        metrics::record_committed(self.memory_committed);
    }

    fn memory_committed(&self) -> usize {
        self.memory_committed
    }

    fn memory_ceiling(&self) -> usize {
        self.memory_ceiling
    }

    fn stats(&self) -> SlabStats {
        SlabStats {
            classes: Vec::new(),
            active_slabs: 0,
            total_malloced: self.memory_committed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_accounting() -> Result<()> {
        let mut allocator = SystemAllocator::new(0);

        let a = allocator.allocate(100)?;
        let b = allocator.allocate(30)?;
        assert_eq!(allocator.memory_committed(), 130);

        unsafe { allocator.free(a, 100) };
        assert_eq!(allocator.memory_committed(), 30);
        unsafe { allocator.free(b, 30) };
        assert_eq!(allocator.memory_committed(), 0);
        Ok(())
    }

    #[test]
    fn test_system_ceiling() -> Result<()> {
        let mut allocator = SystemAllocator::new(256);

        let chunk = allocator.allocate(200)?;
        assert!(matches!(
            allocator.allocate(100),
            Err(Error::OutOfBudget { requested: 100, committed: 200, ceiling: 256 })
        ));

        unsafe { allocator.free(chunk, 200) };
        let again = allocator.allocate(100)?;
        unsafe { allocator.free(again, 100) };
        Ok(())
    }

    #[test]
    fn test_system_rejects_unclassified_sizes() {
        let mut allocator = SystemAllocator::new(0);

        assert_eq!(allocator.allocate(0), Err(Error::UnsupportedSize(0)));
        assert_eq!(
            allocator.allocate(2_000_000),
            Err(Error::UnsupportedSize(2_000_000))
        );
    }

    #[test]
    fn test_system_report() -> Result<()> {
        let mut allocator = SystemAllocator::new(0);
        let chunk = allocator.allocate(64)?;

        assert_eq!(
            allocator.report(),
            "STAT active_slabs 0\r\nSTAT total_malloced 64\r\n"
        );
        assert_eq!(allocator.strategy(), Strategy::System);

        unsafe { allocator.free(chunk, 64) };
        allocator.init(1024);
        assert_eq!(allocator.memory_ceiling(), 1024);
        Ok(())
    }
}
