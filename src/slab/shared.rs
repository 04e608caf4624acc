//! Process-wide allocator handle
//!
//! One lock around the whole allocator: allocation can grow a slab, which
//! touches the global committed counter, and reports must see every class
//! at the same instant.

use super::chunk::ChunkHandle;
use super::stats::SlabStats;
use super::strategy::ChunkAllocator;
use crate::config::{AllocatorConfig, Strategy};
use crate::error::Result;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Cloneable, thread-safe handle to one [`ChunkAllocator`]
#[derive(Clone)]
pub struct SharedAllocator {
    inner: Arc<Mutex<Box<dyn ChunkAllocator>>>,
}

impl SharedAllocator {
    pub fn new(allocator: Box<dyn ChunkAllocator>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(allocator)),
        }
    }

    /// Build the allocator described by `config`
    pub fn from_config(config: &AllocatorConfig) -> Self {
        Self::new(config.build())
    }

    pub fn strategy(&self) -> Strategy {
        self.inner.lock().strategy()
    }

    /// Reset all state; see [`ChunkAllocator::init`]
    pub fn init(&self, memory_ceiling: usize) {
        self.inner.lock().init(memory_ceiling)
    }

    pub fn allocate(&self, size: usize) -> Result<ChunkHandle> {
        self.inner.lock().allocate(size)
    }

    /// Return a chunk
    ///
    /// # Safety
    /// Same contract as [`ChunkAllocator::free`].
    pub unsafe fn free(&self, chunk: ChunkHandle, size: usize) {
        self.inner.lock().free(chunk, size)
    }

    pub fn memory_committed(&self) -> usize {
        self.inner.lock().memory_committed()
    }

    pub fn stats(&self) -> SlabStats {
        self.inner.lock().stats()
    }

    pub fn report(&self) -> String {
        self.inner.lock().report()
    }
}

impl fmt::Debug for SharedAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SharedAllocator")
            .field("strategy", &inner.strategy())
            .field("memory_committed", &inner.memory_committed())
            .field("memory_ceiling", &inner.memory_ceiling())
            .finish()
    }
}
