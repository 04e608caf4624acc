//! Raw memory blocks backing the slabs
//!
//! A [`BlockSource`] is the "underlying system" the allocator claims memory
//! from. [`SystemBlocks`] asks the global Rust allocator for zeroed, page
//! aligned blocks; tests swap in sources that run dry.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Alignment of every block; chunks inherit `min(chunk_size, BLOCK_ALIGN)`
pub const BLOCK_ALIGN: usize = 4096;

/// One contiguous block of memory owned by the allocator
#[derive(Debug)]
pub struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: a block is uniquely owned heap memory; moving it between threads
// moves that ownership with it.
unsafe impl Send for Block {}

impl Block {
    /// Wrap memory obtained with `layout`
    ///
    /// # Safety
    /// `ptr` must point to a live allocation of `layout` that the caller
    /// hands over, and the owning [`BlockSource`] must know how to release it.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, layout: Layout) -> Self {
        Self { ptr, layout }
    }

    /// Base address of the block
    pub fn base(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size of the block in bytes
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }
}

/// Where slabs come from
pub trait BlockSource: Send {
    /// Acquire one zero-initialized block of `len` bytes
    ///
    /// Returns `None` when the underlying system refuses.
    fn acquire(&mut self, len: usize) -> Option<Block>;

    /// Give a block back. Only called when the allocator is reset or dropped.
    fn release(&mut self, block: Block);
}

/// Blocks from the global allocator
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBlocks;

impl BlockSource for SystemBlocks {
    fn acquire(&mut self, len: usize) -> Option<Block> {
        let layout = Layout::from_size_align(len, BLOCK_ALIGN).ok()?;
        if layout.size() == 0 {
            return None;
        }

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).map(|ptr| Block { ptr, layout })
    }

    fn release(&mut self, block: Block) {
        // SAFETY: every Block this source hands out was allocated above
        // with exactly this layout.
        unsafe { alloc::dealloc(block.ptr.as_ptr(), block.layout) }
    }
}
