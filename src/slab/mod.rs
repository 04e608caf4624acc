//! Slab Allocator
//!
//! Serves small, frequently churned objects out of fixed-size slabs.
//! Every request is rounded up to a power-of-two size class; each class
//! carves 1 MiB slabs into equal chunks.
//!
//! # Architecture
//!
//! ```text
//! SlabAllocator (ceiling, committed)
//!   ├─→ SizeClass(8B)    → free: [c7, c2]   bump: slab#0 + 131064 left
//!   ├─→ SizeClass(16B)   → free: []         bump: none
//!   ├─→ ...
//!   └─→ SizeClass(1MiB)  → free: [c0]       bump: none
//!
//! allocate(size)
//!   ├─→ resolve(size)   → class id
//!   ├─→ free list       (LIFO pop)
//!   ├─→ bump cursor     (next unused chunk of newest slab)
//!   └─→ grow(class)     (new slab, subject to the memory ceiling)
//! ```
//!
//! Slabs are never handed back while the allocator lives. Freed chunks go
//! onto their class's free list and are reused most-recently-freed first.

pub mod allocator;
pub mod block;
pub mod chunk;
pub mod shared;
pub mod size_class;
pub mod stats;
pub mod strategy;
pub mod system;

pub use allocator::SlabAllocator;
pub use block::{Block, BlockSource, SystemBlocks};
pub use chunk::ChunkHandle;
pub use shared::SharedAllocator;
pub use size_class::{
    resolve, ClassId, SizeClass, NO_CLASS, POWER_BLOCK, POWER_LARGEST, POWER_SMALLEST,
};
pub use stats::{ClassStats, SlabStats};
pub use strategy::ChunkAllocator;
pub use system::SystemAllocator;
