// memslab - Slab allocator for cache entries
// Power-of-two size classes carved out of 1 MiB slabs

#![warn(rust_2018_idioms)]

pub mod config;
pub mod metrics;
pub mod slab;

// Re-exports for convenience
pub use config::{AllocatorConfig, Strategy};
pub use slab::{
    resolve, ChunkAllocator, ChunkHandle, ClassId, SharedAllocator, SlabAllocator, SlabStats,
    SystemAllocator,
};

/// memslab error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        #[error("Unsupported size: {0} bytes has no size class")]
        UnsupportedSize(usize),

        #[error(
            "Out of budget: {requested} more bytes would exceed the {ceiling} byte ceiling \
             ({committed} committed)"
        )]
        OutOfBudget {
            requested: usize,
            committed: usize,
            ceiling: usize,
        },

        #[error("Allocation failed: {0}")]
        AllocationFailed(String),

        #[error("Invalid size class: {0}")]
        InvalidClass(usize),

        #[error("Configuration error: {0}")]
        Config(String),
    }

    impl Error {
        /// Short label used for metrics and logs
        pub fn reason(&self) -> &'static str {
            match self {
                Error::UnsupportedSize(_) => "unsupported_size",
                Error::OutOfBudget { .. } => "out_of_budget",
                Error::AllocationFailed(_) => "allocation_failed",
                Error::InvalidClass(_) => "invalid_class",
                Error::Config(_) => "config",
            }
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
