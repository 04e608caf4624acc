//! Allocator configuration
//!
//! Settings come from an optional TOML file, overridden by `MEMSLAB_*`
//! environment variables:
//!
//! ```toml
//! memory_limit = 67108864   # bytes, 0 = unbounded
//! strategy = "slab"         # or "system"
//! ```

use crate::error::{Error, Result};
use crate::slab::{ChunkAllocator, SlabAllocator, SystemAllocator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MEMSLAB";

/// Which allocator serves chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Power-of-two size classes carved from slabs
    #[default]
    Slab,
    /// Straight to the system allocator
    System,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Slab => write!(f, "slab"),
            Strategy::System => write!(f, "system"),
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "slab" => Ok(Strategy::Slab),
            "system" => Ok(Strategy::System),
            other => Err(Error::Config(format!("unknown strategy: {}", other))),
        }
    }
}

/// Allocator configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Memory ceiling in bytes (0 = unbounded)
    pub memory_limit: usize,
    /// Allocator strategy
    pub strategy: Strategy,
}

impl AllocatorConfig {
    /// Load from an optional file, then apply `MEMSLAB_*` overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Build the configured allocator
    pub fn build(&self) -> Box<dyn ChunkAllocator> {
        match self.strategy {
            Strategy::Slab => Box::new(SlabAllocator::new(self.memory_limit)),
            Strategy::System => Box::new(SystemAllocator::new(self.memory_limit)),
        }
    }
}
