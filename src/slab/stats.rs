//! Usage snapshots and the `STAT` text report

use super::size_class::{ClassId, SizeClass};
use serde::Serialize;
use std::fmt;

/// Per-class usage figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    pub class_id: ClassId,
    pub chunk_size: usize,
    pub chunks_per_page: usize,
    pub total_pages: usize,
    pub total_chunks: usize,
    /// Chunks not on the free list, including the unserved tail of the newest slab
    pub used_chunks: usize,
    pub free_chunks: usize,
    pub free_chunks_end: usize,
}

impl ClassStats {
    pub(crate) fn from_class(sc: &SizeClass) -> Self {
        let total_chunks = sc.total_chunks();
        Self {
            class_id: sc.id,
            chunk_size: sc.chunk_size,
            chunks_per_page: sc.chunks_per_slab,
            total_pages: sc.slab_count(),
            total_chunks,
            used_chunks: total_chunks.saturating_sub(sc.free_count()),
            free_chunks: sc.free_count(),
            free_chunks_end: sc.bump_remaining(),
        }
    }
}

/// Consistent snapshot of an allocator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlabStats {
    /// Classes with at least one slab, ascending by id
    pub classes: Vec<ClassStats>,
    /// Number of classes in `classes`
    pub active_slabs: usize,
    /// Bytes committed from the underlying system
    pub total_malloced: usize,
}

impl SlabStats {
    /// Snapshot of a class table
    pub fn collect<'a>(
        classes: impl IntoIterator<Item = &'a SizeClass>,
        total_malloced: usize,
    ) -> Self {
        let classes: Vec<ClassStats> = classes
            .into_iter()
            .filter(|sc| sc.slab_count() > 0)
            .map(ClassStats::from_class)
            .collect();

        Self {
            active_slabs: classes.len(),
            classes,
            total_malloced,
        }
    }

    pub fn class(&self, id: ClassId) -> Option<&ClassStats> {
        self.classes.iter().find(|c| c.class_id == id)
    }

    /// Render as CRLF-terminated `STAT key value` lines
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SlabStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.classes {
            let id = c.class_id;
            write!(f, "STAT {}:chunk_size {}\r\n", id, c.chunk_size)?;
            write!(f, "STAT {}:chunks_per_page {}\r\n", id, c.chunks_per_page)?;
            write!(f, "STAT {}:total_pages {}\r\n", id, c.total_pages)?;
            write!(f, "STAT {}:total_chunks {}\r\n", id, c.total_chunks)?;
            write!(f, "STAT {}:used_chunks {}\r\n", id, c.used_chunks)?;
            write!(f, "STAT {}:free_chunks {}\r\n", id, c.free_chunks)?;
            write!(f, "STAT {}:free_chunks_end {}\r\n", id, c.free_chunks_end)?;
        }
        write!(f, "STAT active_slabs {}\r\n", self.active_slabs)?;
        write!(f, "STAT total_malloced {}\r\n", self.total_malloced)
    }
}
