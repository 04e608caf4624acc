//! Chunk handles handed out by the allocators

use std::fmt;
use std::ptr::NonNull;

/// Opaque handle to one chunk of memory owned by the caller
///
/// Not `Clone`: the handle moves back into the allocator on free, so safe
/// code cannot free the same chunk twice.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
    ptr: NonNull<u8>,
}

// SAFETY: a handle is an address plus exclusive ownership of the chunk it
// names; nothing in it is tied to the thread that allocated it.
unsafe impl Send for ChunkHandle {}
unsafe impl Sync for ChunkHandle {}

impl ChunkHandle {
    pub(crate) fn new(ptr: NonNull<u8>) -> Self {
        Self { ptr }
    }

    /// Raw pointer to the start of the chunk
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Address of the chunk, for comparisons and logging
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Give up the handle and keep only the pointer
    pub fn into_raw(self) -> NonNull<u8> {
        self.ptr
    }

    /// Rebuild a handle from a pointer previously returned by [`into_raw`]
    ///
    /// # Safety
    /// `ptr` must come from `into_raw` on a handle of the same allocator and
    /// must not have been rebuilt already.
    ///
    /// [`into_raw`]: ChunkHandle::into_raw
    pub unsafe fn from_raw(ptr: NonNull<u8>) -> Self {
        Self { ptr }
    }

    /// Handle `offset` bytes past this one, inside the same slab
    ///
    /// # Safety
    /// The result must stay within the slab this chunk belongs to.
    pub(crate) unsafe fn offset(&self, offset: usize) -> Self {
        Self {
            ptr: NonNull::new_unchecked(self.ptr.as_ptr().add(offset)),
        }
    }
}

impl fmt::Display for ChunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk({:#x})", self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_raw_round_trip() {
        let mut byte = 0u8;
        let ptr = NonNull::from(&mut byte);
        let handle = ChunkHandle::new(ptr);

        assert_eq!(handle.as_ptr(), ptr.as_ptr());
        assert_eq!(handle.addr(), ptr.as_ptr() as usize);

        let raw = handle.into_raw();
        let rebuilt = unsafe { ChunkHandle::from_raw(raw) };
        assert_eq!(rebuilt.addr(), ptr.as_ptr() as usize);
    }

    #[test]
    fn test_chunk_display() {
        let mut bytes = [0u8; 16];
        let handle = ChunkHandle::new(NonNull::from(&mut bytes[0]));
        let next = unsafe { handle.offset(8) };

        assert_eq!(next.addr() - handle.addr(), 8);
        assert!(handle.to_string().starts_with("Chunk(0x"));
    }
}
