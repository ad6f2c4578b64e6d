//! Per-call bump arena for transient batch buffers.
//!
//! Every batch operation on the cache encodes keys, prefixes them, and copies
//! values out of the store. Those buffers only live for the duration of the
//! call, so they are carved out of an [`Arena`] supplied by the caller and
//! released all at once when the arena is reset or dropped.
//!
//! An arena is `!Sync`: it can be moved between threads but never shared by
//! two concurrent calls.
//!
//! # Example
//!
//! ```
//! use labelcache::Arena;
//!
//! let mut arena = Arena::new();
//! let key = arena.alloc_copy(b"series").unwrap();
//! assert_eq!(key, b"series");
//! arena.reset();
//! ```

use crate::error::{Error, Result};
use bumpalo::Bump;
use std::alloc::Layout;

/// Bump-allocated scratch memory for a single logical batch.
#[derive(Default)]
pub struct Arena {
    bump: Bump,
}

impl Arena {
    /// Create an empty arena. Memory is reserved lazily.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an arena with `bytes` of memory reserved up front.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bump: Bump::with_capacity(bytes),
        }
    }

    /// Create an arena that refuses to grow beyond `limit` bytes.
    ///
    /// Operations that need more scratch space than the limit allows fail
    /// with [`Error::ArenaExhausted`] instead of allocating.
    pub fn with_limit(limit: usize) -> Self {
        let bump = Bump::new();
        bump.set_allocation_limit(Some(limit));
        Self { bump }
    }

    /// The allocation limit, if any.
    pub fn limit(&self) -> Option<usize> {
        self.bump.allocation_limit()
    }

    /// Total bytes currently reserved by the arena's chunks.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Free every allocation at once, keeping the largest chunk for reuse.
    pub fn reset(&mut self) {
        self.bump.reset();
    }

    /// Allocate a zeroed byte buffer of `len` bytes.
    pub fn alloc_bytes(&self, len: usize) -> Result<&mut [u8]> {
        let layout = Layout::array::<u8>(len).map_err(|_| self.exhausted(len))?;
        let ptr = self
            .bump
            .try_alloc_layout(layout)
            .map_err(|_| self.exhausted(len))?;

        // SAFETY: `ptr` is a fresh, exclusively owned allocation of `len`
        // bytes that stays valid until the bump is reset, which requires
        // `&mut self` and so cannot happen while the slice is borrowed.
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, len);
            Ok(std::slice::from_raw_parts_mut(ptr.as_ptr(), len))
        }
    }

    /// Copy `src` into the arena.
    pub fn alloc_copy(&self, src: &[u8]) -> Result<&[u8]> {
        let dst = self.alloc_bytes(src.len())?;
        dst.copy_from_slice(src);
        Ok(dst)
    }

    fn exhausted(&self, requested: usize) -> Error {
        Error::ArenaExhausted {
            requested,
            limit: self.limit(),
        }
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("allocated_bytes", &self.allocated_bytes())
            .field("limit", &self.limit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_copy() {
        let arena = Arena::new();
        let a = arena.alloc_copy(b"hello").unwrap();
        let b = arena.alloc_copy(b"world").unwrap();
        assert_eq!(a, b"hello");
        assert_eq!(b, b"world");
    }

    #[test]
    fn test_alloc_bytes_zeroed() {
        let arena = Arena::new();
        let buf = arena.alloc_bytes(16).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&b| b == 0));
        buf[0] = 7;
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn test_zero_length() {
        let arena = Arena::new();
        assert!(arena.alloc_bytes(0).unwrap().is_empty());
        assert!(arena.alloc_copy(b"").unwrap().is_empty());
    }

    #[test]
    fn test_limit_exhausted() {
        let arena = Arena::with_limit(1024);
        assert_eq!(arena.limit(), Some(1024));

        let err = arena.alloc_bytes(1024 * 1024).unwrap_err();
        assert!(matches!(
            err,
            Error::ArenaExhausted {
                requested: 1048576,
                limit: Some(1024)
            }
        ));
    }

    #[test]
    fn test_reset_reuses_memory() {
        let mut arena = Arena::with_capacity(4096);
        for _ in 0..64 {
            arena.alloc_bytes(32).unwrap();
        }
        let reserved = arena.allocated_bytes();
        assert!(reserved >= 64 * 32);

        arena.reset();
        arena.alloc_bytes(32).unwrap();
        assert!(arena.allocated_bytes() <= reserved);
    }
}
