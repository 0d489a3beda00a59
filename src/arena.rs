//! Per-request bump-style allocator.
//!
//! Headers and the path/query views the parser hands out borrow from the
//! connection's read buffer. A handler that wants to keep a copy beyond the
//! request's lifetime — or that builds a body the serializer must own — puts
//! it here instead of leaking a heap allocation into a static. The arena is
//! dropped with the request's [`crate::Context`].
use std::cell::RefCell;

#[derive(Default)]
pub struct Arena {
    chunks: RefCell<Vec<Box<[u8]>>>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `bytes` into the arena and returns a slice borrowed from `self`.
    pub fn alloc_bytes(&self, bytes: &[u8]) -> &[u8] {
        let boxed: Box<[u8]> = bytes.into();
        let ptr = boxed.as_ptr();
        let len = boxed.len();
        self.chunks.borrow_mut().push(boxed);
        // SAFETY: `boxed` is moved into `self.chunks`, which only ever grows;
        // the heap allocation backing the slice is never reallocated or
        // freed while `self` is alive, so `ptr..ptr+len` stays valid for the
        // lifetime of the `&self` borrow we return it with.
        unsafe { std::slice::from_raw_parts(ptr, len) }
    }

    /// Copies `s` into the arena and returns a `&str` borrowed from `self`.
    pub fn alloc_str<'a>(&'a self, s: &str) -> &'a str {
        // `s` was already validated UTF-8; the copy preserves that.
        std::str::from_utf8(self.alloc_bytes(s.as_bytes())).expect("input was valid utf-8")
    }

    pub fn len(&self) -> usize {
        self.chunks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_stable_copies() {
        let arena = Arena::new();
        let a = arena.alloc_str("hello");
        let b = arena.alloc_str("world");
        assert_eq!(a, "hello");
        assert_eq!(b, "world");
        assert_eq!(arena.len(), 2);
    }
}
