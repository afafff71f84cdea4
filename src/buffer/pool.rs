//! Process-wide cache of reusable scratch buffers, keyed by size class.
//!
//! Large staging buffers dominate the cost of standing up a stream engine, so
//! they are pooled: one `CachedBufferAllocator` per size class, each with a
//! LIFO free-list so the most recently released buffer (the one most likely
//! still warm in cache) is handed out first. Released buffers are *not*
//! cleared; borrowers must treat their own length bookkeeping as the only
//! valid contract, never buffer contents.
//!
//! The allocator registry is an explicit, size-bounded MRU list rather than
//! a weak-reference table: the least-recently-used size class is evicted once
//! the bound is hit. Eviction is transparent to engines, which hold their own
//! `Arc` to the allocator; a later request for the same size class simply
//! creates a fresh allocator.

use std::sync::{Arc, Mutex, OnceLock};

use crate::buffer::{ForeignBuf, ScratchBuf, FOREIGN_ALIGN};
use crate::error::Result;

/// Upper bound on cached size classes. Real deployments use one or two block
/// sizes (plus their 1.5x compressed companions), so a small bound suffices.
const MAX_SIZE_CLASSES: usize = 8;

//==================================================================================
// I. Per-Size-Class Allocator
//==================================================================================

/// Free-lists for one fixed buffer capacity.
///
/// Every buffer handed out by one allocator has identical capacity; the size
/// class is the cache key. Two independent lists are kept: scratch buffers
/// (foreign or heap) for codec staging, and plain byte vectors for frame
/// assembly. Each list serializes on its own mutex, so independent size
/// classes never contend.
pub struct CachedBufferAllocator {
    buffer_size: usize,
    scratch: Mutex<Vec<ScratchBuf>>,
    byte_arrays: Mutex<Vec<Vec<u8>>>,
}

impl CachedBufferAllocator {
    fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            scratch: Mutex::new(Vec::new()),
            byte_arrays: Mutex::new(Vec::new()),
        }
    }

    /// The capacity of every buffer this allocator manages.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Pops the free-list, or creates a new buffer on a miss. `use_foreign`
    /// selects the aligned foreign allocation path for new buffers; recycled
    /// buffers keep whichever backing they were created with.
    pub fn allocate_buffer(&self, use_foreign: bool) -> Result<ScratchBuf> {
        if let Some(buf) = self.scratch.lock().expect("buffer pool poisoned").pop() {
            return Ok(buf);
        }
        if use_foreign {
            Ok(ScratchBuf::Foreign(ForeignBuf::alloc(
                self.buffer_size,
                FOREIGN_ALIGN,
            )?))
        } else {
            Ok(ScratchBuf::Heap(
                vec![0u8; self.buffer_size].into_boxed_slice(),
            ))
        }
    }

    /// Returns a scratch buffer to the free-list. Contents are left as-is.
    pub fn release_buffer(&self, buf: ScratchBuf) {
        debug_assert_eq!(buf.capacity(), self.buffer_size);
        self.scratch.lock().expect("buffer pool poisoned").push(buf);
    }

    /// Pops a plain byte vector, or allocates one sized to this class.
    pub fn allocate_bytes(&self) -> Vec<u8> {
        let recycled = self
            .byte_arrays
            .lock()
            .expect("buffer pool poisoned")
            .pop();
        match recycled {
            Some(mut v) => {
                v.clear();
                v
            }
            None => Vec::with_capacity(self.buffer_size),
        }
    }

    /// Returns a byte vector to the free-list.
    pub fn release_bytes(&self, buf: Vec<u8>) {
        self.byte_arrays
            .lock()
            .expect("buffer pool poisoned")
            .push(buf);
    }
}

//==================================================================================
// II. Global Size-Class Registry
//==================================================================================

/// MRU-ordered (size, allocator) pairs; front is most recently used.
type Registry = Vec<(usize, Arc<CachedBufferAllocator>)>;

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Vec::new()))
}

/// Returns the process-wide allocator for `buffer_size`, creating it if the
/// size class is absent (or was evicted).
pub fn allocator_for(buffer_size: usize) -> Arc<CachedBufferAllocator> {
    let mut table = registry().lock().expect("allocator registry poisoned");
    if let Some(pos) = table.iter().position(|(size, _)| *size == buffer_size) {
        let entry = table.remove(pos);
        let allocator = Arc::clone(&entry.1);
        table.insert(0, entry);
        return allocator;
    }
    let allocator = Arc::new(CachedBufferAllocator::new(buffer_size));
    table.insert(0, (buffer_size, Arc::clone(&allocator)));
    // Evict the coldest size class; live engines keep it alive via their Arc.
    table.truncate(MAX_SIZE_CLASSES);
    allocator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_buffer_is_reused_first() {
        let allocator = CachedBufferAllocator::new(8192);
        let buf = allocator.allocate_buffer(false).unwrap();
        let identity = buf.as_slice().as_ptr();
        allocator.release_buffer(buf);
        let again = allocator.allocate_buffer(false).unwrap();
        assert_eq!(again.as_slice().as_ptr(), identity);
    }

    #[test]
    fn free_list_is_lifo() {
        let allocator = CachedBufferAllocator::new(4096);
        let a = allocator.allocate_buffer(false).unwrap();
        let b = allocator.allocate_buffer(false).unwrap();
        let a_ptr = a.as_slice().as_ptr();
        let b_ptr = b.as_slice().as_ptr();
        allocator.release_buffer(a);
        allocator.release_buffer(b);
        // b was released last, so it comes back first.
        assert_eq!(allocator.allocate_buffer(false).unwrap().as_slice().as_ptr(), b_ptr);
        assert_eq!(allocator.allocate_buffer(false).unwrap().as_slice().as_ptr(), a_ptr);
    }

    #[test]
    fn reuse_does_not_clear_contents() {
        let allocator = CachedBufferAllocator::new(64);
        let mut buf = allocator.allocate_buffer(false).unwrap();
        buf.as_mut_slice()[0] = 0x5A;
        allocator.release_buffer(buf);
        assert_eq!(allocator.allocate_buffer(false).unwrap().as_slice()[0], 0x5A);
    }

    #[test]
    fn byte_arrays_are_recycled_empty() {
        let allocator = CachedBufferAllocator::new(256);
        let mut v = allocator.allocate_bytes();
        v.extend_from_slice(b"frame");
        allocator.release_bytes(v);
        let again = allocator.allocate_bytes();
        assert!(again.is_empty());
        assert!(again.capacity() >= 5);
    }

    #[test]
    fn registry_returns_same_allocator_per_size() {
        let a = allocator_for(512 * 1024);
        let b = allocator_for(512 * 1024);
        assert!(Arc::ptr_eq(&a, &b));
        let other = allocator_for(768 * 1024);
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(other.buffer_size(), 768 * 1024);
    }

    #[test]
    fn foreign_allocation_matches_size_class() {
        let allocator = CachedBufferAllocator::new(4096);
        let buf = allocator.allocate_buffer(true).unwrap();
        assert!(matches!(buf, ScratchBuf::Foreign(_)));
        assert_eq!(buf.capacity(), 4096);
    }
}
