//! Owned scratch-buffer types handed out by the pool.
//!
//! Two allocation paths exist behind one enum: a plain heap allocation, and
//! an explicitly aligned "foreign" allocation for zero-copy hand-off into
//! codec internals that want cache-line-aligned input. Both are fixed
//! capacity for their whole lifetime; position/length bookkeeping lives with
//! the borrower, never in the buffer.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::{CodecError, Result};

pub mod pool;

/// Alignment for foreign allocations. Matches the cache-line / vector-load
/// alignment the wrapped codecs prefer.
pub const FOREIGN_ALIGN: usize = 64;

//==================================================================================
// I. Aligned Foreign Buffer
//==================================================================================

/// An owned, explicitly aligned allocation outside the `Vec` growth machinery.
///
/// The lifetime is tracked by ownership alone: the memory is valid exactly as
/// long as the value exists and is freed once, on drop. Contents are
/// zero-initialized on creation and never cleared on pool reuse.
pub struct ForeignBuf {
    ptr: NonNull<u8>,
    layout: Layout,
}

// Raw pointer + layout; exclusive ownership makes cross-thread moves sound.
unsafe impl Send for ForeignBuf {}

impl ForeignBuf {
    /// Allocates `size` zeroed bytes at the requested alignment.
    pub fn alloc(size: usize, align: usize) -> Result<Self> {
        let layout = Layout::from_size_align(size, align).map_err(|e| {
            CodecError::InvalidArgument(format!(
                "bad foreign buffer layout (size {size}, align {align}): {e}"
            ))
        })?;
        if layout.size() == 0 {
            return Err(CodecError::InvalidArgument(
                "foreign buffer size must be non-zero".to_string(),
            ));
        }
        // SAFETY: layout is non-zero-sized and validated above.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
        Ok(Self { ptr, layout })
    }

    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr covers layout.size() initialized bytes for self's lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, plus &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for ForeignBuf {
    fn drop(&mut self) {
        // SAFETY: allocated with exactly this layout in `alloc`.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl std::fmt::Debug for ForeignBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignBuf")
            .field("capacity", &self.capacity())
            .field("align", &self.layout.align())
            .finish()
    }
}

//==================================================================================
// II. Scratch Buffer
//==================================================================================

/// A fixed-capacity staging buffer, either foreign-aligned or plain heap.
#[derive(Debug)]
pub enum ScratchBuf {
    Foreign(ForeignBuf),
    Heap(Box<[u8]>),
}

impl ScratchBuf {
    pub fn capacity(&self) -> usize {
        match self {
            ScratchBuf::Foreign(b) => b.capacity(),
            ScratchBuf::Heap(b) => b.len(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            ScratchBuf::Foreign(b) => b.as_slice(),
            ScratchBuf::Heap(b) => b,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            ScratchBuf::Foreign(b) => b.as_mut_slice(),
            ScratchBuf::Heap(b) => b,
        }
    }
}
