//! The push-model compression engine.
//!
//! Adapts the single-shot native compress call to an incremental protocol:
//! callers push input with `set_input`, poll `needs_input`, and pull
//! compressed bytes with `compress` until `finished` reports true. One
//! engine owns one codec context and two pooled staging buffers for its
//! whole lifetime; `reset` makes it reusable for the next stream without
//! reallocating either.
//!
//! Exactly one thread may drive an engine at a time. There is no internal
//! locking; exclusivity is the caller's contract.

use std::sync::Arc;

use bytes::{Buf, Bytes};

use crate::buffer::pool::{allocator_for, CachedBufferAllocator};
use crate::buffer::ScratchBuf;
use crate::config::{compressed_capacity, CodecConfig};
use crate::error::{CodecError, Result};
use crate::native::CompressContext;

pub struct Compressor {
    context: Option<CompressContext>,

    uncompressed_allocator: Arc<CachedBufferAllocator>,
    compressed_allocator: Arc<CachedBufferAllocator>,
    /// Input staging; capacity = block size.
    uncompressed: Option<ScratchBuf>,
    /// Output staging; capacity = 1.5x block size (worst-case expansion).
    compressed: Option<ScratchBuf>,

    block_size: usize,
    /// Bytes buffered for the next native call.
    uncompressed_len: usize,
    /// Drain window over freshly produced compressed output.
    compressed_pos: usize,
    compressed_len: usize,

    /// Caller data that did not fit the staging buffer. Held as a cheap
    /// reference-counted span; nothing is copied until it is drained. At
    /// most one pending span exists at a time.
    pending: Bytes,

    finish: bool,
    finished: bool,

    bytes_read: u64,
    bytes_written: u64,
}

impl Compressor {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        let uncompressed_allocator = allocator_for(config.block_size);
        let compressed_allocator = allocator_for(compressed_capacity(config.block_size));
        let uncompressed = uncompressed_allocator.allocate_buffer(config.use_foreign_buffer)?;
        let compressed = compressed_allocator.allocate_buffer(config.use_foreign_buffer)?;
        let context = CompressContext::new(config.codec, config.level)?;
        log::debug!(
            "created compressor: codec {}, level {}, block size {}",
            config.codec,
            config.level,
            config.block_size
        );
        Ok(Self {
            context: Some(context),
            uncompressed_allocator,
            compressed_allocator,
            uncompressed: Some(uncompressed),
            compressed: Some(compressed),
            block_size: config.block_size,
            uncompressed_len: 0,
            compressed_pos: 0,
            compressed_len: 0,
            pending: Bytes::new(),
            finish: false,
            finished: false,
            bytes_read: 0,
            bytes_written: 0,
        })
    }

    /// Supplies input. If the span fits the remaining staging capacity it is
    /// copied immediately; otherwise the whole span is recorded as pending
    /// and drained later, zero-copy. Call only while `needs_input` is true.
    pub fn set_input(&mut self, data: &Bytes, offset: usize, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or(CodecError::OutOfRange {
                offset,
                length: len,
                extent: data.len(),
            })?;
        let staging = self.uncompressed.as_mut().ok_or(CodecError::NotInitialized)?;
        self.finished = false;

        if len > self.block_size - self.uncompressed_len {
            // Set aside; loaded once the compressed output is consumed.
            debug_assert!(self.pending.is_empty(), "second set_input while one is pending");
            self.pending = data.slice(offset..end);
        } else {
            staging.as_mut_slice()[self.uncompressed_len..self.uncompressed_len + len]
                .copy_from_slice(&data[offset..end]);
            self.uncompressed_len += len;
        }

        self.bytes_read += len as u64;
        Ok(())
    }

    /// True iff the caller must supply more bytes before anything further
    /// can be produced: no leftover compressed output, staging not full,
    /// nothing pending.
    pub fn needs_input(&self) -> bool {
        !(self.compressed_remaining() > 0
            || self.uncompressed_len == self.block_size
            || !self.pending.is_empty())
    }

    /// Declares that no more input will arrive after what is already
    /// buffered or pending. Idempotent.
    pub fn finish(&mut self) {
        self.finish = true;
    }

    /// True once `finish` was called, all input has been consumed, and no
    /// compressed output remains to be drained.
    pub fn finished(&self) -> bool {
        self.finish && self.finished && self.compressed_remaining() == 0
    }

    /// Produces up to `out.len()` compressed bytes, returning the count.
    /// A return of 0 means `needs_input`/`finished` should be consulted.
    pub fn compress(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.context.is_none() {
            return Err(CodecError::NotInitialized);
        }

        // Drain leftovers from the previous native call first.
        if self.compressed_remaining() > 0 {
            return Ok(self.drain_compressed(out));
        }

        if self.uncompressed_len == 0 {
            self.load_pending();
            if self.uncompressed_len == 0 {
                // Called without data; nothing left to flush.
                self.finished = true;
                return Ok(0);
            }
        }

        let src = self.uncompressed.as_ref().ok_or(CodecError::NotInitialized)?;
        let dst = self.compressed.as_mut().ok_or(CodecError::NotInitialized)?;
        let context = self.context.as_mut().ok_or(CodecError::NotInitialized)?;
        let produced = context.compress(
            &src.as_slice()[..self.uncompressed_len],
            dst.as_mut_slice(),
        )?;
        self.compressed_pos = 0;
        self.compressed_len = produced;
        // The native call consumes the whole staged input.
        self.uncompressed_len = 0;

        if self.pending.is_empty() {
            self.finished = true;
        }

        Ok(self.drain_compressed(out))
    }

    /// Clears all flags, offsets, and counters. Staging buffers and the
    /// codec context are retained for reuse.
    pub fn reset(&mut self) {
        self.finish = false;
        self.finished = false;
        self.uncompressed_len = 0;
        self.compressed_pos = 0;
        self.compressed_len = 0;
        self.pending = Bytes::new();
        self.bytes_read = 0;
        self.bytes_written = 0;
    }

    /// Uncompressed bytes accepted since the last `reset`.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Compressed bytes handed to callers since the last `reset`.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Returns the staging buffers to the pool and destroys the codec
    /// context. Idempotent; operations afterwards fail `NotInitialized`.
    pub fn close(&mut self) {
        if let Some(buf) = self.uncompressed.take() {
            self.uncompressed_allocator.release_buffer(buf);
        }
        if let Some(buf) = self.compressed.take() {
            self.compressed_allocator.release_buffer(buf);
        }
        self.context = None;
        self.uncompressed_len = 0;
        self.compressed_pos = 0;
        self.compressed_len = 0;
        self.pending = Bytes::new();
    }

    fn compressed_remaining(&self) -> usize {
        self.compressed_len - self.compressed_pos
    }

    fn drain_compressed(&mut self, out: &mut [u8]) -> usize {
        let n = self.compressed_remaining().min(out.len());
        if n > 0 {
            let src = self
                .compressed
                .as_ref()
                .expect("compressed output present without staging buffer");
            out[..n].copy_from_slice(&src.as_slice()[self.compressed_pos..self.compressed_pos + n]);
            self.compressed_pos += n;
            self.bytes_written += n as u64;
        }
        n
    }

    /// Moves up to one block of the pending span into the staging buffer.
    fn load_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.finished = false;
        let n = self.pending.len().min(self.block_size);
        if let Some(staging) = self.uncompressed.as_mut() {
            staging.as_mut_slice()[..n].copy_from_slice(&self.pending[..n]);
        }
        self.uncompressed_len = n;
        self.pending.advance(n);
    }
}

impl Drop for Compressor {
    fn drop(&mut self) {
        self.close();
    }
}
