//! The pull-model decompression engine, counterpart to the push-model
//! compressor. The two machines deliberately share no state-machine code;
//! only the buffer pool and the native boundary are common.
//!
//! Buffering is asymmetric to the compress side: compressed input stages in
//! the 1.5x buffer, decompressed output in the block-size buffer.

use std::sync::Arc;

use bytes::{Buf, Bytes};

use crate::buffer::pool::{allocator_for, CachedBufferAllocator};
use crate::buffer::ScratchBuf;
use crate::config::{compressed_capacity, CodecConfig};
use crate::error::{CodecError, Result};
use crate::native::DecompressContext;

pub struct Decompressor {
    context: Option<DecompressContext>,

    compressed_allocator: Arc<CachedBufferAllocator>,
    uncompressed_allocator: Arc<CachedBufferAllocator>,
    /// Input staging; capacity = 1.5x block size.
    compressed: Option<ScratchBuf>,
    /// Output staging; capacity = block size.
    uncompressed: Option<ScratchBuf>,

    block_size: usize,
    /// Compressed bytes staged for the next native call.
    compressed_len: usize,
    /// Drain window over decompressed output.
    uncompressed_pos: usize,
    uncompressed_len: usize,

    /// Caller input beyond the staging capacity, drained in later rounds.
    pending: Bytes,

    finished: bool,
}

impl Decompressor {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        let compressed_allocator = allocator_for(compressed_capacity(config.block_size));
        let uncompressed_allocator = allocator_for(config.block_size);
        let compressed = compressed_allocator.allocate_buffer(config.use_foreign_buffer)?;
        let uncompressed = uncompressed_allocator.allocate_buffer(config.use_foreign_buffer)?;
        let context = DecompressContext::new(config.codec)?;
        log::debug!(
            "created decompressor: codec {}, block size {}",
            config.codec,
            config.block_size
        );
        Ok(Self {
            context: Some(context),
            compressed_allocator,
            uncompressed_allocator,
            compressed: Some(compressed),
            uncompressed: Some(uncompressed),
            block_size: config.block_size,
            compressed_len: 0,
            uncompressed_pos: 0,
            uncompressed_len: 0,
            pending: Bytes::new(),
            finished: false,
        })
    }

    /// Supplies compressed input, unconditionally replacing any prior
    /// pending span. Must only be called while `needs_input` is true; the
    /// engine does not defend against violations of that contract.
    pub fn set_input(&mut self, data: &Bytes, offset: usize, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or(CodecError::OutOfRange {
                offset,
                length: len,
                extent: data.len(),
            })?;
        if self.compressed.is_none() {
            return Err(CodecError::NotInitialized);
        }

        self.pending = data.slice(offset..end);
        self.load_pending();

        // Any prior decompressed output is forfeited.
        self.uncompressed_pos = 0;
        self.uncompressed_len = 0;
        Ok(())
    }

    /// False while decompressed output remains; otherwise true iff nothing
    /// is staged and nothing is pending. As a side effect, stages the next
    /// pending chunk when one is waiting.
    pub fn needs_input(&mut self) -> bool {
        if self.uncompressed_remaining() > 0 {
            return false;
        }
        if self.compressed_len == 0 {
            if self.pending.is_empty() {
                return true;
            }
            self.load_pending();
        }
        false
    }

    /// Produces up to `out.len()` decompressed bytes, returning the count.
    /// A return of 0 means `needs_input` should be consulted.
    pub fn decompress(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.uncompressed_remaining() > 0 {
            return Ok(self.drain_uncompressed(out));
        }

        if self.compressed_len == 0 {
            return Ok(0);
        }

        let src = self.compressed.as_ref().ok_or(CodecError::NotInitialized)?;
        let dst = self.uncompressed.as_mut().ok_or(CodecError::NotInitialized)?;
        let context = self.context.as_mut().ok_or(CodecError::NotInitialized)?;
        let produced = context.decompress(
            &src.as_slice()[..self.compressed_len],
            &mut dst.as_mut_slice()[..self.block_size],
        )?;
        self.uncompressed_pos = 0;
        self.uncompressed_len = produced;
        self.compressed_len = 0;

        if self.pending.is_empty() {
            self.finished = true;
        }

        Ok(self.drain_uncompressed(out))
    }

    /// True once all supplied input has been decompressed and drained.
    pub fn finished(&self) -> bool {
        self.finished && self.uncompressed_remaining() == 0
    }

    /// Always reports zero. Bytes the native context may retain across
    /// calls are not tracked; block-oriented drivers never rely on this
    /// value. Known limitation, preserved deliberately.
    pub fn remaining(&self) -> usize {
        0
    }

    /// Clears all state; buffers and context are retained for reuse.
    pub fn reset(&mut self) {
        self.finished = false;
        self.compressed_len = 0;
        self.uncompressed_pos = 0;
        self.uncompressed_len = 0;
        self.pending = Bytes::new();
    }

    /// Returns the staging buffers to the pool and destroys the codec
    /// context. Idempotent.
    pub fn close(&mut self) {
        if let Some(buf) = self.compressed.take() {
            self.compressed_allocator.release_buffer(buf);
        }
        if let Some(buf) = self.uncompressed.take() {
            self.uncompressed_allocator.release_buffer(buf);
        }
        self.context = None;
        self.compressed_len = 0;
        self.uncompressed_pos = 0;
        self.uncompressed_len = 0;
        self.pending = Bytes::new();
    }

    fn uncompressed_remaining(&self) -> usize {
        self.uncompressed_len - self.uncompressed_pos
    }

    fn drain_uncompressed(&mut self, out: &mut [u8]) -> usize {
        let n = self.uncompressed_remaining().min(out.len());
        if n > 0 {
            let src = self
                .uncompressed
                .as_ref()
                .expect("decompressed output present without staging buffer");
            out[..n]
                .copy_from_slice(&src.as_slice()[self.uncompressed_pos..self.uncompressed_pos + n]);
            self.uncompressed_pos += n;
        }
        n
    }

    /// Stages up to one buffer's worth of the pending span.
    fn load_pending(&mut self) {
        let capacity = match self.compressed.as_ref() {
            Some(buf) => buf.capacity(),
            None => return,
        };
        let n = self.pending.len().min(capacity);
        if n > 0 {
            if let Some(staging) = self.compressed.as_mut() {
                staging.as_mut_slice()[..n].copy_from_slice(&self.pending[..n]);
            }
        }
        self.compressed_len = n;
        self.pending.advance(n);
    }
}

impl Drop for Decompressor {
    fn drop(&mut self) {
        self.close();
    }
}
