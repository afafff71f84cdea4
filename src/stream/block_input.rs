//! Framing reader: the byte-level mirror of `BlockOutput`.
//!
//! Reads a 4-byte little-endian length prefix, then exactly that many
//! payload bytes, decompresses them with one native call into a buffer sized
//! to the configured block size, and serves the result incrementally. An
//! absent or short prefix at a frame boundary is clean end-of-stream; a
//! prefix followed by too few payload bytes is a corrupt stream, never EOF.
//!
//! The reader carries no codec identity, level, or block size of its own on
//! the wire; those must match the writer's configuration out of band.

use std::io::Read;
use std::sync::Arc;

use crate::buffer::pool::{allocator_for, CachedBufferAllocator};
use crate::buffer::ScratchBuf;
use crate::config::{compressed_capacity, CodecConfig, CodecKind};
use crate::error::{CodecError, Result};
use crate::native::DecompressContext;
use crate::stream::block_output::FRAME_PREFIX_LEN;

pub struct BlockInput<R: Read> {
    inner: Option<R>,
    context: Option<DecompressContext>,

    compressed_allocator: Arc<CachedBufferAllocator>,
    uncompressed_allocator: Arc<CachedBufferAllocator>,
    compressed: Option<ScratchBuf>,
    uncompressed: Option<ScratchBuf>,

    block_size: usize,
    /// Drain window over the current decompressed block.
    position: usize,
    length: usize,

    codec: CodecKind,
    eof: bool,
    closed: bool,
}

impl<R: Read> BlockInput<R> {
    /// Wraps `inner`, which must carry frames produced with the same codec
    /// and block size as `config`.
    pub fn new(inner: R, config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        let compressed_allocator = allocator_for(compressed_capacity(config.block_size));
        let uncompressed_allocator = allocator_for(config.block_size);
        let compressed = compressed_allocator.allocate_buffer(config.use_foreign_buffer)?;
        let uncompressed = uncompressed_allocator.allocate_buffer(config.use_foreign_buffer)?;
        let context = DecompressContext::new(config.codec)?;
        log::debug!(
            "open block input: codec {}, block size {}",
            config.codec,
            config.block_size
        );
        Ok(Self {
            inner: Some(inner),
            context: Some(context),
            compressed_allocator,
            uncompressed_allocator,
            compressed: Some(compressed),
            uncompressed: Some(uncompressed),
            block_size: config.block_size,
            position: 0,
            length: 0,
            codec: config.codec,
            eof: false,
            closed: false,
        })
    }

    /// Reads up to `out.len()` decompressed bytes. Returns 0 only at clean
    /// end-of-stream (or for an empty `out`).
    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<usize> {
        self.check_stream()?;
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.position < self.length {
                let n = (self.length - self.position).min(out.len());
                let src = self
                    .uncompressed
                    .as_ref()
                    .expect("staging buffer present while stream is open");
                out[..n].copy_from_slice(&src.as_slice()[self.position..self.position + n]);
                self.position += n;
                return Ok(n);
            }
            if self.eof {
                return Ok(0);
            }
            self.fill_block()?;
        }
    }

    /// True once the transport hit end-of-stream and the last block has been
    /// fully drained.
    pub fn finished(&self) -> bool {
        self.eof && self.position >= self.length
    }

    /// Closes the transport and returns all pooled resources. Idempotent;
    /// reads afterwards fail.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(buf) = self.compressed.take() {
            self.compressed_allocator.release_buffer(buf);
        }
        if let Some(buf) = self.uncompressed.take() {
            self.uncompressed_allocator.release_buffer(buf);
        }
        self.context = None;
        drop(self.inner.take());
        log::debug!("close block input: codec {}", self.codec);
        Ok(())
    }

    fn check_stream(&self) -> Result<()> {
        if self.closed {
            return Err(CodecError::InvalidState(
                "input stream is already closed".into(),
            ));
        }
        if self.context.is_none() {
            return Err(CodecError::NotInitialized);
        }
        Ok(())
    }

    /// Reads and decompresses the next frame, or marks EOF at a boundary.
    fn fill_block(&mut self) -> Result<()> {
        let reader = self
            .inner
            .as_mut()
            .ok_or_else(|| CodecError::InvalidState("input stream is closed".into()))?;

        let frame_len = match read_frame_prefix(reader)? {
            Some(len) => len as usize,
            None => {
                self.eof = true;
                return Ok(());
            }
        };

        let staging = self.compressed.as_mut().ok_or(CodecError::NotInitialized)?;
        if frame_len == 0 || frame_len > staging.capacity() {
            return Err(CodecError::CorruptStream(format!(
                "frame length {frame_len} outside valid range 1..={}",
                staging.capacity()
            )));
        }
        reader
            .read_exact(&mut staging.as_mut_slice()[..frame_len])
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::UnexpectedEof {
                    CodecError::CorruptStream(format!(
                        "stream ends inside a {frame_len}-byte frame payload"
                    ))
                } else {
                    CodecError::Io(err)
                }
            })?;

        let dst = self.uncompressed.as_mut().ok_or(CodecError::NotInitialized)?;
        let context = self.context.as_mut().ok_or(CodecError::NotInitialized)?;
        let produced = context
            .decompress(
                &staging.as_slice()[..frame_len],
                &mut dst.as_mut_slice()[..self.block_size],
            )
            .map_err(|err| CodecError::CorruptStream(format!("frame failed to decode: {err}")))?;
        self.position = 0;
        self.length = produced;
        Ok(())
    }
}

/// Reads the 4-byte length prefix. `None` means the stream ended at a frame
/// boundary (including the lenient short-prefix case).
fn read_frame_prefix<R: Read>(reader: &mut R) -> Result<Option<u32>> {
    let mut prefix = [0u8; FRAME_PREFIX_LEN];
    let mut filled = 0;
    while filled < FRAME_PREFIX_LEN {
        let n = reader.read(&mut prefix[filled..])?;
        if n == 0 {
            if filled > 0 {
                log::debug!("block stream ended inside a length prefix; treating as EOF");
            }
            return Ok(None);
        }
        filled += n;
    }
    Ok(Some(u32::from_le_bytes(prefix)))
}

impl<R: Read> Read for BlockInput<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl<R: Read> Drop for BlockInput<R> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
