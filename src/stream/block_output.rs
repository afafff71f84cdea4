//! Framing writer: cuts an unbounded byte stream into fixed-size blocks,
//! compresses each with one native call, and emits length-prefixed frames.
//!
//! The cut happens the moment the staging buffer is exactly full, not at
//! flush or close, so memory stays bounded regardless of stream length.
//! Wire format per frame: `u32` little-endian compressed length, then the
//! compressed payload. No header, no checksum, no trailer.

use std::io::Write;
use std::sync::Arc;

use crate::buffer::pool::{allocator_for, CachedBufferAllocator};
use crate::buffer::ScratchBuf;
use crate::config::{compressed_capacity, CodecConfig, CodecKind};
use crate::error::{CodecError, Result};
use crate::native::CompressContext;

/// Bytes of the frame length prefix.
pub const FRAME_PREFIX_LEN: usize = 4;

pub struct BlockOutput<W: Write> {
    inner: Option<W>,
    context: Option<CompressContext>,

    uncompressed_allocator: Arc<CachedBufferAllocator>,
    compressed_allocator: Arc<CachedBufferAllocator>,
    uncompressed: Option<ScratchBuf>,
    compressed: Option<ScratchBuf>,
    /// Pooled byte array assembling `prefix + payload` into one transport write.
    frame: Option<Vec<u8>>,

    block_size: usize,
    /// Fill level of the uncompressed staging buffer.
    position: usize,

    codec: CodecKind,
    level: i32,
    closed: bool,
}

impl<W: Write> BlockOutput<W> {
    /// Wraps `inner` with a framing compressor. Larger block sizes cost more
    /// memory on both ends but improve the compression ratio.
    pub fn new(inner: W, config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        let uncompressed_allocator = allocator_for(config.block_size);
        let compressed_allocator = allocator_for(compressed_capacity(config.block_size));
        let uncompressed = uncompressed_allocator.allocate_buffer(config.use_foreign_buffer)?;
        let compressed = compressed_allocator.allocate_buffer(config.use_foreign_buffer)?;
        let frame = compressed_allocator.allocate_bytes();
        let context = CompressContext::new(config.codec, config.level)?;
        log::debug!(
            "open block output: codec {}, level {}, block size {}",
            config.codec,
            config.level,
            config.block_size
        );
        Ok(Self {
            inner: Some(inner),
            context: Some(context),
            uncompressed_allocator,
            compressed_allocator,
            uncompressed: Some(uncompressed),
            compressed: Some(compressed),
            frame: Some(frame),
            block_size: config.block_size,
            position: 0,
            codec: config.codec,
            level: config.level,
            closed: false,
        })
    }

    /// Buffers `data`, cutting a frame the moment the staging buffer is
    /// exactly full.
    pub fn write_bytes(&mut self, mut data: &[u8]) -> Result<()> {
        self.check_stream()?;
        loop {
            let left = self.block_size - self.position;
            if data.len() < left {
                self.stage(data);
                return Ok(());
            }
            let (head, tail) = data.split_at(left);
            self.stage(head);
            self.compress_buffered_data()?;
            data = tail;
        }
    }

    /// Compresses and emits any partial remaining buffer as one final
    /// (possibly undersized) frame, then flushes the transport.
    pub fn finish(&mut self) -> Result<()> {
        self.check_stream()?;
        self.compress_buffered_data()?;
        self.inner
            .as_mut()
            .ok_or_else(|| CodecError::InvalidState("output stream is closed".into()))?
            .flush()?;
        Ok(())
    }

    /// Finishes the stream, closes the transport, and returns all pooled
    /// resources. A second close is a no-op; writes afterwards fail.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.finish();
        // Resources go back even when the final flush failed.
        self.closed = true;
        if let Some(buf) = self.uncompressed.take() {
            self.uncompressed_allocator.release_buffer(buf);
        }
        if let Some(buf) = self.compressed.take() {
            self.compressed_allocator.release_buffer(buf);
        }
        if let Some(frame) = self.frame.take() {
            self.compressed_allocator.release_bytes(frame);
        }
        self.context = None;
        drop(self.inner.take());
        log::debug!("close block output: codec {}, level {}", self.codec, self.level);
        result
    }

    fn check_stream(&self) -> Result<()> {
        if self.closed {
            return Err(CodecError::InvalidState(
                "output stream is already closed".into(),
            ));
        }
        if self.context.is_none() {
            return Err(CodecError::NotInitialized);
        }
        Ok(())
    }

    /// Copies into the staging buffer; callers guarantee it fits.
    fn stage(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let staging = self
            .uncompressed
            .as_mut()
            .expect("staging buffer present while stream is open");
        staging.as_mut_slice()[self.position..self.position + data.len()].copy_from_slice(data);
        self.position += data.len();
    }

    /// One native call over the buffered input, then one transport write of
    /// the assembled frame.
    fn compress_buffered_data(&mut self) -> Result<()> {
        if self.position == 0 {
            return Ok(());
        }
        let src = self.uncompressed.as_ref().ok_or(CodecError::NotInitialized)?;
        let dst = self.compressed.as_mut().ok_or(CodecError::NotInitialized)?;
        let context = self.context.as_mut().ok_or(CodecError::NotInitialized)?;
        let compressed_len =
            context.compress(&src.as_slice()[..self.position], dst.as_mut_slice())?;

        let frame = self
            .frame
            .as_mut()
            .expect("frame buffer present while stream is open");
        frame.clear();
        frame.extend_from_slice(&(compressed_len as u32).to_le_bytes());
        frame.extend_from_slice(&dst.as_slice()[..compressed_len]);
        self.inner
            .as_mut()
            .ok_or_else(|| CodecError::InvalidState("output stream is closed".into()))?
            .write_all(frame)?;

        self.position = 0;
        Ok(())
    }
}

impl<W: Write> Write for BlockOutput<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    /// Flushes the transport only. Buffered uncompressed data stays staged
    /// until its block fills or the stream finishes; flushing must not cut
    /// an undersized frame.
    fn flush(&mut self) -> std::io::Result<()> {
        self.check_stream()?;
        self.inner
            .as_mut()
            .ok_or_else(|| CodecError::InvalidState("output stream is closed".into()))?
            .flush()
    }
}

impl<W: Write> Drop for BlockOutput<W> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("error closing block output on drop: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_BLOCK_SIZE;

    fn test_config(codec: CodecKind) -> CodecConfig {
        CodecConfig {
            codec,
            level: 1,
            block_size: MIN_BLOCK_SIZE,
            use_foreign_buffer: false,
        }
    }

    /// Splits a framed stream into its compressed payloads, checking every
    /// length prefix against the bytes that follow.
    fn parse_frames(stream: &[u8]) -> Vec<&[u8]> {
        let mut frames = Vec::new();
        let mut rest = stream;
        while !rest.is_empty() {
            let (prefix, tail) = rest.split_at(FRAME_PREFIX_LEN);
            let len = u32::from_le_bytes(prefix.try_into().unwrap()) as usize;
            assert!(tail.len() >= len, "prefix larger than remaining payload");
            let (payload, next) = tail.split_at(len);
            frames.push(payload);
            rest = next;
        }
        frames
    }

    #[test]
    fn empty_stream_has_zero_frames() {
        let mut sink = Vec::new();
        let mut out = BlockOutput::new(&mut sink, &test_config(CodecKind::Zstd)).unwrap();
        out.close().unwrap();
        drop(out);
        assert!(sink.is_empty());
    }

    #[test]
    fn full_block_is_cut_before_close() {
        let config = test_config(CodecKind::Lz4);
        let mut sink = Vec::new();
        let mut out = BlockOutput::new(&mut sink, &config).unwrap();
        out.write_bytes(&vec![3u8; config.block_size]).unwrap();
        out.write_bytes(&[9u8; 10]).unwrap();
        // First block already on the wire; the 10-byte tail is still staged.
        out.finish().unwrap();
        out.close().unwrap();
        drop(out);
        let frames = parse_frames(&sink);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn spanning_write_is_split_across_frames() {
        let config = test_config(CodecKind::Zstd);
        let mut sink = Vec::new();
        let mut out = BlockOutput::new(&mut sink, &config).unwrap();
        // 2.5 blocks in a single write call.
        out.write_bytes(&vec![0xEEu8; config.block_size * 5 / 2]).unwrap();
        out.close().unwrap();
        drop(out);
        assert_eq!(parse_frames(&sink).len(), 3);
    }

    #[test]
    fn double_close_is_a_no_op() {
        let mut sink = Vec::new();
        let mut out = BlockOutput::new(&mut sink, &test_config(CodecKind::Lz4)).unwrap();
        out.write_bytes(b"tail").unwrap();
        out.close().unwrap();
        out.close().unwrap();
    }

    #[test]
    fn write_after_close_fails() {
        let mut sink = Vec::new();
        let mut out = BlockOutput::new(&mut sink, &test_config(CodecKind::Lz4)).unwrap();
        out.close().unwrap();
        assert!(matches!(
            out.write_bytes(b"late"),
            Err(CodecError::InvalidState(_))
        ));
        assert!(matches!(out.finish(), Err(CodecError::InvalidState(_))));
    }

    #[test]
    fn incompressible_block_fits_expansion_margin() {
        use rand::RngCore;
        let config = test_config(CodecKind::Lz4);
        let mut payload = vec![0u8; config.block_size];
        rand::rng().fill_bytes(&mut payload);

        let mut sink = Vec::new();
        let mut out = BlockOutput::new(&mut sink, &config).unwrap();
        out.write_bytes(&payload).unwrap();
        out.close().unwrap();
        drop(out);

        let frames = parse_frames(&sink);
        assert_eq!(frames.len(), 1);
        // Expanded, but inside the 1.5x compressed staging capacity.
        assert!(frames[0].len() <= compressed_capacity(config.block_size));
    }

    #[test]
    fn io_write_trait_counts_all_bytes() {
        use std::io::Write as _;
        let config = test_config(CodecKind::Zstd);
        let mut sink = Vec::new();
        let mut out = BlockOutput::new(&mut sink, &config).unwrap();
        assert_eq!(out.write(b"hello world").unwrap(), 11);
        out.flush().unwrap();
        // flush is transport-only: the staged bytes were not cut into a frame.
        assert_eq!(out.position, 11);
        out.close().unwrap();
        drop(out);
        assert_eq!(parse_frames(&sink).len(), 1);
    }
}
