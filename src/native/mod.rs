//! The native codec boundary.
//!
//! Everything above this module treats compression as an opaque, single-shot
//! foreign call: "compress/decompress these N source bytes into that
//! destination buffer, tell me how many bytes came out". This module binds
//! that contract to real codec libraries:
//!
//! * Zstandard via `zstd::bulk`, which keeps a reusable `ZSTD_CCtx`/`ZSTD_DCtx`
//!   behind the context value — the exact create/compress/destroy lifecycle
//!   this crate adapts.
//! * LZ4 block format via `lz4_flex::block`, a stateless primitive; the
//!   context value exists only to carry the lifecycle.
//!
//! Calls are synchronous and CPU-bound with no cancellation hook: once issued
//! they run to completion on the calling thread.

use crate::config::CodecKind;
use crate::error::{CodecError, Result};

fn unavailable(kind: CodecKind, err: impl std::fmt::Display) -> CodecError {
    CodecError::CodecUnavailable {
        codec: kind.name().to_string(),
        reason: err.to_string(),
    }
}

//==================================================================================
// I. Compression Context
//==================================================================================

/// One compression context, parameterized by codec and level at creation.
///
/// Owned exclusively by the engine that created it; engines hold it as an
/// `Option` so destruction is a `take()` that is trivially idempotent, and
/// every call path is guarded by a `NotInitialized` check upstream.
pub enum CompressContext {
    Zstd(zstd::bulk::Compressor<'static>),
    Lz4,
}

impl CompressContext {
    pub fn new(kind: CodecKind, level: i32) -> Result<Self> {
        match kind {
            CodecKind::Zstd => {
                let ctx = zstd::bulk::Compressor::new(level)
                    .map_err(|e| unavailable(kind, e))?;
                Ok(CompressContext::Zstd(ctx))
            }
            // lz4 block mode has no level and no persistent state.
            CodecKind::Lz4 => Ok(CompressContext::Lz4),
        }
    }

    /// Compresses all of `src` into `dst` in one call, returning the number
    /// of bytes written. `dst` must be large enough for the worst case; the
    /// staging layer guarantees that with its 1.5x margin.
    pub fn compress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        match self {
            CompressContext::Zstd(ctx) => ctx
                .compress_to_buffer(src, &mut dst[..])
                .map_err(|e| CodecError::Codec(format!("zstd compress: {e}"))),
            CompressContext::Lz4 => lz4_flex::block::compress_into(src, dst)
                .map_err(|e| CodecError::Codec(format!("lz4 compress: {e}"))),
        }
    }
}

//==================================================================================
// II. Decompression Context
//==================================================================================

/// One decompression context. Takes no parameters beyond the codec: the
/// level (and anything else the compress side negotiated) is agreed out of
/// band, exactly like the wire format itself.
pub enum DecompressContext {
    Zstd(zstd::bulk::Decompressor<'static>),
    Lz4,
}

impl DecompressContext {
    pub fn new(kind: CodecKind) -> Result<Self> {
        match kind {
            CodecKind::Zstd => {
                let ctx = zstd::bulk::Decompressor::new().map_err(|e| unavailable(kind, e))?;
                Ok(DecompressContext::Zstd(ctx))
            }
            CodecKind::Lz4 => Ok(DecompressContext::Lz4),
        }
    }

    /// Decompresses all of `src` into `dst`, returning the decompressed byte
    /// count. Fails if `dst` cannot hold the result; callers size `dst` to
    /// the block size the payload was cut from.
    pub fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        match self {
            DecompressContext::Zstd(ctx) => ctx
                .decompress_to_buffer(src, &mut dst[..])
                .map_err(|e| CodecError::Codec(format!("zstd decompress: {e}"))),
            DecompressContext::Lz4 => lz4_flex::block::decompress_into(src, dst)
                .map_err(|e| CodecError::Codec(format!("lz4 decompress: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(kind: CodecKind, level: i32, payload: &[u8]) {
        let mut compressor = CompressContext::new(kind, level).unwrap();
        let mut decompressor = DecompressContext::new(kind).unwrap();
        let mut compressed = vec![0u8; payload.len() * 3 / 2 + 64];
        let n = compressor.compress(payload, &mut compressed).unwrap();
        assert!(n > 0);
        let mut restored = vec![0u8; payload.len().max(1)];
        let m = decompressor.decompress(&compressed[..n], &mut restored).unwrap();
        assert_eq!(&restored[..m], payload);
    }

    #[test]
    fn single_shot_round_trip_per_codec() {
        let payload: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
        round_trip(CodecKind::Lz4, 1, &payload);
        round_trip(CodecKind::Zstd, 1, &payload);
        round_trip(CodecKind::Zstd, 9, &payload);
    }

    #[test]
    fn context_is_reusable_across_calls() {
        let mut compressor = CompressContext::new(CodecKind::Zstd, 3).unwrap();
        let mut decompressor = DecompressContext::new(CodecKind::Zstd).unwrap();
        for round in 0..3u8 {
            let payload = vec![round; 4096];
            let mut compressed = vec![0u8; 8192];
            let n = compressor.compress(&payload, &mut compressed).unwrap();
            let mut restored = vec![0u8; 4096];
            let m = decompressor
                .decompress(&compressed[..n], &mut restored)
                .unwrap();
            assert_eq!(m, payload.len());
            assert_eq!(restored, payload);
        }
    }

    #[test]
    fn truncated_payload_fails_to_decompress() {
        let mut compressor = CompressContext::new(CodecKind::Zstd, 1).unwrap();
        let payload = vec![7u8; 4096];
        let mut compressed = vec![0u8; 8192];
        let n = compressor.compress(&payload, &mut compressed).unwrap();
        let mut decompressor = DecompressContext::new(CodecKind::Zstd).unwrap();
        let mut restored = vec![0u8; 4096];
        assert!(decompressor
            .decompress(&compressed[..n / 2], &mut restored)
            .is_err());
    }
}
