//! This file is the root of the `blockpress` crate.
//!
//! blockpress adapts single-shot block compression codecs into byte-stream
//! abstractions: a push-model `Compressor` and pull-model `Decompressor`
//! implementing an incremental "needs input / has output / finished"
//! protocol, and a `BlockOutput`/`BlockInput` pair speaking a length-prefixed
//! block framing format. Large staging buffers are recycled through a
//! process-wide, size-class-keyed pool.
//!
//! The wire format is deliberately minimal: repeated frames of a `u32`
//! little-endian compressed length followed by the payload. Codec, level,
//! and block size are agreed between writer and reader out of band.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod stream;

mod native;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use codec::{BlockCodec, DEFAULT_EXTENSION};
pub use config::{CodecConfig, CodecKind, DEFAULT_BLOCK_SIZE, MIN_BLOCK_SIZE};
pub use error::{CodecError, Result};
pub use stream::{BlockInput, BlockOutput, Compressor, Decompressor};
