//! The codec factory: the adapter surface an enclosing framework drives.
//!
//! A `BlockCodec` is a validated configuration plus constructors for the four
//! engine shapes: the framing writer/reader pair for whole-stream use, and
//! the push/pull engine pair for drivers that manage framing themselves.

use std::io::{Read, Write};

use crate::config::CodecConfig;
use crate::error::Result;
use crate::stream::{BlockInput, BlockOutput, Compressor, Decompressor};

/// Default filename extension for framed output.
pub const DEFAULT_EXTENSION: &str = ".bpz";

#[derive(Debug, Clone)]
pub struct BlockCodec {
    config: CodecConfig,
}

impl BlockCodec {
    /// Validates the configuration up front so every engine constructed from
    /// this codec shares one vetted set of parameters.
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// A stream the caller can write uncompressed data to, emitted as
    /// length-prefixed compressed frames on `out`.
    pub fn create_output_stream<W: Write>(&self, out: W) -> Result<BlockOutput<W>> {
        BlockOutput::new(out, &self.config)
    }

    /// A stream serving uncompressed data read from framed input.
    pub fn create_input_stream<R: Read>(&self, input: R) -> Result<BlockInput<R>> {
        BlockInput::new(input, &self.config)
    }

    /// A push-model engine for drivers that frame output themselves.
    pub fn create_compressor(&self) -> Result<Compressor> {
        Compressor::new(&self.config)
    }

    /// A pull-model engine, counterpart to `create_compressor`.
    pub fn create_decompressor(&self) -> Result<Decompressor> {
        Decompressor::new(&self.config)
    }

    pub fn default_extension(&self) -> &'static str {
        DEFAULT_EXTENSION
    }
}
