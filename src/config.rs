//! The single source of truth for all blockpress configuration.
//!
//! This module defines the unified `CodecConfig` struct, designed to be built
//! once at the application boundary (e.g. from a job configuration file) and
//! handed to the `BlockCodec` factory. Centralizing the settings here keeps
//! the engines themselves free of configuration lookups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

//==================================================================================
// I. Limits & Defaults
//==================================================================================

/// Smallest accepted block size. Blocks this small still amortize the
/// per-frame prefix and the native call overhead.
pub const MIN_BLOCK_SIZE: usize = 32 * 1024;

/// Default block size: one block of uncompressed data per native call.
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Default compression level, interpreted per codec.
pub const DEFAULT_LEVEL: i32 = 1;

/// Capacity of the compressed-side staging buffer, relative to the block
/// size. A single native call must never be told "not enough room"; 1.5x
/// covers the worst-case expansion of incompressible input for every bound
/// codec, so no second buffer-growth path exists.
pub(crate) fn compressed_capacity(block_size: usize) -> usize {
    block_size * 3 / 2
}

//==================================================================================
// II. Codec Selection
//==================================================================================

/// The block compression codecs this crate can bind.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// LZ4 block format. Fast; the level parameter is accepted but ignored,
    /// matching the lz4 block API.
    #[default]
    Lz4,
    /// Zstandard, single-shot over a reusable context. Honors the level.
    Zstd,
}

impl CodecKind {
    pub fn name(&self) -> &'static str {
        match self {
            CodecKind::Lz4 => "lz4",
            CodecKind::Zstd => "zstd",
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lz4" => Ok(CodecKind::Lz4),
            "zstd" => Ok(CodecKind::Zstd),
            other => Err(CodecError::CodecUnavailable {
                codec: other.to_string(),
                reason: "unknown codec name".to_string(),
            }),
        }
    }
}

//==================================================================================
// III. Unified Configuration
//==================================================================================

/// Configuration consumed by the `BlockCodec` factory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CodecConfig {
    /// Which codec to bind.
    pub codec: CodecKind,
    /// Per-codec compression level.
    pub level: i32,
    /// Uncompressed bytes per block. Larger blocks cost more memory at both
    /// ends but improve the compression ratio.
    pub block_size: usize,
    /// When set, staging buffers come from the aligned foreign allocation
    /// path instead of the plain heap.
    pub use_foreign_buffer: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            codec: CodecKind::default(),
            level: DEFAULT_LEVEL,
            block_size: DEFAULT_BLOCK_SIZE,
            use_foreign_buffer: false,
        }
    }
}

impl CodecConfig {
    /// Rejects configurations the engines cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(CodecError::InvalidArgument(format!(
                "block_size {} is below the minimum of {} bytes",
                self.block_size, MIN_BLOCK_SIZE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_names_round_trip() {
        for kind in [CodecKind::Lz4, CodecKind::Zstd] {
            assert_eq!(kind.name().parse::<CodecKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_codec_is_unavailable() {
        let err = "snappy".parse::<CodecKind>().unwrap_err();
        assert!(matches!(err, CodecError::CodecUnavailable { .. }));
    }

    #[test]
    fn default_config_is_valid() {
        let config = CodecConfig::default();
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        config.validate().unwrap();
    }

    #[test]
    fn undersized_block_is_rejected() {
        let config = CodecConfig {
            block_size: MIN_BLOCK_SIZE - 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn config_serde_round_trip() {
        let config = CodecConfig {
            codec: CodecKind::Zstd,
            level: 7,
            block_size: 64 * 1024,
            use_foreign_buffer: true,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"zstd\""));
        let back: CodecConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
