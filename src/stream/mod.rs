//! Streaming adaptation layers over the native codec boundary.
//!
//! Two independent shapes are provided:
//!
//! * `Compressor`/`Decompressor` — push/pull state machines implementing the
//!   "needs input / has output / finished" block-codec contract expected by
//!   generic stream drivers.
//! * `BlockOutput`/`BlockInput` — a simpler single-buffer-pair framing path
//!   built directly on the native calls, producing and consuming the
//!   length-prefixed wire format.

pub mod block_input;
pub mod block_output;
pub mod compressor;
pub mod decompressor;

pub use block_input::BlockInput;
pub use block_output::{BlockOutput, FRAME_PREFIX_LEN};
pub use compressor::Compressor;
pub use decompressor::Decompressor;
