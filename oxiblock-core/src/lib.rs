//! # OxiBlock Core
//!
//! Core components for the OxiBlock compression toolkit.
//!
//! This crate provides the building blocks shared by every codec:
//!
//! - [`bitstream`]: MSB-first bit-level I/O for entropy-coded streams
//! - [`traits`]: the `ByteTransform` and `Predictor` contracts
//! - [`context`]: per-block configuration
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! OxiBlock processes data one block at a time through a configurable
//! pipeline:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Block codec                                         │
//! │     Transform sequence + entropy stage (oxiblock-codec) │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Transforms & coders                                 │
//! │     BWT/BWTS/MTF/SBRT, ROLZ, Huffman/Range/ANS/CM/TPAQ  │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitReader/BitWriter, traits, errors                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitstream;
pub mod context;
pub mod error;
pub mod traits;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use context::{BlockContext, DataType};
pub use error::{OxiBlockError, Result};
pub use traits::{ByteTransform, Predictor};
