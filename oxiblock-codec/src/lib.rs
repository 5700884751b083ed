//! Block codec assembly for OxiBlock.
//!
//! This crate ties the transform crates and the entropy coders into a
//! configurable pipeline:
//!
//! - [`factory`]: symbolic name / numeric tag registry producing
//!   configured instances
//! - [`sequence`]: ordered chains of up to eight byte transforms with
//!   per-stage skip handling
//! - [`block`]: a convenience block compressor pairing a sequence
//!   with one entropy codec
//!
//! ## Example
//!
//! ```
//! use oxiblock_codec::BlockCodec;
//! use oxiblock_core::BlockContext;
//!
//! let ctx = BlockContext::default();
//! let mut codec = BlockCodec::new("BWT+MTFT", "ANS0", &ctx).unwrap();
//! let data = b"compress me compress me compress me".to_vec();
//! let encoded = codec.encode_block(&data).unwrap();
//! let decoded = codec.decode_block(&encoded, data.len()).unwrap();
//! assert_eq!(decoded, data);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod factory;
pub mod sequence;

pub use block::BlockCodec;
pub use factory::{EntropyKind, Transform, TransformKind, decode_entropy, encode_entropy};
pub use sequence::{MAX_STAGES, TransformSequence};
