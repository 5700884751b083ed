//! Burrows-Wheeler family transforms for OxiBlock.
//!
//! This crate provides the permutation stage of the block pipeline:
//!
//! 1. [`divsufsort`] - linear-time suffix array construction
//! 2. [`bwt`] - chunked Burrows-Wheeler Transform with parallel inverse
//! 3. [`bwts`] - bijective (primary-index-free) variant
//! 4. [`mtf`] / [`sbrt`] - post-BWT rank transforms
//!
//! A typical chain is BWT followed by MTF, whose output an entropy
//! coder compresses far better than the raw block.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bwt;
pub mod bwts;
pub mod divsufsort;
pub mod mtf;
pub mod sbrt;

pub use bwt::{Bwt, compute_jobs_per_task, get_chunks};
pub use bwts::Bwts;
pub use divsufsort::DivSufSort;
pub use mtf::Mtft;
pub use sbrt::{Sbrt, SbrtMode};
