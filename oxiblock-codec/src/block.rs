//! One-stop block compression: transform sequence plus entropy stage.
//!
//! `BlockCodec` glues the pieces together for callers that do not
//! bring their own framing: it stores the per-block side channel (skip
//! mask, BWT primary indexes, transformed length) ahead of the
//! entropy-coded payload. Anything beyond that - magic numbers,
//! checksums, job scheduling across blocks - belongs to the caller.

use crate::factory::{EntropyKind, encode_entropy, decode_entropy};
use crate::sequence::TransformSequence;
use oxiblock_bwt::bwt::MAX_CHUNKS;
use oxiblock_core::{BitReader, BitWriter, BlockContext, OxiBlockError, Result};
use oxiblock_entropy::utils;
use std::io::Cursor;

/// A configured block compressor/decompressor.
pub struct BlockCodec {
    sequence: TransformSequence,
    entropy: EntropyKind,
    ctx: BlockContext,
}

impl BlockCodec {
    /// Build a codec from symbolic names, e.g. `("BWT+MTFT", "ANS0")`.
    pub fn new(transform_names: &str, entropy_name: &str, ctx: &BlockContext) -> Result<Self> {
        if ctx.bs_version < BlockContext::MIN_BS_VERSION {
            return Err(OxiBlockError::invalid_input(format!(
                "bitstream version {} is older than the supported minimum {}",
                ctx.bs_version,
                BlockContext::MIN_BS_VERSION
            )));
        }
        Ok(Self {
            sequence: TransformSequence::from_names(transform_names, ctx)?,
            entropy: EntropyKind::from_name(entropy_name)?,
            ctx: ctx.clone(),
        })
    }

    /// The configured transform chain name.
    pub fn transform_name(&self) -> String {
        self.sequence.name()
    }

    /// The configured entropy codec.
    pub fn entropy_kind(&self) -> EntropyKind {
        self.entropy
    }

    /// Compress one block into a self-contained byte vector.
    pub fn encode_block(&mut self, src: &[u8]) -> Result<Vec<u8>> {
        let (transformed, skip_mask) = self.sequence.forward(src)?;

        let mut out = Vec::with_capacity(transformed.len() / 2 + 64);
        {
            let mut bw = BitWriter::new(&mut out);
            bw.write_bits(skip_mask as u64, 8)?;
            if let Some(indexes) = self.sequence.bwt_primary_indexes() {
                for idx in indexes {
                    utils::write_varint(&mut bw, idx)?;
                }
            }
            utils::write_varint(&mut bw, transformed.len() as u32)?;
            encode_entropy(self.entropy, &self.ctx, &mut bw, &transformed)?;
            bw.flush()?;
        }
        Ok(out)
    }

    /// Decompress one block of known original length.
    pub fn decode_block(&mut self, src: &[u8], original_len: usize) -> Result<Vec<u8>> {
        let mut br = BitReader::new(Cursor::new(src));
        let skip_mask = br.read_bits(8)? as u8;
        if self.sequence.bwt_primary_indexes().is_some() {
            let mut indexes = [0u32; MAX_CHUNKS];
            for idx in indexes.iter_mut() {
                *idx = utils::read_varint(&mut br)?;
            }
            self.sequence.set_bwt_primary_indexes(&indexes);
        }
        let transformed_len = utils::read_varint(&mut br)? as usize;
        if transformed_len > original_len.max(1) * 2 + 1024 {
            return Err(OxiBlockError::invalid_bitstream(
                "transformed length implausibly large",
            ));
        }

        let mut transformed = vec![0u8; transformed_len];
        decode_entropy(self.entropy, &self.ctx, &mut br, &mut transformed)?;
        self.sequence.inverse(&transformed, original_len, skip_mask)
    }
}
