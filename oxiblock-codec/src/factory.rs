//! Registry mapping symbolic names and numeric tags to configured
//! transform and entropy-codec instances.
//!
//! Tags are stable across the whole transform family; names and tags
//! from relatives that this workspace does not ship (dictionary and
//! executable filters, small run-length filters) resolve to a typed
//! error instead of a silent fallback.

use oxiblock_bwt::{Bwt, Bwts, Mtft, Sbrt, SbrtMode};
use oxiblock_core::{
    BitReader, BitWriter, BlockContext, ByteTransform, OxiBlockError, Result,
};
use oxiblock_entropy::{
    AnsDecoder, AnsEncoder, BinaryEntropyDecoder, BinaryEntropyEncoder, CmPredictor,
    FpaqPredictor, HuffmanDecoder, HuffmanEncoder, RangeDecoder, RangeEncoder, TpaqPredictor,
};
use oxiblock_rolz::{Rolz, RolzX};
use std::io::{Read, Write};

/// Transform identifiers, one six-bit tag each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransformKind {
    /// Identity (no transform).
    None = 0,
    /// Burrows-Wheeler Transform.
    Bwt = 1,
    /// Bijective Burrows-Wheeler Transform.
    Bwts = 2,
    /// Bucketed Move-to-Front.
    Mtft = 7,
    /// Sort-by-rank transform (rank mode).
    Rank = 8,
    /// Reduced-offset LZ, rANS back-end.
    Rolz = 11,
    /// Reduced-offset LZ, binary arithmetic back-end.
    RolzX = 12,
}

impl TransformKind {
    /// Resolve a symbolic name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "BWT" => Ok(Self::Bwt),
            "BWTS" => Ok(Self::Bwts),
            "MTFT" | "MTF" => Ok(Self::Mtft),
            "RANK" => Ok(Self::Rank),
            "ROLZ" => Ok(Self::Rolz),
            "ROLZX" => Ok(Self::RolzX),
            // Known relatives that this workspace does not provide.
            "LZ" | "LZX" | "LZP" | "RLT" | "ZRLT" | "SRT" | "TEXT" | "DICT" | "EXE" | "X86"
            | "FSD" | "UTF" => Err(OxiBlockError::invalid_input(format!(
                "transform {} is not available in this build",
                name
            ))),
            _ => Err(OxiBlockError::invalid_input(format!(
                "unknown transform {}",
                name
            ))),
        }
    }

    /// Resolve a six-bit tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Bwt),
            2 => Ok(Self::Bwts),
            7 => Ok(Self::Mtft),
            8 => Ok(Self::Rank),
            11 => Ok(Self::Rolz),
            12 => Ok(Self::RolzX),
            3..=6 | 9 | 10 | 13..=17 => Err(OxiBlockError::invalid_input(format!(
                "transform tag {} is not available in this build",
                tag
            ))),
            _ => Err(OxiBlockError::invalid_bitstream(format!(
                "unknown transform tag {}",
                tag
            ))),
        }
    }

    /// Symbolic name (inverse of [`TransformKind::from_name`]).
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Bwt => "BWT",
            Self::Bwts => "BWTS",
            Self::Mtft => "MTFT",
            Self::Rank => "RANK",
            Self::Rolz => "ROLZ",
            Self::RolzX => "ROLZX",
        }
    }

    /// Numeric tag.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// One configured transform stage.
///
/// A closed sum keeps dispatch explicit and lets the sequence reach
/// stage-specific state (the BWT primary indexes) without downcasts.
pub enum Transform {
    /// Identity stage.
    None,
    /// Burrows-Wheeler Transform stage.
    Bwt(Bwt),
    /// Bijective BWT stage.
    Bwts(Bwts),
    /// Move-to-Front stage.
    Mtft(Mtft),
    /// Sort-by-rank stage.
    Rank(Sbrt),
    /// ROLZ stage (rANS back-end).
    Rolz(Rolz),
    /// ROLZ stage (binary arithmetic back-end).
    RolzX(RolzX),
}

impl Transform {
    /// Build a configured stage for `kind`.
    pub fn new(kind: TransformKind, ctx: &BlockContext) -> Self {
        match kind {
            TransformKind::None => Self::None,
            TransformKind::Bwt => Self::Bwt(Bwt::with_jobs(ctx.jobs)),
            TransformKind::Bwts => Self::Bwts(Bwts::new()),
            TransformKind::Mtft => Self::Mtft(Mtft::new()),
            TransformKind::Rank => Self::Rank(Sbrt::new(SbrtMode::Rank)),
            TransformKind::Rolz => Self::Rolz(Rolz::new(ctx.data_type)),
            TransformKind::RolzX => Self::RolzX(RolzX::new(ctx.data_type)),
        }
    }

    /// The stage's identifier.
    pub fn kind(&self) -> TransformKind {
        match self {
            Self::None => TransformKind::None,
            Self::Bwt(_) => TransformKind::Bwt,
            Self::Bwts(_) => TransformKind::Bwts,
            Self::Mtft(_) => TransformKind::Mtft,
            Self::Rank(_) => TransformKind::Rank,
            Self::Rolz(_) => TransformKind::Rolz,
            Self::RolzX(_) => TransformKind::RolzX,
        }
    }

    /// Whether the inverse output can be longer than its input.
    pub fn is_expanding(&self) -> bool {
        matches!(self, Self::Rolz(_) | Self::RolzX(_))
    }

    /// Forward this stage.
    pub fn forward(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        match self {
            Self::None => {
                dst[..src.len()].copy_from_slice(src);
                Ok((src.len(), src.len()))
            }
            Self::Bwt(t) => t.forward(src, dst),
            Self::Bwts(t) => t.forward(src, dst),
            Self::Mtft(t) => t.forward(src, dst),
            Self::Rank(t) => t.forward(src, dst),
            Self::Rolz(t) => t.forward(src, dst),
            Self::RolzX(t) => t.forward(src, dst),
        }
    }

    /// Invert this stage.
    pub fn inverse(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        match self {
            Self::None => {
                dst[..src.len()].copy_from_slice(src);
                Ok((src.len(), src.len()))
            }
            Self::Bwt(t) => t.inverse(src, dst),
            Self::Bwts(t) => t.inverse(src, dst),
            Self::Mtft(t) => t.inverse(src, dst),
            Self::Rank(t) => t.inverse(src, dst),
            Self::Rolz(t) => t.inverse(src, dst),
            Self::RolzX(t) => t.inverse(src, dst),
        }
    }

    /// Destination bound for a forward call.
    pub fn max_encoded_len(&self, src_len: usize) -> usize {
        match self {
            Self::None => src_len,
            Self::Bwt(t) => t.max_encoded_len(src_len),
            Self::Bwts(t) => t.max_encoded_len(src_len),
            Self::Mtft(t) => t.max_encoded_len(src_len),
            Self::Rank(t) => t.max_encoded_len(src_len),
            Self::Rolz(t) => t.max_encoded_len(src_len),
            Self::RolzX(t) => t.max_encoded_len(src_len),
        }
    }
}

/// Entropy codec identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntropyKind {
    /// Store bytes verbatim.
    None = 0,
    /// Canonical Huffman.
    Huffman = 1,
    /// Binary arithmetic with the order-0 bit model.
    Fpaq = 2,
    /// Range coder.
    Range = 4,
    /// rANS, order 0.
    Ans0 = 5,
    /// Binary arithmetic with the context model.
    Cm = 6,
    /// Binary arithmetic with context mixing.
    Tpaq = 7,
    /// rANS, order 1.
    Ans1 = 8,
    /// Context mixing with the extended model set.
    TpaqX = 9,
}

impl EntropyKind {
    /// Resolve a symbolic name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "HUFFMAN" => Ok(Self::Huffman),
            "FPAQ" => Ok(Self::Fpaq),
            "RANGE" => Ok(Self::Range),
            "ANS0" => Ok(Self::Ans0),
            "CM" => Ok(Self::Cm),
            "TPAQ" => Ok(Self::Tpaq),
            "ANS1" => Ok(Self::Ans1),
            "TPAQX" => Ok(Self::TpaqX),
            _ => Err(OxiBlockError::invalid_input(format!(
                "unknown entropy codec {}",
                name
            ))),
        }
    }

    /// Resolve a numeric tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Huffman),
            2 => Ok(Self::Fpaq),
            4 => Ok(Self::Range),
            5 => Ok(Self::Ans0),
            6 => Ok(Self::Cm),
            7 => Ok(Self::Tpaq),
            8 => Ok(Self::Ans1),
            9 => Ok(Self::TpaqX),
            _ => Err(OxiBlockError::invalid_bitstream(format!(
                "unknown entropy tag {}",
                tag
            ))),
        }
    }

    /// Symbolic name (inverse of [`EntropyKind::from_name`]).
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Huffman => "HUFFMAN",
            Self::Fpaq => "FPAQ",
            Self::Range => "RANGE",
            Self::Ans0 => "ANS0",
            Self::Cm => "CM",
            Self::Tpaq => "TPAQ",
            Self::Ans1 => "ANS1",
            Self::TpaqX => "TPAQX",
        }
    }

    /// Numeric tag.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Encode `block` with the selected codec.
pub fn encode_entropy<W: Write>(
    kind: EntropyKind,
    ctx: &BlockContext,
    bs: &mut BitWriter<W>,
    block: &[u8],
) -> Result<()> {
    match kind {
        EntropyKind::None => bs.write_array(block, block.len() * 8),
        EntropyKind::Huffman => HuffmanEncoder::new().encode(bs, block),
        EntropyKind::Range => RangeEncoder::new().encode(bs, block),
        EntropyKind::Ans0 => AnsEncoder::new(0)?.encode(bs, block),
        EntropyKind::Ans1 => AnsEncoder::new(1)?.encode(bs, block),
        EntropyKind::Fpaq => {
            BinaryEntropyEncoder::new(FpaqPredictor::new()).encode(bs, block)
        }
        EntropyKind::Cm => BinaryEntropyEncoder::new(CmPredictor::new()).encode(bs, block),
        EntropyKind::Tpaq => {
            BinaryEntropyEncoder::new(TpaqPredictor::new(ctx.block_size, false)).encode(bs, block)
        }
        EntropyKind::TpaqX => {
            BinaryEntropyEncoder::new(TpaqPredictor::new(ctx.block_size, true)).encode(bs, block)
        }
    }
}

/// Decode exactly `dst.len()` bytes with the selected codec.
pub fn decode_entropy<R: Read>(
    kind: EntropyKind,
    ctx: &BlockContext,
    bs: &mut BitReader<R>,
    dst: &mut [u8],
) -> Result<()> {
    match kind {
        EntropyKind::None => bs.read_array(dst, dst.len() * 8),
        EntropyKind::Huffman => HuffmanDecoder::new().decode(bs, dst),
        EntropyKind::Range => RangeDecoder::new().decode(bs, dst),
        EntropyKind::Ans0 => AnsDecoder::new(0)?.decode(bs, dst),
        EntropyKind::Ans1 => AnsDecoder::new(1)?.decode(bs, dst),
        EntropyKind::Fpaq => {
            BinaryEntropyDecoder::new(FpaqPredictor::new()).decode(bs, dst)
        }
        EntropyKind::Cm => BinaryEntropyDecoder::new(CmPredictor::new()).decode(bs, dst),
        EntropyKind::Tpaq => {
            BinaryEntropyDecoder::new(TpaqPredictor::new(ctx.block_size, false)).decode(bs, dst)
        }
        EntropyKind::TpaqX => {
            BinaryEntropyDecoder::new(TpaqPredictor::new(ctx.block_size, true)).decode(bs, dst)
        }
    }
}
