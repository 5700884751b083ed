//! Binary arithmetic coder over a [`Predictor`].
//!
//! The interval lives in 56 bits; once the top 32 bits of both bounds
//! agree they are flushed and the window slides, so carries never
//! propagate into emitted bytes. One coder serves every bit model in
//! the workspace (FPAQ, CM, TPAQ, the ROLZ literal/match models).

use crate::utils;
use oxiblock_core::{BitReader, BitWriter, Predictor, Result};
use std::io::{Read, Write};

const TOP: u64 = 0x00FF_FFFF_FFFF_FFFF;
const MASK_24: u64 = 0x0000_0000_00FF_FFFF;
const MASK_32: u64 = 0x0000_0000_FFFF_FFFF;
const MASK_56: u64 = 0x00FF_FFFF_FFFF_FFFF;

/// Blocks beyond this size restart the coder per chunk, each chunk
/// preceded by a varint byte count.
pub const CHUNK_SIZE: usize = 1 << 26;

/// Arithmetic encoder driving bits through an adaptive model.
pub struct BinaryEntropyEncoder<P: Predictor> {
    predictor: P,
    low: u64,
    high: u64,
}

impl<P: Predictor> BinaryEntropyEncoder<P> {
    /// Create an encoder around the given bit model.
    pub fn new(predictor: P) -> Self {
        Self {
            predictor,
            low: 0,
            high: TOP,
        }
    }

    /// Access the underlying predictor.
    pub fn predictor_mut(&mut self) -> &mut P {
        &mut self.predictor
    }

    /// Encode `block`, most significant bit of each byte first.
    pub fn encode<W: Write>(&mut self, bs: &mut BitWriter<W>, block: &[u8]) -> Result<()> {
        let multi = block.len() > CHUNK_SIZE;
        for chunk in block.chunks(CHUNK_SIZE) {
            if multi {
                utils::write_varint(bs, chunk.len() as u32)?;
            }
            self.low = 0;
            self.high = TOP;
            for &b in chunk {
                for i in (0..8).rev() {
                    self.encode_bit(bs, (b >> i) & 1)?;
                }
            }
            self.dispose(bs)?;
        }
        Ok(())
    }

    /// Reset the interval for a fresh stream segment.
    ///
    /// Only needed when driving the coder bit by bit; `encode`
    /// handles this itself.
    pub fn begin(&mut self) {
        self.low = 0;
        self.high = TOP;
    }

    /// Encode one bit through the model.
    #[inline]
    pub fn encode_bit<W: Write>(&mut self, bs: &mut BitWriter<W>, bit: u8) -> Result<()> {
        let p = self.predictor.get().clamp(0, 4095) as u64;
        let split = (((self.high - self.low) >> 4) * p) >> 8;

        if bit == 0 {
            self.low += split + 1;
        } else {
            self.high = self.low + split;
        }
        self.predictor.update(bit);

        while (self.low ^ self.high) >> 24 == 0 {
            bs.write_bits((self.high >> 24) & MASK_32, 32)?;
            self.low = (self.low << 32) & MASK_56;
            self.high = ((self.high << 32) | MASK_32) & MASK_56;
        }
        Ok(())
    }

    /// Flush the tail of the interval; call once per stream segment.
    pub fn dispose<W: Write>(&mut self, bs: &mut BitWriter<W>) -> Result<()> {
        bs.write_bits(self.low | MASK_24, 56)
    }
}

/// Arithmetic decoder mirroring [`BinaryEntropyEncoder`].
pub struct BinaryEntropyDecoder<P: Predictor> {
    predictor: P,
    low: u64,
    high: u64,
    current: u64,
}

impl<P: Predictor> BinaryEntropyDecoder<P> {
    /// Create a decoder around the given bit model.
    pub fn new(predictor: P) -> Self {
        Self {
            predictor,
            low: 0,
            high: TOP,
            current: 0,
        }
    }

    /// Access the underlying predictor.
    pub fn predictor_mut(&mut self) -> &mut P {
        &mut self.predictor
    }

    /// Decode exactly `dst.len()` bytes.
    pub fn decode<R: Read>(&mut self, bs: &mut BitReader<R>, dst: &mut [u8]) -> Result<()> {
        let multi = dst.len() > CHUNK_SIZE;
        let mut start = 0;
        while start < dst.len() {
            let end = (start + CHUNK_SIZE).min(dst.len());
            if multi {
                let expected = (end - start) as u32;
                let advertised = utils::read_varint(bs)?;
                if advertised != expected {
                    return Err(oxiblock_core::OxiBlockError::invalid_bitstream(format!(
                        "chunk length mismatch: {} vs {}",
                        advertised, expected
                    )));
                }
            }
            self.low = 0;
            self.high = TOP;
            self.current = bs.read_bits(56)?;
            for out in dst[start..end].iter_mut() {
                let mut b = 0u8;
                for _ in 0..8 {
                    b = (b << 1) | self.decode_bit(bs)?;
                }
                *out = b;
            }
            start = end;
        }
        Ok(())
    }

    /// Reset the interval and pull the initial 56 bits.
    ///
    /// Only needed when driving the decoder bit by bit; `decode`
    /// handles this itself.
    pub fn begin<R: Read>(&mut self, bs: &mut BitReader<R>) -> Result<()> {
        self.low = 0;
        self.high = TOP;
        self.current = bs.read_bits(56)?;
        Ok(())
    }

    /// Decode one bit through the model.
    #[inline]
    pub fn decode_bit<R: Read>(&mut self, bs: &mut BitReader<R>) -> Result<u8> {
        let p = self.predictor.get().clamp(0, 4095) as u64;
        let split = self.low + ((((self.high - self.low) >> 4) * p) >> 8);

        let bit;
        if split >= self.current {
            bit = 1;
            self.high = split;
        } else {
            bit = 0;
            self.low = split + 1;
        }
        self.predictor.update(bit);

        while (self.low ^ self.high) >> 24 == 0 {
            self.low = (self.low << 32) & MASK_56;
            self.high = ((self.high << 32) | MASK_32) & MASK_56;
            self.current = ((self.current << 32) | bs.read_bits(32)?) & MASK_56;
        }
        Ok(bit)
    }
}
