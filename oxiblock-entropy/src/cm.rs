//! Context-model bit predictor.
//!
//! Two counter tables blended per bit: the first is keyed by the
//! partial byte and consulted at three columns (a global slot plus
//! the last two whole bytes), the second refines the blend through a
//! 17-point interpolation keyed by the partial byte and a run flag
//! (set while the last two bytes were equal).

use oxiblock_core::Predictor;

const FAST_RATE: i32 = 2;
const MEDIUM_RATE: i32 = 4;
const SLOW_RATE: i32 = 6;
const PSCALE: i32 = 65536;

/// Two-level counter-based context model.
pub struct CmPredictor {
    counter1: Box<[[i32; 257]; 256]>,
    counter2: Box<[[i32; 17]; 512]>,
    ctx: usize,
    c1: usize,
    c2: usize,
    run_mask: usize,
    idx: usize,
}

impl Default for CmPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl CmPredictor {
    /// Create a predictor with neutral counters.
    pub fn new() -> Self {
        let mut p = Self {
            counter1: Box::new([[0; 257]; 256]),
            counter2: Box::new([[0; 17]; 512]),
            ctx: 1,
            c1: 0,
            c2: 0,
            run_mask: 0,
            idx: 0,
        };
        p.reset();
        p
    }

    /// Clear all per-block state.
    pub fn reset(&mut self) {
        for row in self.counter1.iter_mut() {
            row.fill(PSCALE / 2);
        }
        for row in self.counter2.iter_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (j as i32) << 12;
            }
        }
        self.ctx = 1;
        self.c1 = 0;
        self.c2 = 0;
        self.run_mask = 0;
        self.idx = 0;
    }
}

impl Predictor for CmPredictor {
    fn update(&mut self, bit: u8) {
        let row1 = &mut self.counter1[self.ctx];
        let row2 = &mut self.counter2[self.ctx | self.run_mask];
        if bit == 0 {
            row1[256] -= row1[256] >> FAST_RATE;
            row1[self.c1] -= row1[self.c1] >> MEDIUM_RATE;
            row1[self.c2] -= row1[self.c2] >> SLOW_RATE;
            row2[self.idx] -= row2[self.idx] >> MEDIUM_RATE;
            row2[self.idx + 1] -= row2[self.idx + 1] >> MEDIUM_RATE;
        } else {
            row1[256] += (PSCALE - row1[256]) >> FAST_RATE;
            row1[self.c1] += (PSCALE - row1[self.c1]) >> MEDIUM_RATE;
            row1[self.c2] += (PSCALE - row1[self.c2]) >> SLOW_RATE;
            row2[self.idx] += (PSCALE - row2[self.idx]) >> MEDIUM_RATE;
            row2[self.idx + 1] += (PSCALE - row2[self.idx + 1]) >> MEDIUM_RATE;
        }

        self.ctx = (self.ctx << 1) | bit as usize;
        if self.ctx > 255 {
            // Byte boundary: roll the previous-byte registers.
            self.c2 = self.c1;
            self.c1 = self.ctx & 0xFF;
            self.ctx = 1;
            self.run_mask = if self.c1 == self.c2 { 0x100 } else { 0 };
        }
    }

    fn get(&mut self) -> i32 {
        let row1 = &self.counter1[self.ctx];
        let p = (13 * (row1[256] + row1[self.c1]) + 6 * row1[self.c2]) >> 5;
        self.idx = (p >> 12) as usize;
        let row2 = &self.counter2[self.ctx | self.run_mask];
        let x1 = row2[self.idx];
        let x2 = row2[self.idx + 1];
        let ssep = x1 + (((x2 - x1) * (p & 4095)) >> 12);
        ((p + 3 * ssep + 32) >> 6).clamp(0, 4095)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{BinaryEntropyDecoder, BinaryEntropyEncoder};
    use oxiblock_core::{BitReader, BitWriter};
    use std::io::Cursor;

    #[test]
    fn test_output_range() {
        let mut p = CmPredictor::new();
        let mut state = 7u32;
        for _ in 0..20_000 {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let pr = p.get();
            assert!((0..=4095).contains(&pr));
            p.update((state >> 17) as u8 & 1);
        }
    }

    #[test]
    fn test_learns_repeating_bytes() {
        let mut p = CmPredictor::new();
        // Byte 0xAA repeated: after warmup the model should be
        // confident about each bit of the byte.
        for _ in 0..200 {
            for i in (0..8).rev() {
                p.update((0xAAu8 >> i) & 1);
            }
        }
        // Next bit of 0xAA is 1.
        assert!(p.get() > 3000, "got {}", p.get());
    }

    #[test]
    fn test_toy_block_roundtrip_and_size() {
        // 10 bytes of 0/1 values: must round-trip, and the coded form
        // stays in the ballpark of the 7-byte coder flush.
        let data = [0u8, 0, 0, 1, 1, 1, 0, 0, 0, 0];
        let mut out = Vec::new();
        {
            let mut bw = BitWriter::new(&mut out);
            let mut enc = BinaryEntropyEncoder::new(CmPredictor::new());
            enc.encode(&mut bw, &data).unwrap();
            bw.flush().unwrap();
        }
        assert!(out.len() <= 11, "encoded {} bytes", out.len());

        let mut br = BitReader::new(Cursor::new(&out));
        let mut dec = BinaryEntropyDecoder::new(CmPredictor::new());
        let mut recovered = [0u8; 10];
        dec.decode(&mut br, &mut recovered).unwrap();
        assert_eq!(recovered, data);
    }

    #[test]
    fn test_larger_roundtrip() {
        let mut data = Vec::new();
        for i in 0..5000u32 {
            data.push((i % 17) as u8);
            data.push((i % 3) as u8);
        }
        let mut out = Vec::new();
        {
            let mut bw = BitWriter::new(&mut out);
            let mut enc = BinaryEntropyEncoder::new(CmPredictor::new());
            enc.encode(&mut bw, &data).unwrap();
            bw.flush().unwrap();
        }
        assert!(out.len() < data.len());

        let mut br = BitReader::new(Cursor::new(&out));
        let mut dec = BinaryEntropyDecoder::new(CmPredictor::new());
        let mut recovered = vec![0u8; data.len()];
        dec.decode(&mut br, &mut recovered).unwrap();
        assert_eq!(recovered, data);
    }
}
