//! Four-way interleaved rANS coder, order 0 and order 1.
//!
//! Four 32-bit states share one byte stream: the encoder walks the
//! chunk right to left scattering symbols across the states, emitting
//! 16 bits whenever a state would overflow; the decoder walks forward
//! pulling 16 bits whenever a state underflows. Symbol division uses
//! fixed-point reciprocals (Alverson), so the hot loop is
//! multiply-shift only. Order 1 keeps one frequency table per
//! previous-byte context, with the chunk split into four quarters
//! each running its own context chain.

use crate::utils;
use oxiblock_core::{BitReader, BitWriter, OxiBlockError, Result};
use std::io::{Read, Write};

/// Renormalization threshold: states live in `[TOP, TOP << 16)`.
const ANS_TOP: u32 = 1 << 15;

/// Default chunk size for order 0 (32 KiB).
pub const DEFAULT_CHUNK_SIZE_0: usize = 1 << 15;

/// Default chunk size for order 1.
pub const DEFAULT_CHUNK_SIZE_1: usize = 1 << 23;

const MIN_CHUNK_SIZE: usize = 1024;
const MAX_CHUNK_SIZE: usize = 1 << 27;

/// Default log of the frequency scale per order.
fn default_log_range(order: u8) -> u32 {
    if order == 0 { 12 } else { 9 }
}

fn check_params(order: u8, chunk_size: usize, log_range: u32) -> Result<()> {
    if order > 1 {
        return Err(OxiBlockError::invalid_input(format!(
            "invalid ANS order {}",
            order
        )));
    }
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        return Err(OxiBlockError::invalid_input(format!(
            "invalid ANS chunk size {}",
            chunk_size
        )));
    }
    if !(8..=15).contains(&log_range) {
        return Err(OxiBlockError::invalid_input(format!(
            "invalid ANS log range {}",
            log_range
        )));
    }
    Ok(())
}

fn chunk_log_range(log_range: u32, chunk_len: usize) -> u32 {
    let mut lr = log_range;
    while lr > 8 && (1usize << lr) > chunk_len {
        lr -= 1;
    }
    lr
}

/// Per-symbol encoding record.
#[derive(Clone, Copy, Default)]
struct EncSymbol {
    x_max: u32,
    bias: u32,
    cmpl_freq: u32,
    inv_shift: u32,
    inv_freq: u64,
}

impl EncSymbol {
    fn reset(&mut self, cum_freq: u32, freq: u32, log_range: u32) {
        self.x_max = (((ANS_TOP as u64) << 16) >> log_range) as u32 * freq;
        self.cmpl_freq = (1 << log_range) - freq;
        if freq < 2 {
            self.inv_freq = 0xFFFF_FFFF;
            self.inv_shift = 32;
            self.bias = cum_freq + (1 << log_range) - 1;
        } else {
            let mut shift = 0;
            while freq > (1 << shift) {
                shift += 1;
            }
            // Alverson, "Integer division using reciprocals".
            self.inv_freq = ((1u64 << (shift + 31)) + freq as u64 - 1) / freq as u64;
            self.inv_shift = 31 + shift;
            self.bias = cum_freq;
        }
    }

    #[inline]
    fn next_state(&self, st: u32) -> u32 {
        let q = ((st as u64 * self.inv_freq) >> self.inv_shift) as u32;
        st.wrapping_add(self.bias).wrapping_add(q.wrapping_mul(self.cmpl_freq))
    }
}

/// Push 16 bits of `st` (big-endian) in front of the growing payload.
#[inline]
fn renorm_encode(st: &mut u32, x_max: u32, buf: &mut [u8], idx: &mut usize) {
    while *st >= x_max {
        *idx -= 2;
        buf[*idx] = (*st >> 8) as u8;
        buf[*idx + 1] = *st as u8;
        *st >>= 16;
    }
}

#[inline]
fn renorm_decode(st: &mut u32, buf: &[u8], pos: &mut usize) -> Result<()> {
    while *st < ANS_TOP {
        let hi = *buf
            .get(*pos)
            .ok_or_else(|| OxiBlockError::invalid_bitstream("truncated ANS payload"))?;
        let lo = *buf
            .get(*pos + 1)
            .ok_or_else(|| OxiBlockError::invalid_bitstream("truncated ANS payload"))?;
        *pos += 2;
        *st = (*st << 16) | ((hi as u32) << 8) | lo as u32;
    }
    Ok(())
}

/// rANS encoder (order 0 or 1).
pub struct AnsEncoder {
    order: u8,
    chunk_size: usize,
    log_range: u32,
    payload: Vec<u8>,
    symbols: Vec<EncSymbol>,
}

impl AnsEncoder {
    /// Create an encoder with default parameters for the given order.
    pub fn new(order: u8) -> Result<Self> {
        let chunk = if order == 0 {
            DEFAULT_CHUNK_SIZE_0
        } else {
            DEFAULT_CHUNK_SIZE_1
        };
        Self::with_params(order, chunk, default_log_range(order))
    }

    /// Create an encoder with explicit parameters.
    pub fn with_params(order: u8, chunk_size: usize, log_range: u32) -> Result<Self> {
        check_params(order, chunk_size, log_range)?;
        Ok(Self {
            order,
            chunk_size,
            log_range,
            payload: Vec::new(),
            symbols: Vec::new(),
        })
    }

    /// Encode `block` to the bitstream.
    pub fn encode<W: Write>(&mut self, bs: &mut BitWriter<W>, block: &[u8]) -> Result<()> {
        for start in (0..block.len()).step_by(self.chunk_size) {
            let end = (start + self.chunk_size).min(block.len());
            let chunk = &block[start..end];
            if self.order == 0 {
                self.encode_chunk_order0(bs, chunk)?;
            } else {
                self.encode_chunk_order1(bs, chunk)?;
            }
        }
        Ok(())
    }

    fn write_payload<W: Write>(
        bs: &mut BitWriter<W>,
        states: &[u32; 4],
        payload: &[u8],
    ) -> Result<()> {
        for &st in states {
            bs.write_bits(st as u64, 32)?;
        }
        utils::write_varint(bs, payload.len() as u32)?;
        bs.write_array(payload, payload.len() * 8)?;
        Ok(())
    }

    fn encode_chunk_order0<W: Write>(&mut self, bs: &mut BitWriter<W>, chunk: &[u8]) -> Result<()> {
        let lr = chunk_log_range(self.log_range, chunk.len());

        let mut freqs = [0u32; 256];
        for &b in chunk {
            freqs[b as usize] += 1;
        }
        let mut alphabet = [0u8; 256];
        let size =
            utils::normalize_frequencies(&mut freqs, &mut alphabet, chunk.len() as u32, 1 << lr)?;

        utils::encode_alphabet(bs, &alphabet[..size])?;
        if size == 1 {
            return Ok(());
        }
        bs.write_bits((lr - 8) as u64, 3)?;
        utils::encode_frequencies(bs, &freqs, &alphabet[..size], lr)?;

        self.symbols.resize(256, EncSymbol::default());
        let mut cum = 0u32;
        for i in 0..256 {
            if freqs[i] > 0 {
                self.symbols[i].reset(cum, freqs[i], lr);
                cum += freqs[i];
            }
        }

        self.payload.clear();
        self.payload.resize(2 * chunk.len() + 64, 0);
        let mut idx = self.payload.len();
        let mut states = [ANS_TOP; 4];

        for i in (0..chunk.len()).rev() {
            let s = 3 - (i & 3);
            let sym = &self.symbols[chunk[i] as usize];
            renorm_encode(&mut states[s], sym.x_max, &mut self.payload, &mut idx);
            states[s] = sym.next_state(states[s]);
        }

        let payload = &self.payload[idx..];
        Self::write_payload(bs, &states, payload)
    }

    fn encode_chunk_order1<W: Write>(&mut self, bs: &mut BitWriter<W>, chunk: &[u8]) -> Result<()> {
        let lr = chunk_log_range(self.log_range, chunk.len());
        let len = chunk.len();
        let q = len / 4;
        let tail = &chunk[4 * q..];

        // Per-context histograms over the four quarters.
        let mut freqs = vec![[0u32; 256]; 256];
        for s in 0..4 {
            let mut prev = 0usize;
            for &b in &chunk[s * q..(s + 1) * q] {
                freqs[prev][b as usize] += 1;
                prev = b as usize;
            }
        }

        bs.write_bits((lr - 8) as u64, 3)?;

        // One alphabet + frequency table per context; unused contexts
        // cost two bits.
        self.symbols.resize(256 * 256, EncSymbol::default());
        let mut alphabet = [0u8; 256];
        for ctx in 0..256 {
            let total: u32 = freqs[ctx].iter().sum();
            if total == 0 {
                utils::encode_alphabet(bs, &[])?;
                continue;
            }
            let size =
                utils::normalize_frequencies(&mut freqs[ctx], &mut alphabet, total, 1 << lr)?;
            utils::encode_alphabet(bs, &alphabet[..size])?;
            utils::encode_frequencies(bs, &freqs[ctx], &alphabet[..size], lr)?;

            let mut cum = 0u32;
            for i in 0..256 {
                if freqs[ctx][i] > 0 {
                    self.symbols[(ctx << 8) | i].reset(cum, freqs[ctx][i], lr);
                    cum += freqs[ctx][i];
                }
            }
        }

        self.payload.clear();
        self.payload.resize(2 * len + 64, 0);
        let mut idx = self.payload.len();
        let mut states = [ANS_TOP; 4];

        for k in (0..q).rev() {
            for s in (0..4).rev() {
                let i = s * q + k;
                let ctx = if k == 0 { 0 } else { chunk[i - 1] as usize };
                let sym = &self.symbols[(ctx << 8) | chunk[i] as usize];
                renorm_encode(&mut states[s], sym.x_max, &mut self.payload, &mut idx);
                states[s] = sym.next_state(states[s]);
            }
        }

        let payload_end = self.payload.len();
        let payload = &self.payload[idx..payload_end];
        Self::write_payload(bs, &states, payload)?;

        // Leftover bytes (at most 3) go out raw.
        for &b in tail {
            bs.write_bits(b as u64, 8)?;
        }
        Ok(())
    }
}

/// rANS decoder mirroring [`AnsEncoder`].
pub struct AnsDecoder {
    order: u8,
    chunk_size: usize,
    log_range: u32,
    payload: Vec<u8>,
    freqs: Vec<u32>,
    cum_freqs: Vec<u32>,
    f2s: Vec<u16>,
}

impl AnsDecoder {
    /// Create a decoder with default parameters for the given order.
    pub fn new(order: u8) -> Result<Self> {
        let chunk = if order == 0 {
            DEFAULT_CHUNK_SIZE_0
        } else {
            DEFAULT_CHUNK_SIZE_1
        };
        Self::with_params(order, chunk, default_log_range(order))
    }

    /// Create a decoder with explicit parameters.
    pub fn with_params(order: u8, chunk_size: usize, log_range: u32) -> Result<Self> {
        check_params(order, chunk_size, log_range)?;
        Ok(Self {
            order,
            chunk_size,
            log_range,
            payload: Vec::new(),
            freqs: Vec::new(),
            cum_freqs: Vec::new(),
            f2s: Vec::new(),
        })
    }

    /// Decode exactly `dst.len()` bytes from the bitstream.
    pub fn decode<R: Read>(&mut self, bs: &mut BitReader<R>, dst: &mut [u8]) -> Result<()> {
        let chunk_size = self.chunk_size;
        let mut start = 0;
        while start < dst.len() {
            let end = (start + chunk_size).min(dst.len());
            if self.order == 0 {
                self.decode_chunk_order0(bs, &mut dst[start..end])?;
            } else {
                self.decode_chunk_order1(bs, &mut dst[start..end])?;
            }
            start = end;
        }
        Ok(())
    }

    fn read_payload<R: Read>(&mut self, bs: &mut BitReader<R>) -> Result<[u32; 4]> {
        let mut states = [0u32; 4];
        for st in states.iter_mut() {
            *st = bs.read_bits(32)? as u32;
        }
        let len = utils::read_varint(bs)? as usize;
        if len > 2 * self.chunk_size + 64 {
            return Err(OxiBlockError::invalid_bitstream("oversized ANS payload"));
        }
        self.payload.clear();
        self.payload.resize(len, 0);
        bs.read_array(&mut self.payload, len * 8)?;
        Ok(states)
    }

    fn decode_chunk_order0<R: Read>(&mut self, bs: &mut BitReader<R>, dst: &mut [u8]) -> Result<()> {
        let mut alphabet = [0u8; 256];
        let size = utils::decode_alphabet(bs, &mut alphabet)?;
        if size == 0 {
            return Err(OxiBlockError::invalid_bitstream("empty ANS alphabet"));
        }
        if size == 1 {
            dst.fill(alphabet[0]);
            return Ok(());
        }

        let lr = bs.read_bits(3)? as u32 + 8;
        let mut freqs = [0u32; 256];
        utils::decode_frequencies(bs, &mut freqs, &alphabet[..size], lr)?;

        let scale = 1usize << lr;
        self.cum_freqs.clear();
        self.cum_freqs.resize(257, 0);
        for i in 0..256 {
            self.cum_freqs[i + 1] = self.cum_freqs[i] + freqs[i];
        }
        self.freqs.clear();
        self.freqs.extend_from_slice(&freqs);
        self.f2s.clear();
        self.f2s.resize(scale, 0);
        for s in 0..256 {
            for slot in self.cum_freqs[s]..self.cum_freqs[s + 1] {
                self.f2s[slot as usize] = s as u16;
            }
        }

        let mut states = self.read_payload(bs)?;
        let mask = (scale - 1) as u32;
        let mut pos = 0usize;
        for (i, out) in dst.iter_mut().enumerate() {
            let s = 3 - (i & 3);
            let st = states[s];
            let slot = st & mask;
            let sym = self.f2s[slot as usize] as usize;
            *out = sym as u8;
            let mut st = self.freqs[sym] * (st >> lr) + slot - self.cum_freqs[sym];
            renorm_decode(&mut st, &self.payload, &mut pos)?;
            states[s] = st;
        }
        Ok(())
    }

    fn decode_chunk_order1<R: Read>(&mut self, bs: &mut BitReader<R>, dst: &mut [u8]) -> Result<()> {
        let lr = bs.read_bits(3)? as u32 + 8;
        if lr > 15 {
            return Err(OxiBlockError::invalid_bitstream("invalid ANS log range"));
        }
        let scale = 1usize << lr;
        let len = dst.len();
        let q = len / 4;

        self.freqs.clear();
        self.freqs.resize(256 * 256, 0);
        self.cum_freqs.clear();
        self.cum_freqs.resize(256 * 257, 0);
        self.f2s.clear();
        self.f2s.resize(256 * scale, 0);

        let mut alphabet = [0u8; 256];
        let mut row = [0u32; 256];
        for ctx in 0..256usize {
            let size = utils::decode_alphabet(bs, &mut alphabet)?;
            if size == 0 {
                continue;
            }
            utils::decode_frequencies(bs, &mut row, &alphabet[..size], lr)?;
            let fbase = ctx << 8;
            let cbase = ctx * 257;
            for i in 0..256 {
                self.freqs[fbase + i] = row[i];
                self.cum_freqs[cbase + i + 1] = self.cum_freqs[cbase + i] + row[i];
            }
            let tbase = ctx * scale;
            for s in 0..256 {
                for slot in self.cum_freqs[cbase + s]..self.cum_freqs[cbase + s + 1] {
                    self.f2s[tbase + slot as usize] = s as u16;
                }
            }
        }

        let mut states = self.read_payload(bs)?;
        let mask = (scale - 1) as u32;
        let mut pos = 0usize;
        let mut prevs = [0usize; 4];
        for k in 0..q {
            for s in 0..4 {
                let ctx = if k == 0 { 0 } else { prevs[s] };
                let st = states[s];
                let slot = st & mask;
                let sym = self.f2s[ctx * scale + slot as usize] as usize;
                dst[s * q + k] = sym as u8;
                prevs[s] = sym;
                let cbase = ctx * 257;
                let mut st =
                    self.freqs[(ctx << 8) | sym] * (st >> lr) + slot - self.cum_freqs[cbase + sym];
                renorm_decode(&mut st, &self.payload, &mut pos)?;
                states[s] = st;
            }
        }

        for i in 4 * q..len {
            dst[i] = bs.read_bits(8)? as u8;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip_order(order: u8, data: &[u8]) {
        let mut out = Vec::new();
        {
            let mut bw = BitWriter::new(&mut out);
            let mut enc = AnsEncoder::new(order).unwrap();
            enc.encode(&mut bw, data).unwrap();
            bw.flush().unwrap();
        }
        let mut br = BitReader::new(Cursor::new(&out));
        let mut dec = AnsDecoder::new(order).unwrap();
        let mut recovered = vec![0u8; data.len()];
        dec.decode(&mut br, &mut recovered).unwrap();
        assert_eq!(recovered, data, "order {}", order);
    }

    fn lcg_bytes(len: usize, mut state: u32, span: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            out.push(((state >> 16) % span) as u8);
        }
        out
    }

    #[test]
    fn test_roundtrip_order0() {
        roundtrip_order(0, b"");
        roundtrip_order(0, b"a");
        roundtrip_order(0, b"abcabcabcabc");
        roundtrip_order(0, &[7u8; 3000]);
        roundtrip_order(0, &lcg_bytes(100_000, 11, 256));
        roundtrip_order(0, &lcg_bytes(100_000, 12, 5));
    }

    #[test]
    fn test_roundtrip_order1() {
        roundtrip_order(1, b"");
        roundtrip_order(1, b"ab");
        roundtrip_order(1, b"the quick brown fox jumps over the lazy dog");
        roundtrip_order(1, &[9u8; 2000]);
        roundtrip_order(1, &lcg_bytes(50_000, 21, 256));
        roundtrip_order(1, &lcg_bytes(50_003, 22, 16));
    }

    #[test]
    fn test_order1_beats_order0_on_contextual_data() {
        // Strongly context-dependent data: each byte determines the
        // next from a small set.
        let mut data = Vec::with_capacity(40_000);
        let mut x = 1u8;
        let mut state = 777u32;
        for _ in 0..40_000 {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            x = x.wrapping_mul(31).wrapping_add((state >> 28) as u8 & 1);
            data.push(x);
        }

        let encoded_len = |order: u8| {
            let mut out = Vec::new();
            let mut bw = BitWriter::new(&mut out);
            let mut enc = AnsEncoder::new(order).unwrap();
            enc.encode(&mut bw, &data).unwrap();
            bw.flush().unwrap();
            drop(bw);
            out.len()
        };
        assert!(encoded_len(1) < encoded_len(0));
    }

    #[test]
    fn test_uniform_data_near_incompressible() {
        let data = lcg_bytes(65_536, 42, 256);
        let mut out = Vec::new();
        {
            let mut bw = BitWriter::new(&mut out);
            let mut enc = AnsEncoder::new(0).unwrap();
            enc.encode(&mut bw, &data).unwrap();
            bw.flush().unwrap();
        }
        // Uniform bytes cannot shrink much; allow headers but no
        // catastrophic expansion.
        assert!(out.len() as f64 <= data.len() as f64 * 1.05);
    }

    #[test]
    fn test_bad_params_rejected() {
        assert!(AnsEncoder::with_params(2, 1 << 15, 12).is_err());
        assert!(AnsEncoder::with_params(0, 100, 12).is_err());
        assert!(AnsEncoder::with_params(0, 1 << 28, 12).is_err());
        assert!(AnsEncoder::with_params(0, 1 << 15, 16).is_err());
    }

    #[test]
    fn test_truncated_stream_detected() {
        let data = lcg_bytes(5000, 55, 256);
        let mut out = Vec::new();
        {
            let mut bw = BitWriter::new(&mut out);
            let mut enc = AnsEncoder::new(0).unwrap();
            enc.encode(&mut bw, &data).unwrap();
            bw.flush().unwrap();
        }
        out.truncate(out.len() / 2);
        let mut br = BitReader::new(Cursor::new(&out));
        let mut dec = AnsDecoder::new(0).unwrap();
        let mut recovered = vec![0u8; data.len()];
        assert!(dec.decode(&mut br, &mut recovered).is_err());
    }
}
