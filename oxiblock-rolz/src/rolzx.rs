//! ROLZ with the adaptive binary arithmetic back-end.
//!
//! Every emission is one 9-bit symbol through the arithmetic coder: a
//! literal is a set flag plus the byte, a match is a clear flag plus
//! the length code, followed by the ring index as direct bits. Two
//! symbol models are kept, selected by the kind of the previous
//! emission, each conditioned on the previous output byte.

use crate::dictionary::MatchTable;
use crate::{
    CHUNK_SIZE, check_block_size, emit_copy, min_match_from_selector, min_match_selector,
    min_match_for,
};
use oxiblock_core::{
    BitReader, BitWriter, ByteTransform, DataType, OxiBlockError, Predictor, Result,
};
use oxiblock_entropy::{BinaryEntropyDecoder, BinaryEntropyEncoder};
use std::io::Cursor;

const LITERAL: usize = 1;
const MATCH: usize = 0;
const MODEL_RATE: u32 = 5;

/// Bit model for the 9-bit literal/match symbols.
///
/// Two tables (previous emission kind) of 256 contexts (previous
/// byte) of 512 tree slots. The codec positions `kind`, `ctx` and
/// `tree` between fields; `direct` bypasses adaptation for the ring
/// index bits.
struct SymbolModel {
    probs: [Vec<u16>; 2],
    kind: usize,
    ctx: usize,
    tree: usize,
    direct: bool,
}

impl SymbolModel {
    fn new() -> Self {
        Self {
            probs: [vec![1 << 15; 256 << 9], vec![1 << 15; 256 << 9]],
            kind: LITERAL,
            ctx: 0,
            tree: 1,
            direct: false,
        }
    }
}

impl Predictor for SymbolModel {
    fn update(&mut self, bit: u8) {
        if !self.direct {
            let slot = &mut self.probs[self.kind][(self.ctx << 9) | self.tree];
            if bit != 0 {
                *slot += (u16::MAX - *slot) >> MODEL_RATE;
            } else {
                *slot -= *slot >> MODEL_RATE;
            }
        }
        self.tree = (self.tree << 1) | bit as usize;
    }

    fn get(&mut self) -> i32 {
        if self.direct {
            2048
        } else {
            (self.probs[self.kind][(self.ctx << 9) | self.tree] >> 4) as i32
        }
    }
}

/// ROLZ codec, mode 1 (binary arithmetic back-end).
pub struct RolzX {
    table: MatchTable,
    min_match: usize,
}

impl RolzX {
    /// Default ring depth (log2).
    pub const LOG_POS_CHECKS: u32 = 5;

    /// Create a codec tuned for the given content type.
    pub fn new(data_type: DataType) -> Self {
        Self::with_log_pos_checks(data_type, Self::LOG_POS_CHECKS)
    }

    /// Create a codec with an explicit ring depth.
    pub fn with_log_pos_checks(data_type: DataType, log_pos_checks: u32) -> Self {
        let min_match = min_match_for(data_type);
        Self {
            table: MatchTable::new(log_pos_checks, min_match, 255 + min_match),
            min_match,
        }
    }

    fn encode_chunk<W: std::io::Write>(
        &mut self,
        bw: &mut BitWriter<W>,
        chunk: &[u8],
    ) -> Result<()> {
        let len = chunk.len();
        bw.write_bits(len as u64, 32)?;
        let flags = min_match_selector(self.min_match) << 1;
        bw.write_bits(flags as u64, 8)?;

        let tail_len = len.min(4);
        for &b in &chunk[len - tail_len..] {
            bw.write_bits(b as u64, 8)?;
        }
        let limit = len - tail_len;
        let body = &chunk[..limit];

        self.table.reset();
        let ctx_len = self.table.context_len();
        let log_pos_checks = self.table.log_pos_checks();

        if limit == 0 {
            return Ok(());
        }
        let mut coder = BinaryEntropyEncoder::new(SymbolModel::new());
        coder.begin();

        let mut pos = 0usize;
        while pos < limit {
            if pos < ctx_len {
                Self::emit_symbol(
                    &mut coder,
                    bw,
                    LITERAL,
                    prev_byte(body, pos),
                    0x100 | body[pos] as u32,
                )?;
                pos += 1;
                continue;
            }
            match self.table.find_match(body, pos) {
                None => {
                    Self::emit_symbol(
                        &mut coder,
                        bw,
                        LITERAL,
                        prev_byte(body, pos),
                        0x100 | body[pos] as u32,
                    )?;
                    pos += 1;
                }
                Some(m) => {
                    let code = (m.length - self.min_match) as u32;
                    Self::emit_symbol(&mut coder, bw, MATCH, prev_byte(body, pos), code)?;
                    Self::emit_direct(&mut coder, bw, m.index, log_pos_checks)?;
                    pos += m.length;
                }
            }
        }
        coder.dispose(bw)?;
        Ok(())
    }

    /// Encode one 9-bit symbol: value already carries the flag in bit
    /// 8 (set for literals, clear for matches).
    fn emit_symbol<W: std::io::Write>(
        coder: &mut BinaryEntropyEncoder<SymbolModel>,
        bw: &mut BitWriter<W>,
        next_kind: usize,
        ctx: u8,
        value: u32,
    ) -> Result<()> {
        {
            let model = coder.predictor_mut();
            model.ctx = ctx as usize;
            model.tree = 1;
            model.direct = false;
        }
        for i in (0..9).rev() {
            coder.encode_bit(bw, ((value >> i) & 1) as u8)?;
        }
        coder.predictor_mut().kind = next_kind;
        Ok(())
    }

    fn emit_direct<W: std::io::Write>(
        coder: &mut BinaryEntropyEncoder<SymbolModel>,
        bw: &mut BitWriter<W>,
        value: u32,
        nbits: u32,
    ) -> Result<()> {
        coder.predictor_mut().direct = true;
        for i in (0..nbits).rev() {
            coder.encode_bit(bw, ((value >> i) & 1) as u8)?;
        }
        coder.predictor_mut().direct = false;
        Ok(())
    }

    fn decode_chunk<R: std::io::Read>(
        &mut self,
        br: &mut BitReader<R>,
        dst: &mut [u8],
    ) -> Result<usize> {
        let len = br.read_bits(32)? as usize;
        if len == 0 || len > dst.len() {
            return Err(OxiBlockError::invalid_bitstream(format!(
                "bad ROLZ chunk length {}",
                len
            )));
        }
        let flags = br.read_bits(8)? as u8;
        let min_match = min_match_from_selector((flags >> 1) & 3)?;
        if min_match != self.min_match {
            self.min_match = min_match;
            self.table =
                MatchTable::new(self.table.log_pos_checks(), min_match, 255 + min_match);
        }

        let tail_len = len.min(4);
        let limit = len - tail_len;
        let out = &mut dst[..len];
        for i in 0..tail_len {
            out[limit + i] = br.read_bits(8)? as u8;
        }

        self.table.reset();
        let ctx_len = self.table.context_len();
        let log_pos_checks = self.table.log_pos_checks();

        let mut coder = BinaryEntropyDecoder::new(SymbolModel::new());
        if limit > 0 {
            coder.begin(br)?;
        }

        let mut produced = 0usize;
        while produced < limit {
            let value = Self::read_symbol(&mut coder, br, prev_byte(out, produced))?;
            if value & 0x100 != 0 {
                out[produced] = value as u8;
                if produced >= ctx_len {
                    self.table.register(out, produced);
                }
                coder.predictor_mut().kind = LITERAL;
                produced += 1;
            } else {
                coder.predictor_mut().kind = MATCH;
                let match_len = self.min_match + value as usize;
                let index = Self::read_direct(&mut coder, br, log_pos_checks)?;
                if produced < ctx_len {
                    return Err(OxiBlockError::invalid_bitstream("match before any context"));
                }
                let ref_pos = self
                    .table
                    .resolve(out, produced, index)
                    .ok_or_else(|| OxiBlockError::invalid_bitstream("unresolvable ROLZ index"))?;
                if produced + match_len > limit || ref_pos >= produced {
                    return Err(OxiBlockError::invalid_bitstream("ROLZ match overrun"));
                }
                self.table.register(out, produced);
                emit_copy(out, ref_pos, produced, match_len);
                produced += match_len;
            }
        }
        Ok(len)
    }

    fn read_symbol<R: std::io::Read>(
        coder: &mut BinaryEntropyDecoder<SymbolModel>,
        br: &mut BitReader<R>,
        ctx: u8,
    ) -> Result<u32> {
        {
            let model = coder.predictor_mut();
            model.ctx = ctx as usize;
            model.tree = 1;
            model.direct = false;
        }
        let mut value = 0u32;
        for _ in 0..9 {
            value = (value << 1) | coder.decode_bit(br)? as u32;
        }
        Ok(value)
    }

    fn read_direct<R: std::io::Read>(
        coder: &mut BinaryEntropyDecoder<SymbolModel>,
        br: &mut BitReader<R>,
        nbits: u32,
    ) -> Result<u32> {
        coder.predictor_mut().direct = true;
        let mut value = 0u32;
        for _ in 0..nbits {
            value = (value << 1) | coder.decode_bit(br)? as u32;
        }
        coder.predictor_mut().direct = false;
        Ok(value)
    }
}

fn prev_byte(buf: &[u8], pos: usize) -> u8 {
    if pos == 0 { 0 } else { buf[pos - 1] }
}

impl ByteTransform for RolzX {
    fn forward(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        check_block_size(src.len())?;

        let mut encoded = Vec::with_capacity(src.len() / 2);
        {
            let mut bw = BitWriter::new(&mut encoded);
            for chunk in src.chunks(CHUNK_SIZE) {
                self.encode_chunk(&mut bw, chunk)?;
            }
            bw.flush()?;
        }

        if encoded.len() >= src.len() {
            return Err(OxiBlockError::no_compression(encoded.len(), src.len()));
        }
        if dst.len() < encoded.len() {
            return Err(OxiBlockError::output_too_small(encoded.len(), dst.len()));
        }
        dst[..encoded.len()].copy_from_slice(&encoded);
        Ok((src.len(), encoded.len()))
    }

    fn inverse(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let mut br = BitReader::new(Cursor::new(src));
        let mut written = 0usize;
        while written < dst.len() {
            written += self.decode_chunk(&mut br, &mut dst[written..])?;
        }
        Ok((src.len(), written))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + (src_len >> 2) + 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let mut codec = RolzX::new(DataType::Undefined);
        let mut encoded = vec![0u8; codec.max_encoded_len(data.len())];
        let (read, written) = codec.forward(data, &mut encoded).unwrap();
        assert_eq!(read, data.len());

        let mut decoder = RolzX::new(DataType::Undefined);
        let mut recovered = vec![0u8; data.len()];
        let (_, out_len) = decoder.inverse(&encoded[..written], &mut recovered).unwrap();
        assert_eq!(out_len, data.len());
        assert_eq!(recovered, data);
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
    fn test_abc_block_shrinks_and_roundtrips() {
        let data = b"ABC".repeat(200);
        let mut codec = RolzX::new(DataType::Undefined);
        let mut encoded = vec![0u8; codec.max_encoded_len(data.len())];
        let (_, written) = codec.forward(&data, &mut encoded).unwrap();
        assert!(written < data.len(), "encoded {} bytes", written);

        let mut decoder = RolzX::new(DataType::Undefined);
        let mut recovered = vec![0u8; data.len()];
        decoder.inverse(&encoded[..written], &mut recovered).unwrap();
        assert_eq!(recovered, data);
    }

    #[test]
    fn test_roundtrip_text() {
        roundtrip(&b"she sells sea shells on the sea shore. ".repeat(64));
    }

    #[test]
    fn test_roundtrip_low_entropy_random() {
        roundtrip(&lcg_bytes(5000, 77, 8));
    }

    #[test]
    fn test_long_matches_clamped() {
        // Runs longer than the mode-1 maximum force length clamping.
        roundtrip(&b"z".repeat(10_000));
    }

    #[test]
    fn test_small_block_skipped() {
        let mut codec = RolzX::new(DataType::Undefined);
        let data = [1u8; 10];
        let mut dst = [0u8; 64];
        assert!(matches!(
            codec.forward(&data, &mut dst),
            Err(OxiBlockError::SkipBlock { .. })
        ));
    }
}
