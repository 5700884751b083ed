//! ROLZ with the rANS back-end.
//!
//! Tokens, shared lengths, literals and ring indexes are collected
//! into four buffers per chunk and each buffer is rANS-coded on its
//! own. A token packs a clamped literal-run length with a clamped
//! match length; overflow of either goes to the length buffer as a
//! varint (match part first).

use crate::dictionary::MatchTable;
use crate::{
    CHUNK_SIZE, check_block_size, emit_copy, min_match_from_selector, min_match_selector,
    min_match_for,
};
use oxiblock_core::{BitReader, BitWriter, ByteTransform, DataType, OxiBlockError, Result};
use oxiblock_entropy::utils::{read_varint_from, write_varint_to};
use oxiblock_entropy::{AnsDecoder, AnsEncoder};
use oxiblock_entropy::utils;
use std::io::Cursor;

const MAX_LIT_CODE: u32 = 31;
const MAX_MATCH_CODE: u32 = 7;

/// ROLZ codec, mode 0 (rANS back-end).
pub struct Rolz {
    table: MatchTable,
    literal_order: u8,
    min_match: usize,
    tokens: Vec<u8>,
    lengths: Vec<u8>,
    literals: Vec<u8>,
    indexes: Vec<u8>,
}

impl Rolz {
    /// Default ring depth (log2).
    pub const LOG_POS_CHECKS: u32 = 4;

    /// Create a codec tuned for the given content type.
    pub fn new(data_type: DataType) -> Self {
        Self::with_params(data_type, Self::LOG_POS_CHECKS, 0)
    }

    /// Create a codec with an explicit ring depth and literal coding
    /// order (0 or 1).
    pub fn with_params(data_type: DataType, log_pos_checks: u32, literal_order: u8) -> Self {
        let min_match = min_match_for(data_type);
        Self {
            table: MatchTable::new(log_pos_checks, min_match, 65535 + min_match),
            literal_order,
            min_match,
            tokens: Vec::new(),
            lengths: Vec::new(),
            literals: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn encode_chunk<W: std::io::Write>(
        &mut self,
        bw: &mut BitWriter<W>,
        chunk: &[u8],
    ) -> Result<()> {
        let len = chunk.len();
        bw.write_bits(len as u64, 32)?;
        let flags = (min_match_selector(self.min_match) << 1) | (self.literal_order & 1);
        bw.write_bits(flags as u64, 8)?;

        let tail_len = len.min(4);
        for &b in &chunk[len - tail_len..] {
            bw.write_bits(b as u64, 8)?;
        }
        let limit = len - tail_len;

        self.table.reset();
        self.tokens.clear();
        self.lengths.clear();
        self.literals.clear();
        self.indexes.clear();

        let body = &chunk[..limit];
        let ctx_len = self.table.context_len();
        let mut lit_start = 0usize;
        let mut pos = ctx_len.min(limit);
        while pos < limit {
            let found = self.table.find_match(body, pos);
            let Some(m) = found else {
                pos += 1;
                continue;
            };
            let lit_len = (pos - lit_start) as u32;
            let match_code = (m.length - self.min_match) as u32;
            self.tokens
                .push((lit_len.min(MAX_LIT_CODE) << 3 | match_code.min(MAX_MATCH_CODE)) as u8);
            if match_code >= MAX_MATCH_CODE {
                write_varint_to(&mut self.lengths, match_code - MAX_MATCH_CODE);
            }
            if lit_len >= MAX_LIT_CODE {
                write_varint_to(&mut self.lengths, lit_len - MAX_LIT_CODE);
            }
            self.literals.extend_from_slice(&body[lit_start..pos]);
            self.indexes.push(m.index as u8);
            pos += m.length;
            lit_start = pos;
        }
        if lit_start < limit {
            let lit_len = (limit - lit_start) as u32;
            self.tokens.push((lit_len.min(MAX_LIT_CODE) << 3) as u8);
            if lit_len >= MAX_LIT_CODE {
                write_varint_to(&mut self.lengths, lit_len - MAX_LIT_CODE);
            }
            self.literals.extend_from_slice(&body[lit_start..limit]);
        }

        utils::write_varint(bw, self.tokens.len() as u32)?;
        AnsEncoder::new(0)?.encode(bw, &self.tokens)?;
        utils::write_varint(bw, self.lengths.len() as u32)?;
        AnsEncoder::new(0)?.encode(bw, &self.lengths)?;
        utils::write_varint(bw, self.literals.len() as u32)?;
        AnsEncoder::new(self.literal_order)?.encode(bw, &self.literals)?;
        utils::write_varint(bw, self.indexes.len() as u32)?;
        AnsEncoder::new(0)?.encode(bw, &self.indexes)?;
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
        let literal_order = flags & 1;
        if min_match != self.min_match {
            self.min_match = min_match;
            self.table = MatchTable::new(
                self.table.log_pos_checks(),
                min_match,
                65535 + min_match,
            );
        }

        let tail_len = len.min(4);
        let limit = len - tail_len;
        let out = &mut dst[..len];
        for i in 0..tail_len {
            out[limit + i] = br.read_bits(8)? as u8;
        }

        // The four buffers, in emission order.
        let mut bufs: [Vec<u8>; 4] = Default::default();
        for (i, buf) in bufs.iter_mut().enumerate() {
            let raw_len = utils::read_varint(br)? as usize;
            if raw_len > CHUNK_SIZE + (CHUNK_SIZE >> 2) {
                return Err(OxiBlockError::invalid_bitstream("oversized ROLZ buffer"));
            }
            buf.resize(raw_len, 0);
            let order = if i == 2 { literal_order } else { 0 };
            let mut dec = AnsDecoder::new(order)?;
            dec.decode(br, buf)?;
        }
        let [tokens, lengths, literals, indexes] = bufs;

        self.table.reset();
        let ctx_len = self.table.context_len();
        let mut produced = 0usize;
        let mut lit_pos = 0usize;
        let mut len_pos = 0usize;
        let mut idx_pos = 0usize;
        for &token in &tokens {
            let lit_code = (token >> 3) as u32;
            let match_code = (token & 7) as u32;
            let match_extra = if match_code == MAX_MATCH_CODE {
                read_varint_from(&lengths, &mut len_pos)?
            } else {
                0
            };
            let lit_len = if lit_code == MAX_LIT_CODE {
                (MAX_LIT_CODE + read_varint_from(&lengths, &mut len_pos)?) as usize
            } else {
                lit_code as usize
            };

            if lit_pos + lit_len > literals.len() || produced + lit_len > limit {
                return Err(OxiBlockError::invalid_bitstream("ROLZ literal overrun"));
            }
            out[produced..produced + lit_len]
                .copy_from_slice(&literals[lit_pos..lit_pos + lit_len]);
            lit_pos += lit_len;
            for p in produced..produced + lit_len {
                if p >= ctx_len {
                    self.table.register(out, p);
                }
            }
            produced += lit_len;

            if produced >= limit {
                break;
            }

            if produced < ctx_len {
                return Err(OxiBlockError::invalid_bitstream("match before any context"));
            }
            let match_len = min_match + (match_code + match_extra) as usize;
            let index = *indexes
                .get(idx_pos)
                .ok_or_else(|| OxiBlockError::invalid_bitstream("ROLZ index underrun"))?;
            idx_pos += 1;
            let ref_pos = self
                .table
                .resolve(out, produced, index as u32)
                .ok_or_else(|| OxiBlockError::invalid_bitstream("unresolvable ROLZ index"))?;
            if produced + match_len > limit || ref_pos >= produced {
                return Err(OxiBlockError::invalid_bitstream("ROLZ match overrun"));
            }
            self.table.register(out, produced);
            emit_copy(out, ref_pos, produced, match_len);
            produced += match_len;
        }

        if produced != limit {
            return Err(OxiBlockError::invalid_bitstream(
                "ROLZ chunk did not fill its advertised length",
            ));
        }
        Ok(len)
    }
}

impl ByteTransform for Rolz {
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
        src_len + (src_len >> 3) + 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let mut codec = Rolz::new(DataType::Undefined);
        let mut encoded = vec![0u8; codec.max_encoded_len(data.len())];
        let (read, written) = codec.forward(data, &mut encoded).unwrap();
        assert_eq!(read, data.len());

        let mut decoder = Rolz::new(DataType::Undefined);
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
    fn test_roundtrip_repetitive() {
        roundtrip(&b"ABC".repeat(200));
        roundtrip(&b"the cat sat on the mat. ".repeat(100));
        roundtrip(&b"a".repeat(5000));
    }

    #[test]
    fn test_roundtrip_mixed() {
        let mut data = lcg_bytes(2000, 3, 64);
        data.extend_from_slice(&b"repeated segment ".repeat(300));
        data.extend(lcg_bytes(2000, 4, 64));
        data.extend_from_slice(&b"repeated segment ".repeat(300));
        roundtrip(&data);
    }

    #[test]
    fn test_compresses_abc_block() {
        let data = b"ABC".repeat(200);
        let mut codec = Rolz::new(DataType::Undefined);
        let mut encoded = vec![0u8; codec.max_encoded_len(data.len())];
        let (_, written) = codec.forward(&data, &mut encoded).unwrap();
        assert!(written < data.len());
    }

    #[test]
    fn test_small_block_skipped() {
        let mut codec = Rolz::new(DataType::Undefined);
        let data = [1u8; 32];
        let mut dst = [0u8; 256];
        assert!(matches!(
            codec.forward(&data, &mut dst),
            Err(OxiBlockError::SkipBlock { .. })
        ));
    }

    #[test]
    fn test_incompressible_signals_no_compression() {
        let data = lcg_bytes(4096, 1234, 256);
        let mut codec = Rolz::new(DataType::Undefined);
        let mut dst = vec![0u8; codec.max_encoded_len(data.len())];
        match codec.forward(&data, &mut dst) {
            Err(OxiBlockError::NoCompression { .. }) => {}
            Ok((_, written)) => assert!(written < data.len()),
            Err(e) => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn test_dna_profile_roundtrip() {
        let unit = b"ACGTACGGTTCA";
        let data: Vec<u8> = unit.iter().cycle().take(4000).copied().collect();
        let mut codec = Rolz::new(DataType::Dna);
        let mut encoded = vec![0u8; codec.max_encoded_len(data.len())];
        let (_, written) = codec.forward(&data, &mut encoded).unwrap();

        let mut decoder = Rolz::new(DataType::Dna);
        let mut recovered = vec![0u8; data.len()];
        decoder.inverse(&encoded[..written], &mut recovered).unwrap();
        assert_eq!(recovered, data);
    }
}
