//! Reduced-offset LZ codec for OxiBlock.
//!
//! ROLZ replaces LZ77 distances with small indexes into per-context
//! rings of previous positions ([`dictionary`]), which makes offsets
//! cheap enough to entropy-code per match. Two back-ends share the
//! match finder:
//!
//! - [`Rolz`] batches tokens, literals, lengths and ring indexes into
//!   separate buffers and compresses each with rANS,
//! - [`RolzX`] drives every symbol through the adaptive binary
//!   arithmetic coder with literal/match context models.
//!
//! Blocks are processed in 64 MiB chunks with independent rings.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dictionary;
mod rolz;
mod rolzx;

pub use dictionary::{MatchTable, Match};
pub use rolz::Rolz;
pub use rolzx::RolzX;

use oxiblock_core::{DataType, OxiBlockError, Result};

/// Chunks processed with independent match rings (64 MiB).
pub const CHUNK_SIZE: usize = 1 << 26;

/// Smallest block the codec accepts.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Largest block the codec accepts (1 GiB).
pub const MAX_BLOCK_SIZE: usize = 1 << 30;

/// Seed of the 16-bit multiplicative context hash.
pub const HASH_SEED: u64 = 0x2_0000_2979;

/// Minimum match length for the given content type.
///
/// Long-repeat content (DNA) pays for short matches, sampled content
/// (multimedia) for very short ones; everything else uses 3.
pub fn min_match_for(data_type: DataType) -> usize {
    match data_type {
        DataType::Dna => 7,
        DataType::Multimedia => 4,
        _ => 3,
    }
}

fn min_match_selector(min_match: usize) -> u8 {
    match min_match {
        4 => 1,
        7 => 2,
        _ => 0,
    }
}

fn min_match_from_selector(sel: u8) -> Result<usize> {
    match sel {
        0 => Ok(3),
        1 => Ok(4),
        2 => Ok(7),
        _ => Err(OxiBlockError::invalid_bitstream("bad minimum-match selector")),
    }
}

fn check_block_size(len: usize) -> Result<()> {
    if len > MAX_BLOCK_SIZE {
        return Err(OxiBlockError::invalid_input(format!(
            "block of {} bytes exceeds the ROLZ maximum",
            len
        )));
    }
    if len < MIN_BLOCK_SIZE {
        return Err(OxiBlockError::skip_block(format!(
            "block of {} bytes below the ROLZ minimum",
            len
        )));
    }
    Ok(())
}

/// Forward copy that tolerates overlapping ranges (`src < dst`),
/// eight bytes at a stride while the gap allows it.
fn emit_copy(buf: &mut [u8], src: usize, dst: usize, len: usize) {
    debug_assert!(src < dst);
    let gap = dst - src;
    let mut n = 0;
    if gap >= 8 {
        while n + 8 <= len {
            buf.copy_within(src + n..src + n + 8, dst + n);
            n += 8;
        }
    }
    while n < len {
        buf[dst + n] = buf[src + n];
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_match_mapping() {
        assert_eq!(min_match_for(DataType::Dna), 7);
        assert_eq!(min_match_for(DataType::Multimedia), 4);
        assert_eq!(min_match_for(DataType::Text), 3);
        assert_eq!(min_match_for(DataType::Undefined), 3);
        for mm in [3usize, 4, 7] {
            assert_eq!(
                min_match_from_selector(min_match_selector(mm)).unwrap(),
                mm
            );
        }
    }

    #[test]
    fn test_emit_copy_overlap() {
        // Period-2 fill from a 2-byte seed.
        let mut buf = vec![0u8; 20];
        buf[0] = b'a';
        buf[1] = b'b';
        emit_copy(&mut buf, 0, 2, 18);
        assert_eq!(&buf, b"abababababababababab");

        // Wide gap takes the strided path.
        let mut buf: Vec<u8> = (0..40u8).collect();
        emit_copy(&mut buf, 0, 20, 20);
        for i in 0..20 {
            assert_eq!(buf[20 + i], i as u8);
        }
    }

    #[test]
    fn test_block_size_gates() {
        assert!(matches!(
            check_block_size(10),
            Err(OxiBlockError::SkipBlock { .. })
        ));
        assert!(check_block_size(1000).is_ok());
        assert!(matches!(
            check_block_size(MAX_BLOCK_SIZE + 1),
            Err(OxiBlockError::InvalidInput { .. })
        ));
    }
}
