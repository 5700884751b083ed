//! Sort-by-rank transforms.
//!
//! One structure covers three related rank transforms, selected by a
//! mode that fixes how a symbol's sort key is refreshed on each
//! occurrence: move-to-front (key = position), rank (key = average of
//! the last two positions) and timestamp (key = previous position).

use oxiblock_core::{ByteTransform, OxiBlockError, Result};

/// Key update rule for the sort-by-rank transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbrtMode {
    /// Key is the current position: plain move-to-front.
    Mtf,
    /// Key averages the current and previous positions.
    Rank,
    /// Key is the previous position.
    Timestamp,
}

impl SbrtMode {
    /// `(mask1, mask2, shift)` of the key formula
    /// `((i & mask1) + (p & mask2)) >> shift`.
    fn params(self) -> (i64, i64, u32) {
        match self {
            SbrtMode::Mtf => (-1, 0, 0),
            SbrtMode::Rank => (-1, -1, 1),
            SbrtMode::Timestamp => (0, -1, 0),
        }
    }
}

/// Sort-by-rank transform over a 256-symbol alphabet.
pub struct Sbrt {
    mode: SbrtMode,
}

impl Sbrt {
    /// Create a transform with the given key rule.
    pub fn new(mode: SbrtMode) -> Self {
        Self { mode }
    }

    /// The configured mode.
    pub fn mode(&self) -> SbrtMode {
        self.mode
    }
}

impl ByteTransform for Sbrt {
    fn forward(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if dst.len() < src.len() {
            return Err(OxiBlockError::output_too_small(src.len(), dst.len()));
        }
        let (mask1, mask2, shift) = self.mode.params();

        let mut p = [0i64; 256];
        let mut q = [0i64; 256];
        let mut s2r: [u8; 256] = std::array::from_fn(|i| i as u8);
        let mut r2s: [u8; 256] = std::array::from_fn(|i| i as u8);

        for (i, &c) in src.iter().enumerate() {
            let c = c as usize;
            let mut r = s2r[c] as usize;
            dst[i] = r as u8;

            q[c] = ((i as i64 & mask1) + (p[c] & mask2)) >> shift;
            p[c] = i as i64;

            // Bubble the symbol up to its new rank.
            while r > 0 && q[r2s[r - 1] as usize] <= q[c] {
                r2s[r] = r2s[r - 1];
                s2r[r2s[r] as usize] = r as u8;
                r -= 1;
            }
            r2s[r] = c as u8;
            s2r[c] = r as u8;
        }
        Ok((src.len(), src.len()))
    }

    fn inverse(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if dst.len() < src.len() {
            return Err(OxiBlockError::output_too_small(src.len(), dst.len()));
        }
        let (mask1, mask2, shift) = self.mode.params();

        let mut p = [0i64; 256];
        let mut q = [0i64; 256];
        let mut r2s: [u8; 256] = std::array::from_fn(|i| i as u8);

        for (i, &code) in src.iter().enumerate() {
            let mut r = code as usize;
            let c = r2s[r] as usize;
            dst[i] = c as u8;

            q[c] = ((i as i64 & mask1) + (p[c] & mask2)) >> shift;
            p[c] = i as i64;

            while r > 0 && q[r2s[r - 1] as usize] <= q[c] {
                r2s[r] = r2s[r - 1];
                r -= 1;
            }
            r2s[r] = c as u8;
        }
        Ok((src.len(), src.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(mode: SbrtMode, data: &[u8]) {
        let mut fw = Sbrt::new(mode);
        let mut transformed = vec![0u8; data.len()];
        fw.forward(data, &mut transformed).unwrap();

        let mut inv = Sbrt::new(mode);
        let mut recovered = vec![0u8; data.len()];
        inv.inverse(&transformed, &mut recovered).unwrap();
        assert_eq!(recovered, data, "mode {:?} input {:?}", mode, data);
    }

    fn lcg_bytes(len: usize, mut state: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            out.push((state >> 16) as u8);
        }
        out
    }

    #[test]
    fn test_roundtrip_all_modes() {
        for mode in [SbrtMode::Mtf, SbrtMode::Rank, SbrtMode::Timestamp] {
            roundtrip(mode, b"");
            roundtrip(mode, b"a");
            roundtrip(mode, b"bananas and abracadabras");
            roundtrip(mode, &(0u8..=255).collect::<Vec<u8>>());
            roundtrip(mode, &lcg_bytes(5000, 31 + mode as u32));
        }
    }

    #[test]
    fn test_mtf_mode_matches_mtf_ranks() {
        // In MTF mode the emitted codes are classic move-to-front
        // ranks.
        fn reference_mtf(data: &[u8]) -> Vec<u8> {
            let mut list: Vec<u8> = (0..=255).collect();
            let mut out = Vec::with_capacity(data.len());
            for &b in data {
                let pos = list.iter().position(|&x| x == b).unwrap();
                out.push(pos as u8);
                list.remove(pos);
                list.insert(0, b);
            }
            out
        }

        let data = b"compression ratio";
        let mut fw = Sbrt::new(SbrtMode::Mtf);
        let mut out = vec![0u8; data.len()];
        fw.forward(data, &mut out).unwrap();
        assert_eq!(out, reference_mtf(data));
    }

    #[test]
    fn test_runs_emit_zero() {
        let mut fw = Sbrt::new(SbrtMode::Rank);
        let data = [9u8, 9, 9, 9, 9];
        let mut out = [0u8; 5];
        fw.forward(&data, &mut out).unwrap();
        assert_eq!(&out[1..], &[0, 0, 0, 0]);
    }
}
