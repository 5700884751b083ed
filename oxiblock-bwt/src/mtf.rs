//! Move-to-Front transform with a bucketed symbol list.
//!
//! A flat 256-entry MTF list costs a long walk per symbol. The forward
//! direction instead keeps the 256 symbols in 16 doubly-linked lists:
//! bucket 0 holds the most recent symbol, buckets 1..15 hold 17 each.
//! A symbol's rank is its offset in its list plus the lengths of the
//! lists before it, so a lookup touches at most one short list. The
//! lists are stored as an index arena (no pointer cycles).
//!
//! The inverse needs no ranks-to-symbol search and keeps the plain
//! index array.

use oxiblock_core::{ByteTransform, OxiBlockError, Result};

const LIST_LENGTH: usize = 17;
const RESET_THRESHOLD: usize = 64;
const NB_LISTS: usize = 16;

/// One arena slot: a symbol with its list neighbours.
#[derive(Clone, Copy, Default)]
struct Node {
    prev: u16,
    next: u16,
}

const NIL: u16 = u16::MAX;

/// Bucketed Move-to-Front transform.
pub struct Mtft {
    nodes: [Node; 256],
    heads: [u16; NB_LISTS],
    lengths: [usize; NB_LISTS],
    buckets: [u8; 256],
}

impl Default for Mtft {
    fn default() -> Self {
        Self::new()
    }
}

impl Mtft {
    /// Create a transform; the symbol lists are built lazily.
    pub fn new() -> Self {
        Self {
            nodes: [Node::default(); 256],
            heads: [NIL; NB_LISTS],
            lengths: [0; NB_LISTS],
            buckets: [0; 256],
        }
    }

    /// Rebuild the lists in natural symbol order: bucket 0 holds
    /// symbol 0, buckets 1..15 hold 17 symbols each.
    fn reset_lists(&mut self) {
        let order: Vec<u16> = (0..256).map(|v| v as u16).collect();
        self.relink(&order);
    }

    /// Relink all 256 symbols in the given global order.
    fn relink(&mut self, order: &[u16]) {
        debug_assert_eq!(order.len(), 256);
        let mut pos = 0usize;
        for (list, len) in list_sizes().enumerate() {
            self.heads[list] = order[pos];
            self.lengths[list] = len;
            for k in 0..len {
                let v = order[pos + k];
                self.buckets[v as usize] = list as u8;
                self.nodes[v as usize].prev = if k == 0 { NIL } else { order[pos + k - 1] };
                self.nodes[v as usize].next = if k == len - 1 {
                    NIL
                } else {
                    order[pos + k + 1]
                };
            }
            pos += len;
        }
        debug_assert_eq!(pos, 256);
    }

    /// Collect the current global symbol order and relink so bucket 0
    /// again holds one element and the rest 17 each.
    fn balance_lists(&mut self) {
        let mut order = Vec::with_capacity(256);
        for list in 0..NB_LISTS {
            let mut v = self.heads[list];
            while v != NIL {
                order.push(v);
                v = self.nodes[v as usize].next;
            }
        }
        self.relink(&order);
    }

    /// Rank of symbol `c`, walking only its own bucket.
    fn rank_of(&self, c: u8) -> usize {
        let list = self.buckets[c as usize] as usize;
        let mut rank: usize = self.lengths[..list].iter().sum();
        let mut v = self.heads[list];
        while v != c as u16 {
            rank += 1;
            v = self.nodes[v as usize].next;
        }
        rank
    }

    /// Unlink `c` from its list and push it onto the front of bucket 0.
    fn move_to_front(&mut self, c: u8) {
        let list = self.buckets[c as usize] as usize;
        let node = self.nodes[c as usize];
        if node.prev != NIL {
            self.nodes[node.prev as usize].next = node.next;
        } else {
            self.heads[list] = node.next;
        }
        if node.next != NIL {
            self.nodes[node.next as usize].prev = node.prev;
        }
        self.lengths[list] -= 1;

        let old_head = self.heads[0];
        self.nodes[c as usize].prev = NIL;
        self.nodes[c as usize].next = old_head;
        if old_head != NIL {
            self.nodes[old_head as usize].prev = c as u16;
        }
        self.heads[0] = c as u16;
        self.buckets[c as usize] = 0;
        self.lengths[0] += 1;

        if self.lengths[0] > RESET_THRESHOLD {
            self.balance_lists();
        }
    }
}

/// Sizes of the 16 lists after a rebalance: 1, then 17 each.
fn list_sizes() -> impl Iterator<Item = usize> {
    std::iter::once(1).chain(std::iter::repeat(LIST_LENGTH).take(NB_LISTS - 1))
}

impl ByteTransform for Mtft {
    fn forward(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if dst.len() < src.len() {
            return Err(OxiBlockError::output_too_small(src.len(), dst.len()));
        }
        if src.is_empty() {
            return Ok((0, 0));
        }

        self.reset_lists();
        let mut previous = self.heads[0] as u8;

        for (i, &c) in src.iter().enumerate() {
            if c == previous {
                dst[i] = 0;
                continue;
            }
            dst[i] = self.rank_of(c) as u8;
            self.move_to_front(c);
            previous = c;
        }
        Ok((src.len(), src.len()))
    }

    fn inverse(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if dst.len() < src.len() {
            return Err(OxiBlockError::output_too_small(src.len(), dst.len()));
        }
        if src.is_empty() {
            return Ok((0, 0));
        }

        let mut idx: [u8; 256] = std::array::from_fn(|i| i as u8);
        for (i, &r) in src.iter().enumerate() {
            if r == 0 {
                // Repeat of the most recent symbol.
                dst[i] = idx[0];
                continue;
            }
            let c = idx[r as usize];
            idx.copy_within(0..r as usize, 1);
            idx[0] = c;
            dst[i] = c;
        }
        Ok((src.len(), src.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let mut mtf = Mtft::new();
        let mut transformed = vec![0u8; data.len()];
        mtf.forward(data, &mut transformed).unwrap();

        let mut inv = Mtft::new();
        let mut recovered = vec![0u8; data.len()];
        inv.inverse(&transformed, &mut recovered).unwrap();
        assert_eq!(recovered, data, "input: {:?}", data);
    }

    #[test]
    fn test_runs_become_zeros() {
        let mut mtf = Mtft::new();
        let data = [5u8, 5, 5, 5];
        let mut out = [0u8; 4];
        mtf.forward(&data, &mut out).unwrap();
        assert_eq!(out[1], 0);
        assert_eq!(out[2], 0);
        assert_eq!(out[3], 0);
    }

    #[test]
    fn test_sentence_roundtrip() {
        roundtrip(b"the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn test_roundtrip_all_bytes() {
        let data: Vec<u8> = (0u8..=255).collect();
        roundtrip(&data);
        let data: Vec<u8> = (0u8..=255).rev().collect();
        roundtrip(&data);
    }

    #[test]
    fn test_roundtrip_forces_rebalance() {
        // More than 64 distinct symbols moved to the front.
        let mut data = Vec::new();
        for round in 0..4u16 {
            for v in 0..200u16 {
                data.push(((v * 7 + round) % 256) as u8);
            }
        }
        roundtrip(&data);
    }

    #[test]
    fn test_bucket_invariant_after_rebalance() {
        let mut mtf = Mtft::new();
        let data: Vec<u8> = (0..=255u8).chain(0..=255u8).collect();
        let mut out = vec![0u8; data.len()];
        mtf.forward(&data, &mut out).unwrap();

        // Rebalance happened at least once; re-trigger one directly
        // and check the list shape.
        mtf.balance_lists();
        assert_eq!(mtf.lengths[0], 1);
        for list in 1..NB_LISTS {
            assert_eq!(mtf.lengths[list], LIST_LENGTH);
        }
        for v in 0..=255u16 {
            let list = mtf.buckets[v as usize] as usize;
            let mut found = false;
            let mut node = mtf.heads[list];
            while node != NIL {
                if node == v {
                    found = true;
                    break;
                }
                node = mtf.nodes[node as usize].next;
            }
            assert!(found, "symbol {} not in its bucket", v);
        }
    }

    #[test]
    fn test_matches_reference_mtf() {
        // The bucketed list must emit exactly the classic MTF ranks.
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

        let data = b"sixty zippers were quickly picked from the woven jute bag";
        let mut mtf = Mtft::new();
        let mut out = vec![0u8; data.len()];
        mtf.forward(data, &mut out).unwrap();
        assert_eq!(out, reference_mtf(data));
    }
}
