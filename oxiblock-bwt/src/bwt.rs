//! Burrows-Wheeler Transform.
//!
//! The forward transform sorts all rotations of the block via the
//! suffix array and emits the last column plus one primary index per
//! chunk. The inverse rebuilds the block by walking the last-to-first
//! mapping backward from each primary index; chunk walks are
//! independent, so large blocks decode in parallel when the `parallel`
//! feature is enabled.

use crate::divsufsort::DivSufSort;
use oxiblock_core::{ByteTransform, OxiBlockError, Result};

/// Maximum supported block size (1 GiB).
pub const MAX_BLOCK_SIZE: usize = 1 << 30;

/// Maximum number of independently-invertible chunks per block.
pub const MAX_CHUNKS: usize = 8;

/// Blocks below this size use the packed 24-bit-index LF layout.
const PACKED_LIMIT: usize = 1 << 24;

/// Number of chunks used for a block of the given size.
///
/// One chunk below 8 MiB, then one more per 8 MiB, capped at
/// [`MAX_CHUNKS`].
pub fn get_chunks(size: usize) -> usize {
    ((size + (1 << 22)) >> 23).clamp(1, MAX_CHUNKS)
}

/// Split `nb_chunks` across `nb_tasks` workers as evenly as possible.
///
/// Every task receives `ceil(nb_chunks / nb_tasks)` or
/// `floor(nb_chunks / nb_tasks)` chunks.
pub fn compute_jobs_per_task(nb_chunks: usize, nb_tasks: usize) -> Vec<usize> {
    let nb_tasks = nb_tasks.min(nb_chunks).max(1);
    let q = nb_chunks / nb_tasks;
    let r = nb_chunks % nb_tasks;
    (0..nb_tasks).map(|t| if t < r { q + 1 } else { q }).collect()
}

/// Chunked Burrows-Wheeler Transform.
///
/// The primary indexes produced by [`Bwt::forward`] are not part of
/// the output buffer; the framing layer transmits them and restores
/// them with [`Bwt::set_primary_index`] before calling the inverse.
pub struct Bwt {
    dss: DivSufSort,
    sa: Vec<i32>,
    data: Vec<u32>,
    symbols: Vec<u8>,
    primary_indexes: [u32; MAX_CHUNKS],
    jobs: usize,
}

impl Default for Bwt {
    fn default() -> Self {
        Self::new()
    }
}

impl Bwt {
    /// Create a transform with a single-threaded inverse.
    pub fn new() -> Self {
        Self::with_jobs(1)
    }

    /// Create a transform allowing up to `jobs` workers for the
    /// inverse of multi-chunk blocks.
    pub fn with_jobs(jobs: usize) -> Self {
        Self {
            dss: DivSufSort::new(),
            sa: Vec::new(),
            data: Vec::new(),
            symbols: Vec::new(),
            primary_indexes: [0; MAX_CHUNKS],
            jobs: jobs.max(1),
        }
    }

    /// Primary index of the given chunk.
    pub fn primary_index(&self, chunk: usize) -> u32 {
        self.primary_indexes[chunk]
    }

    /// Restore a primary index before inverting.
    ///
    /// Returns false if the chunk number is out of range.
    pub fn set_primary_index(&mut self, chunk: usize, index: u32) -> bool {
        if chunk >= MAX_CHUNKS {
            return false;
        }
        self.primary_indexes[chunk] = index;
        true
    }

    fn check_block(src: &[u8], dst: &[u8]) -> Result<()> {
        if src.len() > MAX_BLOCK_SIZE {
            return Err(OxiBlockError::invalid_input(format!(
                "block of {} bytes exceeds the BWT maximum",
                src.len()
            )));
        }
        if dst.len() < src.len() {
            return Err(OxiBlockError::output_too_small(src.len(), dst.len()));
        }
        Ok(())
    }

    pub(crate) fn forward_with_chunks(
        &mut self,
        src: &[u8],
        dst: &mut [u8],
        chunks: usize,
    ) -> Result<(usize, usize)> {
        let n = src.len();
        Self::check_block(src, dst)?;
        if n == 0 {
            return Ok((0, 0));
        }
        self.primary_indexes = [0; MAX_CHUNKS];
        if n == 1 {
            dst[0] = src[0];
            return Ok((1, 1));
        }

        if self.sa.len() < n {
            self.sa.resize(n, 0);
        }
        let sa = &mut self.sa[..n];
        self.dss.compute_suffix_array(src, sa);

        let step = n.div_ceil(chunks);
        for (i, &s) in sa.iter().enumerate() {
            if s == 0 {
                dst[i] = src[n - 1];
                self.primary_indexes[0] = i as u32;
            } else {
                dst[i] = src[s as usize - 1];
                if s as usize % step == 0 {
                    let c = s as usize / step;
                    if c < MAX_CHUNKS {
                        self.primary_indexes[c] = i as u32;
                    }
                }
            }
        }
        Ok((n, n))
    }

    pub(crate) fn inverse_with_chunks(
        &mut self,
        src: &[u8],
        dst: &mut [u8],
        chunks: usize,
    ) -> Result<(usize, usize)> {
        let n = src.len();
        Self::check_block(src, dst)?;
        if n == 0 {
            return Ok((0, 0));
        }
        if n == 1 {
            dst[0] = src[0];
            return Ok((1, 1));
        }

        let step = n.div_ceil(chunks);
        let nb = n.div_ceil(step);
        for c in 0..nb {
            if self.primary_indexes[c] as usize >= n {
                return Err(OxiBlockError::invalid_bitstream(format!(
                    "primary index {} out of range for block of {} bytes",
                    self.primary_indexes[c], n
                )));
            }
        }

        if n < PACKED_LIMIT {
            self.inverse_packed(src, dst, step, nb)
        } else {
            self.inverse_big(src, dst, step, nb)
        }
        Ok((n, n))
    }

    /// LF walk on the packed `rank << 8 | symbol` layout (N < 2^24).
    fn inverse_packed(&mut self, src: &[u8], dst: &mut [u8], step: usize, nb: usize) {
        let n = src.len();
        if self.data.len() < n {
            self.data.resize(n, 0);
        }
        let data = &mut self.data[..n];
        let mut buckets = [0u32; 256];
        for (i, &c) in src.iter().enumerate() {
            data[i] = (buckets[c as usize] << 8) | c as u32;
            buckets[c as usize] += 1;
        }
        let mut sum = 0u32;
        for b in buckets.iter_mut() {
            let t = *b;
            *b = sum;
            sum += t;
        }

        let data = &self.data[..n];
        let starts: Vec<usize> = (0..nb)
            .map(|c| self.primary_indexes[(c + 1) % nb] as usize)
            .collect();
        run_chunk_walks(&mut dst[..n], step, nb, self.jobs, |c, out| {
            walk_packed(data, &buckets, starts[c], out);
        });
    }

    /// LF walk on the split rank/symbol layout (N >= 2^24).
    fn inverse_big(&mut self, src: &[u8], dst: &mut [u8], step: usize, nb: usize) {
        let n = src.len();
        if self.data.len() < n {
            self.data.resize(n, 0);
        }
        if self.symbols.len() < n {
            self.symbols.resize(n, 0);
        }
        let ranks = &mut self.data[..n];
        let syms = &mut self.symbols[..n];
        let mut buckets = [0u32; 256];
        for (i, &c) in src.iter().enumerate() {
            ranks[i] = buckets[c as usize];
            syms[i] = c;
            buckets[c as usize] += 1;
        }
        let mut sum = 0u32;
        for b in buckets.iter_mut() {
            let t = *b;
            *b = sum;
            sum += t;
        }

        let ranks = &self.data[..n];
        let syms = &self.symbols[..n];
        let starts: Vec<usize> = (0..nb)
            .map(|c| self.primary_indexes[(c + 1) % nb] as usize)
            .collect();
        run_chunk_walks(&mut dst[..n], step, nb, self.jobs, |c, out| {
            walk_big(ranks, syms, &buckets, starts[c], out);
        });
    }
}

fn walk_packed(data: &[u32], buckets: &[u32; 256], start: usize, out: &mut [u8]) {
    let mut ptr = data[start];
    let hi = out.len();
    out[hi - 1] = ptr as u8;
    for idx in (0..hi - 1).rev() {
        ptr = data[(ptr >> 8) as usize + buckets[(ptr & 0xFF) as usize] as usize];
        out[idx] = ptr as u8;
    }
}

fn walk_big(ranks: &[u32], syms: &[u8], buckets: &[u32; 256], start: usize, out: &mut [u8]) {
    let mut i = start;
    let hi = out.len();
    out[hi - 1] = syms[i];
    for idx in (0..hi - 1).rev() {
        i = ranks[i] as usize + buckets[syms[i] as usize] as usize;
        out[idx] = syms[i];
    }
}

/// Run one LF walk per chunk over disjoint output ranges.
///
/// `walk(c, out)` must fill `out` completely; `out` is the `c`-th
/// `step`-sized piece of `dst`. With the `parallel` feature and
/// `jobs > 1`, chunks are grouped into at most `jobs` tasks.
fn run_chunk_walks<F>(dst: &mut [u8], step: usize, nb: usize, jobs: usize, walk: F)
where
    F: Fn(usize, &mut [u8]) + Sync,
{
    debug_assert_eq!(dst.len().div_ceil(step), nb);

    #[cfg(feature = "parallel")]
    if jobs > 1 && nb > 1 {
        use rayon::prelude::*;

        let per_task = compute_jobs_per_task(nb, jobs);
        // Carve dst into one contiguous region per task.
        let mut regions: Vec<(usize, &mut [u8])> = Vec::with_capacity(per_task.len());
        let mut rest = dst;
        let mut chunk_idx = 0;
        for &cnt in &per_task {
            let bytes = (cnt * step).min(rest.len());
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(bytes);
            regions.push((chunk_idx, head));
            chunk_idx += cnt;
            rest = tail;
        }
        regions.into_par_iter().for_each(|(first_chunk, region)| {
            for (k, out) in region.chunks_mut(step).enumerate() {
                walk(first_chunk + k, out);
            }
        });
        return;
    }

    let _ = jobs;
    for (c, out) in dst.chunks_mut(step).enumerate() {
        walk(c, out);
    }
}

impl ByteTransform for Bwt {
    fn forward(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let chunks = get_chunks(src.len());
        self.forward_with_chunks(src, dst, chunks)
    }

    fn inverse(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let chunks = get_chunks(src.len());
        self.inverse_with_chunks(src, dst, chunks)
    }
}
