//! Composition of byte transforms.
//!
//! Up to eight stages run left to right on encode and right to left
//! on decode. A stage may decline its block (too small, or no gain);
//! the sequence then forwards the bytes unchanged and records the
//! stage in a skip mask that travels with the block.

use crate::factory::{Transform, TransformKind};
use oxiblock_core::{BlockContext, OxiBlockError, Result};
use oxiblock_bwt::bwt::MAX_CHUNKS;

/// Maximum number of stages in a sequence.
pub const MAX_STAGES: usize = 8;

const TAG_BITS: u32 = 6;
const TAG_MASK: u64 = (1 << TAG_BITS) - 1;

/// An ordered chain of transform stages.
pub struct TransformSequence {
    stages: Vec<Transform>,
    ctx: BlockContext,
}

impl TransformSequence {
    /// Build a sequence from a plus-separated name list, e.g.
    /// `"BWT+MTFT"`.
    pub fn from_names(names: &str, ctx: &BlockContext) -> Result<Self> {
        let kinds = names
            .split('+')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(TransformKind::from_name)
            .collect::<Result<Vec<_>>>()?;
        Self::from_kinds(&kinds, ctx)
    }

    /// Build a sequence from explicit kinds.
    pub fn from_kinds(kinds: &[TransformKind], ctx: &BlockContext) -> Result<Self> {
        if kinds.len() > MAX_STAGES {
            return Err(OxiBlockError::invalid_input(format!(
                "{} transforms exceed the sequence maximum of {}",
                kinds.len(),
                MAX_STAGES
            )));
        }
        let expanding = kinds
            .iter()
            .filter(|k| matches!(k, TransformKind::Rolz | TransformKind::RolzX))
            .count();
        if expanding > 1 {
            return Err(OxiBlockError::invalid_input(
                "at most one length-changing transform per sequence",
            ));
        }
        Ok(Self {
            stages: kinds.iter().map(|&k| Transform::new(k, ctx)).collect(),
            ctx: ctx.clone(),
        })
    }

    /// Rebuild a sequence from packed six-bit tags.
    pub fn from_tags(tags: u64, ctx: &BlockContext) -> Result<Self> {
        let mut kinds = Vec::new();
        let mut rest = tags;
        while rest != 0 {
            kinds.push(TransformKind::from_tag((rest & TAG_MASK) as u8)?);
            rest >>= TAG_BITS;
        }
        kinds.reverse();
        Self::from_kinds(&kinds, ctx)
    }

    /// Pack the stage tags into a u64, first stage in the highest
    /// occupied six-bit group.
    pub fn tags(&self) -> u64 {
        let mut packed = 0u64;
        for stage in &self.stages {
            packed = (packed << TAG_BITS) | stage.kind().tag() as u64;
        }
        packed
    }

    /// Plus-separated stage names.
    pub fn name(&self) -> String {
        let names: Vec<&str> = self.stages.iter().map(|s| s.kind().name()).collect();
        names.join("+")
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the sequence has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The block context this sequence was configured with.
    pub fn context(&self) -> &BlockContext {
        &self.ctx
    }

    /// Run all stages forward.
    ///
    /// Returns the transformed bytes and the skip mask (bit `i` set
    /// when stage `i` passed its input through unchanged).
    pub fn forward(&mut self, src: &[u8]) -> Result<(Vec<u8>, u8)> {
        let mut cur = src.to_vec();
        let mut skip_mask = 0u8;
        for (i, stage) in self.stages.iter_mut().enumerate() {
            let mut next = vec![0u8; stage.max_encoded_len(cur.len())];
            match stage.forward(&cur, &mut next) {
                Ok((_, written)) => {
                    next.truncate(written);
                    cur = next;
                }
                Err(e) if e.is_recoverable() => {
                    skip_mask |= 1 << i;
                }
                Err(e) => return Err(e),
            }
        }
        Ok((cur, skip_mask))
    }

    /// Run all stages backward, producing `original_len` bytes.
    pub fn inverse(&mut self, src: &[u8], original_len: usize, skip_mask: u8) -> Result<Vec<u8>> {
        let mut cur = src.to_vec();
        for (i, stage) in self.stages.iter_mut().enumerate().rev() {
            if skip_mask & (1 << i) != 0 {
                continue;
            }
            let out_len = if stage.is_expanding() {
                original_len
            } else {
                cur.len()
            };
            let mut next = vec![0u8; out_len];
            let (_, written) = stage.inverse(&cur, &mut next)?;
            next.truncate(written);
            cur = next;
        }
        if cur.len() != original_len {
            return Err(OxiBlockError::invalid_bitstream(format!(
                "inverse sequence produced {} bytes, expected {}",
                cur.len(),
                original_len
            )));
        }
        Ok(cur)
    }

    /// Primary indexes of the first BWT stage, if any.
    pub fn bwt_primary_indexes(&self) -> Option<[u32; MAX_CHUNKS]> {
        self.stages.iter().find_map(|s| match s {
            Transform::Bwt(b) => {
                let mut out = [0u32; MAX_CHUNKS];
                for (c, o) in out.iter_mut().enumerate() {
                    *o = b.primary_index(c);
                }
                Some(out)
            }
            _ => None,
        })
    }

    /// Restore the primary indexes of the first BWT stage.
    pub fn set_bwt_primary_indexes(&mut self, indexes: &[u32; MAX_CHUNKS]) -> bool {
        for s in self.stages.iter_mut() {
            if let Transform::Bwt(b) = s {
                for (c, &v) in indexes.iter().enumerate() {
                    b.set_primary_index(c, v);
                }
                return true;
            }
        }
        false
    }
}
