//! Per-block configuration shared by transforms and entropy coders.

/// Broad classification of the block's content.
///
/// Transforms use this to pick tuning parameters (e.g. the ROLZ
/// minimum match length); it never changes correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// Unknown or mixed content.
    #[default]
    Undefined,
    /// Natural-language text.
    Text,
    /// DNA/RNA sequences (tiny alphabet, long repeats).
    Dna,
    /// Already-compressed or sampled media.
    Multimedia,
    /// Numeric tables.
    Numeric,
    /// Base64-like encodings.
    Base64,
    /// Opaque binary.
    Bin,
}

/// Options propagated from the framing layer to every component.
///
/// One `BlockContext` configures the instances built for a single
/// block; components copy what they need at construction time.
#[derive(Debug, Clone)]
pub struct BlockContext {
    /// Worker budget for the parallel BWT inverse.
    pub jobs: usize,
    /// Block size hint, used to size predictor tables.
    pub block_size: usize,
    /// Enables the extended TPAQ model and larger tables.
    pub extra: bool,
    /// Content classification for parameter tuning.
    pub data_type: DataType,
    /// Bitstream format version (current encoders emit >= 6).
    pub bs_version: u32,
}

impl BlockContext {
    /// Stream version written by current encoders.
    pub const CURRENT_BS_VERSION: u32 = 6;

    /// Oldest stream version decoders accept.
    pub const MIN_BS_VERSION: u32 = 4;

    /// Context with the given block size and defaults everywhere else.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size,
            ..Self::default()
        }
    }
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            jobs: 1,
            block_size: 4 * 1024 * 1024,
            extra: false,
            data_type: DataType::Undefined,
            bs_version: Self::CURRENT_BS_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = BlockContext::default();
        assert_eq!(ctx.jobs, 1);
        assert_eq!(ctx.bs_version, BlockContext::CURRENT_BS_VERSION);
        assert_eq!(ctx.data_type, DataType::Undefined);
        assert!(!ctx.extra);
    }

    #[test]
    fn test_with_block_size() {
        let ctx = BlockContext::with_block_size(1 << 20);
        assert_eq!(ctx.block_size, 1 << 20);
        assert_eq!(ctx.jobs, 1);
    }
}
