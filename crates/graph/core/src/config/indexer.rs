use std::time::Duration;

/// Configuration of the [`ChainIndexer`](crate::ChainIndexer) loop.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    /// Blocks fetched per iteration.
    pub batch_size: u64,
    /// Wait between two chain head polls while the indexer is within one batch of the head.
    pub poll_interval: Duration,
    /// Head polls without progress before the loop gives up.
    pub max_poll_retries: u32,
    /// The memory health check runs whenever the next block is a multiple of this.
    pub health_check_interval: u64,
    /// Resident memory the process is expected to stay under, in bytes.
    pub memory_ceiling_bytes: u64,
    /// Percentage of [`Self::memory_ceiling_bytes`] above which the loop stops.
    pub memory_threshold_percent: u64,
    /// Progress is reported whenever the next block is a multiple of this.
    pub report_interval: u64,
    /// First block to index. The persisted chain state wins once it is past this block.
    pub start_block: Option<u64>,
}

impl IndexerConfig {
    /// Default number of blocks per batch.
    pub const DEFAULT_BATCH_SIZE: u64 = 4;
    /// Default resident memory ceiling.
    pub const DEFAULT_MEMORY_CEILING_BYTES: u64 = 2 * 1024 * 1024 * 1024;

    /// Aligns `block` down to the start of its batch.
    pub const fn align(&self, block: u64) -> u64 {
        if self.batch_size == 0 { block } else { block - block % self.batch_size }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_secs(10),
            max_poll_retries: 20,
            health_check_interval: 2_000,
            memory_ceiling_bytes: Self::DEFAULT_MEMORY_CEILING_BYTES,
            memory_threshold_percent: 80,
            report_interval: 10_000,
            start_block: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(3, 0)]
    #[case(4, 4)]
    #[case(103, 100)]
    fn test_align_to_batch(#[case] block: u64, #[case] aligned: u64) {
        assert_eq!(IndexerConfig::default().align(block), aligned);
    }

    #[test]
    fn test_align_with_zero_batch_is_identity() {
        let config = IndexerConfig { batch_size: 0, ..Default::default() };
        assert_eq!(config.align(7), 7);
    }
}
