use anyhow::ensure;
use serde::{Deserialize, Serialize};

use crate::sim::config::Config;
use crate::timeq::CostConfig;

use super::policy::ReplacementPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub num_cpu: usize,
    /// Cache size in blocks; sets = cache_size / associativity.
    pub cache_size: usize,
    pub block_size: usize,
    pub associativity: usize,
    pub write_back: bool,
    pub write_allocate: bool,
    /// Write buffer capacity per CPU; 0 disables buffering.
    pub buffer_limit: usize,
    pub retire_threshold: usize,
    /// Stride prefetch distance in bytes; 0 disables prefetching.
    pub prefetch_offset: u64,
    pub replacement: ReplacementPolicy,
    pub seed: u64,
    /// Addresses below this bound feed the sharing histogram.
    pub sharing_address_bound: usize,
    pub costs: CostConfig,
}

impl Config for CacheConfig {}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            num_cpu: 4,
            cache_size: 128,
            block_size: 4,
            associativity: 1,
            write_back: false,
            write_allocate: true,
            buffer_limit: 32,
            retire_threshold: 8,
            prefetch_offset: 0,
            replacement: ReplacementPolicy::Lru,
            seed: 0,
            sharing_address_bound: 2048,
            costs: CostConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.num_cpu > 0, "num_cpu must be > 0");
        ensure!(self.cache_size > 0, "cache_size must be > 0");
        ensure!(self.block_size > 0, "block_size must be > 0");
        ensure!(self.associativity > 0, "associativity must be > 0");
        ensure!(
            self.cache_size % self.associativity == 0,
            "associativity {} does not evenly divide cache_size {}",
            self.associativity,
            self.cache_size
        );
        Ok(())
    }

    pub fn num_sets(&self) -> usize {
        self.cache_size / self.associativity.max(1)
    }
}
