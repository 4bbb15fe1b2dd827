pub mod addr;
pub mod array;
pub mod coherence;
pub mod config;
pub mod events;
pub mod line;
pub mod policy;
pub mod prefetch;
pub mod stats;
pub mod write_buffer;

#[cfg(test)]
mod unit_tests;

pub use addr::{Addr, AddressDecoder, Decoded, LinePos};
pub use array::CpuCache;
pub use coherence::{CoherenceEngine, CpuSnapshot, ReadOutcome, Snapshot, Violation, WriteOutcome};
pub use config::CacheConfig;
pub use events::{EventLog, SimEvent};
pub use line::{CacheLine, CacheSet, LineState};
pub use policy::{ReplacementPolicy, Replacer};
pub use prefetch::Prefetcher;
pub use stats::{AccessClass, AccessStats, CpuStats, SharingBreadth, SharingHistogram};
pub use write_buffer::{BufferWrite, Retire, WriteBuffer};
