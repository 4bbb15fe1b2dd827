/*
Counter model for the coherence simulator.

There is no clock. Each CPU owns an abstract counter that only moves forward, by a fixed cost
per kind of operation: a cache probe, a bus transaction, a main memory access, or a read served
from the write buffer. Stalls are expressed by pushing the counter further, never by blocking.
*/

use serde::{Deserialize, Serialize};

pub type Cycle = u64;

// Cost charged for each kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CostConfig {
    pub cache_access: Cycle,
    pub bus: Cycle,
    pub memory: Cycle,
    pub read_bypass: Cycle,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            cache_access: 2,
            bus: 20,
            memory: 200,
            read_bypass: 1,
        }
    }
}

// Per-CPU counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuClock {
    now: Cycle,
}

impl CpuClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Cycle {
        self.now
    }

    pub fn advance(&mut self, cost: Cycle) {
        self.now = self.now.saturating_add(cost);
    }

    // Wait until `at` (if it is still ahead of us), then pay `cost`.
    pub fn stall_until(&mut self, at: Cycle, cost: Cycle) -> Cycle {
        self.now = self.now.max(at).saturating_add(cost);
        self.now
    }

    pub fn has_reached(&self, at: Cycle) -> bool {
        self.now >= at
    }
}
