use std::collections::VecDeque;

use crate::timeq::{CpuClock, Cycle};

use super::addr::LinePos;

/// What happened to a write handed to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferWrite {
    /// Buffering disabled: the write went straight to memory.
    Direct,
    /// Appended. `evicted` is the entry forced out to memory to make room.
    Queued { evicted: Option<LinePos> },
}

impl BufferWrite {
    /// Main memory accesses this write caused.
    pub fn ram_accesses(&self) -> u64 {
        match self {
            BufferWrite::Direct => 1,
            BufferWrite::Queued { evicted } => evicted.is_some() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retire {
    /// Below the threshold, nothing to do.
    Idle,
    /// Over the threshold but the previous drain is still in flight.
    Pending { until: Cycle },
    Retired { entry: LinePos, next_at: Cycle },
}

/// Bounded FIFO of writes waiting to reach memory.
///
/// A limit of zero disables buffering: every write is charged a memory
/// access immediately. `retire_at` is the earliest counter value at which
/// the head may drain through the threshold path.
#[derive(Debug, Clone)]
pub struct WriteBuffer {
    limit: usize,
    retire_threshold: usize,
    entries: VecDeque<LinePos>,
    retire_at: Cycle,
}

impl WriteBuffer {
    pub fn new(limit: usize, retire_threshold: usize) -> Self {
        Self {
            limit,
            retire_threshold,
            entries: VecDeque::with_capacity(limit),
            retire_at: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn retire_at(&self) -> Cycle {
        self.retire_at
    }

    pub fn contains(&self, pos: LinePos) -> bool {
        self.is_enabled() && self.entries.contains(&pos)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LinePos> + '_ {
        self.entries.iter()
    }

    pub fn push(&mut self, pos: LinePos, clock: &mut CpuClock, memory_cost: Cycle) -> BufferWrite {
        if !self.is_enabled() {
            clock.advance(memory_cost);
            return BufferWrite::Direct;
        }

        let evicted = if self.entries.len() >= self.limit {
            clock.stall_until(self.retire_at, memory_cost);
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(pos);
        BufferWrite::Queued { evicted }
    }

    pub fn retire_if_due(&mut self, clock: &CpuClock, memory_cost: Cycle) -> Retire {
        if self.entries.len() <= self.retire_threshold {
            return Retire::Idle;
        }
        if !clock.has_reached(self.retire_at) {
            return Retire::Pending {
                until: self.retire_at,
            };
        }
        match self.entries.pop_front() {
            Some(entry) => {
                self.retire_at = clock.now().saturating_add(memory_cost);
                Retire::Retired {
                    entry,
                    next_at: self.retire_at,
                }
            }
            None => Retire::Idle,
        }
    }
}
