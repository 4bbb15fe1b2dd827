use std::collections::HashMap;

use serde::Serialize;

use crate::timeq::{CostConfig, CpuClock, Cycle};

use super::addr::{Addr, AddressDecoder, LinePos};
use super::array::CpuCache;
use super::config::CacheConfig;
use super::events::{EventLog, SimEvent};
use super::line::{CacheLine, LineState};
use super::policy::Replacer;
use super::prefetch::Prefetcher;
use super::stats::{AccessClass, AccessStats, CpuStats, SharingHistogram};
use super::write_buffer::{BufferWrite, Retire, WriteBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Served from the CPU's own write buffer.
    Bypassed,
    Hit(AccessClass),
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Local copy was already Modified.
    Hit(AccessClass),
    /// Local copy was Shared: the others were invalidated and the write counts as a miss.
    Upgrade(AccessClass),
    Miss,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuSnapshot {
    pub cpu: usize,
    pub counter: Cycle,
    pub sets: Vec<Vec<CacheLine>>,
    pub write_buffer: Vec<LinePos>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub write_buffer_enabled: bool,
    pub cpus: Vec<CpuSnapshot>,
}

/// A (set, tag) held in conflicting states by several CPUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub pos: LinePos,
    pub modified: usize,
    pub shared: usize,
}

/// MSI snooping engine over `num_cpu` private caches sharing one bus.
///
/// All cross-CPU effects of one access (snoop, commit, invalidate) are
/// applied before the handler returns, so the single-writer invariant
/// holds between any two calls.
#[derive(Debug)]
pub struct CoherenceEngine {
    config: CacheConfig,
    decoder: AddressDecoder,
    costs: CostConfig,
    caches: Vec<CpuCache>,
    buffers: Vec<WriteBuffer>,
    clocks: Vec<CpuClock>,
    stats: Vec<CpuStats>,
    access: AccessStats,
    sharing: SharingHistogram,
    replacer: Replacer,
    prefetcher: Prefetcher,
    events: EventLog,
}

impl CoherenceEngine {
    pub fn new(config: CacheConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let decoder = AddressDecoder::new(config.block_size, config.cache_size, config.associativity);
        let sets = decoder.num_sets();
        let num_cpu = config.num_cpu;
        Ok(Self {
            decoder,
            costs: config.costs,
            caches: (0..num_cpu)
                .map(|_| CpuCache::new(sets, config.associativity))
                .collect(),
            buffers: (0..num_cpu)
                .map(|_| WriteBuffer::new(config.buffer_limit, config.retire_threshold))
                .collect(),
            clocks: vec![CpuClock::new(); num_cpu],
            stats: vec![CpuStats::default(); num_cpu],
            access: AccessStats::default(),
            sharing: SharingHistogram::new(config.sharing_address_bound, num_cpu),
            replacer: Replacer::new(config.replacement, config.seed),
            prefetcher: Prefetcher::new(config.prefetch_offset),
            events: EventLog::new(false),
            config,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn num_cpu(&self) -> usize {
        self.config.num_cpu
    }

    pub fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }

    pub fn cache(&self, cpu: usize) -> &CpuCache {
        &self.caches[cpu]
    }

    pub fn write_buffer(&self, cpu: usize) -> &WriteBuffer {
        &self.buffers[cpu]
    }

    pub fn counter(&self, cpu: usize) -> Cycle {
        self.clocks[cpu].now()
    }

    pub fn stats(&self, cpu: usize) -> &CpuStats {
        &self.stats[cpu]
    }

    pub fn all_stats(&self) -> &[CpuStats] {
        &self.stats
    }

    pub fn access_stats(&self) -> &AccessStats {
        &self.access
    }

    pub fn sharing(&self) -> &SharingHistogram {
        &self.sharing
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }

    pub fn state_of(&self, addr: Addr, cpu: usize) -> LineState {
        self.caches[cpu].state_of(self.decoder.pos(addr))
    }

    pub fn handle_read(&mut self, addr: Addr, cpu: usize) -> ReadOutcome {
        let pos = self.decoder.pos(addr);
        self.events.push_with(|| SimEvent::Read { cpu, addr });
        self.sharing.record(addr, cpu);
        self.retire_if_due(cpu);

        if self.buffers[cpu].contains(pos) {
            self.clocks[cpu].advance(self.costs.read_bypass);
            self.events.push_with(|| SimEvent::ReadBypass { cpu, pos });
            return ReadOutcome::Bypassed;
        }

        if self.is_hit(addr, cpu) {
            let class = self.classify(pos, false);
            self.stats[cpu].record_read_hit();
            self.prefetch(addr, cpu);
            return ReadOutcome::Hit(class);
        }

        self.snoop_for_read(pos, cpu);
        self.bus_transaction(cpu);
        if !self.config.write_back {
            self.load_memory(pos, cpu);
        }
        self.install_line(pos, cpu, LineState::Shared);
        self.stats[cpu].record_read_miss();
        self.prefetch(addr, cpu);
        ReadOutcome::Miss
    }

    pub fn handle_write(&mut self, addr: Addr, cpu: usize) -> WriteOutcome {
        let pos = self.decoder.pos(addr);
        self.events.push_with(|| SimEvent::Write { cpu, addr });
        self.sharing.record(addr, cpu);
        self.retire_if_due(cpu);

        let local = if self.is_hit(addr, cpu) {
            self.caches[cpu].lookup(pos)
        } else {
            None
        };
        // A hit always has a valid local way; if it somehow does not, take the miss path.
        if let Some((way, local)) = local {
            let class = self.classify(pos, true);
            let upgrade = local == LineState::Shared;
            if upgrade {
                self.stats[cpu].record_write_miss();
                self.snoop_for_write(pos, cpu);
            } else {
                self.stats[cpu].record_write_hit();
            }
            self.bus_transaction(cpu);
            self.caches[cpu].set_state(pos.index, way, LineState::Modified);
            if upgrade {
                self.events.push_with(|| SimEvent::Upgrade { cpu, pos, way });
            }
            if !self.config.write_back {
                self.write_memory(pos, cpu);
            }
            self.prefetch(addr, cpu);
            return if upgrade {
                WriteOutcome::Upgrade(class)
            } else {
                WriteOutcome::Hit(class)
            };
        }

        self.snoop_for_write(pos, cpu);
        self.bus_transaction(cpu);
        if self.config.write_allocate {
            self.install_line(pos, cpu, LineState::Modified);
        } else {
            self.write_memory(pos, cpu);
        }
        self.stats[cpu].record_write_miss();
        self.prefetch(addr, cpu);
        WriteOutcome::Miss
    }

    /// Probe this CPU's cache, charging one cache access whatever the outcome.
    pub fn is_hit(&mut self, addr: Addr, cpu: usize) -> bool {
        let pos = self.decoder.pos(addr);
        self.clocks[cpu].advance(self.costs.cache_access);
        let probe = self.caches[cpu].probe(pos);
        if probe.stale > 0 {
            self.stats[cpu].record_coherence_misses(probe.stale);
            self.events.push_with(|| SimEvent::CoherenceMiss {
                cpu,
                pos,
                count: probe.stale,
            });
        }
        self.events.push_with(|| SimEvent::Probe {
            cpu,
            pos,
            way: probe.way,
        });
        match probe.way {
            Some(way) => {
                self.caches[cpu].touch(pos.index, way);
                true
            }
            None => false,
        }
    }

    /// Place `pos` in this CPU's cache, in a free way if there is one.
    pub fn install_line(&mut self, pos: LinePos, cpu: usize, state: LineState) -> usize {
        let cache = &mut self.caches[cpu];
        let way = match cache.free_way(pos.index) {
            Some(way) => way,
            None => self.replacer.select_victim(&cache.set(pos.index).ages()),
        };
        let evicted = cache.fill(pos, way, state);
        self.events.push_with(|| SimEvent::Install {
            cpu,
            pos,
            way,
            state,
            evicted,
        });
        way
    }

    /// Count, over all CPUs, the Shared and Modified holders of `pos` and record the class.
    fn classify(&mut self, pos: LinePos, is_write: bool) -> AccessClass {
        let (shared, modified) = self.holders(pos);
        let class = AccessClass::classify(shared, modified, is_write);
        self.access.record(class);
        class
    }

    fn holders(&self, pos: LinePos) -> (usize, usize) {
        let mut shared = 0;
        let mut modified = 0;
        for cache in &self.caches {
            if cache.find(pos, LineState::Shared).is_some() {
                shared += 1;
            }
            if cache.find(pos, LineState::Modified).is_some() {
                modified += 1;
            }
        }
        (shared, modified)
    }

    // Commit remote Modified copies and keep them as Shared.
    fn snoop_for_read(&mut self, pos: LinePos, cpu: usize) {
        for holder in 0..self.caches.len() {
            if holder == cpu {
                continue;
            }
            let Some(way) = self.caches[holder].find(pos, LineState::Modified) else {
                continue;
            };
            if !self.config.write_back {
                self.write_memory(pos, cpu);
            }
            self.caches[holder].set_state(pos.index, way, LineState::Shared);
            self.events
                .push_with(|| SimEvent::SnoopDemote { cpu, holder, pos });
        }
    }

    // Commit remote Modified copies, then invalidate every remote copy.
    fn snoop_for_write(&mut self, pos: LinePos, cpu: usize) {
        for holder in 0..self.caches.len() {
            if holder == cpu {
                continue;
            }
            while let Some((way, was)) = self.caches[holder].lookup(pos) {
                if was == LineState::Modified && !self.config.write_back {
                    self.write_memory(pos, cpu);
                }
                self.caches[holder].set_state(pos.index, way, LineState::Invalid);
                self.stats[cpu].record_invalidation();
                self.events.push_with(|| SimEvent::SnoopInvalidate {
                    cpu,
                    holder,
                    pos,
                    was,
                });
            }
        }
    }

    fn bus_transaction(&mut self, cpu: usize) {
        self.clocks[cpu].advance(self.costs.bus);
        self.events.push_with(|| SimEvent::Bus { cpu });
    }

    fn load_memory(&mut self, pos: LinePos, cpu: usize) {
        self.clocks[cpu].advance(self.costs.memory);
        self.stats[cpu].record_ram_accesses(1);
        self.events.push_with(|| SimEvent::MemoryLoad { cpu, pos });
    }

    /// Send a write toward memory through this CPU's write buffer.
    pub fn write_memory(&mut self, pos: LinePos, cpu: usize) -> BufferWrite {
        let outcome = self.buffers[cpu].push(pos, &mut self.clocks[cpu], self.costs.memory);
        self.stats[cpu].record_ram_accesses(outcome.ram_accesses());
        let stalled_to = self.clocks[cpu].now();
        match outcome {
            BufferWrite::Direct => {
                self.events.push_with(|| SimEvent::MemoryWrite { cpu, pos });
            }
            BufferWrite::Queued { evicted } => {
                if let Some(evicted) = evicted {
                    self.events.push_with(|| SimEvent::BufferOverflow {
                        cpu,
                        evicted,
                        stalled_to,
                    });
                }
                self.events.push_with(|| SimEvent::Buffered { cpu, pos });
            }
        }
        outcome
    }

    /// Drain the head of the write buffer if it is over the threshold and the last drain finished.
    pub fn retire_if_due(&mut self, cpu: usize) -> Retire {
        let retire = self.buffers[cpu].retire_if_due(&self.clocks[cpu], self.costs.memory);
        match retire {
            Retire::Idle => {}
            Retire::Pending { until } => {
                self.events
                    .push_with(|| SimEvent::RetirePending { cpu, until });
            }
            Retire::Retired { entry, next_at } => {
                self.stats[cpu].record_ram_accesses(1);
                self.events.push_with(|| SimEvent::BufferRetire {
                    cpu,
                    entry,
                    next_at,
                });
            }
        }
        retire
    }

    /// Fetch `addr + offset` as Shared if it is not cached. Never recurses.
    fn prefetch(&mut self, addr: Addr, cpu: usize) {
        let Some(target) = self.prefetcher.target(addr) else {
            return;
        };
        let installed = !self.is_hit(target, cpu);
        if installed {
            let pos = self.decoder.pos(target);
            self.snoop_for_read(pos, cpu);
            self.load_memory(pos, cpu);
            self.install_line(pos, cpu, LineState::Shared);
        }
        self.events.push_with(|| SimEvent::Prefetch {
            cpu,
            addr: target,
            installed,
        });
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            write_buffer_enabled: self.config.buffer_limit > 0,
            cpus: (0..self.num_cpu())
                .map(|cpu| CpuSnapshot {
                    cpu,
                    counter: self.clocks[cpu].now(),
                    sets: self.caches[cpu].lines(),
                    write_buffer: self.buffers[cpu].entries().copied().collect(),
                })
                .collect(),
        }
    }

    /// First (set, tag) that breaks single-writer/multiple-reader, if any.
    pub fn coherence_violation(&self) -> Option<Violation> {
        for index in 0..self.decoder.num_sets() {
            let mut holders: HashMap<u64, (usize, usize)> = HashMap::new();
            for cache in &self.caches {
                for line in cache.set(index).ways() {
                    let Some(tag) = line.tag else { continue };
                    let entry = holders.entry(tag).or_default();
                    match line.state {
                        LineState::Modified => entry.1 += 1,
                        LineState::Shared => entry.0 += 1,
                        LineState::Invalid => {}
                    }
                }
            }
            let mut tags: Vec<_> = holders.into_iter().collect();
            tags.sort_unstable_by_key(|(tag, _)| *tag);
            for (tag, (shared, modified)) in tags {
                if modified > 1 || (modified == 1 && shared > 0) {
                    return Some(Violation {
                        pos: LinePos { tag, index },
                        modified,
                        shared,
                    });
                }
            }
        }
        None
    }
}
