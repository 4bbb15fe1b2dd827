use serde::Serialize;
use std::ops::AddAssign;

use super::addr::Addr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuStats {
    read_hits: u64,
    read_misses: u64,
    write_hits: u64,
    write_misses: u64,
    invalidations: u64,
    ram_accesses: u64,
    coherence_misses: u64,
}

impl CpuStats {
    pub fn read_hits(&self) -> u64 {
        self.read_hits
    }

    pub fn read_misses(&self) -> u64 {
        self.read_misses
    }

    pub fn write_hits(&self) -> u64 {
        self.write_hits
    }

    pub fn write_misses(&self) -> u64 {
        self.write_misses
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    pub fn ram_accesses(&self) -> u64 {
        self.ram_accesses
    }

    pub fn coherence_misses(&self) -> u64 {
        self.coherence_misses
    }

    pub fn reads(&self) -> u64 {
        self.read_hits + self.read_misses
    }

    pub fn writes(&self) -> u64 {
        self.write_hits + self.write_misses
    }

    pub fn misses(&self) -> u64 {
        self.read_misses + self.write_misses
    }

    pub fn record_read_hit(&mut self) {
        self.read_hits = self.read_hits.saturating_add(1);
    }

    pub fn record_read_miss(&mut self) {
        self.read_misses = self.read_misses.saturating_add(1);
    }

    pub fn record_write_hit(&mut self) {
        self.write_hits = self.write_hits.saturating_add(1);
    }

    pub fn record_write_miss(&mut self) {
        self.write_misses = self.write_misses.saturating_add(1);
    }

    pub fn record_invalidation(&mut self) {
        self.invalidations = self.invalidations.saturating_add(1);
    }

    pub fn record_ram_accesses(&mut self, count: u64) {
        self.ram_accesses = self.ram_accesses.saturating_add(count);
    }

    pub fn record_coherence_misses(&mut self, count: u64) {
        self.coherence_misses = self.coherence_misses.saturating_add(count);
    }

    pub fn read_hit_rate(&self) -> Option<f64> {
        percent(self.read_hits, self.reads())
    }

    pub fn write_hit_rate(&self) -> Option<f64> {
        percent(self.write_hits, self.writes())
    }

    pub fn hit_rate(&self) -> Option<f64> {
        percent(self.read_hits + self.write_hits, self.reads() + self.writes())
    }

    /// Share of misses caused by another CPU invalidating the line.
    pub fn coherence_miss_rate(&self) -> Option<f64> {
        percent(self.coherence_misses, self.misses())
    }
}

impl AddAssign<&CpuStats> for CpuStats {
    fn add_assign(&mut self, other: &CpuStats) {
        self.read_hits = self.read_hits.saturating_add(other.read_hits);
        self.read_misses = self.read_misses.saturating_add(other.read_misses);
        self.write_hits = self.write_hits.saturating_add(other.write_hits);
        self.write_misses = self.write_misses.saturating_add(other.write_misses);
        self.invalidations = self.invalidations.saturating_add(other.invalidations);
        self.ram_accesses = self.ram_accesses.saturating_add(other.ram_accesses);
        self.coherence_misses = self.coherence_misses.saturating_add(other.coherence_misses);
    }
}

impl AddAssign<CpuStats> for CpuStats {
    fn add_assign(&mut self, other: CpuStats) {
        *self += &other;
    }
}

pub(crate) fn percent(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    Some(100.0 * part as f64 / whole as f64)
}

/// How widely a line was held when a hit landed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessClass {
    Private,
    SharedReadOnly,
    SharedReadWrite,
}

impl AccessClass {
    /// Classify from the number of CPUs holding the line Shared and Modified.
    pub fn classify(shared: usize, modified: usize, is_write: bool) -> Self {
        if (shared == 1 && modified == 0) || (shared == 0 && modified == 1) {
            Self::Private
        } else if !is_write && shared > 1 && modified == 0 {
            Self::SharedReadOnly
        } else {
            Self::SharedReadWrite
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccessStats {
    private: u64,
    shared_read_only: u64,
    shared_read_write: u64,
}

impl AccessStats {
    pub fn private(&self) -> u64 {
        self.private
    }

    pub fn shared_read_only(&self) -> u64 {
        self.shared_read_only
    }

    pub fn shared_read_write(&self) -> u64 {
        self.shared_read_write
    }

    pub fn total(&self) -> u64 {
        self.private + self.shared_read_only + self.shared_read_write
    }

    pub fn record(&mut self, class: AccessClass) {
        let slot = match class {
            AccessClass::Private => &mut self.private,
            AccessClass::SharedReadOnly => &mut self.shared_read_only,
            AccessClass::SharedReadWrite => &mut self.shared_read_write,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Number of addresses touched by one, two, or more than two CPUs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SharingBreadth {
    pub one: u64,
    pub two: u64,
    pub many: u64,
}

impl SharingBreadth {
    pub fn total(&self) -> u64 {
        self.one + self.two + self.many
    }
}

/// Which CPUs touched each address below `bound`.
#[derive(Debug, Clone)]
pub struct SharingHistogram {
    bound: usize,
    num_cpu: usize,
    touched: Vec<bool>,
}

impl SharingHistogram {
    pub fn new(bound: usize, num_cpu: usize) -> Self {
        Self {
            bound,
            num_cpu,
            touched: vec![false; bound * num_cpu],
        }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Addresses at or beyond the bound are ignored.
    pub fn record(&mut self, addr: Addr, cpu: usize) -> bool {
        if addr >= self.bound as u64 || cpu >= self.num_cpu {
            return false;
        }
        self.touched[addr as usize * self.num_cpu + cpu] = true;
        true
    }

    pub fn touch_count(&self, addr: Addr) -> usize {
        if addr >= self.bound as u64 {
            return 0;
        }
        let start = addr as usize * self.num_cpu;
        self.touched[start..start + self.num_cpu]
            .iter()
            .filter(|&&touched| touched)
            .count()
    }

    pub fn breadth(&self) -> SharingBreadth {
        let mut breadth = SharingBreadth::default();
        if self.num_cpu == 0 {
            return breadth;
        }
        for cpus in self.touched.chunks(self.num_cpu) {
            match cpus.iter().filter(|&&touched| touched).count() {
                0 => {}
                1 => breadth.one += 1,
                2 => breadth.two += 1,
                _ => breadth.many += 1,
            }
        }
        breadth
    }
}
