use super::addr::LinePos;
use super::line::{CacheLine, CacheSet, LineState, Probe};

/// One CPU's private cache: `sets` sets of `ways` lines each.
#[derive(Debug, Clone)]
pub struct CpuCache {
    ways: usize,
    sets: Vec<CacheSet>,
}

impl CpuCache {
    pub fn new(sets: usize, ways: usize) -> Self {
        let sets = sets.max(1);
        let ways = ways.max(1);
        Self {
            ways,
            sets: (0..sets).map(|_| CacheSet::new(ways)).collect(),
        }
    }

    pub fn num_sets(&self) -> usize {
        self.sets.len()
    }

    pub fn ways(&self) -> usize {
        self.ways
    }

    pub fn set(&self, index: usize) -> &CacheSet {
        &self.sets[index]
    }

    pub fn sets(&self) -> &[CacheSet] {
        &self.sets
    }

    pub fn line(&self, index: usize, way: usize) -> &CacheLine {
        self.sets[index].line(way)
    }

    pub fn probe(&self, pos: LinePos) -> Probe {
        self.sets[pos.index].probe(pos.tag)
    }

    pub fn find(&self, pos: LinePos, state: LineState) -> Option<usize> {
        self.sets[pos.index].find(pos.tag, state)
    }

    /// The way holding `pos` in M or S, with its state.
    pub fn lookup(&self, pos: LinePos) -> Option<(usize, LineState)> {
        let set = &self.sets[pos.index];
        set.find_valid(pos.tag).map(|way| (way, set.line(way).state))
    }

    pub fn state_of(&self, pos: LinePos) -> LineState {
        self.lookup(pos)
            .map(|(_, state)| state)
            .unwrap_or(LineState::Invalid)
    }

    pub fn free_way(&self, index: usize) -> Option<usize> {
        self.sets[index].free_way()
    }

    /// Overwrite `way` with `pos` in `state` and return the line it replaced.
    pub fn fill(&mut self, pos: LinePos, way: usize, state: LineState) -> CacheLine {
        let evicted = self.sets[pos.index].fill(way, pos.tag, state);
        self.touch(pos.index, way);
        evicted
    }

    pub fn set_state(&mut self, index: usize, way: usize, state: LineState) {
        self.sets[index].set_state(way, state);
    }

    /// Mark `(index, way)` most recently used. Every other line of the cache ages by one.
    pub fn touch(&mut self, index: usize, way: usize) {
        for (set_idx, set) in self.sets.iter_mut().enumerate() {
            let skip = (set_idx == index).then_some(way);
            set.age_all(skip);
        }
    }

    pub fn lines(&self) -> Vec<Vec<CacheLine>> {
        self.sets.iter().map(|set| set.ways().to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::CpuCache;
    use crate::cache::addr::LinePos;
    use crate::cache::line::LineState;

    fn pos(tag: u64, index: usize) -> LinePos {
        LinePos { tag, index }
    }

    #[test]
    fn probe_misses_on_empty_cache() {
        let cache = CpuCache::new(4, 2);
        let probe = cache.probe(pos(3, 1));
        assert_eq!(probe.way, None);
        assert_eq!(probe.stale, 0);
    }

    #[test]
    fn fill_then_lookup_returns_state() {
        let mut cache = CpuCache::new(4, 2);
        cache.fill(pos(7, 2), 0, LineState::Modified);
        assert_eq!(cache.lookup(pos(7, 2)), Some((0, LineState::Modified)));
        assert_eq!(cache.state_of(pos(7, 1)), LineState::Invalid);
    }

    #[test]
    fn invalidated_copy_counts_as_stale() {
        let mut cache = CpuCache::new(1, 2);
        cache.fill(pos(5, 0), 0, LineState::Shared);
        cache.set_state(0, 0, LineState::Invalid);
        let probe = cache.probe(pos(5, 0));
        assert_eq!(probe.way, None);
        assert_eq!(probe.stale, 1);
        // an invalidated line is not free
        assert_eq!(cache.free_way(0), Some(1));
    }

    #[test]
    fn touch_ages_whole_cache() {
        let mut cache = CpuCache::new(2, 2);
        cache.fill(pos(1, 0), 0, LineState::Shared);
        cache.fill(pos(2, 1), 0, LineState::Shared);
        assert_eq!(cache.line(0, 0).age, 1);
        assert_eq!(cache.line(1, 0).age, 0);
        assert_eq!(cache.line(1, 1).age, 2);
        cache.touch(0, 0);
        assert_eq!(cache.line(0, 0).age, 0);
        assert_eq!(cache.line(1, 0).age, 1);
    }

    #[test]
    fn fill_reports_evicted_line() {
        let mut cache = CpuCache::new(1, 1);
        cache.fill(pos(1, 0), 0, LineState::Modified);
        let evicted = cache.fill(pos(2, 0), 0, LineState::Shared);
        assert_eq!(evicted.tag, Some(1));
        assert_eq!(evicted.state, LineState::Modified);
        assert_eq!(cache.lookup(pos(1, 0)), None);
    }
}
