use serde::Serialize;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LineState {
    Modified,
    Shared,
    Invalid,
}

impl LineState {
    pub fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    pub fn short(self) -> &'static str {
        match self {
            Self::Modified => "M",
            Self::Shared => "S",
            Self::Invalid => "I",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheLine {
    pub tag: Option<u64>,
    pub state: LineState,
    pub age: u64,
}

impl CacheLine {
    pub const EMPTY: CacheLine = CacheLine {
        tag: None,
        state: LineState::Invalid,
        age: 0,
    };

    /// Never filled since construction.
    pub fn is_free(&self) -> bool {
        self.tag.is_none() && self.state == LineState::Invalid
    }

    pub fn holds(&self, tag: u64, state: LineState) -> bool {
        self.tag == Some(tag) && self.state == state
    }

    pub fn holds_valid(&self, tag: u64) -> bool {
        self.tag == Some(tag) && self.state.is_valid()
    }
}

/// Result of scanning a set for a tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Probe {
    pub way: Option<usize>,
    /// Invalidated copies of the tag seen before the hit (or in the whole set on a miss).
    pub stale: u64,
}

#[derive(Debug, Clone)]
pub struct CacheSet {
    ways: SmallVec<[CacheLine; 4]>,
}

impl CacheSet {
    pub fn new(ways: usize) -> Self {
        Self {
            ways: SmallVec::from_elem(CacheLine::EMPTY, ways.max(1)),
        }
    }

    pub fn ways(&self) -> &[CacheLine] {
        &self.ways
    }

    pub fn len(&self) -> usize {
        self.ways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ways.is_empty()
    }

    pub fn line(&self, way: usize) -> &CacheLine {
        &self.ways[way]
    }

    pub fn find(&self, tag: u64, state: LineState) -> Option<usize> {
        self.ways.iter().position(|line| line.holds(tag, state))
    }

    pub fn find_valid(&self, tag: u64) -> Option<usize> {
        self.ways.iter().position(|line| line.holds_valid(tag))
    }

    pub fn free_way(&self) -> Option<usize> {
        self.ways.iter().position(CacheLine::is_free)
    }

    pub fn probe(&self, tag: u64) -> Probe {
        let mut stale = 0;
        for (way, line) in self.ways.iter().enumerate() {
            if line.tag != Some(tag) {
                continue;
            }
            if line.state.is_valid() {
                return Probe {
                    way: Some(way),
                    stale,
                };
            }
            stale += 1;
        }
        Probe { way: None, stale }
    }

    pub fn ages(&self) -> SmallVec<[u64; 4]> {
        self.ways.iter().map(|line| line.age).collect()
    }

    pub(crate) fn fill(&mut self, way: usize, tag: u64, state: LineState) -> CacheLine {
        std::mem::replace(
            &mut self.ways[way],
            CacheLine {
                tag: Some(tag),
                state,
                age: 0,
            },
        )
    }

    pub(crate) fn set_state(&mut self, way: usize, state: LineState) {
        self.ways[way].state = state;
    }

    // Reset `skip` to age 0 and age everything else in the set.
    pub(crate) fn age_all(&mut self, skip: Option<usize>) {
        for (way, line) in self.ways.iter_mut().enumerate() {
            if Some(way) == skip {
                line.age = 0;
            } else {
                line.age = line.age.saturating_add(1);
            }
        }
    }
}
