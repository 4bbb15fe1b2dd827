use serde::Serialize;

pub type Addr = u64;

/// A cache line position: the set it maps to and the tag it is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LinePos {
    pub tag: u64,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub tag: u64,
    pub index: usize,
    pub byte_offset: u64,
}

impl Decoded {
    pub fn pos(&self) -> LinePos {
        LinePos {
            tag: self.tag,
            index: self.index,
        }
    }
}

/// Splits addresses into (tag, set index, byte offset).
///
/// The set count is `cache_size / associativity`, i.e. the cache size is
/// counted in blocks. Geometry is validated by `CacheConfig::validate`, so
/// decoding itself cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDecoder {
    block_size: u64,
    num_sets: u64,
}

impl AddressDecoder {
    pub fn new(block_size: usize, cache_size: usize, associativity: usize) -> Self {
        let block_size = block_size.max(1) as u64;
        let num_sets = (cache_size / associativity.max(1)).max(1) as u64;
        Self {
            block_size,
            num_sets,
        }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn num_sets(&self) -> usize {
        self.num_sets as usize
    }

    pub fn decode(&self, addr: Addr) -> Decoded {
        let block = addr / self.block_size;
        Decoded {
            tag: block / self.num_sets,
            index: (block % self.num_sets) as usize,
            byte_offset: addr % self.block_size,
        }
    }

    pub fn pos(&self, addr: Addr) -> LinePos {
        self.decode(addr).pos()
    }

    /// First address of the block stored at `pos`.
    pub fn base_addr(&self, pos: LinePos) -> Addr {
        (pos.tag * self.num_sets + pos.index as u64) * self.block_size
    }
}
