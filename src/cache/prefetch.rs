use super::addr::Addr;

/// Fixed-stride prefetcher: after every access, fetch `addr + offset`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Prefetcher {
    offset: u64,
}

impl Prefetcher {
    pub fn new(offset: u64) -> Self {
        Self { offset }
    }

    pub fn is_enabled(&self) -> bool {
        self.offset > 0
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn target(&self, addr: Addr) -> Option<Addr> {
        if !self.is_enabled() {
            return None;
        }
        addr.checked_add(self.offset)
    }
}
