use serde::Serialize;

use crate::timeq::Cycle;

use super::addr::{Addr, LinePos};
use super::line::{CacheLine, LineState};

/// Protocol steps reported by the engine. Rendering is left to an `EventSink`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SimEvent {
    Read { cpu: usize, addr: Addr },
    Write { cpu: usize, addr: Addr },
    Probe { cpu: usize, pos: LinePos, way: Option<usize> },
    CoherenceMiss { cpu: usize, pos: LinePos, count: u64 },
    Install { cpu: usize, pos: LinePos, way: usize, state: LineState, evicted: CacheLine },
    Upgrade { cpu: usize, pos: LinePos, way: usize },
    /// A remote Modified copy was committed and demoted to Shared for a reader.
    SnoopDemote { cpu: usize, holder: usize, pos: LinePos },
    SnoopInvalidate { cpu: usize, holder: usize, pos: LinePos, was: LineState },
    Bus { cpu: usize },
    MemoryLoad { cpu: usize, pos: LinePos },
    MemoryWrite { cpu: usize, pos: LinePos },
    Buffered { cpu: usize, pos: LinePos },
    BufferOverflow { cpu: usize, evicted: LinePos, stalled_to: Cycle },
    BufferRetire { cpu: usize, entry: LinePos, next_at: Cycle },
    RetirePending { cpu: usize, until: Cycle },
    ReadBypass { cpu: usize, pos: LinePos },
    Prefetch { cpu: usize, addr: Addr, installed: bool },
}

/// Collects events only when someone asked for them.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    enabled: bool,
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            events: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.events.clear();
        }
    }

    pub fn push_with<F>(&mut self, make: F)
    where
        F: FnOnce() -> SimEvent,
    {
        if self.enabled {
            self.events.push(make());
        }
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, SimEvent> {
        self.events.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }
}
