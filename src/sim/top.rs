use log::warn;

use crate::cache::{CacheConfig, CoherenceEngine, ReadOutcome, Snapshot, WriteOutcome};
use crate::sim::log::{EventSink, NullSink};
use crate::sim::perf_log::{self, RunPerfSummary};
use crate::sim::trace::TraceEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Read(ReadOutcome),
    Write(WriteOutcome),
    Dumped,
    /// The event named a CPU that does not exist.
    Skipped,
}

/// All state of one run: the engine plus whoever is watching it.
pub struct Simulator<S: EventSink = NullSink> {
    engine: CoherenceEngine,
    sink: S,
    steps: u64,
    skipped: u64,
}

impl Simulator<NullSink> {
    pub fn new(config: CacheConfig) -> anyhow::Result<Self> {
        Self::with_sink(config, NullSink)
    }
}

impl<S: EventSink> Simulator<S> {
    pub fn with_sink(config: CacheConfig, sink: S) -> anyhow::Result<Self> {
        let mut engine = CoherenceEngine::new(config)?;
        engine.events_mut().set_enabled(sink.wants_events());
        Ok(Self {
            engine,
            sink,
            steps: 0,
            skipped: 0,
        })
    }

    pub fn engine(&self) -> &CoherenceEngine {
        &self.engine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn step(&mut self, event: TraceEvent) -> StepOutcome {
        if let Some(cpu) = event.cpu() {
            if cpu >= self.engine.num_cpu() {
                warn!(
                    "skipping {:?}: processor {} out of range (num_cpu = {})",
                    event,
                    cpu,
                    self.engine.num_cpu()
                );
                self.skipped += 1;
                return StepOutcome::Skipped;
            }
        }

        self.steps += 1;
        let outcome = match event {
            TraceEvent::Read { cpu, addr } => StepOutcome::Read(self.engine.handle_read(addr, cpu)),
            TraceEvent::Write { cpu, addr } => {
                StepOutcome::Write(self.engine.handle_write(addr, cpu))
            }
            TraceEvent::Dump => {
                let snapshot = self.snapshot();
                self.sink.on_snapshot(&snapshot);
                StepOutcome::Dumped
            }
        };
        for event in self.engine.events_mut().drain() {
            self.sink.on_event(&event);
        }
        outcome
    }

    pub fn run<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = TraceEvent>,
    {
        for event in events {
            self.step(event);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.engine.snapshot()
    }

    pub fn summary(&self) -> RunPerfSummary {
        perf_log::summarize(&self.engine)
    }
}
