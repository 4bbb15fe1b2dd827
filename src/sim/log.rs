use crate::cache::{Snapshot, SimEvent};

#[derive(PartialEq, PartialOrd, Debug, Default, Clone, Copy)]
pub enum LogLevel {
    #[default]
    NONE,
    INFO,
    DEBUG,
}

impl LogLevel {
    fn to_string(&self) -> &str {
        match self {
            LogLevel::NONE => "NONE",
            LogLevel::INFO => "INFO",
            LogLevel::DEBUG => "DEBUG",
        }
    }
}

pub fn to_loglevel(ulevel: u64) -> LogLevel {
    match ulevel {
        0 => LogLevel::NONE,
        1 => LogLevel::INFO,
        2 => LogLevel::DEBUG,
        _ => LogLevel::DEBUG,
    }
}

/// Observer of a run. The protocol code never prints; it reports here.
pub trait EventSink {
    /// Whether the engine should bother materialising `SimEvent`s.
    fn wants_events(&self) -> bool {
        false
    }

    fn on_event(&mut self, _event: &SimEvent) {}

    fn on_snapshot(&mut self, _snapshot: &Snapshot) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {}

/// Keeps every event and snapshot, for inspection after the run.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SimEvent>,
    pub snapshots: Vec<Snapshot>,
}

impl EventSink for RecordingSink {
    fn wants_events(&self) -> bool {
        true
    }

    fn on_event(&mut self, event: &SimEvent) {
        self.events.push(event.clone());
    }

    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        self.snapshots.push(snapshot.clone());
    }
}

/// Prints to stdout. Dumps are always printed, protocol narration only at DEBUG.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    level: LogLevel,
}

impl ConsoleSink {
    pub fn new(ulevel: u64) -> Self {
        ConsoleSink {
            level: to_loglevel(ulevel),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn log(&self, level: LogLevel, args: std::fmt::Arguments<'_>) {
        if level > self.level {
            return;
        }
        println!("[{}] {}", level.to_string(), args);
    }
}

impl EventSink for ConsoleSink {
    fn wants_events(&self) -> bool {
        self.level >= LogLevel::DEBUG
    }

    fn on_event(&mut self, event: &SimEvent) {
        self.log(LogLevel::DEBUG, format_args!("{}", describe(event)));
    }

    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        print!("{}", render_snapshot(snapshot));
    }
}

pub fn describe(event: &SimEvent) -> String {
    match event {
        SimEvent::Read { cpu, addr } => format!("read from address {addr} on processor {cpu}"),
        SimEvent::Write { cpu, addr } => format!("write to address {addr} on processor {cpu}"),
        SimEvent::Probe { cpu, pos, way } => match way {
            Some(way) => format!(
                "looked for tag {} in set {} on processor {cpu}: hit in block {way}",
                pos.tag, pos.index
            ),
            None => format!(
                "looked for tag {} in set {} on processor {cpu}: miss",
                pos.tag, pos.index
            ),
        },
        SimEvent::CoherenceMiss { cpu, pos, count } => format!(
            "processor {cpu} found {count} invalidated copies of tag {} in set {}",
            pos.tag, pos.index
        ),
        SimEvent::Install {
            cpu,
            pos,
            way,
            state,
            evicted,
        } => {
            let evicted = match evicted.tag {
                Some(tag) => format!("evicting tag {tag} ({})", evicted.state.short()),
                None => "free block".to_string(),
            };
            format!(
                "processor {cpu} installed tag {} in set {} block {way} as {}, {evicted}",
                pos.tag,
                pos.index,
                state.short()
            )
        }
        SimEvent::Upgrade { cpu, pos, way } => format!(
            "processor {cpu} upgraded tag {} in set {} block {way} to M",
            pos.tag, pos.index
        ),
        SimEvent::SnoopDemote { cpu, holder, pos } => format!(
            "snooping for {cpu}: found modified tag {} in processor {holder}'s cache, committing and setting shared",
            pos.tag
        ),
        SimEvent::SnoopInvalidate {
            cpu,
            holder,
            pos,
            was,
        } => format!(
            "snooping for {cpu}: found {} tag {} in processor {holder}'s cache, invalidating",
            was.short(),
            pos.tag
        ),
        SimEvent::Bus { cpu } => format!("processor {cpu}: bus transaction"),
        SimEvent::MemoryLoad { cpu, pos } => format!(
            "processor {cpu}: RAM load of tag {} set {}",
            pos.tag, pos.index
        ),
        SimEvent::MemoryWrite { cpu, pos } => format!(
            "processor {cpu}: RAM write of tag {} set {}",
            pos.tag, pos.index
        ),
        SimEvent::Buffered { cpu, pos } => format!(
            "processor {cpu}: buffered write of tag {} set {}",
            pos.tag, pos.index
        ),
        SimEvent::BufferOverflow {
            cpu,
            evicted,
            stalled_to,
        } => format!(
            "processor {cpu}: write buffer full, flushed tag {} set {} and stalled to {stalled_to}",
            evicted.tag, evicted.index
        ),
        SimEvent::BufferRetire {
            cpu,
            entry,
            next_at,
        } => format!(
            "processor {cpu}: retired tag {} set {} from write buffer, next drain at {next_at}",
            entry.tag, entry.index
        ),
        SimEvent::RetirePending { cpu, until } => {
            format!("processor {cpu}: waiting for write to finish (until {until})")
        }
        SimEvent::ReadBypass { cpu, pos } => format!(
            "processor {cpu}: tag {} set {} hit in write buffer",
            pos.tag, pos.index
        ),
        SimEvent::Prefetch {
            cpu,
            addr,
            installed,
        } => format!(
            "processor {cpu}: prefetching address {addr}: {}",
            if *installed { "success" } else { "already cached" }
        ),
    }
}

pub fn render_snapshot(snapshot: &Snapshot) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "\nDumping cache");
    for cpu in &snapshot.cpus {
        let _ = writeln!(out, "\nProcessor {} (counter {})", cpu.cpu, cpu.counter);
        for (index, set) in cpu.sets.iter().enumerate() {
            let _ = writeln!(out, "Set {index}");
            let _ = writeln!(out, "Flag\tBlock\tTag\tAge");
            let _ = writeln!(out, "------------------------------");
            for (way, line) in set.iter().enumerate() {
                let tag = line
                    .tag
                    .map(|tag| tag.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let _ = writeln!(out, "{}\t{way}\t{tag}\t{}", line.state.short(), line.age);
            }
        }
        if snapshot.write_buffer_enabled {
            let _ = writeln!(out, "Write buffer");
            let _ = writeln!(out, "Tag\tIndex");
            let _ = writeln!(out, "------------");
            for entry in &cpu.write_buffer {
                let _ = writeln!(out, "{}\t{}", entry.tag, entry.index);
            }
        }
    }
    out
}
