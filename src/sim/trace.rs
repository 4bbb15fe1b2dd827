use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use log::debug;

use crate::cache::Addr;

/// One line of a memory trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    Read { cpu: usize, addr: Addr },
    Write { cpu: usize, addr: Addr },
    Dump,
}

impl TraceEvent {
    pub fn cpu(&self) -> Option<usize> {
        match self {
            TraceEvent::Read { cpu, .. } | TraceEvent::Write { cpu, .. } => Some(*cpu),
            TraceEvent::Dump => None,
        }
    }
}

fn parse_addr(token: &str) -> Option<Addr> {
    match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

/// Parse `P<cpu> R <addr>`, `P<cpu> W <addr>` or `D`.
/// Anything else (comments, blank or malformed lines) yields `None`.
pub fn parse_line(line: &str) -> Option<TraceEvent> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;
    if head.starts_with('#') {
        return None;
    }
    if head == "D" {
        return Some(TraceEvent::Dump);
    }
    let cpu = head.strip_prefix('P')?.parse().ok()?;
    let op = parts.next()?;
    let addr = parse_addr(parts.next()?)?;
    match op {
        "R" => Some(TraceEvent::Read { cpu, addr }),
        "W" => Some(TraceEvent::Write { cpu, addr }),
        _ => None,
    }
}

pub fn parse_trace<R: BufRead>(reader: R) -> anyhow::Result<Vec<TraceEvent>> {
    let mut events = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read trace line {}", lineno + 1))?;
        match parse_line(&line) {
            Some(event) => events.push(event),
            None if line.trim().is_empty() => {}
            None => debug!("skipping trace line {}: {:?}", lineno + 1, line),
        }
    }
    Ok(events)
}

pub fn read_trace(path: &Path) -> anyhow::Result<Vec<TraceEvent>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open trace file {}", path.display()))?;
    parse_trace(BufReader::new(file))
}
