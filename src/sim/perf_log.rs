use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::Context;
use log::info;
use serde::Serialize;

use crate::cache::stats::percent;
use crate::cache::{AccessStats, CoherenceEngine, CpuStats, SharingBreadth};
use crate::timeq::Cycle;

#[derive(Debug, Clone, Serialize)]
pub struct CpuPerfSummary {
    pub cpu: usize,
    pub counter: Cycle,
    pub stats: CpuStats,
    pub load_hit_pct: Option<f64>,
    pub store_hit_pct: Option<f64>,
    pub hit_pct: Option<f64>,
    pub coherence_miss_pct: Option<f64>,
}

impl CpuPerfSummary {
    pub fn new(cpu: usize, counter: Cycle, stats: CpuStats) -> Self {
        Self {
            cpu,
            counter,
            load_hit_pct: stats.read_hit_rate(),
            store_hit_pct: stats.write_hit_rate(),
            hit_pct: stats.hit_rate(),
            coherence_miss_pct: stats.coherence_miss_rate(),
            stats,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatePerfSummary {
    pub num_cpu: usize,
    pub max_counter: Cycle,
    pub stats: CpuStats,
    pub hit_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessSummary {
    pub counts: AccessStats,
    pub private_pct: Option<f64>,
    pub shared_read_only_pct: Option<f64>,
    pub shared_read_write_pct: Option<f64>,
}

impl From<AccessStats> for AccessSummary {
    fn from(counts: AccessStats) -> Self {
        let total = counts.total();
        Self {
            private_pct: percent(counts.private(), total),
            shared_read_only_pct: percent(counts.shared_read_only(), total),
            shared_read_write_pct: percent(counts.shared_read_write(), total),
            counts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SharingSummary {
    pub address_bound: usize,
    pub counts: SharingBreadth,
    pub one_cpu_pct: Option<f64>,
    pub two_cpu_pct: Option<f64>,
    pub many_cpu_pct: Option<f64>,
}

impl SharingSummary {
    pub fn new(address_bound: usize, counts: SharingBreadth) -> Self {
        let total = counts.total();
        Self {
            address_bound,
            one_cpu_pct: percent(counts.one, total),
            two_cpu_pct: percent(counts.two, total),
            many_cpu_pct: percent(counts.many, total),
            counts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPerfSummary {
    pub per_cpu: Vec<CpuPerfSummary>,
    pub total: AggregatePerfSummary,
    pub access: AccessSummary,
    pub sharing: SharingSummary,
}

pub fn aggregate_summaries(per_cpu: &[CpuPerfSummary]) -> AggregatePerfSummary {
    let mut total = AggregatePerfSummary {
        num_cpu: per_cpu.len(),
        ..AggregatePerfSummary::default()
    };
    for cpu in per_cpu {
        total.stats += &cpu.stats;
        total.max_counter = total.max_counter.max(cpu.counter);
    }
    total.hit_pct = total.stats.hit_rate();
    total
}

pub fn summarize(engine: &CoherenceEngine) -> RunPerfSummary {
    let per_cpu: Vec<_> = (0..engine.num_cpu())
        .map(|cpu| CpuPerfSummary::new(cpu, engine.counter(cpu), *engine.stats(cpu)))
        .collect();
    RunPerfSummary {
        total: aggregate_summaries(&per_cpu),
        access: AccessSummary::from(*engine.access_stats()),
        sharing: SharingSummary::new(engine.sharing().bound(), engine.sharing().breadth()),
        per_cpu,
    }
}

fn pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.6}%"),
        None => "n/a".to_string(),
    }
}

pub fn render_report(summary: &RunPerfSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Finished. Displaying statistics\n");
    for cpu in &summary.per_cpu {
        let _ = writeln!(out, "Proc {}\n", cpu.cpu);
        // Rates with no matching accesses are left out.
        let rates = [
            ("Load", cpu.load_hit_pct),
            ("Store", cpu.store_hit_pct),
            ("Hit rate", cpu.hit_pct),
            ("Percentage of coherence misses", cpu.coherence_miss_pct),
        ];
        for (label, value) in rates {
            if value.is_some() {
                let _ = writeln!(out, "{label}: {}", pct(value));
            }
        }
        let _ = writeln!(out, "Instruction counter: {}", cpu.counter);
        let _ = writeln!(out, "RAM accesses: {}", cpu.stats.ram_accesses());
        let _ = writeln!(out, "Number of invalidations: {}", cpu.stats.invalidations());
        let _ = writeln!(out);
    }

    let access = &summary.access;
    let _ = writeln!(out, "Private cache-line hits: {}", pct(access.private_pct));
    let _ = writeln!(
        out,
        "Shared read-only cache-line hits: {}",
        pct(access.shared_read_only_pct)
    );
    let _ = writeln!(
        out,
        "Shared read-write cache-line hits: {}",
        pct(access.shared_read_write_pct)
    );

    let sharing = &summary.sharing;
    let _ = writeln!(out, "1 processor access: {}", pct(sharing.one_cpu_pct));
    let _ = writeln!(out, "2 processors access: {}", pct(sharing.two_cpu_pct));
    let _ = writeln!(out, ">2 processors access: {}", pct(sharing.many_cpu_pct));
    out
}

pub fn write_summary(path: &Path, summary: &RunPerfSummary) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(summary).context("cannot serialize summary")?;
    fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote run summary to {}", path.display());
    Ok(())
}
