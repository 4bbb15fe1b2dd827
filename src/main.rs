use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;
use msisim::cache::ReplacementPolicy;
use msisim::sim::log::ConsoleSink;
use msisim::sim::perf_log::{render_report, write_summary};
use msisim::sim::{read_trace, RunConfig, Simulator};

#[derive(Parser)]
#[command(version, about = "Trace-driven MSI snooping cache coherence simulator")]
struct MsisimArgs {
    #[arg(help = "Path to the memory trace (overrides [sim].trace)")]
    trace: Option<PathBuf>,
    #[arg(long, help = "Path to config.toml")]
    config: Option<PathBuf>,
    #[arg(long, help = "Override number of processors")]
    num_cpu: Option<usize>,
    #[arg(long, help = "Override cache size in blocks")]
    cache_size: Option<usize>,
    #[arg(long, help = "Override block size in bytes")]
    block_size: Option<usize>,
    #[arg(long, help = "Override associativity")]
    associativity: Option<usize>,
    #[arg(long, help = "Use write-back instead of write-through")]
    write_back: Option<bool>,
    #[arg(long, help = "Allocate a line on write miss")]
    write_allocate: Option<bool>,
    #[arg(long, help = "Write buffer entries per processor (0 disables)")]
    buffer_limit: Option<usize>,
    #[arg(long, help = "Retire from the write buffer above this many entries")]
    retire_threshold: Option<usize>,
    #[arg(long, help = "Stride prefetch offset in bytes (0 disables)")]
    prefetch_offset: Option<u64>,
    #[arg(long, help = "Replacement policy: lru, mru or random")]
    replacement: Option<ReplacementPolicy>,
    #[arg(long, help = "Seed for random replacement")]
    seed: Option<u64>,
    #[arg(long, help = "Enable log at level (0:none, 1:info, 2:debug)")]
    log: Option<u64>,
    #[arg(long, help = "Write the run summary as JSON to this path")]
    stats_json: Option<PathBuf>,
}

pub fn main() -> anyhow::Result<()> {
    env_logger::init();

    let argv = MsisimArgs::parse();
    let mut config = match &argv.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    // override toml configs with argv
    let sim_config = &mut config.sim;
    sim_config.trace = argv.trace.unwrap_or(sim_config.trace.clone());
    sim_config.log_level = argv.log.unwrap_or(sim_config.log_level);
    sim_config.stats_json = argv.stats_json.or(sim_config.stats_json.take());

    let cache_config = &mut config.cache;
    cache_config.num_cpu = argv.num_cpu.unwrap_or(cache_config.num_cpu);
    cache_config.cache_size = argv.cache_size.unwrap_or(cache_config.cache_size);
    cache_config.block_size = argv.block_size.unwrap_or(cache_config.block_size);
    cache_config.associativity = argv.associativity.unwrap_or(cache_config.associativity);
    cache_config.write_back = argv.write_back.unwrap_or(cache_config.write_back);
    cache_config.write_allocate = argv.write_allocate.unwrap_or(cache_config.write_allocate);
    cache_config.buffer_limit = argv.buffer_limit.unwrap_or(cache_config.buffer_limit);
    cache_config.retire_threshold = argv.retire_threshold.unwrap_or(cache_config.retire_threshold);
    cache_config.prefetch_offset = argv.prefetch_offset.unwrap_or(cache_config.prefetch_offset);
    cache_config.replacement = argv.replacement.unwrap_or(cache_config.replacement);
    cache_config.seed = argv.seed.unwrap_or(cache_config.seed);

    let mut sim = Simulator::with_sink(config.cache, ConsoleSink::new(config.sim.log_level))
        .context("invalid cache configuration")?;

    info!("opening trace {}", config.sim.trace.display());
    let events = read_trace(&config.sim.trace)?;
    sim.run(events);
    info!("replayed {} events, skipped {}", sim.steps(), sim.skipped());

    let summary = sim.summary();
    print!("{}", render_report(&summary));
    if let Some(path) = &config.sim.stats_json {
        write_summary(path, &summary)?;
    }
    Ok(())
}
