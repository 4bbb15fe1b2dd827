pub mod config;
pub mod log;
pub mod perf_log;
pub mod top;
pub mod trace;

pub use config::{Config, RunConfig, SimConfig};
pub use top::{Simulator, StepOutcome};
pub use trace::{parse_line, read_trace, TraceEvent};
