//! Pipeline profiling
//!
//! Turns the completion events of a drained pipeline cycle into per-phase
//! durations and throughput.
//!
//! # Example
//!
//! ```ignore
//! instance.write()?;
//! instance.exec()?;
//! instance.read()?;
//! instance.finish()?;
//!
//! let profile = instance.profile()?;
//! println!("load: {:.3} GB/s", profile.load.throughput_gbps());
//! ```

pub mod collector;

pub use collector::{PhaseProfile, PhaseTimestamps, PipelineProfile, ProfilingCollector, NS_TO_SECONDS};
