//! Per-phase timing from completed events

use std::fmt;

use serde::Serialize;

use crate::backend::{AcceleratorApi, DeviceResult, ProfilingInfo};
use crate::session::{BufferManager, ExecutionPipeline};

/// Device time unit to seconds
pub const NS_TO_SECONDS: f64 = 1e-9;

/// Profiling counters of one phase, in device nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PhaseTimestamps {
    pub queued: u64,
    pub submitted: u64,
    pub start: u64,
    pub end: u64,
}

impl PhaseTimestamps {
    /// Query all four counters of `event`
    pub fn query<A: AcceleratorApi>(api: &A, event: &A::Event) -> DeviceResult<Self> {
        Ok(PhaseTimestamps {
            queued: api.event_profiling(event, ProfilingInfo::Queued)?,
            submitted: api.event_profiling(event, ProfilingInfo::Submitted)?,
            start: api.event_profiling(event, ProfilingInfo::Start)?,
            end: api.event_profiling(event, ProfilingInfo::End)?,
        })
    }

    /// Earliest queue / start and latest end over several events
    pub fn span(events: &[PhaseTimestamps]) -> Self {
        let Some(first) = events.first() else {
            return PhaseTimestamps::default();
        };
        events.iter().skip(1).fold(*first, |acc, t| PhaseTimestamps {
            queued: acc.queued.min(t.queued),
            submitted: acc.submitted.min(t.submitted),
            start: acc.start.min(t.start),
            end: acc.end.max(t.end),
        })
    }

    pub fn duration_ns(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Timing of one pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PhaseProfile {
    /// `false` when the phase issued no work
    pub issued: bool,
    pub timestamps: PhaseTimestamps,
    /// Bytes moved by the phase (zero for compute)
    pub bytes: u64,
}

impl PhaseProfile {
    pub fn duration_ns(&self) -> u64 {
        self.timestamps.duration_ns()
    }

    pub fn seconds(&self) -> f64 {
        self.duration_ns() as f64 * NS_TO_SECONDS
    }

    /// Zero when the phase took no time
    pub fn throughput_bytes_per_sec(&self) -> f64 {
        let seconds = self.seconds();
        if seconds > 0.0 {
            self.bytes as f64 / seconds
        } else {
            0.0
        }
    }

    /// Bytes per nanosecond
    pub fn throughput_gbps(&self) -> f64 {
        let ns = self.duration_ns();
        if ns > 0 {
            self.bytes as f64 / ns as f64
        } else {
            0.0
        }
    }
}

/// Timing of a full load / compute / store cycle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PipelineProfile {
    pub load: PhaseProfile,
    pub compute: PhaseProfile,
    pub store: PhaseProfile,
}

impl PipelineProfile {
    /// From the earliest issued start to the latest issued end
    pub fn total_ns(&self) -> u64 {
        let issued: Vec<&PhaseProfile> = [&self.load, &self.compute, &self.store]
            .into_iter()
            .filter(|p| p.issued)
            .collect();
        let start = issued.iter().map(|p| p.timestamps.start).min();
        let end = issued.iter().map(|p| p.timestamps.end).max();
        match (start, end) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }
}

impl fmt::Display for PipelineProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, phase) in [("load", &self.load), ("compute", &self.compute), ("store", &self.store)] {
            writeln!(
                f,
                "{:<8} {:>12.6} s {:>10.3} GB/s ({} bytes)",
                name,
                phase.seconds(),
                phase.throughput_gbps(),
                phase.bytes
            )?;
        }
        Ok(())
    }
}

/// Reads phase timings out of a drained pipeline
pub struct ProfilingCollector;

impl ProfilingCollector {
    /// Profile of the load phase; zeros when no load was issued
    pub fn load<A: AcceleratorApi>(
        api: &A,
        pipeline: &ExecutionPipeline<A>,
        buffers: &BufferManager<A>,
    ) -> DeviceResult<PhaseProfile> {
        Self::phase(api, pipeline.load_event(), buffers.load_bytes())
    }

    /// Profile of the compute phase, spanning every launched kernel
    pub fn compute<A: AcceleratorApi>(api: &A, pipeline: &ExecutionPipeline<A>) -> DeviceResult<PhaseProfile> {
        let events = pipeline.compute_events();
        if events.is_empty() {
            return Ok(PhaseProfile::default());
        }
        let timestamps = events
            .iter()
            .map(|e| PhaseTimestamps::query(api, e))
            .collect::<DeviceResult<Vec<_>>>()?;
        Ok(PhaseProfile {
            issued: true,
            timestamps: PhaseTimestamps::span(&timestamps),
            bytes: 0,
        })
    }

    /// Profile of the store phase; zeros when no store was issued
    pub fn store<A: AcceleratorApi>(
        api: &A,
        pipeline: &ExecutionPipeline<A>,
        buffers: &BufferManager<A>,
    ) -> DeviceResult<PhaseProfile> {
        Self::phase(api, pipeline.store_event(), buffers.store_bytes())
    }

    /// All three phases; call after `finish`
    pub fn collect<A: AcceleratorApi>(
        api: &A,
        pipeline: &ExecutionPipeline<A>,
        buffers: &BufferManager<A>,
    ) -> DeviceResult<PipelineProfile> {
        let profile = PipelineProfile {
            load: Self::load(api, pipeline, buffers)?,
            compute: Self::compute(api, pipeline)?,
            store: Self::store(api, pipeline, buffers)?,
        };
        tracing::debug!(
            "Cycle {}: load {} ns, compute {} ns, store {} ns",
            pipeline.cycle(),
            profile.load.duration_ns(),
            profile.compute.duration_ns(),
            profile.store.duration_ns()
        );
        Ok(profile)
    }

    fn phase<A: AcceleratorApi>(api: &A, event: Option<&A::Event>, bytes: u64) -> DeviceResult<PhaseProfile> {
        match event {
            Some(event) => Ok(PhaseProfile {
                issued: true,
                timestamps: PhaseTimestamps::query(api, event)?,
                bytes,
            }),
            None => Ok(PhaseProfile::default()),
        }
    }
}
