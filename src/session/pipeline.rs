//! Load / compute / store pipeline
//!
//! Every phase is enqueued asynchronously on the session's out-of-order
//! queue; ordering comes only from event dependencies:
//!
//! ```text
//! write_to_device:  migrate(load set)             -> load event
//! exec:             task(kernel) after load       -> compute event(s)
//! read_from_device: migrate(store set) after exec -> store event
//! finish:           flush + block until drained
//! ```
//!
//! A phase with an empty buffer set issues no command and leaves no event,
//! so phases depending on it start unconstrained.

use std::fmt;

use thiserror::Error;

use crate::backend::{AcceleratorApi, DeviceError, MigrationDirection};

use super::buffers::BufferManager;
use super::DeviceSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Loaded,
    Computed,
    Stored,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Loaded => "loaded",
            PipelineState::Computed => "computed",
            PipelineState::Stored => "stored",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{operation} called out of order (pipeline is {state})")]
    OutOfOrder {
        operation: &'static str,
        state: PipelineState,
    },
    #[error("{operation} while commands are in flight; call finish first")]
    InFlight { operation: &'static str },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Events of the current pipeline cycle
pub struct ExecutionPipeline<A: AcceleratorApi> {
    state: PipelineState,
    cycle: u64,
    // Commands enqueued since the last finish
    in_flight: bool,
    load_event: Option<A::Event>,
    compute_events: Vec<A::Event>,
    store_event: Option<A::Event>,
}

impl<A: AcceleratorApi> Default for ExecutionPipeline<A> {
    fn default() -> Self {
        ExecutionPipeline {
            state: PipelineState::Idle,
            cycle: 0,
            in_flight: false,
            load_event: None,
            compute_events: Vec::new(),
            store_event: None,
        }
    }
}

impl<A: AcceleratorApi> ExecutionPipeline<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Whether commands were enqueued since the last `finish`
    ///
    /// While busy the device may still read or write the host mirrors.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Fail with `InFlight` while commands are pending
    pub fn ensure_drained(&self, operation: &'static str) -> PipelineResult<()> {
        if self.in_flight {
            return Err(PipelineError::InFlight { operation });
        }
        Ok(())
    }

    /// Number of cycles started so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn load_event(&self) -> Option<&A::Event> {
        self.load_event.as_ref()
    }

    /// One event per launched kernel
    pub fn compute_events(&self) -> &[A::Event] {
        &self.compute_events
    }

    pub fn store_event(&self) -> Option<&A::Event> {
        self.store_event.as_ref()
    }

    fn begin_cycle(&mut self) {
        self.cycle += 1;
        self.load_event = None;
        self.compute_events.clear();
        self.store_event = None;
        tracing::trace!("Pipeline cycle {}", self.cycle);
    }

    /// Migrate the load set to the device
    pub fn write_to_device(
        &mut self,
        session: &DeviceSession<A>,
        buffers: &BufferManager<A>,
    ) -> PipelineResult<()> {
        self.begin_cycle();

        let load = buffers.load_buffers();
        if !load.is_empty() {
            let event = session.api().enqueue_migrate(
                session.queue(),
                &load,
                MigrationDirection::HostToDevice,
                &[],
            )?;
            tracing::debug!("Load: {} buffer(s), {} bytes", load.len(), buffers.load_bytes());
            self.load_event = Some(event);
            self.in_flight = true;
        }

        self.state = PipelineState::Loaded;
        Ok(())
    }

    /// Launch every kernel once, after the load phase
    ///
    /// Called without a preceding load in this cycle, it starts a new cycle
    /// with nothing to wait on.
    pub fn exec(&mut self, session: &DeviceSession<A>) -> PipelineResult<()> {
        if matches!(self.state, PipelineState::Idle | PipelineState::Stored) {
            self.begin_cycle();
        }

        let wait_for: Vec<A::Event> = self.load_event.iter().cloned().collect();
        let mut events = Vec::with_capacity(session.kernels().len());
        for (kernel, name) in session.kernels().iter().zip(session.kernel_names()) {
            let event = session.api().enqueue_task(session.queue(), kernel, &wait_for)?;
            tracing::debug!("Compute: kernel {} enqueued", name);
            events.push(event);
            self.in_flight = true;
        }
        self.compute_events = events;
        self.store_event = None;

        self.state = PipelineState::Computed;
        Ok(())
    }

    /// Migrate the store set back to the host, after compute
    pub fn read_from_device(
        &mut self,
        session: &DeviceSession<A>,
        buffers: &BufferManager<A>,
    ) -> PipelineResult<()> {
        if self.state != PipelineState::Computed {
            return Err(PipelineError::OutOfOrder {
                operation: "read_from_device",
                state: self.state,
            });
        }

        let store = buffers.store_buffers();
        self.store_event = if store.is_empty() {
            None
        } else {
            let event = session.api().enqueue_migrate(
                session.queue(),
                &store,
                MigrationDirection::DeviceToHost,
                &self.compute_events,
            )?;
            tracing::debug!("Store: {} buffer(s), {} bytes", store.len(), buffers.store_bytes());
            self.in_flight = true;
            Some(event)
        };

        self.state = PipelineState::Stored;
        Ok(())
    }

    /// Flush the queue and block until all enqueued work completes
    pub fn finish(&mut self, session: &DeviceSession<A>) -> PipelineResult<()> {
        session.api().flush(session.queue())?;
        session.api().finish(session.queue())?;
        self.in_flight = false;
        if self.state == PipelineState::Stored {
            self.state = PipelineState::Idle;
        }
        tracing::debug!("Pipeline cycle {} drained", self.cycle);
        Ok(())
    }
}

impl<A: AcceleratorApi> fmt::Debug for ExecutionPipeline<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPipeline")
            .field("state", &self.state)
            .field("cycle", &self.cycle)
            .field("in_flight", &self.in_flight)
            .field("load", &self.load_event.is_some())
            .field("compute", &self.compute_events.len())
            .field("store", &self.store_event.is_some())
            .finish()
    }
}
