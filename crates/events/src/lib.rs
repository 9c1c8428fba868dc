//! Events Orchestrator (C4): the single-subscriber controller channel.
//!
//! State mutation is centralized in one consumer task (spawned by
//! [`Orchestrator::spawn`]); every other task talks to it exclusively
//! through the cheaply-cloned [`Orchestrator`] handle, never by touching
//! shared state directly.

mod commands;
mod envelope;
mod orchestrator;
mod sink;
mod state;

pub use envelope::EventEnvelope;
pub use orchestrator::Orchestrator;
pub use sink::ControllerSink;
pub use state::{SessionEventsState, SlotWaveInfo, SummaryWaveInfo};
