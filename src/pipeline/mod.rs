//! Concurrent alignment pipeline.
//!
//! Implements a producer → worker pool → writer pipeline where each station
//! runs in its own thread, connected by crossbeam channels. The task queue is
//! bounded for backpressure; the result queue is not.

pub mod error;
pub mod orchestrator;
pub mod station;
pub mod worker;
pub mod writer;

pub use error::{ErrorReporter, LogReporter, StationError};
pub use orchestrator::{DrainReport, Pipeline, PipelineHandle, RunSummary};
pub use station::{Station, StationRunner};
pub use worker::AlignmentWorker;
pub use writer::{ResultWriter, WrittenRecord};
