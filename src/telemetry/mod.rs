//! Telemetry for the leaky-bucket engine.
//!
//! The engine emits a [`BucketEvent`] at each decision point: admissions,
//! rejections, non-zero leaks, lost write races and failed writes. Events flow
//! through [`TelemetrySink`] implementations which can log or buffer them.
//!
//! # Telemetry Sinks
//!
//! The `TelemetrySink` trait is a `tower::Service<BucketEvent>` so sinks compose
//! with the usual tower combinators. Emission is best-effort: a sink that is not
//! ready or that errors simply loses the event.

pub mod events;
pub mod sinks;

pub use events::BucketEvent;
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
