//! Device activity telemetry.
//!
//! Read-only side layer: nothing in the publish path ever decides anything
//! based on it. Entries carry counts and ids only, never payload contents.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{SessionSummary, TelemetryEvent};
pub use metrics::TelemetrySnapshot;
pub use recorder::{TelemetryHandle, TelemetryRecorder};
