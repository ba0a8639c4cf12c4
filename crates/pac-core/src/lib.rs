//! Domain model and state reconciliation for the phased-array console.

pub mod event;
pub mod model;
pub mod reconcile;
pub mod store;
mod wire;

pub use event::{EventError, StreamEvent};
pub use model::{
    ArrayElement, ElementId, ElementStatus, GridPos, Job, JobId, JobStatus, JobSubmission,
    ModelError, Snapshot, AMPLITUDE_MAX, AMPLITUDE_MIN,
};
pub use reconcile::ApplyOutcome;
pub use store::{clamp_amplitude, InvariantViolation, StateStore, StatusCounts};
