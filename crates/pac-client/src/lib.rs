//! Scheduler boundary: REST snapshot reads, job submission and the monitor
//! stream.

pub mod error;
pub mod snapshot;
pub mod stream;

pub use error::ClientError;
pub use snapshot::{
    ClientConfig, Fetched, ResourceHealth, SnapshotClient, SnapshotHealth, SnapshotRead,
};
pub use stream::{
    ConnectionManager, ConnectionStatus, StreamConfig, StreamSignal, SIGNAL_QUEUE_CAPACITY,
};
