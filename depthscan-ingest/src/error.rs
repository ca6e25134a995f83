//! Error types for frame ingest.

use depthscan_capture::CaptureError;
use thiserror::Error;

/// Errors that can occur while setting up or running a scan.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid dispatch configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
}
