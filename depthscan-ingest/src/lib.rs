//! Depthscan Ingest Crate
//!
//! Turns the notification stream of a [`depthscan_capture::Sensor`] into a
//! bounded sequence of user callbacks:
//!
//! - [`dispatch`]: the `FrameDispatcher`, its configuration and outcomes
//! - [`pool`]: bounded worker pool running the callbacks
//! - [`completion`]: one-shot "quota reached" signal
//! - [`session`]: start / wait / stop orchestration for one scan

pub mod completion;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod session;

pub use completion::Completion;
pub use dispatch::{DispatchConfig, DispatchOutcome, DispatchStats, DropReason, FrameDispatcher};
pub use error::IngestError;
pub use pool::WorkerPool;
pub use session::{ScanReport, ScanSession};
