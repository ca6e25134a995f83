//! Driver-facing traits and capture errors.
//!
//! A hardware backend implements [`SensorDriver`]. Once a reader is open the
//! driver calls the registered [`NotificationHandler`] once per synchronized
//! sample, passing a [`SampleNotification`] that is only valid for the
//! duration of the call.

use std::sync::Arc;

use thiserror::Error;

use crate::frame::{ColorBuffer, DepthBuffer, FrameSources};

/// Errors that can occur while talking to a sensor.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Device busy: {0} is already claimed in this process")]
    DeviceBusy(String),

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Failed to close device: {0}")]
    CloseFailed(String),

    #[error("Failed to open frame reader: {0}")]
    ReaderFailed(String),

    #[error("Sensor already has a subscriber")]
    AlreadySubscribed,

    #[error("Failed to acquire frame: {0}")]
    AcquisitionFailed(String),

    #[error("Invalid frame data: {0}")]
    InvalidData(String),

    #[error("Invalid sensor configuration: {0}")]
    InvalidConfig(String),
}

/// Callback invoked by a driver for every incoming sample.
///
/// Shared via `Arc` so a driver can hand it to its delivery thread.
pub type NotificationHandler = Arc<dyn Fn(&dyn SampleNotification) + Send + Sync>;

/// A "sample arrived" notification from the driver.
pub trait SampleNotification {
    /// Acquire the multi-source sample this notification refers to.
    ///
    /// Returns `Ok(None)` when the sample is no longer available (the driver
    /// has already recycled it).
    fn acquire_sample(&self) -> Result<Option<Box<dyn MultiSourceSample + '_>>, CaptureError>;
}

/// One synchronized capture with paired depth and color sources.
pub trait MultiSourceSample {
    /// Copy out the depth data, or `None` if the depth source missed this sample.
    fn depth_frame(&self) -> Result<Option<DepthBuffer>, CaptureError>;

    /// Copy out the color data, or `None` if the color source missed this sample.
    fn color_frame(&self) -> Result<Option<ColorBuffer>, CaptureError>;
}

/// Low-level access to one physical sensor.
///
/// Implementations are driven exclusively through [`crate::Sensor`], which
/// serializes calls and enforces one handle per device.
pub trait SensorDriver: Send {
    /// Stable identifier of the physical device.
    fn device_id(&self) -> &str;

    /// Whether the device is currently open and streaming.
    fn is_available(&self) -> bool;

    /// Open the device.
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Close the device.
    fn close(&mut self) -> Result<(), CaptureError>;

    /// Open a multi-source reader for `sources` and register `handler` on it.
    fn open_reader(
        &mut self,
        sources: FrameSources,
        handler: NotificationHandler,
    ) -> Result<(), CaptureError>;
}
