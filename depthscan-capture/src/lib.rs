//! Depthscan Capture - Sensor lifecycle and frame acquisition
//!
//! This crate owns the boundary between depthscan and a depth + color
//! scanning sensor:
//!
//! - [`driver`]: traits a hardware driver implements (`SensorDriver`,
//!   `SampleNotification`, `MultiSourceSample`)
//! - [`frame`]: acquired frame data (`DepthBuffer`, `ColorBuffer`, `Frame`)
//! - [`sensor`]: the `Sensor` lifecycle handle (start, stop, subscribe)
//! - [`synthetic`]: a software sensor used for tests and demos
//!
//! ## Example
//!
//! ```ignore
//! use depthscan_capture::{Sensor, SyntheticConfig, SyntheticDriver};
//!
//! let sensor = Sensor::claim(SyntheticDriver::new(SyntheticConfig::default()))?;
//! sensor.subscribe(|notification| {
//!     // Acquire the sample and hand it off...
//! })?;
//! sensor.start()?;
//! ```

pub mod driver;
pub mod frame;
pub mod sensor;
pub mod synthetic;

pub use driver::{
    CaptureError, MultiSourceSample, NotificationHandler, SampleNotification, SensorDriver,
};
pub use frame::{ColorBuffer, DepthBuffer, Frame, FramePayload, FrameSources};
pub use sensor::{Sensor, SensorState};
pub use synthetic::{SampleKind, SyntheticConfig, SyntheticDriver, SyntheticNotification};
