//! Synthetic sensor driver.
//!
//! Produces depth + color samples on a background thread at a fixed rate.
//! Depth shows a sphere in front of a flat wall; color is a gradient that
//! shifts with the sample sequence. Defective samples can be injected at
//! regular intervals to exercise the drop paths of a consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::driver::{
    CaptureError, MultiSourceSample, NotificationHandler, SampleNotification, SensorDriver,
};
use crate::frame::{ColorBuffer, DepthBuffer, FrameSources};

const WALL_DEPTH_MM: u16 = 2000;
const SPHERE_DEPTH_MM: f32 = 1200.0;

/// Configuration for [`SyntheticDriver`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Device id used for the process-wide claim.
    pub device_id: String,
    /// Depth resolution (width, height).
    pub depth_resolution: (u32, u32),
    /// Color resolution (width, height).
    pub color_resolution: (u32, u32),
    /// Samples per second. `0` delivers as fast as the consumer accepts them.
    pub frame_rate: f32,
    /// Every n-th sample has no frame reference.
    pub missing_reference_every: Option<u64>,
    /// Every n-th sample is missing its depth source.
    pub missing_depth_every: Option<u64>,
    /// Every n-th sample reports a driver error on acquisition.
    pub fault_every: Option<u64>,
    /// Stop producing after this many samples.
    pub max_samples: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            device_id: "synthetic:0".to_string(),
            depth_resolution: (512, 424),
            color_resolution: (640, 360),
            frame_rate: 30.0,
            missing_reference_every: None,
            missing_depth_every: None,
            fault_every: None,
            max_samples: None,
        }
    }
}

impl SyntheticConfig {
    /// Set the device id.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    /// Set the sample rate.
    pub fn with_frame_rate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Use the same small resolution for both sources.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.depth_resolution = (width, height);
        self.color_resolution = (width, height);
        self
    }

    /// Limit the number of produced samples.
    pub fn with_max_samples(mut self, max_samples: u64) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    /// Classify sample `sequence` (1-based) according to the failure pattern.
    pub fn kind_of(&self, sequence: u64) -> SampleKind {
        let hits = |every: Option<u64>| every.is_some_and(|n| n > 0 && sequence % n == 0);
        if hits(self.fault_every) {
            SampleKind::Fault
        } else if hits(self.missing_reference_every) {
            SampleKind::MissingReference
        } else if hits(self.missing_depth_every) {
            SampleKind::MissingDepth
        } else {
            SampleKind::Complete
        }
    }

    /// Check that the frame rate maps to a representable sample interval.
    pub fn validate(&self) -> Result<(), CaptureError> {
        self.interval().map(|_| ())
    }

    /// Pause between two samples, `None` when delivering as fast as possible.
    pub fn interval(&self) -> Result<Option<Duration>, CaptureError> {
        if !self.frame_rate.is_finite() || self.frame_rate < 0.0 {
            return Err(CaptureError::InvalidConfig(format!(
                "frame rate must be zero or positive, got {}",
                self.frame_rate
            )));
        }
        if self.frame_rate == 0.0 {
            return Ok(None);
        }
        Duration::try_from_secs_f32(1.0 / self.frame_rate)
            .map(Some)
            .map_err(|e| {
                CaptureError::InvalidConfig(format!(
                    "frame rate {} gives no usable interval: {}",
                    self.frame_rate, e
                ))
            })
    }
}

/// What a synthetic notification yields when acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Both sources present.
    Complete,
    /// The sample was recycled before it could be acquired.
    MissingReference,
    /// Depth source missed the sample.
    MissingDepth,
    /// Color source missed the sample.
    MissingColor,
    /// The driver reports an error.
    Fault,
}

/// A scripted notification, also usable on its own to drive consumers in tests.
#[derive(Debug, Clone)]
pub struct SyntheticNotification {
    sequence: u64,
    kind: SampleKind,
    depth_resolution: (u32, u32),
    color_resolution: (u32, u32),
}

impl SyntheticNotification {
    /// Small 8x6 notification of the given kind.
    pub fn new(sequence: u64, kind: SampleKind) -> Self {
        Self {
            sequence,
            kind,
            depth_resolution: (8, 6),
            color_resolution: (8, 6),
        }
    }

    pub fn complete(sequence: u64) -> Self {
        Self::new(sequence, SampleKind::Complete)
    }

    fn from_config(config: &SyntheticConfig, sequence: u64) -> Self {
        Self {
            sequence,
            kind: config.kind_of(sequence),
            depth_resolution: config.depth_resolution,
            color_resolution: config.color_resolution,
        }
    }
}

impl SampleNotification for SyntheticNotification {
    fn acquire_sample(&self) -> Result<Option<Box<dyn MultiSourceSample + '_>>, CaptureError> {
        match self.kind {
            SampleKind::MissingReference => Ok(None),
            SampleKind::Fault => Err(CaptureError::AcquisitionFailed(format!(
                "synthetic fault on sample {}",
                self.sequence
            ))),
            _ => Ok(Some(Box::new(SyntheticSample { notification: self }))),
        }
    }
}

struct SyntheticSample<'a> {
    notification: &'a SyntheticNotification,
}

impl MultiSourceSample for SyntheticSample<'_> {
    fn depth_frame(&self) -> Result<Option<DepthBuffer>, CaptureError> {
        if self.notification.kind == SampleKind::MissingDepth {
            return Ok(None);
        }
        let (width, height) = self.notification.depth_resolution;
        render_depth(width, height).map(Some)
    }

    fn color_frame(&self) -> Result<Option<ColorBuffer>, CaptureError> {
        if self.notification.kind == SampleKind::MissingColor {
            return Ok(None);
        }
        let (width, height) = self.notification.color_resolution;
        Ok(Some(render_color(width, height, self.notification.sequence)))
    }
}

/// Sphere in front of a wall. The outermost pixel ring has no reading, like
/// the invalid border of a real time-of-flight sensor.
fn render_depth(width: u32, height: u32) -> Result<DepthBuffer, CaptureError> {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = cx.min(cy) * 0.6;
    let mut data = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                data.push(0);
                continue;
            }
            let (dx, dy) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
            let r2 = dx * dx + dy * dy;
            if r2 < radius * radius {
                let bulge = (radius * radius - r2).sqrt() / radius;
                data.push((SPHERE_DEPTH_MM - bulge * 200.0) as u16);
            } else {
                data.push(WALL_DEPTH_MM);
            }
        }
    }
    DepthBuffer::new(width, height, data)
}

fn render_color(width: u32, height: u32, sequence: u64) -> ColorBuffer {
    let shift = (sequence % 256) as u8;
    let image = RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgba([r, g, shift, 255])
    });
    ColorBuffer::new(image)
}

struct Producer {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Software sensor implementing [`SensorDriver`].
pub struct SyntheticDriver {
    config: SyntheticConfig,
    handler: Arc<Mutex<Option<NotificationHandler>>>,
    producer: Option<Producer>,
}

impl SyntheticDriver {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            handler: Arc::new(Mutex::new(None)),
            producer: None,
        }
    }
}

impl SensorDriver for SyntheticDriver {
    fn device_id(&self) -> &str {
        &self.config.device_id
    }

    fn is_available(&self) -> bool {
        self.producer.is_some()
    }

    fn open(&mut self) -> Result<(), CaptureError> {
        if self.producer.is_some() {
            return Ok(());
        }

        let interval = self.config.interval()?;
        let running = Arc::new(AtomicBool::new(true));
        let config = self.config.clone();
        let handler = self.handler.clone();
        let flag = running.clone();

        let thread = thread::Builder::new()
            .name(format!("{}-producer", self.config.device_id))
            .spawn(move || produce(config, interval, handler, flag))
            .map_err(|e| CaptureError::OpenFailed(e.to_string()))?;

        info!(
            "Synthetic sensor {} opened: depth {:?}, color {:?} @ {} fps",
            self.config.device_id,
            self.config.depth_resolution,
            self.config.color_resolution,
            self.config.frame_rate
        );
        self.producer = Some(Producer { running, thread });
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        producer.running.store(false, Ordering::SeqCst);
        producer
            .thread
            .join()
            .map_err(|_| CaptureError::CloseFailed("producer thread panicked".to_string()))?;
        info!("Synthetic sensor {} closed", self.config.device_id);
        Ok(())
    }

    fn open_reader(
        &mut self,
        sources: FrameSources,
        handler: NotificationHandler,
    ) -> Result<(), CaptureError> {
        if !sources.depth || !sources.color {
            return Err(CaptureError::ReaderFailed(format!(
                "synthetic sensor only delivers paired depth + color, got {:?}",
                sources
            )));
        }
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
        Ok(())
    }
}

impl Drop for SyntheticDriver {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}", e);
        }
    }
}

fn produce(
    config: SyntheticConfig,
    interval: Option<Duration>,
    handler: Arc<Mutex<Option<NotificationHandler>>>,
    running: Arc<AtomicBool>,
) {
    let mut sequence = 0u64;

    while running.load(Ordering::SeqCst) {
        if config.max_samples.is_some_and(|max| sequence >= max) {
            debug!("Synthetic sensor {} reached its sample limit", config.device_id);
            break;
        }
        sequence += 1;

        // Clone out of the lock so a slow handler never blocks open_reader.
        let current = handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = current {
            let notification = SyntheticNotification::from_config(&config, sequence);
            handler(&notification as &dyn SampleNotification);
        }

        if let Some(interval) = interval {
            thread::sleep(interval);
        }
    }
}
