//! Orchestration of one scan: subscribe, start, wait for the quota, stop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use depthscan_capture::{Frame, Sensor};
use tracing::{info, warn};

use crate::completion::Completion;
use crate::dispatch::{DispatchConfig, DispatchStats, FrameDispatcher};
use crate::error::IngestError;

/// Summary of a finished scan session.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Whether the quota was reached before the timeout.
    pub finished: bool,
    pub elapsed: Duration,
    pub stats: DispatchStats,
}

/// Drives a [`FrameDispatcher`] from a [`Sensor`] until the quota is reached.
pub struct ScanSession {
    sensor: Arc<Sensor>,
    dispatcher: Arc<FrameDispatcher>,
    completion: Completion,
    timeout: Option<Duration>,
}

impl ScanSession {
    /// Create a dispatcher for `config` and subscribe it to `sensor`.
    pub fn new<F>(
        sensor: Arc<Sensor>,
        config: DispatchConfig,
        on_frame: F,
    ) -> Result<Self, IngestError>
    where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        let (dispatcher, completion) = FrameDispatcher::new(config, on_frame)?;
        let dispatcher = Arc::new(dispatcher);
        dispatcher.subscribe_to(&sensor)?;
        Ok(Self {
            sensor,
            dispatcher,
            completion,
            timeout: None,
        })
    }

    /// Give up waiting for the quota after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    pub fn dispatcher(&self) -> &Arc<FrameDispatcher> {
        &self.dispatcher
    }

    /// Run the scan to completion.
    ///
    /// Starts the sensor, waits for the completion signal (or the timeout),
    /// stops the sensor and waits for in-flight callbacks before reporting.
    pub fn run(self) -> Result<ScanReport, IngestError> {
        let started = Instant::now();
        info!(
            "Scanning {} frames from {}",
            self.dispatcher.quota(),
            self.sensor.device_id()
        );
        self.sensor.start()?;

        let finished = match self.timeout {
            Some(timeout) => self.completion.wait_timeout(timeout),
            None => {
                self.completion.wait();
                true
            }
        };
        if !finished {
            warn!(
                "Scan timed out after {:?} with {} of {} frames",
                started.elapsed(),
                self.dispatcher.frames_acquired(),
                self.dispatcher.quota()
            );
        }

        let stopped = self.sensor.stop();
        self.dispatcher.join();
        stopped?;

        let report = ScanReport {
            finished,
            elapsed: started.elapsed(),
            stats: self.dispatcher.stats(),
        };
        info!(
            "Scan session ended after {:.2}s: {} frames delivered, {} samples dropped",
            report.elapsed.as_secs_f64(),
            report.stats.completed,
            report.stats.dropped()
        );
        Ok(report)
    }
}
