use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use depthscan_capture::{CaptureError, Frame, FramePayload, SampleNotification, Sensor};
use tracing::{debug, error, info, trace};

use super::stats::StatsCounters;
use super::{DispatchConfig, DispatchOutcome, DispatchStats, DropReason};
use crate::completion::Completion;
use crate::error::IngestError;
use crate::pool::WorkerPool;

type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

/// Delivers up to `quota` frames to a callback, then signals completion.
///
/// Drivers deliver notifications serially, but nothing here depends on it:
/// frame ids come from an atomic counter, so they stay unique under
/// overlapping calls and only id `quota + 1` can fire the completion.
pub struct FrameDispatcher {
    quota: u64,
    counter: AtomicU64,
    completion: Completion,
    on_frame: FrameCallback,
    stats: Arc<StatsCounters>,
    pool: WorkerPool,
}

impl FrameDispatcher {
    /// Create a dispatcher and the completion handle observers wait on.
    pub fn new<F>(
        config: DispatchConfig,
        on_frame: F,
    ) -> Result<(Self, Completion), IngestError>
    where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        config.validate()?;
        debug!("Number of frames: {}", config.quota);

        let pool = WorkerPool::new("frame-worker", config.workers, config.queue_capacity)?;
        let completion = Completion::new();
        let dispatcher = Self {
            quota: u64::from(config.quota),
            counter: AtomicU64::new(0),
            completion: completion.clone(),
            on_frame: Arc::new(on_frame),
            stats: Arc::new(StatsCounters::default()),
            pool,
        };
        Ok((dispatcher, completion))
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// Another handle on the completion signal.
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.completion.is_finished()
    }

    /// Successfully acquired frames so far, including the one that finished
    /// the scan.
    pub fn frames_acquired(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats.snapshot()
    }

    /// Subscribe this dispatcher to every sample `sensor` produces.
    pub fn subscribe_to(self: &Arc<Self>, sensor: &Sensor) -> Result<(), IngestError> {
        let dispatcher = Arc::clone(self);
        sensor.subscribe(move |notification| {
            dispatcher.handle_notification(notification);
        })?;
        Ok(())
    }

    /// Process one sensor notification.
    ///
    /// Never fails: defective samples, driver errors and driver panics are
    /// logged and reported as [`DispatchOutcome::Dropped`]. Returns as soon as
    /// the frame is queued; the callback runs on a worker.
    pub fn handle_notification(&self, notification: &dyn SampleNotification) -> DispatchOutcome {
        self.stats.record_received();

        if self.completion.is_finished() {
            return self.drop_sample(DropReason::Finished);
        }
        // A closed pool cannot deliver, so the sample must not take an id.
        if self.pool.is_closed() {
            return self.drop_sample(DropReason::Shutdown);
        }

        let payload = match acquire_payload(notification) {
            Ok(payload) => payload,
            Err(reason) => return self.drop_sample(reason),
        };

        let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Frame number {} was read properly", id);

        if id <= self.quota {
            self.dispatch(Frame::new(id, payload))
        } else if id == self.quota + 1 {
            self.completion.fire();
            info!("Scanning is finished after {} frames", self.quota);
            DispatchOutcome::Finished { id }
        } else {
            self.drop_sample(DropReason::Finished)
        }
    }

    /// Stop accepting frames and wait for every queued callback to return.
    ///
    /// Must not be called from inside the frame callback.
    pub fn join(&self) {
        self.pool.join();
    }

    fn dispatch(&self, frame: Frame) -> DispatchOutcome {
        let id = frame.id();
        let on_frame = self.on_frame.clone();
        let stats = self.stats.clone();

        let job = move || match panic::catch_unwind(AssertUnwindSafe(|| on_frame(frame))) {
            Ok(()) => stats.record_completed(),
            Err(payload) => {
                stats.record_callback_panic();
                error!(
                    "Callback for frame {} panicked: {}",
                    id,
                    panic_message(payload.as_ref())
                );
            }
        };

        match self.pool.submit(job) {
            Ok(()) => {
                self.stats.record_dispatched();
                debug!("Frame {} handed to a worker", id);
                DispatchOutcome::Dispatched { id }
            }
            Err(e) => {
                error!("Frame {} could not be dispatched: {}", id, e);
                self.drop_sample(DropReason::Shutdown)
            }
        }
    }

    fn drop_sample(&self, reason: DropReason) -> DispatchOutcome {
        match &reason {
            DropReason::Fault(_) => error!("Frame was not read properly: {}", reason),
            DropReason::Finished | DropReason::Shutdown => trace!("Ignoring sample: {}", reason),
            DropReason::MissingReference | DropReason::AcquisitionFailed => {
                debug!("Dropping sample: {}", reason)
            }
        }
        self.stats.record_drop(&reason);
        DispatchOutcome::Dropped(reason)
    }
}

fn acquire_payload(notification: &dyn SampleNotification) -> Result<FramePayload, DropReason> {
    let read = || -> Result<FramePayload, DropReason> {
        let sample = notification
            .acquire_sample()
            .map_err(fault)?
            .ok_or(DropReason::MissingReference)?;
        FramePayload::acquire(sample.as_ref())
            .map_err(fault)?
            .ok_or(DropReason::AcquisitionFailed)
    };
    panic::catch_unwind(AssertUnwindSafe(read)).unwrap_or_else(|payload| {
        Err(DropReason::Fault(format!(
            "driver panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn fault(e: CaptureError) -> DropReason {
    DropReason::Fault(e.to_string())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl std::fmt::Debug for FrameDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDispatcher")
            .field("quota", &self.quota)
            .field("frames_acquired", &self.frames_acquired())
            .field("finished", &self.is_finished())
            .finish()
    }
}
