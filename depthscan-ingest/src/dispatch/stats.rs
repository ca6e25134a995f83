use std::sync::atomic::{AtomicU64, Ordering};

use super::DropReason;

/// Counters describing what a dispatcher has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Notifications received.
    pub received: u64,
    /// Dropped because the sample had no frame reference.
    pub missing_reference: u64,
    /// Dropped because depth or color data was missing.
    pub acquisition_failed: u64,
    /// Dropped because the driver failed or panicked.
    pub faults: u64,
    /// Dropped because the quota was already reached.
    pub after_finish: u64,
    /// Dropped because the worker pool was already shut down.
    pub after_shutdown: u64,
    /// Frames handed to the worker pool.
    pub dispatched: u64,
    /// Callbacks that returned normally.
    pub completed: u64,
    /// Callbacks that panicked.
    pub callback_panics: u64,
}

impl DispatchStats {
    /// Notifications that produced no dispatch and did not finish the scan.
    pub fn dropped(&self) -> u64 {
        self.missing_reference
            + self.acquisition_failed
            + self.faults
            + self.after_finish
            + self.after_shutdown
    }
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    received: AtomicU64,
    missing_reference: AtomicU64,
    acquisition_failed: AtomicU64,
    faults: AtomicU64,
    after_finish: AtomicU64,
    after_shutdown: AtomicU64,
    dispatched: AtomicU64,
    completed: AtomicU64,
    callback_panics: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drop(&self, reason: &DropReason) {
        let counter = match reason {
            DropReason::MissingReference => &self.missing_reference,
            DropReason::AcquisitionFailed => &self.acquisition_failed,
            DropReason::Fault(_) => &self.faults,
            DropReason::Finished => &self.after_finish,
            DropReason::Shutdown => &self.after_shutdown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_callback_panic(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            received: self.received.load(Ordering::Relaxed),
            missing_reference: self.missing_reference.load(Ordering::Relaxed),
            acquisition_failed: self.acquisition_failed.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            after_finish: self.after_finish.load(Ordering::Relaxed),
            after_shutdown: self.after_shutdown.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
        }
    }
}
