//! Sensor lifecycle handle.
//!
//! A physical scanning sensor cannot be opened through more than one handle,
//! so each device id can be claimed by at most one [`Sensor`] per process.
//! The claim is released when the `Sensor` is dropped.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{info, warn};

use crate::driver::{CaptureError, SampleNotification, SensorDriver};
use crate::frame::FrameSources;

static CLAIMED_DEVICES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn claimed_devices() -> MutexGuard<'static, HashSet<String>> {
    CLAIMED_DEVICES
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle state of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Closed,
    Open,
}

struct SensorInner {
    driver: Box<dyn SensorDriver>,
    subscribed: bool,
}

/// Exclusive handle to one physical sensor.
///
/// All methods take `&self`; share the handle with `Arc<Sensor>` between the
/// code that subscribes and the code that starts and stops scanning.
///
/// [`state`](Self::state) and [`is_open`](Self::is_open) never wait on the
/// driver and are safe to call from a subscriber. `start`, `stop` and
/// `subscribe` are not: `stop` waits for the delivery thread, which may be
/// blocked inside that same subscriber.
pub struct Sensor {
    device_id: String,
    open: AtomicBool,
    inner: Mutex<SensorInner>,
}

impl Sensor {
    /// Claim the device behind `driver`.
    ///
    /// Fails with [`CaptureError::DeviceBusy`] if another `Sensor` in this
    /// process already owns the same device id.
    pub fn claim<D: SensorDriver + 'static>(driver: D) -> Result<Self, CaptureError> {
        let device_id = driver.device_id().to_string();
        if !claimed_devices().insert(device_id.clone()) {
            return Err(CaptureError::DeviceBusy(device_id));
        }
        info!("Claimed sensor {}", device_id);
        Ok(Self {
            device_id,
            open: AtomicBool::new(driver.is_available()),
            inner: Mutex::new(SensorInner {
                driver: Box::new(driver),
                subscribed: false,
            }),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn state(&self) -> SensorState {
        if self.open.load(Ordering::SeqCst) {
            SensorState::Open
        } else {
            SensorState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SensorState::Open
    }

    /// Open the sensor. Does nothing if it is already open.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut inner = self.lock();
        if !inner.driver.is_available() {
            info!("Starting sensor {}", self.device_id);
            let result = inner.driver.open();
            self.open.store(inner.driver.is_available(), Ordering::SeqCst);
            result?;
        }
        Ok(())
    }

    /// Close the sensor. Does nothing if it is already closed.
    ///
    /// Samples stop arriving once this returns; callbacks already handed off
    /// by a subscriber keep running.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let mut inner = self.lock();
        if inner.driver.is_available() {
            info!("Stopping sensor {}", self.device_id);
            let result = inner.driver.close();
            self.open.store(inner.driver.is_available(), Ordering::SeqCst);
            result?;
        }
        Ok(())
    }

    /// Register `handler` to receive every depth + color sample.
    ///
    /// A sensor accepts a single subscriber.
    pub fn subscribe<F>(&self, handler: F) -> Result<(), CaptureError>
    where
        F: Fn(&dyn SampleNotification) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        if inner.subscribed {
            warn!("Rejected second subscriber on sensor {}", self.device_id);
            return Err(CaptureError::AlreadySubscribed);
        }
        info!("Opening a depth + color frame reader on {}", self.device_id);
        inner
            .driver
            .open_reader(FrameSources::DEPTH_AND_COLOR, Arc::new(handler))?;
        inner.subscribed = true;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SensorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Sensor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to close sensor {} on drop: {}", self.device_id, e);
        }
        claimed_devices().remove(&self.device_id);
    }
}

impl std::fmt::Debug for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("device_id", &self.device_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NotificationHandler;
    use crate::synthetic::{SyntheticConfig, SyntheticDriver};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Calls {
        opens: AtomicUsize,
        closes: AtomicUsize,
        readers: AtomicUsize,
    }

    struct CountingDriver {
        id: String,
        open: bool,
        fail_open: bool,
        calls: Arc<Calls>,
    }

    impl CountingDriver {
        fn new(id: &str) -> (Self, Arc<Calls>) {
            let calls = Arc::new(Calls::default());
            let driver = Self {
                id: id.to_string(),
                open: false,
                fail_open: false,
                calls: calls.clone(),
            };
            (driver, calls)
        }
    }

    impl SensorDriver for CountingDriver {
        fn device_id(&self) -> &str {
            &self.id
        }

        fn is_available(&self) -> bool {
            self.open
        }

        fn open(&mut self) -> Result<(), CaptureError> {
            if self.fail_open {
                return Err(CaptureError::OpenFailed("no device attached".to_string()));
            }
            if self.open {
                panic!("device opened twice");
            }
            self.calls.opens.fetch_add(1, Ordering::SeqCst);
            self.open = true;
            Ok(())
        }

        fn close(&mut self) -> Result<(), CaptureError> {
            if !self.open {
                panic!("device closed twice");
            }
            self.calls.closes.fetch_add(1, Ordering::SeqCst);
            self.open = false;
            Ok(())
        }

        fn open_reader(
            &mut self,
            sources: FrameSources,
            _handler: NotificationHandler,
        ) -> Result<(), CaptureError> {
            assert_eq!(sources, FrameSources::DEPTH_AND_COLOR);
            self.calls.readers.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_start_twice_opens_once() {
        let (driver, calls) = CountingDriver::new("sensor-test-start-twice");
        let sensor = Sensor::claim(driver).unwrap();
        assert_eq!(sensor.state(), SensorState::Closed);

        sensor.start().unwrap();
        sensor.start().unwrap();

        assert_eq!(sensor.state(), SensorState::Open);
        assert_eq!(calls.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_twice_closes_once() {
        let (driver, calls) = CountingDriver::new("sensor-test-stop-twice");
        let sensor = Sensor::claim(driver).unwrap();
        sensor.start().unwrap();

        sensor.stop().unwrap();
        sensor.stop().unwrap();

        assert_eq!(sensor.state(), SensorState::Closed);
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_when_never_started_is_noop() {
        let (driver, calls) = CountingDriver::new("sensor-test-stop-closed");
        let sensor = Sensor::claim(driver).unwrap();
        sensor.stop().unwrap();
        assert_eq!(calls.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_open_failure_is_propagated() {
        let (mut driver, _calls) = CountingDriver::new("sensor-test-open-fails");
        driver.fail_open = true;
        let sensor = Sensor::claim(driver).unwrap();

        let err = sensor.start().unwrap_err();
        assert!(matches!(err, CaptureError::OpenFailed(_)));
        assert!(!sensor.is_open());
    }

    #[test]
    fn test_device_can_only_be_claimed_once() {
        let (first, _) = CountingDriver::new("sensor-test-claim");
        let (second, _) = CountingDriver::new("sensor-test-claim");

        let sensor = Sensor::claim(first).unwrap();
        let err = Sensor::claim(second).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceBusy(_)));

        drop(sensor);
        let (third, _) = CountingDriver::new("sensor-test-claim");
        assert!(Sensor::claim(third).is_ok());
    }

    #[test]
    fn test_drop_closes_open_sensor() {
        let (driver, calls) = CountingDriver::new("sensor-test-drop");
        let sensor = Sensor::claim(driver).unwrap();
        sensor.start().unwrap();
        drop(sensor);
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_subscriber() {
        let (driver, calls) = CountingDriver::new("sensor-test-subscribe");
        let sensor = Sensor::claim(driver).unwrap();

        sensor.subscribe(|_| {}).unwrap();
        let err = sensor.subscribe(|_| {}).unwrap_err();

        assert!(matches!(err, CaptureError::AlreadySubscribed));
        assert_eq!(calls.readers.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscriber_can_observe_state_while_stopping() {
        let config = SyntheticConfig::default()
            .with_device_id("sensor-test-observe")
            .with_resolution(4, 4)
            .with_frame_rate(0.0);
        let sensor = Arc::new(Sensor::claim(SyntheticDriver::new(config)).unwrap());

        let (seen_tx, seen_rx) = mpsc::channel();
        let seen_tx = Mutex::new(seen_tx);
        let weak = Arc::downgrade(&sensor);
        sensor
            .subscribe(move |_| {
                if let Some(sensor) = weak.upgrade() {
                    let _ = seen_tx.lock().unwrap().send(sensor.is_open());
                }
            })
            .unwrap();

        sensor.start().unwrap();
        seen_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(sensor.is_open());

        let (done_tx, done_rx) = mpsc::channel();
        let stopper = sensor.clone();
        thread::spawn(move || {
            let result = stopper.stop();
            done_tx.send(result.is_ok()).unwrap();
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap());
        assert_eq!(sensor.state(), SensorState::Closed);
    }
}
