//! One-shot completion signal.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct State {
    finished: Mutex<bool>,
    cond: Condvar,
}

/// Fires once when a dispatcher has delivered its quota.
///
/// Cheap to clone; every clone observes the same signal. It can be polled
/// with [`Completion::is_finished`] or waited on.
#[derive(Clone)]
pub struct Completion {
    state: Arc<State>,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(State {
                finished: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// Mark as finished and wake all waiters. Returns `true` only for the
    /// call that performed the transition.
    pub(crate) fn fire(&self) -> bool {
        let mut finished = self.lock();
        if *finished {
            return false;
        }
        *finished = true;
        self.state.cond.notify_all();
        true
    }

    pub fn is_finished(&self) -> bool {
        *self.lock()
    }

    /// Block until finished.
    pub fn wait(&self) {
        let mut finished = self.lock();
        while !*finished {
            finished = self
                .state
                .cond
                .wait(finished)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until finished or `timeout` elapses. Returns whether it finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let finished = self.lock();
        let (finished, _) = self
            .state
            .cond
            .wait_timeout_while(finished, timeout, |finished| !*finished)
            .unwrap_or_else(PoisonError::into_inner);
        *finished
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.state
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fires_once() {
        let completion = Completion::new();
        assert!(!completion.is_finished());
        assert!(completion.fire());
        assert!(!completion.fire());
        assert!(completion.is_finished());
    }

    #[test]
    fn test_wait_timeout_without_fire() {
        let completion = Completion::new();
        assert!(!completion.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_clone_wakes_waiter() {
        let completion = Completion::new();
        let remote = completion.clone();
        let waiter = thread::spawn(move || remote.wait_timeout(Duration::from_secs(5)));

        completion.fire();
        assert!(waiter.join().unwrap());
    }
}
