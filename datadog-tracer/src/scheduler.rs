// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{Arc, Condvar, Mutex},
    thread,
    time::Duration,
};

/// Cancels a recurring event. Cloneable, idempotent, and safe to invoke
/// after the scheduler that issued it is gone. Cancellation is
/// level-triggered: it prevents further invocations, but an in-flight one
/// completes.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

struct CancelState {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        CancelToken {
            inner: Arc::new(CancelState {
                cancelled: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock().unwrap();
        *cancelled = true;
        self.inner.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock().unwrap()
    }

    /// Sleeps for `interval` or until cancellation, whichever comes first.
    /// Returns whether the token is still live.
    fn sleep(&self, interval: Duration) -> bool {
        let guard = self.inner.cancelled.lock().unwrap();
        let (guard, _timeout) = self
            .inner
            .condvar
            .wait_timeout_while(guard, interval, |cancelled| !*cancelled)
            .unwrap();
        !*guard
    }
}

/// Invokes callbacks periodically on behalf of the uploader.
pub trait EventScheduler: Send + Sync {
    /// Invokes `callback` every `interval` until the returned token is
    /// cancelled. The first invocation happens one `interval` from now.
    fn schedule_recurring(
        &self,
        interval: Duration,
        callback: Box<dyn FnMut() + Send>,
    ) -> CancelToken;
}

/// The default scheduler: one background worker thread per recurring
/// event, sleeping on a condition variable so cancellation interrupts the
/// wait. Outstanding workers are cancelled and joined on drop.
#[derive(Default)]
pub struct ThreadedEventScheduler {
    workers: Mutex<Vec<(CancelToken, thread::JoinHandle<()>)>>,
}

impl ThreadedEventScheduler {
    pub fn new() -> Self {
        ThreadedEventScheduler::default()
    }
}

impl EventScheduler for ThreadedEventScheduler {
    fn schedule_recurring(
        &self,
        interval: Duration,
        mut callback: Box<dyn FnMut() + Send>,
    ) -> CancelToken {
        let token = CancelToken::new();
        let worker_token = token.clone();
        let handle = thread::spawn(move || {
            while worker_token.sleep(interval) {
                callback();
            }
        });
        self.workers.lock().unwrap().push((token.clone(), handle));
        token
    }
}

impl Drop for ThreadedEventScheduler {
    fn drop(&mut self) {
        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for (token, handle) in workers {
            token.cancel();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_recurring_invocations() {
        let scheduler = ThreadedEventScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let token = scheduler.schedule_recurring(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        thread::sleep(Duration::from_millis(100));
        token.cancel();
        let observed = count.load(Ordering::SeqCst);
        assert!(observed >= 2, "expected at least 2 invocations, got {observed}");

        // No further invocations after cancellation.
        thread::sleep(Duration::from_millis(50));
        let after_cancel = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn test_cancel_is_idempotent_and_outlives_scheduler() {
        let token = {
            let scheduler = ThreadedEventScheduler::new();
            scheduler.schedule_recurring(Duration::from_secs(3600), Box::new(|| {}))
        };
        // The scheduler is gone; cancelling (twice) is still fine.
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_drop_cancels_workers() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        {
            let scheduler = ThreadedEventScheduler::new();
            scheduler.schedule_recurring(
                Duration::from_millis(5),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
            thread::sleep(Duration::from_millis(30));
        }
        let at_drop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), at_drop);
    }
}
