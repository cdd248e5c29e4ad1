/*
 * This file is part of psumon.
 *
 * Copyright (C) 2025 psumon contributors
 *
 * psumon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 2 of the License, or
 * (at your option) any later version.
 *
 * psumon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with psumon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Background acquisition task
//!
//! A dedicated thread runs one poll cycle per refresh period until asked to
//! stop. The remainder of each period is spent waiting on a `StopSignal`, so a
//! stop request cuts the pacing sleep short instead of waiting it out.
//!
//! # Lifecycle
//! - `spawn`: start the thread; the first cycle runs immediately
//! - `stop`: raise the signal and join. When `stop` returns no cycle is in
//!   flight and none will start.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

/// One-shot stop flag with an interruptible wait
#[derive(Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.cond.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.stopped.lock()
    }

    /// Wait up to `timeout`. Returns true if stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cond.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// Handle to a running acquisition thread
pub struct PollTask {
    name: String,
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    /// Start a thread that calls `cycle` once per `period`.
    ///
    /// A cycle that overruns the period is followed directly by the next one.
    pub fn spawn<F>(name: &str, period: Duration, mut cycle: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let signal = Arc::new(StopSignal::new());
        let thread_signal = signal.clone();
        let thread_name = name.to_string();

        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            info!("{} started (period {:?})", thread_name, period);
            let mut iteration: u64 = 0;

            while !thread_signal.is_requested() {
                iteration += 1;
                let started = Instant::now();
                cycle();

                let elapsed = started.elapsed();
                let remaining = period.saturating_sub(elapsed);
                if remaining.is_zero() {
                    debug!("{} cycle {} overran period ({:?})", thread_name, iteration, elapsed);
                    continue;
                }
                if thread_signal.wait_timeout(remaining) {
                    break;
                }
            }

            info!("{} stopped after {} cycles", thread_name, iteration);
        })?;

        Ok(Self {
            name: name.to_string(),
            signal,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Request stop and wait for the thread to exit. Idempotent.
    pub fn stop(&mut self) {
        self.signal.request();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("{} panicked", self.name);
            }
        }
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_signal_wait_times_out() {
        let signal = StopSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_signal_wakes_waiter() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait_timeout(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(10));
        signal.request();
        assert!(waiter.join().unwrap());
        assert!(signal.is_requested());
    }

    #[test]
    fn test_first_cycle_runs_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut task = PollTask::spawn("test-poll", Duration::from_secs(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(task.is_running());

        // Stop interrupts the 30 s pacing wait
        let start = Instant::now();
        task.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!task.is_running());
    }

    #[test]
    fn test_no_cycle_after_stop_returns() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut task = PollTask::spawn("test-poll", Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        task.stop();
        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);

        // Second stop is a no-op
        task.stop();
    }

    #[test]
    fn test_overrunning_cycle_is_followed_immediately() {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let recorder = starts.clone();
        let mut task = PollTask::spawn("test-poll", Duration::from_millis(50), move || {
            recorder.lock().push(Instant::now());
            thread::sleep(Duration::from_millis(60));
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while starts.lock().len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        task.stop();

        let starts = starts.lock();
        assert!(starts.len() >= 3);
        for pair in starts.windows(2) {
            let gap = pair[1] - pair[0];
            // One 60 ms cycle, with no pacing wait on top
            assert!(gap >= Duration::from_millis(60));
            assert!(gap < Duration::from_millis(100), "cycles {:?} apart", gap);
        }
    }
}
