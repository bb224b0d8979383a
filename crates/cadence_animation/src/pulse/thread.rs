//! Pulse source backed by a background timer thread.

use super::{next_frame_time, FrameCallback, FrameHandle, PulseSource};
use crate::config::{self, PulseConfig};
use crate::error::{AnimationError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct PendingFrame {
    handle: FrameHandle,
    due: f64,
    callback: FrameCallback,
}

struct TimerState {
    last_frame: f64,
    next_handle: u64,
    pending: Vec<PendingFrame>,
    stopped: bool,
}

struct TimerShared {
    origin: Instant,
    min_interval_ms: f64,
    state: Mutex<TimerState>,
    wake: Condvar,
}

impl TimerShared {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pulse source that fires frames from a dedicated thread.
///
/// Each frame is due at `max(last + interval, now)` computed when it is
/// requested, so a steady stream of requests settles at one pulse per
/// interval. Frame callbacks run on the timer thread; a panicking callback
/// is logged and does not stop the timer.
///
/// Time is measured in milliseconds since the source was created.
pub struct ThreadPulseSource {
    shared: Arc<TimerShared>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadPulseSource {
    /// Start the timer thread.
    ///
    /// Fails with [`AnimationError::InvalidArgument`] unless the interval
    /// lies in `(0, MAX_MIN_INTERVAL_MS]`, or with
    /// [`AnimationError::PulseThread`] if the thread can't be spawned.
    pub fn new(min_interval_ms: f64) -> Result<Self> {
        config::validate_interval(min_interval_ms)?;
        let shared = Arc::new(TimerShared {
            origin: Instant::now(),
            min_interval_ms,
            state: Mutex::new(TimerState {
                last_frame: 0.0,
                next_handle: 1,
                pending: Vec::new(),
                stopped: false,
            }),
            wake: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("cadence-pulse".into())
            .spawn(move || run_timer(&worker_shared))
            .map_err(AnimationError::PulseThread)?;

        tracing::debug!("ThreadPulseSource: started ({}ms interval)", min_interval_ms);

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    pub fn from_config(config: &PulseConfig) -> Result<Self> {
        Self::new(config.min_interval_ms)
    }
}

fn run_timer(shared: &TimerShared) {
    let mut state = shared.lock();
    loop {
        if state.stopped {
            break;
        }

        let now = shared.now();
        let earliest = state
            .pending
            .iter()
            .map(|frame| frame.due)
            .fold(None, |acc: Option<f64>, due| Some(acc.map_or(due, |a| a.min(due))));

        match earliest {
            None => {
                state = shared
                    .wake
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(due) if due > now => {
                let timeout = Duration::try_from_secs_f64((due - now) / 1000.0)
                    .unwrap_or(Duration::MAX);
                state = shared
                    .wake
                    .wait_timeout(state, timeout)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            Some(_) => {
                let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
                    .into_iter()
                    .partition(|frame| frame.due <= now);
                state.pending = waiting;
                for frame in &ready {
                    state.last_frame = state.last_frame.max(frame.due);
                }
                drop(state);

                for frame in ready {
                    let PendingFrame { due, callback, .. } = frame;
                    if panic::catch_unwind(AssertUnwindSafe(|| callback(due))).is_err() {
                        tracing::error!("ThreadPulseSource: frame callback panicked at {:.1}ms", due);
                    }
                }

                state = shared.lock();
            }
        }
    }
    tracing::debug!("ThreadPulseSource: timer thread exiting");
}

impl PulseSource for ThreadPulseSource {
    fn now(&self) -> f64 {
        self.shared.now()
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let now = self.shared.now();
        let mut state = self.shared.lock();
        let handle = FrameHandle::from_raw(state.next_handle);
        state.next_handle += 1;
        let due = next_frame_time(state.last_frame, self.shared.min_interval_ms, now);
        state.pending.push(PendingFrame {
            handle,
            due,
            callback,
        });
        drop(state);
        self.shared.wake.notify_one();
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.shared
            .lock()
            .pending
            .retain(|frame| frame.handle != handle);
        self.shared.wake.notify_one();
    }
}

impl Drop for ThreadPulseSource {
    fn drop(&mut self) {
        self.shared.lock().stopped = true;
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            // Dropped from inside a frame callback: the thread exits on its own
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}
