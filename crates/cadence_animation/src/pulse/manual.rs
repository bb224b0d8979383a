//! Deterministic pulse source driven by the caller.

use super::{next_frame_time, FrameCallback, FrameHandle, PulseSource};
use crate::config::{self, PulseConfig};
use crate::error::Result;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct ManualState {
    now: f64,
    last_frame: f64,
    next_handle: u64,
    pending: Vec<(FrameHandle, FrameCallback)>,
}

/// A virtual clock that only moves when told to.
///
/// Time starts at 0 and the first pulse is treated as following a pulse at
/// time 0, so it fires no earlier than one minimum interval in.
///
/// ```
/// use cadence_animation::{AnimationEngine, Animation, ManualPulseSource};
/// use std::sync::Arc;
///
/// let pulse = Arc::new(ManualPulseSource::new(16.0).unwrap());
/// let engine = AnimationEngine::new(pulse.clone());
/// engine.schedule(Animation::new(40.0, |_| {})).unwrap();
///
/// assert_eq!(pulse.fire(), Some(16.0));
/// assert_eq!(pulse.run_until_idle(10), 2);
/// assert_eq!(pulse.now(), 48.0);
/// ```
pub struct ManualPulseSource {
    min_interval_ms: f64,
    state: Mutex<ManualState>,
}

impl ManualPulseSource {
    /// Fails with [`AnimationError::InvalidArgument`] unless the interval
    /// lies in `(0, MAX_MIN_INTERVAL_MS]`.
    ///
    /// [`AnimationError::InvalidArgument`]: crate::AnimationError::InvalidArgument
    pub fn new(min_interval_ms: f64) -> Result<Self> {
        config::validate_interval(min_interval_ms)?;
        Ok(Self::with_interval(min_interval_ms))
    }

    pub fn from_config(config: &PulseConfig) -> Result<Self> {
        Self::new(config.min_interval_ms)
    }

    fn with_interval(min_interval_ms: f64) -> Self {
        Self {
            min_interval_ms,
            state: Mutex::new(ManualState {
                now: 0.0,
                last_frame: 0.0,
                next_handle: 1,
                pending: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current virtual time
    pub fn now(&self) -> f64 {
        self.lock().now
    }

    /// Move the clock forward without firing anything
    pub fn advance(&self, ms: f64) {
        self.lock().now += ms;
    }

    /// Set the clock. Time never moves backwards.
    pub fn set_time(&self, ms: f64) {
        let mut state = self.lock();
        state.now = state.now.max(ms);
    }

    /// Number of requested frames that have not fired yet
    pub fn pending_frames(&self) -> usize {
        self.lock().pending.len()
    }

    /// Fire every pending frame.
    ///
    /// The pulse timestamp is `max(now, last + interval)` and the clock jumps
    /// to it. Frames requested by the callbacks themselves wait for the next
    /// call. Returns the timestamp, or `None` if nothing was pending.
    pub fn fire(&self) -> Option<f64> {
        let (timestamp, callbacks) = {
            let mut state = self.lock();
            if state.pending.is_empty() {
                return None;
            }
            let timestamp = next_frame_time(state.last_frame, self.min_interval_ms, state.now);
            state.now = timestamp;
            state.last_frame = timestamp;
            (timestamp, std::mem::take(&mut state.pending))
        };

        for (_, callback) in callbacks {
            callback(timestamp);
        }
        Some(timestamp)
    }

    /// Fire frames until none are pending or `max_frames` have fired.
    ///
    /// Returns the number of frames fired.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut fired = 0;
        while fired < max_frames && self.fire().is_some() {
            fired += 1;
        }
        fired
    }
}

impl Default for ManualPulseSource {
    fn default() -> Self {
        Self::with_interval(PulseConfig::default().min_interval_ms)
    }
}

impl PulseSource for ManualPulseSource {
    fn now(&self) -> f64 {
        ManualPulseSource::now(self)
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut state = self.lock();
        let handle = FrameHandle::from_raw(state.next_handle);
        state.next_handle += 1;
        state.pending.push((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.lock().pending.retain(|(h, _)| *h != handle);
    }
}
