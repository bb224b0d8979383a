//! Timing pulse sources
//!
//! The engine never sleeps or reads the wall clock itself. It asks a
//! [`PulseSource`] for the current time and for a one-shot frame callback,
//! which lets tests drive it with [`ManualPulseSource`] while real hosts use
//! [`ThreadPulseSource`] or their own display-link integration.

mod manual;
mod thread;

pub use manual::ManualPulseSource;
pub use thread::ThreadPulseSource;

/// One-shot frame callback, invoked with the frame timestamp in milliseconds
pub type FrameCallback = Box<dyn FnOnce(f64) + Send + 'static>;

/// Handle to a requested, not yet fired frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }
}

/// Source of timing pulses consumed by the animation engine
pub trait PulseSource: Send + Sync {
    /// Current monotonic time in milliseconds, in the same time base as the
    /// timestamps passed to frame callbacks
    fn now(&self) -> f64;

    /// Invoke `callback` once at a time no earlier than `now()` and no
    /// earlier than the previous pulse plus the minimum interval
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancel a requested frame. Unknown or already fired handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Timestamp of the next pulse given the previous one
#[inline]
pub(crate) fn next_frame_time(last_frame: f64, min_interval_ms: f64, now: f64) -> f64 {
    (last_frame + min_interval_ms).max(now)
}
