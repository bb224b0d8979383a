//! Cadence Animation Engine
//!
//! Frame-synchronized scheduling of time-based animations.
//!
//! # Features
//!
//! - **Engine**: Advances every active animation once per timing pulse
//! - **Easing**: `ease_in`, `ease_out`, `ease_in_out` or any custom warp
//! - **Cancellation**: Immediate, with exactly-once completion notification
//! - **Pluggable Pulses**: Manual clock for tests, timer thread for real time
//!
//! # Example
//!
//! ```
//! use cadence_animation::{Animation, AnimationEngine, Completion, Easing, ManualPulseSource};
//! use std::sync::{Arc, Mutex};
//!
//! let pulse = Arc::new(ManualPulseSource::new(16.0).unwrap());
//! let engine = AnimationEngine::new(pulse.clone());
//!
//! let outcome = Arc::new(Mutex::new(None));
//! let sink = outcome.clone();
//! engine
//!     .schedule(
//!         Animation::new(100.0, |t| println!("progress {t:.2}"))
//!             .easing(Easing::EaseInOut)
//!             .on_complete(move |c| *sink.lock().unwrap() = Some(c)),
//!     )
//!     .unwrap();
//!
//! pulse.run_until_idle(100);
//! assert_eq!(*outcome.lock().unwrap(), Some(Completion::Completed));
//! ```

pub mod config;
pub mod easing;
pub mod engine;
pub mod error;
pub mod global;
pub mod id;
pub mod pulse;

pub use config::{EngineConfig, PulseConfig, MAX_MIN_INTERVAL_MS};
pub use easing::{ease_in, ease_in_out, ease_out, linear, Easing, Warp};
pub use engine::{
    Animation, AnimationEngine, Completion, CompletionCallback, EngineHandle, EngineStatus,
    ProgressCallback,
};
pub use error::{AnimationError, Result};
pub use global::{animate, cancel, global_engine, set_global_engine, try_global_engine};
pub use id::AnimationId;
pub use pulse::{FrameCallback, FrameHandle, ManualPulseSource, PulseSource, ThreadPulseSource};
