//! Animation engine
//!
//! Tracks every in-flight animation and advances them on each timing pulse.
//!
//! The engine is Idle while nothing is animating and Running while exactly
//! one pulse is armed on its [`PulseSource`]. Scheduling the first animation
//! arms a pulse; a tick that leaves no animations behind lets the engine go
//! idle again.
//!
//! No registry lock is held while user callbacks run, so progress callbacks
//! and completion hooks may freely call back into the engine (typically
//! through an [`EngineHandle`]) to schedule or cancel animations.
//!
//! `schedule`, `cancel`, the tick handler and teardown are serialized by a
//! re-entrant gate. A thread calling `cancel` while another thread is inside
//! a tick waits for that tick to finish; a callback cancelling from inside
//! the tick passes straight through.

use crate::config::EngineConfig;
use crate::easing::{Easing, Warp};
use crate::error::{AnimationError, Result};
use crate::id::{self, AnimationId};
use crate::pulse::{FrameHandle, PulseSource, ThreadPulseSource};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

/// Callback receiving the eased progress of an animation on every pulse
pub type ProgressCallback = Box<dyn FnMut(f64) + Send + 'static>;

/// Callback invoked exactly once when an animation is retired
pub type CompletionCallback = Box<dyn FnOnce(Completion) + Send + 'static>;

/// How an animation left the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Ran to its finish time
    Completed,
    /// Removed by `cancel` before finishing
    Cancelled,
}

/// Externally visible engine state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    /// No animations, no pulse pending
    Idle,
    /// At least one animation, a pulse is pending or being handled
    Running,
}

/// Description of an animation to schedule
///
/// ```
/// use cadence_animation::{Animation, Easing};
///
/// let fade = Animation::new(250.0, |opacity| println!("opacity {opacity}"))
///     .easing(Easing::EaseOut)
///     .on_complete(|outcome| println!("fade done: {outcome:?}"));
/// ```
pub struct Animation {
    duration_ms: f64,
    progress: ProgressCallback,
    warp: Warp,
    on_complete: Option<CompletionCallback>,
}

impl Animation {
    pub fn new<F>(duration_ms: f64, progress: F) -> Self
    where
        F: FnMut(f64) + Send + 'static,
    {
        Self {
            duration_ms,
            progress: Box::new(progress),
            warp: Warp::identity(),
            on_complete: None,
        }
    }

    /// Use a custom time-warping function
    pub fn warp(mut self, warp: impl Into<Warp>) -> Self {
        self.warp = warp.into();
        self
    }

    /// Use one of the named easing curves
    pub fn easing(self, easing: Easing) -> Self {
        self.warp(easing)
    }

    /// Called once with the outcome when the animation is retired
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("duration_ms", &self.duration_ms)
            .field("has_on_complete", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

/// A registered animation. Timing fields never change after creation.
struct AnimationRecord {
    id: AnimationId,
    start_time: f64,
    finish_time: f64,
    duration_ms: f64,
    warp: Warp,
    progress: Mutex<ProgressCallback>,
    on_complete: Mutex<Option<CompletionCallback>>,
    /// Set under the engine lock when the record leaves the registry
    retired: AtomicBool,
}

impl AnimationRecord {
    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn report(&self, fraction: f64) {
        let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        (*progress)(fraction);
    }

    /// Run the completion hook. The caller must be the one that removed the
    /// record from the registry.
    fn complete(&self, outcome: Completion) {
        let hook = self
            .on_complete
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook(outcome);
        }
    }

    /// [`complete`](Self::complete), with a panicking hook caught and logged
    fn complete_isolated(&self, outcome: Completion) -> thread::Result<()> {
        panic::catch_unwind(AssertUnwindSafe(|| self.complete(outcome))).map_err(|payload| {
            tracing::error!(
                "AnimationEngine: completion hook for {} panicked: {}",
                self.id,
                panic_message(&*payload)
            );
            payload
        })
    }
}

/// Mutual exclusion that the owning thread may enter again
///
/// Held across a whole tick, including the user callbacks, so other threads
/// can't interleave a `cancel` with them.
#[derive(Default)]
struct Gate {
    owner: Mutex<GateOwner>,
    released: Condvar,
}

#[derive(Default)]
struct GateOwner {
    thread: Option<ThreadId>,
    depth: usize,
}

struct GateGuard<'a> {
    gate: &'a Gate,
}

impl Gate {
    fn enter(&self) -> GateGuard<'_> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        while owner.thread.is_some_and(|thread| thread != me) {
            owner = self
                .released
                .wait(owner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        owner.thread = Some(me);
        owner.depth += 1;
        GateGuard { gate: self }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut owner = self
            .gate
            .owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.thread = None;
            drop(owner);
            self.gate.released.notify_all();
        }
    }
}

enum Phase {
    Idle,
    Armed(FrameHandle),
    /// The tick handler is running; it decides whether to re-arm when done
    Ticking,
}

struct EngineState {
    records: Vec<Arc<AnimationRecord>>,
    phase: Phase,
    /// Bumped on every arm so a pulse that fires after being superseded is ignored
    epoch: u64,
}

struct EngineShared {
    /// Always entered before `state` is locked
    gate: Gate,
    state: Mutex<EngineState>,
    pulse: Arc<dyn PulseSource>,
    config: EngineConfig,
}

type RecordList = SmallVec<[Arc<AnimationRecord>; 8]>;

/// The engine that ticks all active animations
///
/// Owns the active-animation registry. Hand out [`EngineHandle`]s to code
/// that needs to schedule or cancel without owning the engine, including
/// the animation callbacks themselves.
///
/// Dropping the engine cancels the pending pulse and retires every remaining
/// animation with [`Completion::Cancelled`].
pub struct AnimationEngine {
    shared: Arc<EngineShared>,
}

impl AnimationEngine {
    pub fn new(pulse: Arc<dyn PulseSource>) -> Self {
        Self::with_config(pulse, EngineConfig::default())
    }

    pub fn with_config(pulse: Arc<dyn PulseSource>, config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                gate: Gate::default(),
                state: Mutex::new(EngineState {
                    records: Vec::new(),
                    phase: Phase::Idle,
                    epoch: 0,
                }),
                pulse,
                config,
            }),
        }
    }

    /// Create an engine driven by a background [`ThreadPulseSource`]
    pub fn threaded(config: EngineConfig) -> Result<Self> {
        let pulse = ThreadPulseSource::from_config(&config.pulse)?;
        Ok(Self::with_config(Arc::new(pulse), config))
    }

    /// Get a handle to this engine for passing to callbacks and components
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Register an animation and return its id.
    ///
    /// Fails with [`AnimationError::InvalidArgument`] if the duration is not
    /// a positive finite number.
    pub fn schedule(&self, animation: Animation) -> Result<AnimationId> {
        schedule(&self.shared, animation)
    }

    /// Retire an animation early, invoking its completion hook with
    /// [`Completion::Cancelled`]. Unknown ids are ignored.
    ///
    /// Returns true if an animation was cancelled.
    pub fn cancel(&self, id: AnimationId) -> bool {
        cancel(&self.shared, id)
    }

    pub fn status(&self) -> EngineStatus {
        self.shared.lock().status()
    }

    pub fn active_count(&self) -> usize {
        self.shared.lock().records.len()
    }

    pub fn is_active(&self, id: AnimationId) -> bool {
        self.shared.lock().records.iter().any(|r| r.id == id)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }
}

impl fmt::Debug for AnimationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("AnimationEngine")
            .field("status", &state.status())
            .field("active", &state.records.len())
            .finish()
    }
}

impl Drop for AnimationEngine {
    fn drop(&mut self) {
        let _gate = self.shared.gate.enter();
        let (frame, remaining) = {
            let mut state = self.shared.lock();
            let frame = match std::mem::replace(&mut state.phase, Phase::Idle) {
                Phase::Armed(frame) => Some(frame),
                _ => None,
            };
            let remaining: RecordList = state.records.drain(..).collect();
            for record in &remaining {
                record.retired.store(true, Ordering::Release);
            }
            (frame, remaining)
        };

        if let Some(frame) = frame {
            self.shared.pulse.cancel_frame(frame);
        }
        if !remaining.is_empty() {
            tracing::debug!(
                "AnimationEngine: dropped with {} active animations",
                remaining.len()
            );
        }
        let mut first_panic = None;
        for record in remaining {
            if let Err(payload) = record.complete_isolated(Completion::Cancelled) {
                first_panic.get_or_insert(payload);
            }
        }
        if let Some(payload) = first_panic {
            if !self.shared.config.isolate_panics && !thread::panicking() {
                panic::resume_unwind(payload);
            }
        }
    }
}

/// Weak, cloneable handle to an [`AnimationEngine`]
///
/// Safe to capture inside animation callbacks: it does not keep the engine
/// alive, so no reference cycle forms between the engine and its records.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Weak<EngineShared>,
}

impl EngineHandle {
    /// Register an animation through the handle.
    ///
    /// Fails with [`AnimationError::EngineDropped`] if the engine is gone.
    pub fn schedule(&self, animation: Animation) -> Result<AnimationId> {
        let shared = self.shared.upgrade().ok_or(AnimationError::EngineDropped)?;
        schedule(&shared, animation)
    }

    /// Cancel an animation. A no-op returning false if the engine is gone.
    pub fn cancel(&self, id: AnimationId) -> bool {
        match self.shared.upgrade() {
            Some(shared) => cancel(&shared, id),
            None => false,
        }
    }

    pub fn status(&self) -> Option<EngineStatus> {
        let shared = self.shared.upgrade()?;
        let status = shared.lock().status();
        Some(status)
    }

    pub fn is_active(&self, id: AnimationId) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let active = shared.lock().records.iter().any(|r| r.id == id);
        active
    }

    /// Check if the engine is still alive
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl EngineShared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove a record from the registry. Whoever gets `Some` back owns the
    /// record's single completion notification.
    fn retire(&self, state: &mut EngineState, id: AnimationId) -> Option<Arc<AnimationRecord>> {
        let index = state.records.iter().position(|r| r.id == id)?;
        let record = state.records.remove(index);
        record.retired.store(true, Ordering::Release);
        Some(record)
    }
}

impl EngineState {
    fn status(&self) -> EngineStatus {
        match self.phase {
            Phase::Idle => EngineStatus::Idle,
            Phase::Armed(_) | Phase::Ticking => EngineStatus::Running,
        }
    }
}

/// Arm a pulse that calls back into the tick handler
fn arm(shared: &Arc<EngineShared>, state: &mut EngineState) {
    state.epoch += 1;
    let epoch = state.epoch;
    let weak = Arc::downgrade(shared);
    let frame = shared.pulse.request_frame(Box::new(move |now| {
        if let Some(shared) = weak.upgrade() {
            tick(&shared, epoch, now);
        }
    }));
    state.phase = Phase::Armed(frame);
}

fn schedule(shared: &Arc<EngineShared>, animation: Animation) -> Result<AnimationId> {
    let Animation {
        duration_ms,
        progress,
        warp,
        on_complete,
    } = animation;

    if !duration_ms.is_finite() || duration_ms <= 0.0 {
        tracing::warn!("AnimationEngine: rejected duration {}", duration_ms);
        return Err(AnimationError::InvalidArgument(format!(
            "duration_ms must be a positive number, got {duration_ms}"
        )));
    }

    let start_time = shared.pulse.now();
    let record = Arc::new(AnimationRecord {
        id: id::next_id(),
        start_time,
        finish_time: start_time + duration_ms,
        duration_ms,
        warp,
        progress: Mutex::new(progress),
        on_complete: Mutex::new(on_complete),
        retired: AtomicBool::new(false),
    });
    let id = record.id;

    let _gate = shared.gate.enter();
    let mut state = shared.lock();
    state.records.push(record);
    if matches!(state.phase, Phase::Idle) {
        arm(shared, &mut state);
        tracing::debug!("AnimationEngine: running");
    }
    tracing::trace!("AnimationEngine: scheduled {} ({}ms)", id, duration_ms);

    Ok(id)
}

fn cancel(shared: &Arc<EngineShared>, id: AnimationId) -> bool {
    let _gate = shared.gate.enter();
    let (record, frame) = {
        let mut state = shared.lock();
        let Some(record) = shared.retire(&mut state, id) else {
            return false;
        };
        // Outside a tick nothing else will notice the registry emptied
        let frame = match state.phase {
            Phase::Armed(frame) if state.records.is_empty() => Some(frame),
            _ => None,
        };
        if frame.is_some() {
            state.phase = Phase::Idle;
        }
        (record, frame)
    };

    if let Some(frame) = frame {
        shared.pulse.cancel_frame(frame);
        tracing::debug!("AnimationEngine: idle");
    }
    tracing::trace!("AnimationEngine: cancelled {}", id);
    record.complete(Completion::Cancelled);
    true
}

/// Advance every animation that was active when the pulse fired.
///
/// Works on a snapshot so that callbacks scheduling or cancelling animations
/// cannot make the loop skip or repeat a record. A record that reaches its
/// finish time is retired and notified before the next record is visited.
fn tick(shared: &Arc<EngineShared>, epoch: u64, now: f64) {
    let _gate = shared.gate.enter();
    let snapshot: RecordList = {
        let mut state = shared.lock();
        // A pulse that raced with cancel_frame, or was superseded by a newer arm
        if !matches!(state.phase, Phase::Armed(_)) || state.epoch != epoch {
            tracing::trace!("AnimationEngine: ignoring stale pulse at {:.1}ms", now);
            return;
        }
        state.phase = Phase::Ticking;
        state.records.iter().cloned().collect()
    };
    tracing::trace!("AnimationEngine: tick at {:.1}ms ({} active)", now, snapshot.len());

    let mut first_panic: Option<Box<dyn Any + Send>> = None;

    for record in snapshot {
        // Cancelled by an earlier callback in this tick
        if record.is_retired() {
            continue;
        }

        let done = now >= record.finish_time;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if done {
                record.report(1.0);
            } else {
                let fraction = (now - record.start_time) / record.duration_ms;
                record.report(record.warp.apply(fraction));
            }
        }));

        let retiring = match outcome {
            Ok(()) if done => Completion::Completed,
            Ok(()) => continue,
            Err(payload) => {
                tracing::error!(
                    "AnimationEngine: callback for {} panicked: {}",
                    record.id,
                    panic_message(&*payload)
                );
                first_panic.get_or_insert(payload);
                Completion::Cancelled
            }
        };

        // None if the callback cancelled its own animation
        let retired = shared.retire(&mut shared.lock(), record.id);
        if let Some(record) = retired {
            tracing::trace!("AnimationEngine: retired {} ({:?})", record.id, retiring);
            if let Err(payload) = record.complete_isolated(retiring) {
                first_panic.get_or_insert(payload);
            }
        }
    }

    let frame_needed = {
        let mut state = shared.lock();
        let frame_needed = !state.records.is_empty();
        if frame_needed {
            arm(shared, &mut state);
        } else {
            state.phase = Phase::Idle;
        }
        frame_needed
    };

    if !frame_needed {
        tracing::debug!("AnimationEngine: idle");
    }

    if let Some(payload) = first_panic {
        if !shared.config.isolate_panics {
            panic::resume_unwind(payload);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
