//! Process-wide engine access
//!
//! Lets components start animations without threading an engine through
//! every call. The application still owns the [`AnimationEngine`](crate::AnimationEngine); only a
//! weak [`EngineHandle`] is stored here.

use crate::easing::Warp;
use crate::engine::{Animation, CompletionCallback, EngineHandle};
use crate::error::{AnimationError, Result};
use crate::id::AnimationId;
use std::sync::OnceLock;

static GLOBAL_ENGINE: OnceLock<EngineHandle> = OnceLock::new();

/// Install the global engine handle
///
/// Call once at app startup after creating the [`AnimationEngine`](crate::AnimationEngine).
/// Fails with [`AnimationError::GlobalAlreadyInitialized`] on a second call.
pub fn set_global_engine(handle: EngineHandle) -> Result<()> {
    GLOBAL_ENGINE
        .set(handle)
        .map_err(|_| AnimationError::GlobalAlreadyInitialized)?;
    tracing::debug!("global animation engine installed");
    Ok(())
}

/// Get the global engine handle
pub fn global_engine() -> Result<EngineHandle> {
    try_global_engine().ok_or(AnimationError::GlobalNotInitialized)
}

/// Try to get the global engine handle (returns None if not initialized)
pub fn try_global_engine() -> Option<EngineHandle> {
    GLOBAL_ENGINE.get().cloned()
}

/// Animate on the global engine
///
/// `warp` defaults to the identity; `on_complete` is optional.
///
/// ```ignore
/// use cadence_animation::{animate, ease_in_out, Warp};
///
/// let id = animate(|t| set_opacity(t), 300.0, Some(Warp::new(ease_in_out)), None)?;
/// ```
pub fn animate<F>(
    progress: F,
    duration_ms: f64,
    warp: Option<Warp>,
    on_complete: Option<CompletionCallback>,
) -> Result<AnimationId>
where
    F: FnMut(f64) + Send + 'static,
{
    let mut animation = Animation::new(duration_ms, progress);
    if let Some(warp) = warp {
        animation = animation.warp(warp);
    }
    if let Some(on_complete) = on_complete {
        animation = animation.on_complete(on_complete);
    }
    global_engine()?.schedule(animation)
}

/// Cancel an animation on the global engine. A no-op if there is none.
pub fn cancel(id: AnimationId) -> bool {
    try_global_engine().is_some_and(|engine| engine.cancel(id))
}
