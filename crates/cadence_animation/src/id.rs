//! Animation identifiers

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to a scheduled animation
///
/// Ids come from a process-wide counter and are never reused, so a stale id
/// can never alias a newer animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnimationId(u64);

impl AnimationId {
    /// Convert to raw u64 for storage outside the engine
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw u64 produced by `to_raw()`
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim#{}", self.0)
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Hand out the next animation id
pub(crate) fn next_id() -> AnimationId {
    AnimationId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}
