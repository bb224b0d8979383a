//! Easing functions for animations
//!
//! All functions are pure and total. Inputs outside `[0, 1]` are not clamped;
//! the math simply runs past the ends.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Identity warp
#[inline]
pub fn linear(t: f64) -> f64 {
    t
}

/// Quadratic ease in: `t²`
#[inline]
pub fn ease_in(t: f64) -> f64 {
    t.powi(2)
}

/// Quadratic ease out: `1 - (1 - t)²`
#[inline]
pub fn ease_out(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(2)
}

/// Sinusoidal ease in then out: `t - sin(2πt) / 2π`
#[inline]
pub fn ease_in_out(t: f64) -> f64 {
    t - (2.0 * PI * t).sin() / (2.0 * PI)
}

/// Named easing curve
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Easing::Linear => linear(t),
            Easing::EaseIn => ease_in(t),
            Easing::EaseOut => ease_out(t),
            Easing::EaseInOut => ease_in_out(t),
        }
    }
}

/// A time-warping function shared between the caller and the engine.
///
/// Cheap to clone. Defaults to the identity warp.
#[derive(Clone)]
pub struct Warp(Arc<dyn Fn(f64) -> f64 + Send + Sync>);

impl Warp {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn identity() -> Self {
        Self::new(linear)
    }

    #[inline]
    pub fn apply(&self, t: f64) -> f64 {
        (self.0)(t)
    }
}

impl Default for Warp {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for Warp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Warp(..)")
    }
}

impl From<Easing> for Warp {
    fn from(easing: Easing) -> Self {
        match easing {
            Easing::Linear => Warp::new(linear),
            Easing::EaseIn => Warp::new(ease_in),
            Easing::EaseOut => Warp::new(ease_out),
            Easing::EaseInOut => Warp::new(ease_in_out),
        }
    }
}

impl From<fn(f64) -> f64> for Warp {
    fn from(f: fn(f64) -> f64) -> Self {
        Warp::new(f)
    }
}
