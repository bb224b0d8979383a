//! Fade Demo
//!
//! Runs three eased animations on the background pulse thread and prints
//! their progress as text bars, plus a long one that gets cancelled early.
//! Pass a path to a TOML engine config to override the defaults.
//!
//! Run with: cargo run -p cadence_animation --example fade

use anyhow::Result;
use cadence_animation::{Animation, AnimationEngine, Completion, Easing, EngineConfig};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn bar(label: &str, t: f64) {
    let filled = (t.clamp(0.0, 1.0) * 40.0).round() as usize;
    println!("{label:>10} [{:<40}] {:5.1}%", "#".repeat(filled), t * 100.0);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(Path::new(&path))?,
        None => EngineConfig::default(),
    };
    let engine = AnimationEngine::threaded(config)?;
    let (done_tx, done_rx) = mpsc::channel::<(&'static str, Completion)>();

    for (label, easing, duration_ms) in [
        ("ease-in", Easing::EaseIn, 600.0),
        ("ease-out", Easing::EaseOut, 800.0),
        ("in-out", Easing::EaseInOut, 1000.0),
    ] {
        let tx = done_tx.clone();
        engine.schedule(
            Animation::new(duration_ms, move |t| bar(label, t))
                .easing(easing)
                .on_complete(move |outcome| {
                    let _ = tx.send((label, outcome));
                }),
        )?;
    }
    drop(done_tx);

    thread::sleep(Duration::from_millis(500));
    tracing::info!("{} animations still running", engine.active_count());

    let handle = engine.handle();
    let cancelled = engine.schedule(Animation::new(5_000.0, |t| bar("doomed", t)))?;
    thread::sleep(Duration::from_millis(100));
    handle.cancel(cancelled);

    for (label, outcome) in done_rx.iter() {
        println!("{label} finished: {outcome:?}");
    }
    Ok(())
}
