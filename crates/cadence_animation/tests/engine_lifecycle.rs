//! Integration tests for the animation engine lifecycle
//!
//! Every test drives the engine with a `ManualPulseSource`, so pulse
//! timestamps are exact multiples of the 16ms interval.

use cadence_animation::{
    Animation, AnimationEngine, AnimationId, Completion, EngineConfig, EngineStatus,
    ManualPulseSource, Warp,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
enum Event {
    Progress(&'static str, f64),
    Done(&'static str, Completion),
}

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<Event>>>);

impl Log {
    fn progress(&self, tag: &'static str) -> impl FnMut(f64) + Send + 'static {
        let log = self.clone();
        move |v| log.0.lock().unwrap().push(Event::Progress(tag, v))
    }

    fn done(&self, tag: &'static str) -> impl FnOnce(Completion) + Send + 'static {
        let log = self.clone();
        move |c| log.0.lock().unwrap().push(Event::Done(tag, c))
    }

    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    fn values(&self, tag: &'static str) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(t, v) if t == tag => Some(v),
                _ => None,
            })
            .collect()
    }

    fn outcomes(&self, tag: &'static str) -> Vec<Completion> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Done(t, c) if t == tag => Some(c),
                _ => None,
            })
            .collect()
    }
}

fn setup() -> (Arc<ManualPulseSource>, AnimationEngine, Log) {
    let pulse = Arc::new(ManualPulseSource::new(16.0).unwrap());
    let engine = AnimationEngine::new(pulse.clone());
    (pulse, engine, Log::default())
}

/// Duration shorter than the pulse interval finishes on the first pulse
#[test]
fn test_short_animation_completes_on_first_pulse() {
    let (pulse, engine, log) = setup();

    engine
        .schedule(
            Animation::new(1.0, log.progress("a"))
                .warp(Warp::identity())
                .on_complete(log.done("a")),
        )
        .unwrap();
    assert_eq!(engine.status(), EngineStatus::Running);

    assert_eq!(pulse.fire(), Some(16.0));

    assert_eq!(
        log.events(),
        vec![
            Event::Progress("a", 1.0),
            Event::Done("a", Completion::Completed)
        ]
    );
    assert_eq!(engine.status(), EngineStatus::Idle);
    assert_eq!(pulse.pending_frames(), 0);
}

/// A progress callback that cancels its own animation
#[test]
fn test_cancel_from_own_progress_callback() {
    let (pulse, engine, log) = setup();
    let handle = engine.handle();
    let own_id: Arc<OnceLock<AnimationId>> = Arc::new(OnceLock::new());

    let id_slot = own_id.clone();
    let progress_log = log.clone();
    let id = engine
        .schedule(
            Animation::new(2000.0, move |v| {
                progress_log.push(Event::Progress("a", v));
                if let Some(id) = id_slot.get() {
                    handle.cancel(*id);
                }
            })
            .on_complete(log.done("a")),
        )
        .unwrap();
    own_id.set(id).unwrap();

    pulse.fire();

    assert_eq!(
        log.events(),
        vec![
            Event::Progress("a", 16.0 / 2000.0),
            Event::Done("a", Completion::Cancelled)
        ]
    );
    assert_eq!(engine.status(), EngineStatus::Idle);
    assert_eq!(pulse.run_until_idle(10), 0);
    assert_eq!(log.values("a").len(), 1);
}

#[test]
fn test_progress_non_decreasing_and_ends_at_one() {
    let (pulse, engine, log) = setup();
    engine
        .schedule(Animation::new(250.0, log.progress("a")).on_complete(log.done("a")))
        .unwrap();

    // Irregular frame pacing: sometimes the host is late
    let mut lateness = [0.0, 7.0, 0.0, 31.0, 2.0].iter().cycle();
    while pulse.pending_frames() > 0 {
        pulse.advance(*lateness.next().unwrap());
        pulse.fire();
    }

    let values = log.values("a");
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "{values:?}");
    assert_eq!(values.last(), Some(&1.0));
    assert_eq!(values.iter().filter(|v| **v == 1.0).count(), 1);
    assert_eq!(log.outcomes("a"), vec![Completion::Completed]);
}

#[test]
fn test_cancel_before_completion_suppresses_final_progress() {
    let (pulse, engine, log) = setup();
    let id = engine
        .schedule(Animation::new(100.0, log.progress("a")).on_complete(log.done("a")))
        .unwrap();

    pulse.fire();
    pulse.fire();
    assert!(engine.cancel(id));
    assert_eq!(log.outcomes("a"), vec![Completion::Cancelled]);

    pulse.run_until_idle(20);

    assert_eq!(log.values("a"), vec![0.16, 0.32]);
    assert_eq!(log.outcomes("a"), vec![Completion::Cancelled]);
    assert!(!engine.is_active(id));
    assert_eq!(engine.status(), EngineStatus::Idle);
}

#[test]
fn test_cancel_unknown_id_has_no_effect() {
    let (pulse, engine, log) = setup();
    let id = engine
        .schedule(Animation::new(32.0, log.progress("a")).on_complete(log.done("a")))
        .unwrap();

    assert!(!engine.cancel(AnimationId::from_raw(u64::MAX)));
    assert!(engine.is_active(id));
    assert_eq!(engine.status(), EngineStatus::Running);
    assert!(log.events().is_empty());

    pulse.run_until_idle(10);
    assert_eq!(log.values("a"), vec![0.5, 1.0]);
    assert_eq!(log.outcomes("a"), vec![Completion::Completed]);
}

#[test]
fn test_concurrent_animations_are_independent() {
    let (pulse, engine, log) = setup();
    let a = engine
        .schedule(Animation::new(32.0, log.progress("a")).on_complete(log.done("a")))
        .unwrap();
    let b = engine
        .schedule(Animation::new(64.0, log.progress("b")).on_complete(log.done("b")))
        .unwrap();
    assert_ne!(a, b);
    assert_eq!(pulse.pending_frames(), 1);

    assert_eq!(pulse.run_until_idle(10), 4);

    assert_eq!(log.values("a"), vec![0.5, 1.0]);
    assert_eq!(log.values("b"), vec![0.25, 0.5, 0.75, 1.0]);
    assert_eq!(log.outcomes("a"), vec![Completion::Completed]);
    assert_eq!(log.outcomes("b"), vec![Completion::Completed]);
    assert_eq!(engine.status(), EngineStatus::Idle);
}

#[test]
fn test_animation_added_during_tick_waits_for_next_pulse() {
    let (pulse, engine, log) = setup();
    let handle = engine.handle();

    let spawner_log = log.clone();
    let child_log = log.clone();
    let mut spawned = false;
    engine
        .schedule(Animation::new(100.0, move |v| {
            spawner_log.push(Event::Progress("parent", v));
            if !spawned {
                spawned = true;
                handle
                    .schedule(Animation::new(64.0, child_log.progress("child")))
                    .unwrap();
            }
        }))
        .unwrap();

    pulse.fire();
    assert!(log.values("child").is_empty());
    assert_eq!(engine.active_count(), 2);
    assert_eq!(pulse.pending_frames(), 1);

    // Child started at 16ms, so the 32ms pulse is a quarter in
    pulse.fire();
    assert_eq!(log.values("child"), vec![0.25]);
}

#[test]
fn test_animation_cancelled_during_tick_is_not_visited() {
    let (pulse, engine, log) = setup();
    let handle = engine.handle();
    let victim_id: Arc<OnceLock<AnimationId>> = Arc::new(OnceLock::new());

    let victim_slot = victim_id.clone();
    let killer_log = log.clone();
    engine
        .schedule(
            Animation::new(64.0, move |v| {
                killer_log.push(Event::Progress("killer", v));
                if let Some(id) = victim_slot.get() {
                    handle.cancel(*id);
                }
            })
            .on_complete(log.done("killer")),
        )
        .unwrap();
    let victim = engine
        .schedule(Animation::new(64.0, log.progress("victim")).on_complete(log.done("victim")))
        .unwrap();
    victim_id.set(victim).unwrap();

    pulse.fire();

    assert!(log.values("victim").is_empty());
    assert_eq!(log.outcomes("victim"), vec![Completion::Cancelled]);
    assert_eq!(log.values("killer"), vec![0.25]);
    assert_eq!(engine.active_count(), 1);

    pulse.run_until_idle(10);
    assert_eq!(log.outcomes("killer"), vec![Completion::Completed]);
}

/// Each finishing animation is completed before the next one is visited
#[test]
fn test_animations_finishing_together_complete_in_order() {
    let (pulse, engine, log) = setup();
    engine
        .schedule(Animation::new(1.0, log.progress("a")).on_complete(log.done("a")))
        .unwrap();
    engine
        .schedule(Animation::new(1.0, log.progress("b")).on_complete(log.done("b")))
        .unwrap();

    pulse.fire();

    assert_eq!(
        log.events(),
        vec![
            Event::Progress("a", 1.0),
            Event::Done("a", Completion::Completed),
            Event::Progress("b", 1.0),
            Event::Done("b", Completion::Completed),
        ]
    );
    assert_eq!(engine.status(), EngineStatus::Idle);
}

/// A later animation in the same tick can't un-complete an earlier one
#[test]
fn test_completed_animation_cannot_be_cancelled_later_in_tick() {
    let (pulse, engine, log) = setup();
    let handle = engine.handle();
    let first_id: Arc<OnceLock<AnimationId>> = Arc::new(OnceLock::new());

    let first = engine
        .schedule(Animation::new(1.0, log.progress("a")).on_complete(log.done("a")))
        .unwrap();
    first_id.set(first).unwrap();

    let id_slot = first_id.clone();
    let killer_log = log.clone();
    engine
        .schedule(
            Animation::new(1.0, move |v| {
                killer_log.push(Event::Progress("b", v));
                assert!(!handle.cancel(*id_slot.get().unwrap()));
            })
            .on_complete(log.done("b")),
        )
        .unwrap();

    pulse.fire();

    assert_eq!(log.outcomes("a"), vec![Completion::Completed]);
    assert_eq!(log.outcomes("b"), vec![Completion::Completed]);
}

/// Only the animation's own cancel can override its final progress
#[test]
fn test_cancel_inside_final_progress_wins_over_completion() {
    let (pulse, engine, log) = setup();
    let handle = engine.handle();
    let own_id: Arc<OnceLock<AnimationId>> = Arc::new(OnceLock::new());

    let id_slot = own_id.clone();
    let progress_log = log.clone();
    let id = engine
        .schedule(
            Animation::new(10.0, move |v| {
                progress_log.push(Event::Progress("a", v));
                if v == 1.0 {
                    handle.cancel(*id_slot.get().unwrap());
                }
            })
            .on_complete(log.done("a")),
        )
        .unwrap();
    own_id.set(id).unwrap();

    pulse.fire();

    assert_eq!(log.values("a"), vec![1.0]);
    assert_eq!(log.outcomes("a"), vec![Completion::Cancelled]);
    assert_eq!(engine.status(), EngineStatus::Idle);
}

#[test]
fn test_completion_hook_can_chain_animation() {
    let (pulse, engine, log) = setup();
    let handle = engine.handle();

    let second_log = log.clone();
    let first_log = log.clone();
    engine
        .schedule(Animation::new(16.0, log.progress("first")).on_complete(move |c| {
            first_log.push(Event::Done("first", c));
            handle
                .schedule(
                    Animation::new(32.0, second_log.progress("second"))
                        .on_complete(second_log.done("second")),
                )
                .unwrap();
        }))
        .unwrap();

    pulse.fire();
    assert_eq!(log.outcomes("first"), vec![Completion::Completed]);
    assert_eq!(engine.status(), EngineStatus::Running);
    assert_eq!(pulse.pending_frames(), 1);

    pulse.run_until_idle(10);
    assert_eq!(log.values("second"), vec![0.5, 1.0]);
    assert_eq!(log.outcomes("second"), vec![Completion::Completed]);
}

#[test]
fn test_panicking_callback_is_isolated() {
    let (pulse, engine, log) = setup();
    engine
        .schedule(
            Animation::new(100.0, |_| panic!("progress callback failed"))
                .on_complete(log.done("bad")),
        )
        .unwrap();
    engine
        .schedule(Animation::new(32.0, log.progress("good")).on_complete(log.done("good")))
        .unwrap();

    assert_eq!(pulse.fire(), Some(16.0));

    assert_eq!(log.outcomes("bad"), vec![Completion::Cancelled]);
    assert_eq!(log.values("good"), vec![0.5]);
    assert_eq!(engine.active_count(), 1);
    assert_eq!(pulse.pending_frames(), 1);

    pulse.run_until_idle(10);
    assert_eq!(log.outcomes("good"), vec![Completion::Completed]);
}

#[test]
fn test_panicking_warp_is_isolated() {
    let (pulse, engine, log) = setup();
    engine
        .schedule(
            Animation::new(100.0, log.progress("a"))
                .warp(Warp::new(|_| panic!("warp failed")))
                .on_complete(log.done("a")),
        )
        .unwrap();

    pulse.fire();

    assert!(log.values("a").is_empty());
    assert_eq!(log.outcomes("a"), vec![Completion::Cancelled]);
    assert_eq!(engine.status(), EngineStatus::Idle);
}

#[test]
fn test_panic_propagates_after_bookkeeping_when_not_isolated() {
    let pulse = Arc::new(ManualPulseSource::new(16.0).unwrap());
    let config = EngineConfig {
        isolate_panics: false,
        ..EngineConfig::default()
    };
    let engine = AnimationEngine::with_config(pulse.clone(), config);
    let log = Log::default();

    engine
        .schedule(Animation::new(100.0, |_| panic!("boom")).on_complete(log.done("bad")))
        .unwrap();
    engine
        .schedule(Animation::new(100.0, log.progress("good")))
        .unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| pulse.fire()));
    assert!(result.is_err());

    assert_eq!(log.outcomes("bad"), vec![Completion::Cancelled]);
    assert_eq!(log.values("good"), vec![0.16]);
    assert_eq!(engine.active_count(), 1);
    assert_eq!(engine.status(), EngineStatus::Running);
    assert_eq!(pulse.pending_frames(), 1);
}

/// A panicking completion hook doesn't cost other animations theirs
#[test]
fn test_panicking_completion_hook_is_isolated() {
    let (pulse, engine, log) = setup();
    engine
        .schedule(Animation::new(1.0, log.progress("bad")).on_complete(|_| panic!("hook failed")))
        .unwrap();
    engine
        .schedule(Animation::new(1.0, log.progress("good")).on_complete(log.done("good")))
        .unwrap();
    engine
        .schedule(Animation::new(100.0, log.progress("later")).on_complete(log.done("later")))
        .unwrap();

    assert_eq!(pulse.fire(), Some(16.0));

    assert_eq!(log.values("bad"), vec![1.0]);
    assert_eq!(log.outcomes("good"), vec![Completion::Completed]);
    assert_eq!(log.values("later"), vec![0.16]);
    assert_eq!(engine.active_count(), 1);
    assert_eq!(pulse.pending_frames(), 1);
}

#[test]
fn test_panicking_completion_hook_on_drop_is_isolated() {
    let (pulse, engine, log) = setup();
    engine
        .schedule(Animation::new(100.0, |_| {}).on_complete(|_| panic!("hook failed")))
        .unwrap();
    engine
        .schedule(Animation::new(100.0, log.progress("b")).on_complete(log.done("b")))
        .unwrap();

    drop(engine);

    assert_eq!(log.outcomes("b"), vec![Completion::Cancelled]);
    assert_eq!(pulse.pending_frames(), 0);
}

/// A cancel from another thread waits for the tick in flight, and no
/// progress follows the cancellation
#[test]
fn test_cross_thread_cancel_waits_for_running_tick() {
    let (pulse, engine, log) = setup();
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);

    let id = engine
        .schedule(
            Animation::new(100.0, log.progress("a"))
                .warp(Warp::new(move |t| {
                    entered_tx.lock().unwrap().send(()).unwrap();
                    release_rx.lock().unwrap().recv().unwrap();
                    t
                }))
                .on_complete(log.done("a")),
        )
        .unwrap();

    let firing = {
        let pulse = pulse.clone();
        thread::spawn(move || pulse.fire())
    };
    entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

    let cancelling = {
        let handle = engine.handle();
        thread::spawn(move || handle.cancel(id))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(log.events().is_empty());

    release_tx.send(()).unwrap();
    assert_eq!(firing.join().unwrap(), Some(16.0));
    assert!(cancelling.join().unwrap());

    assert_eq!(
        log.events(),
        vec![
            Event::Progress("a", 0.16),
            Event::Done("a", Completion::Cancelled)
        ]
    );
    assert_eq!(engine.status(), EngineStatus::Idle);
    assert_eq!(pulse.pending_frames(), 0);
}

#[test]
fn test_dropping_engine_cancels_remaining_animations() {
    let (pulse, engine, log) = setup();
    engine
        .schedule(Animation::new(100.0, log.progress("a")).on_complete(log.done("a")))
        .unwrap();
    engine
        .schedule(Animation::new(200.0, log.progress("b")).on_complete(log.done("b")))
        .unwrap();
    pulse.fire();

    drop(engine);

    assert_eq!(log.outcomes("a"), vec![Completion::Cancelled]);
    assert_eq!(log.outcomes("b"), vec![Completion::Cancelled]);
    assert_eq!(pulse.pending_frames(), 0);
}

#[test]
fn test_engine_restarts_after_going_idle() {
    let (pulse, engine, log) = setup();
    engine
        .schedule(Animation::new(16.0, log.progress("a")))
        .unwrap();
    pulse.run_until_idle(10);
    assert_eq!(engine.status(), EngineStatus::Idle);

    pulse.advance(500.0);
    engine
        .schedule(Animation::new(32.0, log.progress("b")))
        .unwrap();
    assert_eq!(engine.status(), EngineStatus::Running);

    // Clock is past last pulse + interval, so the next pulse is immediate
    assert_eq!(pulse.fire(), Some(516.0));
    assert_eq!(log.values("b"), vec![0.0]);
    pulse.run_until_idle(10);
    assert_eq!(log.values("b"), vec![0.0, 0.5, 1.0]);
}
