// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Loop recording and playback engine.
//!
//! The engine listens on the bus for transport commands and live note
//! events. While recording it captures note events with their offset from
//! the moment recording began. When recording stops it replays the loop
//! forever by arming one one-shot timer per event plus one continuation timer
//! at `cycle_duration + gap` that re-arms the next cycle.
//!
//! Stop and clear cancel every armed timer before the state changes, and each
//! timer re-checks on firing that the playback session it belongs to is
//! still the current one. No engine borrow is ever held while publishing, so
//! handlers may send commands back to the engine from inside its own
//! broadcasts.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::capture::{EventKind, Loop, RecordedEvent};
use super::pending::PendingCallbackSet;
use crate::bus::{EngineState, EventBus, Message, NoteEvent, SubscriptionId, Topic};
use crate::timing::{Clock, Timer};

/// Pause between the last event of a cycle and the start of the next one
pub const DEFAULT_LOOP_GAP: Duration = Duration::from_millis(100);

/// Smallest gap the engine accepts; a zero-length loop with no gap would
/// re-arm itself at the same deadline forever
pub const MIN_LOOP_GAP: Duration = Duration::from_millis(1);

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Recording,
    Playing,
}

/// Mutable engine state, only touched through `Shared::core`
#[derive(Debug, Default)]
struct Core {
    phase: Phase,
    take: Loop,
    /// Clock reading when the current recording began
    recording_started: Duration,
    pending: PendingCallbackSet,
    /// Identifies the current playback session; bumped on every entry to
    /// and exit from `Playing`
    generation: u64,
    gap: Duration,
}

impl Core {
    fn state(&self) -> EngineState {
        EngineState {
            is_recording: self.phase == Phase::Recording,
            is_playing: self.phase == Phase::Playing,
            has_loop: !self.take.is_empty(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.phase == Phase::Playing && self.generation == generation
    }
}

struct Shared {
    core: RefCell<Core>,
    bus: Rc<EventBus>,
    clock: Rc<dyn Clock>,
    timer: Rc<dyn Timer>,
}

impl Shared {
    fn handle(self: &Rc<Self>, message: &Message) {
        match message {
            Message::LoopStart => self.start(),
            Message::LoopStop => self.stop(),
            Message::LoopClear => self.clear(),
            Message::NotePressed(event) => self.record(EventKind::Start, event),
            Message::NoteReleased(event) => self.record(EventKind::Stop, event),
            _ => {}
        }
    }

    fn start(&self) {
        let state = {
            let mut core = self.core.borrow_mut();
            if core.phase != Phase::Idle {
                debug!(phase = ?core.phase, "loop start ignored");
                return;
            }
            core.take.clear();
            core.recording_started = self.clock.now();
            core.phase = Phase::Recording;
            core.state()
        };

        info!("recording started");
        self.broadcast(state);
    }

    fn stop(self: &Rc<Self>) {
        let state = {
            let mut core = self.core.borrow_mut();
            if core.phase != Phase::Recording {
                debug!(phase = ?core.phase, "loop stop ignored");
                return;
            }

            if core.take.is_empty() {
                core.phase = Phase::Idle;
                info!("recording stopped with no events");
            } else {
                core.phase = Phase::Playing;
                core.generation += 1;
                info!(
                    events = core.take.len(),
                    cycle_ms = core.take.cycle_duration().as_millis() as u64,
                    "recording stopped, looping"
                );
                self.arm_cycle(&mut core);
            }
            core.state()
        };

        self.broadcast(state);
    }

    fn clear(&self) {
        let state = {
            let mut core = self.core.borrow_mut();
            core.pending.cancel_all(self.timer.as_ref());
            if core.phase == Phase::Playing {
                core.generation += 1;
            }
            core.phase = Phase::Idle;
            core.take.clear();
            core.state()
        };

        info!("loop cleared");
        self.broadcast(state);
    }

    fn record(&self, kind: EventKind, event: &NoteEvent) {
        let mut core = self.core.borrow_mut();
        if core.phase != Phase::Recording {
            trace!(note = %event.note, "not armed, note ignored");
            return;
        }
        if let Err(e) = event.validate() {
            warn!(error = %e, "dropping malformed note event");
            return;
        }

        let offset = self.clock.now().saturating_sub(core.recording_started);
        debug!(note = %event.note, ?kind, ?offset, "captured");
        core.take.push(RecordedEvent::capture(kind, event, offset));
    }

    /// Arm one timer per recorded event and the continuation timer for the
    /// next cycle
    fn arm_cycle(self: &Rc<Self>, core: &mut Core) {
        let generation = core.generation;
        let restart_after = core.take.cycle_duration() + core.gap;

        for event in core.take.events() {
            let weak = Rc::downgrade(self);
            let message = event.playback_message();
            let handle = self.timer.schedule(
                event.offset,
                Box::new(move || {
                    if let Some(engine) = weak.upgrade() {
                        engine.emit_if_current(generation, &message);
                    }
                }),
            );
            core.pending.arm(handle);
        }

        let weak: Weak<Self> = Rc::downgrade(self);
        let handle = self.timer.schedule(
            restart_after,
            Box::new(move || {
                if let Some(engine) = weak.upgrade() {
                    engine.next_cycle(generation);
                }
            }),
        );
        core.pending.arm(handle);

        trace!(generation, pending = core.pending.len(), ?restart_after, "cycle armed");
    }

    fn next_cycle(self: &Rc<Self>, generation: u64) {
        let mut core = self.core.borrow_mut();
        if !core.is_current(generation) {
            return;
        }
        // Everything from the finished cycle has fired by now
        core.pending.cancel_all(self.timer.as_ref());
        self.arm_cycle(&mut core);
    }

    fn emit_if_current(&self, generation: u64, message: &Message) {
        let live = self.core.borrow().is_current(generation);
        if live {
            self.bus.publish(message);
        }
    }

    fn broadcast(&self, state: EngineState) {
        self.bus.publish(&Message::StateChanged(state));
    }
}

/// The loop recorder, wired to an [`EventBus`].
///
/// Dropping the engine unsubscribes it and cancels any armed playback.
pub struct LoopEngine {
    shared: Rc<Shared>,
    subscriptions: Vec<(Topic, SubscriptionId)>,
}

impl LoopEngine {
    /// Topics the engine consumes
    pub const TOPICS: [Topic; 5] = [
        Topic::LoopStart,
        Topic::LoopStop,
        Topic::LoopClear,
        Topic::NotePressed,
        Topic::NoteReleased,
    ];

    /// Create an engine using [`DEFAULT_LOOP_GAP`] and subscribe it to `bus`
    pub fn new(bus: Rc<EventBus>, clock: Rc<dyn Clock>, timer: Rc<dyn Timer>) -> Self {
        Self::with_gap(bus, clock, timer, DEFAULT_LOOP_GAP)
    }

    /// Create an engine with a custom gap between cycles.
    ///
    /// Gaps below [`MIN_LOOP_GAP`] are raised to it.
    pub fn with_gap(
        bus: Rc<EventBus>,
        clock: Rc<dyn Clock>,
        timer: Rc<dyn Timer>,
        gap: Duration,
    ) -> Self {
        if gap < MIN_LOOP_GAP {
            warn!(?gap, min = ?MIN_LOOP_GAP, "loop gap too small, clamping");
        }
        let gap = gap.max(MIN_LOOP_GAP);

        let shared = Rc::new(Shared {
            core: RefCell::new(Core {
                gap,
                ..Core::default()
            }),
            bus,
            clock,
            timer,
        });

        let subscriptions = Self::TOPICS
            .iter()
            .map(|&topic| {
                let weak = Rc::downgrade(&shared);
                let id = shared.bus.subscribe(topic, move |message| {
                    if let Some(engine) = weak.upgrade() {
                        engine.handle(message);
                    }
                });
                (topic, id)
            })
            .collect();

        Self {
            shared,
            subscriptions,
        }
    }

    /// Begin recording (same as publishing `loop:start`)
    pub fn start(&self) {
        self.shared.start();
    }

    /// Stop recording and loop what was captured (same as `loop:stop`)
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Stop everything and forget the loop (same as `loop:clear`)
    pub fn clear(&self) {
        self.shared.clear();
    }

    /// Current state projection
    pub fn state(&self) -> EngineState {
        self.shared.core.borrow().state()
    }

    pub fn phase(&self) -> Phase {
        self.shared.core.borrow().phase
    }

    /// Copy of the recorded loop
    pub fn recorded_events(&self) -> Vec<RecordedEvent> {
        self.shared.core.borrow().take.events().to_vec()
    }

    /// Largest recorded offset
    pub fn cycle_duration(&self) -> Duration {
        self.shared.core.borrow().take.cycle_duration()
    }

    pub fn gap(&self) -> Duration {
        self.shared.core.borrow().gap
    }

    /// Number of timers armed for the current cycle
    pub fn pending_callbacks(&self) -> usize {
        self.shared.core.borrow().pending.len()
    }
}

impl Drop for LoopEngine {
    fn drop(&mut self) {
        for (topic, id) in self.subscriptions.drain(..) {
            self.shared.bus.unsubscribe(topic, id);
        }
        // Avoid a double borrow if dropped from inside one of our own callbacks
        if let Ok(mut core) = self.shared.core.try_borrow_mut() {
            core.pending.cancel_all(self.shared.timer.as_ref());
            core.phase = Phase::Idle;
        }
    }
}

impl fmt::Debug for LoopEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.borrow();
        f.debug_struct("LoopEngine")
            .field("phase", &core.phase)
            .field("events", &core.take.len())
            .field("pending", &core.pending.len())
            .field("generation", &core.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ManualScheduler;
    use std::cell::RefCell;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    struct Rig {
        bus: Rc<EventBus>,
        scheduler: Rc<ManualScheduler>,
        engine: LoopEngine,
        seen: Rc<RefCell<Vec<(Duration, Message)>>>,
    }

    /// Engine on a manual scheduler, logging every outgoing message with the
    /// virtual time it was published at
    fn rig() -> Rig {
        let bus = Rc::new(EventBus::new());
        let scheduler = Rc::new(ManualScheduler::new());
        let engine = LoopEngine::new(bus.clone(), scheduler.clone(), scheduler.clone());

        let seen = Rc::new(RefCell::new(Vec::new()));
        for topic in [
            Topic::PlaybackNotePressed,
            Topic::PlaybackNoteReleased,
            Topic::StateChanged,
        ] {
            let seen = Rc::clone(&seen);
            let clock = Rc::clone(&scheduler);
            bus.subscribe(topic, move |message| {
                seen.borrow_mut().push((clock.now(), message.clone()));
            });
        }

        Rig {
            bus,
            scheduler,
            engine,
            seen,
        }
    }

    impl Rig {
        fn press(&self, note: &str, frequency: f64) {
            self.bus
                .publish(&Message::NotePressed(NoteEvent::new(note, frequency)));
        }

        fn release(&self, note: &str, frequency: f64) {
            self.bus
                .publish(&Message::NoteReleased(NoteEvent::new(note, frequency)));
        }

        fn states(&self) -> Vec<EngineState> {
            self.seen.borrow().iter().filter_map(|(_, m)| m.state()).collect()
        }

        fn playback(&self) -> Vec<(Duration, Message)> {
            self.seen
                .borrow()
                .iter()
                .filter(|(_, m)| m.state().is_none())
                .cloned()
                .collect()
        }

        /// Record A4 down at 0ms and up at 200ms, stop at 500ms
        fn record_simple_loop(&self) {
            self.bus.publish(&Message::LoopStart);
            self.press("A4", 440.0);
            self.scheduler.advance(ms(200));
            self.release("A4", 440.0);
            self.scheduler.advance(ms(300));
            self.bus.publish(&Message::LoopStop);
        }
    }

    #[test]
    fn test_engine_creation() {
        let rig = rig();
        assert_eq!(rig.engine.phase(), Phase::Idle);
        assert_eq!(rig.engine.state(), EngineState::default());
        assert_eq!(rig.engine.gap(), DEFAULT_LOOP_GAP);
        for topic in LoopEngine::TOPICS {
            assert_eq!(rig.bus.subscriber_count(topic), 1);
        }
    }

    #[test]
    fn test_start_enters_recording() {
        let rig = rig();
        rig.bus.publish(&Message::LoopStart);

        assert_eq!(rig.engine.phase(), Phase::Recording);
        assert_eq!(
            rig.states(),
            vec![EngineState {
                is_recording: true,
                is_playing: false,
                has_loop: false,
            }]
        );
    }

    #[test]
    fn test_notes_ignored_when_idle() {
        let rig = rig();
        rig.press("C4", 261.63);
        rig.release("C4", 261.63);
        assert!(rig.engine.recorded_events().is_empty());
        assert!(rig.states().is_empty());
    }

    #[test]
    fn test_offset_fidelity() {
        let rig = rig();
        rig.record_simple_loop();

        let events = rig.engine.recorded_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Start);
        assert_eq!(events[0].offset, ms(0));
        assert_eq!(events[1].kind, EventKind::Stop);
        assert_eq!(events[1].offset, ms(200));
        assert_eq!(rig.engine.cycle_duration(), ms(200));
    }

    #[test]
    fn test_offsets_relative_to_recording_start() {
        let rig = rig();
        rig.scheduler.advance(ms(1_000));
        rig.bus.publish(&Message::LoopStart);
        rig.scheduler.advance(ms(50));
        rig.press("E4", 329.63);

        assert_eq!(rig.engine.recorded_events()[0].offset, ms(50));
    }

    #[test]
    fn test_idempotent_start() {
        let rig = rig();
        rig.bus.publish(&Message::LoopStart);
        rig.scheduler.advance(ms(100));
        rig.press("C4", 261.63);
        rig.scheduler.advance(ms(100));

        rig.bus.publish(&Message::LoopStart);
        rig.release("C4", 261.63);

        let events = rig.engine.recorded_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].offset, ms(100));
        assert_eq!(events[1].offset, ms(200));
        // Only the first start broadcast
        assert_eq!(rig.states().len(), 1);
    }

    #[test]
    fn test_empty_loop_stop_returns_to_idle() {
        let rig = rig();
        rig.bus.publish(&Message::LoopStart);
        rig.bus.publish(&Message::LoopStop);

        assert_eq!(rig.engine.phase(), Phase::Idle);
        assert_eq!(rig.states().last().copied(), Some(EngineState::default()));
        assert_eq!(rig.scheduler.pending(), 0);
    }

    #[test]
    fn test_stop_when_idle_is_ignored() {
        let rig = rig();
        rig.bus.publish(&Message::LoopStop);
        assert_eq!(rig.engine.phase(), Phase::Idle);
        assert!(rig.states().is_empty());
    }

    #[test]
    fn test_stop_begins_playback() {
        let rig = rig();
        rig.record_simple_loop();

        assert_eq!(rig.engine.phase(), Phase::Playing);
        assert_eq!(
            rig.states().last().copied(),
            Some(EngineState {
                is_recording: false,
                is_playing: true,
                has_loop: true,
            })
        );
        // Two events plus the continuation
        assert_eq!(rig.engine.pending_callbacks(), 3);
    }

    #[test]
    fn test_cycle_repetition() {
        let rig = rig();
        rig.record_simple_loop();
        let t = rig.scheduler.now();

        rig.scheduler.advance(ms(1_000));

        let pressed = Message::PlaybackNotePressed(NoteEvent::new("A4", 440.0));
        let released = Message::PlaybackNoteReleased(NoteEvent::new("A4", 440.0));
        let playback = rig.playback();

        // Cycle length is 200ms + 100ms gap
        assert_eq!(
            playback,
            vec![
                (t, pressed.clone()),
                (t + ms(200), released.clone()),
                (t + ms(300), pressed.clone()),
                (t + ms(500), released.clone()),
                (t + ms(600), pressed.clone()),
                (t + ms(800), released.clone()),
                (t + ms(900), pressed),
            ]
        );
    }

    #[test]
    fn test_start_while_playing_is_ignored() {
        let rig = rig();
        rig.record_simple_loop();
        let broadcasts = rig.states().len();

        rig.bus.publish(&Message::LoopStart);
        assert_eq!(rig.engine.phase(), Phase::Playing);
        assert_eq!(rig.engine.recorded_events().len(), 2);
        assert_eq!(rig.states().len(), broadcasts);
    }

    #[test]
    fn test_live_notes_not_recorded_while_playing() {
        let rig = rig();
        rig.record_simple_loop();
        rig.press("B4", 493.88);
        assert_eq!(rig.engine.recorded_events().len(), 2);
    }

    #[test]
    fn test_clear_cancels_playback() {
        let rig = rig();
        rig.record_simple_loop();
        rig.scheduler.advance(ms(250));
        let before = rig.playback().len();

        rig.bus.publish(&Message::LoopClear);
        assert_eq!(rig.scheduler.pending(), 0);
        assert_eq!(rig.engine.pending_callbacks(), 0);

        rig.scheduler.advance(ms(5_000));
        assert_eq!(rig.playback().len(), before);
        assert_eq!(rig.states().last().copied(), Some(EngineState::default()));
        assert!(rig.engine.recorded_events().is_empty());
    }

    #[test]
    fn test_clear_while_recording() {
        let rig = rig();
        rig.bus.publish(&Message::LoopStart);
        rig.press("D4", 293.66);

        rig.bus.publish(&Message::LoopClear);

        assert_eq!(rig.engine.phase(), Phase::Idle);
        assert!(rig.engine.recorded_events().is_empty());

        // No longer armed
        rig.press("D4", 293.66);
        assert!(rig.engine.recorded_events().is_empty());
    }

    #[test]
    fn test_clear_when_idle_still_broadcasts() {
        let rig = rig();
        rig.bus.publish(&Message::LoopClear);
        assert_eq!(rig.states(), vec![EngineState::default()]);
    }

    #[test]
    fn test_malformed_events_dropped() {
        let rig = rig();
        rig.bus.publish(&Message::LoopStart);
        rig.press("", 440.0);
        rig.press("A4", 0.0);
        rig.press("A4", f64::NAN);
        rig.press("A4", 440.0);

        let events = rig.engine.recorded_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].note, "A4");
    }

    #[test]
    fn test_simultaneous_events_both_fire() {
        let rig = rig();
        rig.bus.publish(&Message::LoopStart);
        rig.press("C4", 261.63);
        rig.press("E4", 329.63);
        rig.scheduler.advance(ms(100));
        rig.release("C4", 261.63);
        rig.release("E4", 329.63);
        rig.bus.publish(&Message::LoopStop);

        rig.scheduler.advance(ms(150));
        assert_eq!(rig.playback().len(), 4);
    }

    #[test]
    fn test_reentrant_clear_from_state_handler() {
        let rig = rig();
        let bus = Rc::downgrade(&rig.bus);
        rig.bus.subscribe(Topic::StateChanged, move |message| {
            if message.state().map_or(false, |s| s.is_playing) {
                if let Some(bus) = bus.upgrade() {
                    bus.publish(&Message::LoopClear);
                }
            }
        });

        rig.record_simple_loop();

        assert_eq!(rig.engine.phase(), Phase::Idle);
        assert_eq!(rig.scheduler.pending(), 0);
        rig.scheduler.advance(ms(2_000));
        assert!(rig.playback().is_empty());
    }

    #[test]
    fn test_new_recording_replaces_loop() {
        let rig = rig();
        rig.record_simple_loop();
        rig.bus.publish(&Message::LoopClear);

        rig.bus.publish(&Message::LoopStart);
        rig.press("G5", 783.99);
        rig.scheduler.advance(ms(80));
        rig.release("G5", 783.99);
        rig.bus.publish(&Message::LoopStop);

        let events = rig.engine.recorded_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.note == "G5"));
        assert_eq!(rig.engine.cycle_duration(), ms(80));
    }

    #[test]
    fn test_custom_gap() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Rc::new(ManualScheduler::new());
        let engine =
            LoopEngine::with_gap(bus.clone(), scheduler.clone(), scheduler.clone(), ms(400));
        assert_eq!(engine.gap(), ms(400));

        let presses = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&presses);
        let clock = Rc::clone(&scheduler);
        bus.subscribe(Topic::PlaybackNotePressed, move |_| {
            log.borrow_mut().push(clock.now())
        });

        engine.start();
        bus.publish(&Message::NotePressed(NoteEvent::new("F4", 349.23)));
        scheduler.advance(ms(100));
        bus.publish(&Message::NoteReleased(NoteEvent::new("F4", 349.23)));
        engine.stop();

        let t = scheduler.now();
        scheduler.advance(ms(1_000));
        assert_eq!(*presses.borrow(), vec![t, t + ms(500), t + ms(1_000)]);
    }

    #[test]
    fn test_zero_gap_is_clamped() {
        let bus = Rc::new(EventBus::new());
        let scheduler = Rc::new(ManualScheduler::new());
        let engine =
            LoopEngine::with_gap(bus.clone(), scheduler.clone(), scheduler.clone(), Duration::ZERO);
        assert_eq!(engine.gap(), MIN_LOOP_GAP);

        let presses = Rc::new(RefCell::new(0u32));
        let count = Rc::clone(&presses);
        bus.subscribe(Topic::PlaybackNotePressed, move |_| *count.borrow_mut() += 1);

        // Press and release in the same tick: a zero-length loop
        engine.start();
        bus.publish(&Message::NotePressed(NoteEvent::new("A4", 440.0)));
        bus.publish(&Message::NoteReleased(NoteEvent::new("A4", 440.0)));
        engine.stop();
        assert_eq!(engine.cycle_duration(), Duration::ZERO);

        // One cycle per millisecond, fired at 0..=10ms
        scheduler.advance(ms(10));
        assert_eq!(*presses.borrow(), 11);

        engine.clear();
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_drop_unsubscribes_and_cancels() {
        let rig = rig();
        rig.record_simple_loop();
        let Rig {
            bus,
            scheduler,
            engine,
            seen,
        } = rig;

        drop(engine);
        for topic in LoopEngine::TOPICS {
            assert_eq!(bus.subscriber_count(topic), 0);
        }
        assert_eq!(scheduler.pending(), 0);

        let before = seen.borrow().len();
        scheduler.advance(ms(1_000));
        assert_eq!(seen.borrow().len(), before);
    }
}
