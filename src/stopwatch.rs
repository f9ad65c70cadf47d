use std::sync::{Mutex, MutexGuard, PoisonError};

use timer_core::{sync_progress, LapRecord};

use crate::engine::TimerEngine;
use crate::observer::TimerObserver;

/// What the front end last heard from the engine, plus the laps it owns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopwatchState {
    pub elapsed_ms: u64,
    pub running: bool,
    pub paused: bool,
    pub laps: LapRecord,
    pub sync_progress: u8,
}

/// Caller-side stopwatch model. Register it with the engine to keep the
/// display fields current; button presses go through the `press_*` methods.
pub struct StopwatchView {
    state: Mutex<StopwatchState>,
    sync_ceiling_ms: u64,
}

impl StopwatchView {
    pub fn new(sync_ceiling_ms: u64) -> Self {
        Self {
            state: Mutex::new(StopwatchState::default()),
            sync_ceiling_ms,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StopwatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StopwatchState {
        self.lock().clone()
    }

    /// Fresh start after a full stop drops the previous laps.
    pub fn press_start(&self, engine: &TimerEngine) {
        if !engine.is_running() && !engine.is_paused() {
            self.lock().laps.clear();
        }
        engine.start();
    }

    pub fn press_pause(&self, engine: &TimerEngine) {
        if engine.is_paused() {
            engine.start();
        } else {
            engine.pause();
        }
    }

    pub fn press_stop(&self, engine: &TimerEngine) {
        engine.stop();
        self.lock().laps.clear();
    }

    /// Returns the new split, or `None` when nothing has elapsed yet.
    pub fn press_lap(&self, engine: &TimerEngine) -> Option<u64> {
        let elapsed = engine.current_elapsed();
        self.lock().laps.record(elapsed)
    }
}

impl TimerObserver for StopwatchView {
    fn on_tick(&self, elapsed_ms: u64) {
        let mut state = self.lock();
        state.elapsed_ms = elapsed_ms;
        state.sync_progress = sync_progress(elapsed_ms, self.sync_ceiling_ms);
    }

    fn on_state_changed(&self, running: bool, paused: bool) {
        let mut state = self.lock();
        state.running = running;
        state.paused = paused;
        if !running && !paused {
            state.elapsed_ms = 0;
            state.sync_progress = 0;
            state.laps.clear();
        }
    }
}
