//! Pure stopwatch arithmetic with no platform dependencies.
//! Every time value is a millisecond reading from a monotonic source,
//! passed in by the caller so the logic is testable on host.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Phase {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Authoritative stopwatch state.
///
/// Elapsed time is always derived from two timestamps and the phase, never
/// accumulated tick by tick. Resuming shifts `start_ms` forward by the length
/// of the pause so the paused interval is not counted.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimerCore {
    phase: Phase,
    start_ms: u64,
    paused_at_ms: u64,
}

impl TimerCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    /// Starts from zero or resumes from a pause. Returns `false` when
    /// already running.
    pub fn start(&mut self, now_ms: u64) -> bool {
        match self.phase {
            Phase::Running => return false,
            Phase::Stopped => {
                self.start_ms = now_ms;
            }
            Phase::Paused => {
                let pause_duration = now_ms.saturating_sub(self.paused_at_ms);
                self.start_ms = self.start_ms.saturating_add(pause_duration);
                self.paused_at_ms = 0;
            }
        }
        self.phase = Phase::Running;
        true
    }

    /// Returns `false` unless the timer was running.
    pub fn pause(&mut self, now_ms: u64) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        // A clock that stepped backwards must not make elapsed negative
        self.paused_at_ms = now_ms.max(self.start_ms);
        self.phase = Phase::Paused;
        true
    }

    /// Resets to `Stopped`. Returns `false` when it was already stopped.
    pub fn stop(&mut self) -> bool {
        let changed = self.phase != Phase::Stopped;
        self.phase = Phase::Stopped;
        self.start_ms = 0;
        self.paused_at_ms = 0;
        changed
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        match self.phase {
            Phase::Stopped => 0,
            Phase::Paused => self.paused_at_ms.saturating_sub(self.start_ms),
            Phase::Running => now_ms.saturating_sub(self.start_ms),
        }
    }
}

/// Split durations between consecutive lap presses.
///
/// Owned by the caller, never by the engine. Boundaries are elapsed readings
/// taken at each press.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LapRecord {
    laps: Vec<u64>,
    last_boundary_ms: u64,
}

impl LapRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the split ending at `elapsed_ms` and returns it. A press at
    /// zero elapsed is ignored.
    pub fn record(&mut self, elapsed_ms: u64) -> Option<u64> {
        if elapsed_ms == 0 {
            return None;
        }
        let split = elapsed_ms.saturating_sub(self.last_boundary_ms);
        self.laps.push(split);
        self.last_boundary_ms = elapsed_ms;
        Some(split)
    }

    pub fn clear(&mut self) {
        self.laps.clear();
        self.last_boundary_ms = 0;
    }

    pub fn laps(&self) -> &[u64] {
        &self.laps
    }

    pub fn len(&self) -> usize {
        self.laps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    pub fn last_boundary_ms(&self) -> u64 {
        self.last_boundary_ms
    }
}

/// Percentage of `ceiling_ms` covered by `elapsed_ms`, clamped to 0..=100.
/// A zero ceiling reports no progress.
pub fn sync_progress(elapsed_ms: u64, ceiling_ms: u64) -> u8 {
    if ceiling_ms == 0 {
        return 0;
    }
    let pct = (u128::from(elapsed_ms) * 100) / u128::from(ceiling_ms);
    pct.min(100) as u8
}

/// Format milliseconds as "HH:MM:SS.cs" (centiseconds)
pub fn format_hms_cs(ms: u64) -> String {
    let total_secs = ms / 1000;
    let cs = (ms % 1000) / 10;
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}:{:02}.{:02}", h, m, s, cs)
}

/// Format milliseconds as "MM:SS.cs", switching to "HH:MM:SS.cs" from one hour
pub fn format_stopwatch(ms: u64) -> String {
    if ms >= 3_600_000 {
        return format_hms_cs(ms);
    }
    let total_secs = ms / 1000;
    let cs = (ms % 1000) / 10;
    let m = total_secs / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}.{:02}", m, s, cs)
}
