use std::fmt::Write;

use timer_core::format_stopwatch;

use crate::stopwatch::StopwatchState;

pub const HELP_TEXT: &str = "STOPWATCH HELP\n\n\
     Enter  Start/Pause\n\
     s      Start\n\
     p      Pause/Resume\n\
     x      Stop\n\
     l      Record lap\n\
     v      Show laps\n\
     h      Help\n\
     q      Quit";

const MAX_VISIBLE_LAPS: usize = 10;

/// Which controls a front end should offer for a phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Controls {
    pub start: bool,
    pub stop: bool,
    pub pause: bool,
    pub lap: bool,
    /// Label for the pause button: "Resume" while paused.
    pub pause_label: &'static str,
}

impl Controls {
    pub fn from_flags(running: bool, paused: bool) -> Self {
        Self {
            start: !running || paused,
            stop: running || paused,
            pause: running || paused,
            lap: running && !paused,
            pause_label: if paused { "Resume" } else { "Pause" },
        }
    }

    pub fn footer(&self) -> String {
        let mut keys = Vec::new();
        if self.start {
            keys.push("s=start".to_string());
        }
        if self.pause {
            keys.push(format!("p={}", self.pause_label.to_lowercase()));
        }
        if self.stop {
            keys.push("x=stop".to_string());
        }
        if self.lap {
            keys.push("l=lap".to_string());
        }
        keys.push("q=quit".to_string());
        keys.join("  ")
    }
}

pub fn status_label(running: bool, paused: bool) -> &'static str {
    match (running, paused) {
        (true, _) => "RUNNING",
        (false, true) => "PAUSED",
        (false, false) => "STOPPED",
    }
}

/// Single status line, redrawn in place on every tick.
pub fn draw_time_line(state: &StopwatchState) -> String {
    format!(
        "\r  {}  [{:>3}%]  {:<7}",
        format_stopwatch(state.elapsed_ms),
        state.sync_progress,
        status_label(state.running, state.paused)
    )
}

/// Lap list, most recent first.
pub fn draw_laps(state: &StopwatchState) -> String {
    let laps = state.laps.laps();
    if laps.is_empty() {
        return "No laps".to_string();
    }
    let mut out = String::from("LAPS\n");
    for (idx, lap) in laps.iter().enumerate().rev().take(MAX_VISIBLE_LAPS) {
        // writing to a String cannot fail
        let _ = writeln!(out, "Lap {:2}: {}", idx + 1, format_stopwatch(*lap));
    }
    out
}
