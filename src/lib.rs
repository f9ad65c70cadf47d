//! Stopwatch engine.
//!
//! A worker thread owns the stopwatch state and serializes start, pause and
//! stop commands; observers hear about ticks and transitions on a separate
//! presentation queue. Lap splits and display helpers are derived by the
//! caller from the engine's elapsed time.

pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod observer;
pub mod settings;
pub mod stopwatch;
pub mod ui;

pub use clock::{ManualClock, MonotonicClock, TimeSource};
pub use dispatch::{ui_context, UiHandle, UiLoop};
pub use engine::{EngineConfig, TimerEngine, DEFAULT_TICK_INTERVAL};
pub use error::StopwatchError;
pub use observer::{Members, ObserverId, ObserverRegistry, TimerObserver};
pub use settings::Settings;
pub use stopwatch::{StopwatchState, StopwatchView};
pub use timer_core::{format_hms_cs, format_stopwatch, sync_progress, LapRecord, Phase, TimerCore};
