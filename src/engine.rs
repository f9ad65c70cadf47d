//! The stopwatch engine.
//!
//! A dedicated worker thread owns every write to [`TimerCore`]. Callers push
//! commands into its channel and never block. While running, the worker
//! wakes on a fixed interval to publish a tick; the phase is checked when the
//! tick fires, so a pause or stop cuts the tick stream immediately.
//! Notifications are posted to the presentation queue and reach observers
//! there, never on the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use timer_core::{Phase, TimerCore};

use crate::clock::{MonotonicClock, TimeSource};
use crate::dispatch::UiHandle;
use crate::error::{Result, StopwatchError};
use crate::observer::{ObserverId, ObserverRegistry, TimerObserver};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between tick notifications while running.
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Pause,
    Stop,
    /// Deliver the current snapshot to a newly registered observer.
    Greet(ObserverId),
    Shutdown,
}

fn lock(core: &Mutex<TimerCore>) -> MutexGuard<'_, TimerCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running stopwatch engine.
///
/// Commands issued after [`shutdown`](Self::shutdown) are ignored and
/// queries keep answering from the last state the worker left behind.
pub struct TimerEngine {
    commands: Sender<Command>,
    core: Arc<Mutex<TimerCore>>,
    clock: Arc<dyn TimeSource>,
    registry: Arc<ObserverRegistry>,
    alive: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimerEngine {
    /// Spawns an engine on the monotonic clock with the default tick rate.
    pub fn spawn(ui: UiHandle) -> Result<Self> {
        Self::with_config(ui, Arc::new(MonotonicClock::new()), EngineConfig::default())
    }

    pub fn with_config(
        ui: UiHandle,
        clock: Arc<dyn TimeSource>,
        config: EngineConfig,
    ) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let core = Arc::new(Mutex::new(TimerCore::new()));
        let registry = Arc::new(ObserverRegistry::new());

        let worker = Worker {
            commands: rx,
            core: Arc::clone(&core),
            clock: Arc::clone(&clock),
            registry: Arc::clone(&registry),
            ui,
            tick_interval: config.tick_interval.max(Duration::from_millis(1)),
        };
        let handle = thread::Builder::new()
            .name("stopwatch-engine".to_string())
            .spawn(move || worker.run())
            .map_err(|source| StopwatchError::Spawn {
                name: "engine",
                source,
            })?;

        Ok(Self {
            commands: tx,
            core,
            clock,
            registry,
            alive: AtomicBool::new(true),
            worker: Mutex::new(Some(handle)),
        })
    }

    fn send(&self, command: Command) {
        if !self.alive.load(Ordering::Acquire) {
            log::trace!("engine torn down, ignoring {:?}", command);
            return;
        }
        if let Err(err) = self.commands.send(command) {
            log::trace!("engine worker gone, dropping {:?}", err.into_inner());
        }
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn current_elapsed(&self) -> u64 {
        let core = lock(&self.core);
        core.elapsed_ms(self.clock.now_ms())
    }

    pub fn phase(&self) -> Phase {
        lock(&self.core).phase()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.core).is_running()
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.core).is_paused()
    }

    /// Adds `observer` and queues a snapshot of the current elapsed time and
    /// phase for it alone. The snapshot is the first notification it
    /// receives; regular ticks and transitions follow. Returns `None` once
    /// torn down.
    pub fn register_observer<O>(&self, observer: &Arc<O>) -> Option<ObserverId>
    where
        O: TimerObserver + 'static,
    {
        if !self.alive.load(Ordering::Acquire) {
            log::debug!("engine torn down, observer not registered");
            return None;
        }
        let id = self.registry.register_pending(observer);
        self.send(Command::Greet(id));
        Some(id)
    }

    pub fn unregister_observer(&self, id: ObserverId) {
        if !self.registry.unregister(id) {
            log::trace!("observer {:?} was not registered", id);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.registry.len()
    }

    /// Halts the tick source, joins the worker and drops every observer
    /// reference. Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        // The worker may already be gone; nothing to report then.
        let _ = self.commands.send(Command::Shutdown);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("stopwatch engine worker panicked");
            }
        }
        self.registry.clear();
        log::info!("stopwatch engine shut down");
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    commands: Receiver<Command>,
    core: Arc<Mutex<TimerCore>>,
    clock: Arc<dyn TimeSource>,
    registry: Arc<ObserverRegistry>,
    ui: UiHandle,
    tick_interval: Duration,
}

impl Worker {
    fn run(self) {
        log::info!(
            "stopwatch engine started, tick every {:?}",
            self.tick_interval
        );
        let mut next_tick: Option<Instant> = None;

        loop {
            // Block-wait when idle, wake for the next tick when running
            let received = match next_tick {
                Some(deadline) => match self.commands.recv_deadline(deadline) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };

            next_tick = match received {
                None => self.tick(next_tick),
                Some(Command::Shutdown) => break,
                Some(command) => self.handle(command, next_tick),
            };
        }

        log::info!("stopwatch engine stopped");
    }

    fn handle(&self, command: Command, next_tick: Option<Instant>) -> Option<Instant> {
        match command {
            Command::Start => {
                let changed = lock(&self.core).start(self.clock.now_ms());
                if changed {
                    log::debug!("stopwatch running");
                    self.post_state(true, false);
                    // first tick fires right away
                    return Some(Instant::now());
                }
                next_tick
            }
            Command::Pause => {
                let changed = lock(&self.core).pause(self.clock.now_ms());
                if changed {
                    log::debug!("stopwatch paused");
                    self.post_state(false, true);
                    return None;
                }
                next_tick
            }
            Command::Stop => {
                if lock(&self.core).stop() {
                    log::debug!("stopwatch stopped");
                    self.post_state(false, false);
                } else {
                    log::trace!("stop while already stopped");
                }
                None
            }
            Command::Greet(id) => {
                // Activated here so no fan-out captured earlier can reach it
                if self.registry.activate(id) {
                    self.post_snapshot(id);
                } else {
                    log::trace!("observer {:?} left before its snapshot", id);
                }
                next_tick
            }
            Command::Shutdown => None,
        }
    }

    fn tick(&self, fired: Option<Instant>) -> Option<Instant> {
        let (running, elapsed) = {
            let core = lock(&self.core);
            (core.is_running(), core.elapsed_ms(self.clock.now_ms()))
        };
        if !running {
            return None;
        }
        log::trace!("tick {} ms", elapsed);
        let members = self.registry.members();
        let registry = Arc::clone(&self.registry);
        self.post(move || registry.deliver(&members, |o| o.on_tick(elapsed)));

        let now = Instant::now();
        // Skip missed ticks instead of bursting to catch up
        let next = fired
            .unwrap_or(now)
            .checked_add(self.tick_interval)
            .filter(|next| *next > now)
            .or_else(|| now.checked_add(self.tick_interval));
        if next.is_none() {
            log::debug!(
                "tick interval {:?} out of range, no further ticks",
                self.tick_interval
            );
        }
        next
    }

    fn post_state(&self, running: bool, paused: bool) {
        let members = self.registry.members();
        let registry = Arc::clone(&self.registry);
        self.post(move || registry.deliver(&members, |o| o.on_state_changed(running, paused)));
    }

    fn post_snapshot(&self, id: ObserverId) {
        let (elapsed, running, paused) = {
            let core = lock(&self.core);
            (
                core.elapsed_ms(self.clock.now_ms()),
                core.is_running(),
                core.is_paused(),
            )
        };
        let registry = Arc::clone(&self.registry);
        self.post(move || {
            if let Some(observer) = registry.get(id) {
                observer.on_tick(elapsed);
                observer.on_state_changed(running, paused);
            }
        });
    }

    fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.ui.post(job) {
            log::trace!("presentation loop gone, notification dropped");
        }
    }
}
