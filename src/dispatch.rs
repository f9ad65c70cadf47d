//! Presentation execution context.
//!
//! Observer callbacks never run on the engine thread. The engine posts jobs
//! into a FIFO queue and whoever owns the [`UiLoop`] drains it, either from
//! its own event loop or on a dedicated thread via [`UiLoop::spawn`].

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::error::{Result, StopwatchError};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Posting side of the presentation queue. Cheap to clone.
#[derive(Clone)]
pub struct UiHandle {
    tx: Sender<Job>,
}

impl UiHandle {
    /// Queues `job` behind everything already posted. Returns `false` when
    /// the loop has been dropped.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(job)).is_ok()
    }
}

/// Draining side of the presentation queue.
pub struct UiLoop {
    rx: Receiver<Job>,
}

/// Creates a connected poster/drainer pair.
pub fn ui_context() -> (UiHandle, UiLoop) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (UiHandle { tx }, UiLoop { rx })
}

impl UiLoop {
    /// Runs every job queued right now without waiting for more.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Runs jobs as they arrive until `duration` has passed.
    pub fn run_for(&self, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut ran = 0;
        loop {
            match self.rx.recv_deadline(deadline) {
                Ok(job) => {
                    job();
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        ran
    }

    /// Blocks running jobs until every [`UiHandle`] is gone.
    pub fn run(self) {
        for job in self.rx.iter() {
            job();
        }
        log::debug!("presentation loop drained");
    }

    pub fn spawn(self, name: &str) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || self.run())
            .map_err(|source| StopwatchError::Spawn {
                name: "presentation",
                source,
            })
    }
}
