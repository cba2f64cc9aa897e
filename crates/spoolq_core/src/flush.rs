//! Periodic background flush worker.

use crate::error::QueueResult;
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs a flush task on a dedicated thread at a fixed interval.
///
/// The worker waits on exactly two events: the next tick and cancellation.
/// A task error stops the worker for good; it is logged, never returned.
/// Stopping is idempotent and only ever performed under the worker's own
/// lock, which is separate from anything the task itself locks.
#[derive(Debug, Default)]
pub(crate) struct FlushWorker {
    state: Arc<Mutex<WorkerState>>,
}

#[derive(Debug, Default)]
struct WorkerState {
    active: bool,
    /// Bumped on every start so a dying thread cannot stop its successor.
    generation: u64,
    /// Dropping the sender disconnects the channel and wakes the thread.
    quit: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerState {
    fn stop(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.quit = None;
        true
    }
}

impl FlushWorker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns true while the worker thread is scheduled to keep running.
    pub(crate) fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Starts the worker unless one is already active.
    ///
    /// A handle left behind by a worker that stopped itself is joined
    /// before the new thread is spawned. The join happens without the state
    /// lock held, since the exiting thread may still need it.
    pub(crate) fn start<F>(&self, interval: Duration, task: F) -> QueueResult<()>
    where
        F: FnMut() -> QueueResult<()> + Send + 'static,
    {
        let leftover = {
            let mut state = self.state.lock();
            if state.active {
                return Ok(());
            }
            state.handle.take()
        };
        if let Some(handle) = leftover {
            join(handle);
        }

        let mut state = self.state.lock();
        if state.active {
            return Ok(());
        }

        let (quit_tx, quit_rx) = channel::bounded::<()>(0);
        let generation = state.generation.wrapping_add(1);
        let shared = Arc::clone(&self.state);

        let handle = thread::Builder::new()
            .name("spoolq-flush".to_string())
            .spawn(move || run(interval, quit_rx, task, shared, generation))?;

        state.active = true;
        state.generation = generation;
        state.quit = Some(quit_tx);
        state.handle = Some(handle);
        debug!(interval_ms = interval.as_millis() as u64, "flush worker started");
        Ok(())
    }

    /// Stops the worker and waits for an in-flight flush to finish.
    ///
    /// Called from the worker thread itself this only signals, since a
    /// thread cannot join itself.
    pub(crate) fn shutdown(&self) {
        let handle = {
            let mut state = self.state.lock();
            if state.stop() {
                debug!("flush worker stopped");
            }
            state.handle.take()
        };

        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            join(handle);
        }
    }
}

fn join(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!("flush worker panicked");
    }
}

fn run<F>(
    interval: Duration,
    quit: Receiver<()>,
    mut task: F,
    state: Arc<Mutex<WorkerState>>,
    generation: u64,
) where
    F: FnMut() -> QueueResult<()>,
{
    let ticker: Receiver<Instant> = channel::tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => {
                if let Err(err) = task() {
                    warn!(error = %err, "background flush failed, stopping flush worker");
                    let mut state = state.lock();
                    if state.generation == generation {
                        state.stop();
                    }
                    return;
                }
            }
            recv(quit) -> _ => return,
        }
    }
}
