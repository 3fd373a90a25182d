//! Suspendable background loop thread
//!
//! A dedicated thread repeatedly runs an iteration closure. The thread can
//! be parked between iterations (suspended) and stopped for good. Neither
//! suspending nor stopping interrupts an iteration that is already running;
//! an iteration blocked in a long call has to be woken by its own means.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Lifecycle state of a background worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Parked before the next iteration
    Suspended,
    /// Running iterations back to back
    Running,
    /// Terminal; the thread exits (or has exited)
    Stopped,
}

struct Shared<E> {
    state: Mutex<WorkerState>,
    wakeup: Condvar,
    failure: Mutex<Option<E>>,
}

/// Dedicated thread running an iteration closure until stopped
///
/// An iteration returning `Err` stops the worker; the error is kept for
/// [`take_failure`](Self::take_failure). Dropping the worker stops and
/// joins the thread.
pub struct BackgroundWorker<E> {
    shared: Arc<Shared<E>>,
    thread: Option<JoinHandle<()>>,
}

impl<E> BackgroundWorker<E>
where
    E: fmt::Display + Send + 'static,
{
    /// Spawn the worker thread
    ///
    /// With `start_suspended` the first iteration only runs after
    /// [`unsuspend`](Self::unsuspend).
    pub fn spawn<F>(name: &str, start_suspended: bool, iteration: F) -> io::Result<Self>
    where
        F: FnMut() -> Result<(), E> + Send + 'static,
    {
        let initial = if start_suspended {
            WorkerState::Suspended
        } else {
            WorkerState::Running
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(initial),
            wakeup: Condvar::new(),
            failure: Mutex::new(None),
        });

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(thread_shared, iteration))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Park the thread before its next iteration
    pub fn suspend(&self) {
        let mut state = self.shared.state.lock();
        if *state == WorkerState::Running {
            *state = WorkerState::Suspended;
        }
    }

    /// Resume iterating; wakes a parked thread
    pub fn unsuspend(&self) {
        let mut state = self.shared.state.lock();
        if *state == WorkerState::Suspended {
            *state = WorkerState::Running;
        }
        self.shared.wakeup.notify_all();
    }

    /// Mark the worker stopped; takes effect between iterations
    pub fn stop(&self) {
        *self.shared.state.lock() = WorkerState::Stopped;
        self.shared.wakeup.notify_all();
    }

    /// Wait for the thread to exit
    ///
    /// Unsuspends first so a parked thread can observe a stop. Without a
    /// prior `stop` this blocks until an iteration fails.
    pub fn join(&mut self) {
        self.unsuspend();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("background worker thread panicked");
                *self.shared.state.lock() = WorkerState::Stopped;
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state.lock()
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == WorkerState::Suspended
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == WorkerState::Stopped
    }

    /// True until the thread has been joined
    pub fn is_joinable(&self) -> bool {
        self.thread.is_some()
    }

    /// Error that stopped the worker, if any
    pub fn take_failure(&self) -> Option<E> {
        self.shared.failure.lock().take()
    }
}

impl<E> Drop for BackgroundWorker<E> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            *state = WorkerState::Stopped;
            self.shared.wakeup.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("background worker thread panicked");
            }
        }
    }
}

fn run<E, F>(shared: Arc<Shared<E>>, mut iteration: F)
where
    E: fmt::Display,
    F: FnMut() -> Result<(), E>,
{
    loop {
        {
            let mut state = shared.state.lock();
            while *state == WorkerState::Suspended {
                shared.wakeup.wait(&mut state);
            }
            if *state == WorkerState::Stopped {
                break;
            }
        }

        if let Err(e) = iteration() {
            error!("background worker stopping: {}", e);
            *shared.failure.lock() = Some(e);
            *shared.state.lock() = WorkerState::Stopped;
            break;
        }
    }

    debug!("background worker exited");
}
