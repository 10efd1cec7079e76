//! Worker pool for settlement listeners

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{BatchJobError, BatchResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How a dispatcher shutdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ShutdownOutcome {
    /// Every queued job ran and all workers exited within the grace period
    Graceful,
    /// Grace period elapsed; remaining queued jobs were discarded and workers exited
    Forced,
    /// Workers were still busy after forced cancellation and were left running detached
    Abandoned,
}

/// Named pool of OS worker threads fed by an unbounded channel
///
/// Listener jobs are isolated from whatever context settles an operation
/// (tokio workers, I/O threads, the caller). A panicking job is logged and the
/// worker keeps serving the queue.
///
/// Work is accounted through [`DispatchTicket`]s: a ticket counts as pending
/// from the moment it is reserved until its job finishes, so callers can
/// reserve capacity on several dispatchers before any of the jobs can run.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    name: String,
    worker_count: usize,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    state: Arc<DispatchState>,
}

#[derive(Default)]
struct DispatchState {
    /// Reserved + queued + running jobs
    pending: AtomicUsize,
    live_workers: AtomicUsize,
    cancelled: AtomicBool,
    lock: Mutex<()>,
    changed: Condvar,
}

impl DispatchState {
    fn notify(&self) {
        let _guard = self.lock.lock();
        self.changed.notify_all();
    }

    fn finish_job(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify();
        }
    }

    fn worker_exited(&self) {
        self.live_workers.fetch_sub(1, Ordering::AcqRel);
        self.notify();
    }

    /// Wait until `done` holds or `timeout` elapses; returns the final value of `done`.
    /// A timeout too large to express as an `Instant` waits without a deadline.
    fn wait_until(&self, timeout: Duration, done: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.lock.lock();
        while !done(self) {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut guard, deadline).timed_out() {
                        return done(self);
                    }
                }
                None => self.changed.wait(&mut guard),
            }
        }
        true
    }
}

impl Dispatcher {
    /// Start a dispatcher with `workers` threads named `{name}-{index}`
    pub fn new(name: impl Into<String>, workers: usize) -> BatchResult<Self> {
        let name = name.into();
        let worker_count = workers.max(1);
        let (sender, receiver) = channel::unbounded::<Job>();
        let state = Arc::new(DispatchState::default());

        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let state = Arc::clone(&state);
            let worker_name = format!("{name}-{index}");
            let thread_name = worker_name.clone();

            state.live_workers.fetch_add(1, Ordering::AcqRel);
            let spawned = std::thread::Builder::new()
                .name(thread_name)
                .spawn(move || worker_loop(worker_name, receiver, state));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Already running workers exit once the sender is dropped with this scope
                    return Err(BatchJobError::Runtime(format!(
                        "Failed to start dispatcher worker {name}-{index}: {e}"
                    )));
                }
            }
        }

        debug!(dispatcher = %name, workers = worker_count, "Dispatcher started");

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                name,
                worker_count,
                sender: Mutex::new(Some(sender)),
                workers: Mutex::new(handles),
                state,
            }),
        })
    }

    /// Single-worker dispatcher; jobs run strictly in dispatch order
    pub fn single(name: impl Into<String>) -> BatchResult<Self> {
        Self::new(name, 1)
    }

    /// Business continuation pool sized to available parallelism plus one
    pub fn continuation_pool(name: impl Into<String>) -> BatchResult<Self> {
        Self::new(name, super::default_continuation_workers())
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn worker_count(&self) -> usize {
        self.inner.worker_count
    }

    /// Jobs reserved, queued or running
    pub fn pending(&self) -> usize {
        self.inner.state.pending.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.sender.lock().is_none()
    }

    /// Reserve one unit of pending work before the job itself exists
    pub fn reserve(&self) -> DispatchTicket {
        self.inner.state.pending.fetch_add(1, Ordering::AcqRel);
        DispatchTicket {
            dispatcher: self.clone(),
            armed: true,
        }
    }

    /// Queue a job; returns `false` if the dispatcher no longer accepts work
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.reserve().dispatch(job)
    }

    /// Block until no job is reserved, queued or running, or `timeout` elapses
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.inner
            .state
            .wait_until(timeout, |state| state.pending.load(Ordering::Acquire) == 0)
    }

    /// Stop accepting work and wait for the workers to drain the queue
    ///
    /// Workers get `grace` to finish every queued job. After that the queue is
    /// cancelled (remaining jobs are discarded) and workers get `force_window`
    /// to finish whatever they are running. Workers still busy after that are
    /// detached.
    pub fn shutdown(&self, grace: Duration, force_window: Duration) -> ShutdownOutcome {
        let name = &self.inner.name;
        drop(self.inner.sender.lock().take());

        let state = &self.inner.state;
        let all_exited = |s: &DispatchState| s.live_workers.load(Ordering::Acquire) == 0;

        let outcome = if state.wait_until(grace, all_exited) {
            ShutdownOutcome::Graceful
        } else {
            warn!(
                dispatcher = %name,
                grace_seconds = grace.as_secs_f64(),
                pending = state.pending.load(Ordering::Acquire),
                "⚠️ Dispatcher did not drain within grace period, cancelling queued jobs"
            );
            state.cancelled.store(true, Ordering::Release);

            if state.wait_until(force_window, all_exited) {
                ShutdownOutcome::Forced
            } else {
                error!(
                    dispatcher = %name,
                    live_workers = state.live_workers.load(Ordering::Acquire),
                    "❌ Dispatcher workers still busy after forced cancellation, detaching"
                );
                ShutdownOutcome::Abandoned
            }
        };

        let handles: Vec<_> = self.inner.workers.lock().drain(..).collect();
        if outcome != ShutdownOutcome::Abandoned {
            for handle in handles {
                let _ = handle.join();
            }
        }

        info!(dispatcher = %name, outcome = ?outcome, "🛑 Dispatcher shut down");
        outcome
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.inner.name)
            .field("worker_count", &self.inner.worker_count)
            .field("pending", &self.pending())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        // Closing the channel lets detached workers exit once the queue is empty
        self.sender.lock().take();
    }
}

/// A unit of pending work reserved on a [`Dispatcher`]
///
/// Dropping an unused ticket releases the reservation.
pub struct DispatchTicket {
    dispatcher: Dispatcher,
    armed: bool,
}

impl DispatchTicket {
    /// Queue the job this ticket was reserved for
    pub fn dispatch<F>(mut self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let inner = &self.dispatcher.inner;
        let sent = match inner.sender.lock().as_ref() {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        };

        if sent {
            self.armed = false;
        } else {
            warn!(
                dispatcher = %inner.name,
                "⚠️ Dispatcher is shut down, rejecting listener job"
            );
        }
        sent
    }
}

impl Drop for DispatchTicket {
    fn drop(&mut self) {
        if self.armed {
            self.dispatcher.inner.state.finish_job();
        }
    }
}

fn worker_loop(name: String, receiver: Receiver<Job>, state: Arc<DispatchState>) {
    for job in receiver.iter() {
        if state.cancelled.load(Ordering::Acquire) {
            state.finish_job();
            continue;
        }

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            error!(
                worker = %name,
                panic = %panic_message(payload.as_ref()),
                "💥 Listener job panicked"
            );
        }
        state.finish_job();
    }
    state.worker_exited();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
