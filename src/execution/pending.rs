//! Single-settlement handles for in-flight operations

use parking_lot::Mutex;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

use super::dispatcher::Dispatcher;

/// Settled value of an operation
pub type TaskOutcome<R> = Result<R, TaskFailure>;

/// Why an operation settled with a failure
///
/// `kind` is the short type name of the originating error and is used as the
/// `error_type` tag in metrics.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    kind: String,
    message: String,
    source: Option<Arc<dyn Error + Send + Sync + 'static>>,
}

impl TaskFailure {
    pub const ABANDONED: &'static str = "Abandoned";
    pub const PANIC: &'static str = "Panic";
    pub const CANCELLED: &'static str = "Cancelled";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a typed error, tagging the failure with the error's short type name
    pub fn from_error<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            kind: short_type_name::<E>().to_string(),
            message: error.to_string(),
            source: Some(Arc::new(error)),
        }
    }

    /// The completer was dropped without ever settling the operation
    pub fn abandoned() -> Self {
        Self::new(
            Self::ABANDONED,
            "operation was dropped before it produced a result",
        )
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for TaskFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn Error + 'static))
    }
}

/// `my_crate::errors::SendError<Foo>` -> `SendError`
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

type Callback<R> = Box<dyn FnOnce(Arc<TaskOutcome<R>>) + Send + 'static>;

struct Listener<R> {
    dispatcher: Dispatcher,
    callback: Callback<R>,
}

enum SettlementState<R> {
    Pending(Vec<Listener<R>>),
    Settled(Arc<TaskOutcome<R>>),
}

struct Settlement<R> {
    state: Mutex<SettlementState<R>>,
}

impl<R: Send + Sync + 'static> Settlement<R> {
    fn settle(&self, outcome: TaskOutcome<R>) -> bool {
        let outcome = Arc::new(outcome);
        let listeners = {
            let mut state = self.state.lock();
            let previous = std::mem::replace(
                &mut *state,
                SettlementState::Settled(Arc::clone(&outcome)),
            );
            match previous {
                SettlementState::Pending(listeners) => listeners,
                already @ SettlementState::Settled(_) => {
                    *state = already;
                    return false;
                }
            }
        };

        // Reserve on every dispatcher first so no listener can observe a
        // quiescent system while a sibling listener is still unaccounted for.
        let reserved: Vec<_> = listeners
            .into_iter()
            .map(|listener| (listener.dispatcher.reserve(), listener.callback))
            .collect();

        for (ticket, callback) in reserved {
            let outcome = Arc::clone(&outcome);
            ticket.dispatch(move || callback(outcome));
        }
        true
    }
}

/// Handle to one in-flight asynchronous operation
///
/// Settles exactly once with a success value or a [`TaskFailure`]. Any number
/// of listeners may be attached with [`PendingResult::on_settled`]; each runs
/// exactly once on the dispatcher it was attached with, including listeners
/// attached after settlement.
///
/// ```rust
/// use tasker_batch::execution::{Dispatcher, PendingResult};
/// use std::time::Duration;
///
/// let dispatcher = Dispatcher::single("docs").unwrap();
/// let (pending, completer) = PendingResult::<u32>::channel();
///
/// pending.on_settled(&dispatcher, |outcome| assert_eq!(*outcome.as_ref().unwrap(), 7));
/// completer.succeed(7);
/// assert!(dispatcher.wait_idle(Duration::from_secs(1)));
/// ```
pub struct PendingResult<R> {
    shared: Arc<Settlement<R>>,
}

impl<R> Clone for PendingResult<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Send + Sync + 'static> PendingResult<R> {
    /// Create an unsettled handle and the completer that settles it
    pub fn channel() -> (Self, Completer<R>) {
        let shared = Arc::new(Settlement {
            state: Mutex::new(SettlementState::Pending(Vec::new())),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            Completer {
                shared: Some(shared),
            },
        )
    }

    /// An already-succeeded handle
    pub fn succeeded(value: R) -> Self {
        Self::settled(Ok(value))
    }

    /// An already-failed handle
    pub fn failed(failure: TaskFailure) -> Self {
        Self::settled(Err(failure))
    }

    pub fn settled(outcome: TaskOutcome<R>) -> Self {
        Self {
            shared: Arc::new(Settlement {
                state: Mutex::new(SettlementState::Settled(Arc::new(outcome))),
            }),
        }
    }

    /// Run `future` on the given tokio runtime and settle with its output
    ///
    /// A panic inside the future settles the handle with a `Panic` failure. If
    /// the runtime shuts down first, the handle settles as `Abandoned`.
    pub fn spawn<F, E>(handle: &Handle, future: F) -> Self
    where
        F: Future<Output = Result<R, E>> + Send + 'static,
        E: Error + Send + Sync + 'static,
    {
        let (pending, completer) = Self::channel();
        let task = handle.spawn(future);

        handle.spawn(async move {
            match task.await {
                Ok(Ok(value)) => completer.succeed(value),
                Ok(Err(error)) => completer.fail(TaskFailure::from_error(error)),
                Err(join_error) => {
                    let kind = if join_error.is_panic() {
                        TaskFailure::PANIC
                    } else {
                        TaskFailure::CANCELLED
                    };
                    completer.fail(TaskFailure::new(kind, join_error.to_string()))
                }
            };
        });

        pending
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.shared.state.lock(), SettlementState::Settled(_))
    }

    /// The settled outcome, if any
    pub fn outcome(&self) -> Option<Arc<TaskOutcome<R>>> {
        match &*self.shared.state.lock() {
            SettlementState::Settled(outcome) => Some(Arc::clone(outcome)),
            SettlementState::Pending(_) => None,
        }
    }

    /// Attach a listener that runs on `dispatcher` once the operation settles
    pub fn on_settled<F>(&self, dispatcher: &Dispatcher, callback: F)
    where
        F: FnOnce(&TaskOutcome<R>) + Send + 'static,
    {
        let callback: Callback<R> = Box::new(move |outcome| callback(&outcome));

        let settled = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                SettlementState::Pending(listeners) => {
                    listeners.push(Listener {
                        dispatcher: dispatcher.clone(),
                        callback,
                    });
                    return;
                }
                SettlementState::Settled(outcome) => Arc::clone(outcome),
            }
        };

        dispatcher.execute(move || callback(settled));
    }
}

impl<R> fmt::Debug for PendingResult<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settled = matches!(&*self.shared.state.lock(), SettlementState::Settled(_));
        f.debug_struct("PendingResult")
            .field("settled", &settled)
            .finish()
    }
}

/// Settles the paired [`PendingResult`]
///
/// Dropping a completer that never settled its result settles it as
/// [`TaskFailure::abandoned`], so a handle can never stay pending forever
/// because its producer went away.
pub struct Completer<R: Send + Sync + 'static> {
    shared: Option<Arc<Settlement<R>>>,
}

impl<R: Send + Sync + 'static> Completer<R> {
    /// Settle with `outcome`; returns `false` if the result was already settled
    pub fn complete(mut self, outcome: TaskOutcome<R>) -> bool {
        match self.shared.take() {
            Some(shared) => shared.settle(outcome),
            None => false,
        }
    }

    pub fn succeed(self, value: R) -> bool {
        self.complete(Ok(value))
    }

    pub fn fail(self, failure: TaskFailure) -> bool {
        self.complete(Err(failure))
    }
}

impl<R: Send + Sync + 'static> Drop for Completer<R> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Err(TaskFailure::abandoned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("kafka send timed out")]
    struct KafkaTimeout;

    fn dispatcher() -> Dispatcher {
        Dispatcher::single("pending-test").unwrap()
    }

    #[test]
    fn listeners_attached_before_and_after_settlement_each_fire_once() {
        let dispatcher = dispatcher();
        let fired = Arc::new(AtomicU64::new(0));
        let (pending, completer) = PendingResult::<&'static str>::channel();

        let f = Arc::clone(&fired);
        pending.on_settled(&dispatcher, move |outcome| {
            assert_eq!(outcome.as_ref().ok(), Some(&"ok"));
            f.fetch_add(1, Ordering::SeqCst);
        });

        assert!(completer.succeed("ok"));

        let f = Arc::clone(&fired);
        pending.on_settled(&dispatcher, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        assert!(dispatcher.wait_idle(Duration::from_secs(5)));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert!(pending.is_settled());
    }

    #[test]
    fn failure_is_tagged_with_short_error_type() {
        let failure = TaskFailure::from_error(KafkaTimeout);
        assert_eq!(failure.kind(), "KafkaTimeout");
        assert_eq!(failure.to_string(), "KafkaTimeout: kafka send timed out");
        assert!(failure.source().is_some());
    }

    #[test]
    fn dropped_completer_settles_as_abandoned() {
        let (pending, completer) = PendingResult::<u8>::channel();
        drop(completer);

        let outcome = pending.outcome().expect("settled on drop");
        let failure = outcome.as_ref().as_ref().unwrap_err();
        assert_eq!(failure.kind(), TaskFailure::ABANDONED);
    }

    #[test]
    fn settled_constructors_are_immediately_settled() {
        assert!(PendingResult::succeeded(1u8).is_settled());
        let failed = PendingResult::<u8>::failed(TaskFailure::new("Boom", "bad"));
        assert!(failed.outcome().unwrap().is_err());
    }

    #[test]
    fn spawned_future_settles_with_its_output() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dispatcher = dispatcher();
        let (tx, rx) = std::sync::mpsc::channel();

        let ok = PendingResult::spawn(runtime.handle(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, KafkaTimeout>(5u32)
        });
        let err = PendingResult::<u32>::spawn(runtime.handle(), async { Err(KafkaTimeout) });

        let tx_ok = tx.clone();
        ok.on_settled(&dispatcher, move |o| tx_ok.send(o.as_ref().ok().copied()).unwrap());
        err.on_settled(&dispatcher, move |o| {
            tx.send(o.as_ref().err().map(|f| f.kind().len() as u32)).unwrap()
        });

        let mut results = vec![
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ];
        results.sort();
        assert_eq!(results, vec![Some(5), Some("KafkaTimeout".len() as u32)]);
    }

    #[test]
    fn panicking_future_settles_as_panic_failure() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let pending = PendingResult::<u8>::spawn(runtime.handle(), async {
            if true {
                panic!("backend exploded");
            }
            Ok::<_, KafkaTimeout>(1)
        });

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !pending.is_settled() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let outcome = pending.outcome().expect("settled");
        assert_eq!(
            outcome.as_ref().as_ref().unwrap_err().kind(),
            TaskFailure::PANIC
        );
    }
}
