use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, SendError, Sender, TryRecvError};
use log::warn;

use crate::errors::{PoolError, TaskFailure};

/// A unit of work as stored in the queue of a thread pool
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

type Outcome<T> = Result<T, TaskFailure>;

/// The result of a task submitted to a [crate::thread_pool::ThreadPool]
///
/// The handle receives exactly one outcome: the value returned by the task or the failure it
/// raised. Dropping the handle does not cancel the task, the outcome is discarded when the task
/// completes.
///
/// A handle has a single owner. Once the outcome was returned by one of the getters, later calls
/// report [PoolError::Consumed].
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: Receiver<Outcome<T>>,
    taken: Cell<bool>,
}

impl<T> TaskHandle<T> {
    /// Block until the task completed and return its value.
    ///
    /// # Errors
    /// * [PoolError::TaskFailed] - the task panicked or returned an error
    /// * [PoolError::Cancelled] - the task was discarded before it ran
    /// * [PoolError::Consumed] - the outcome was already returned by [TaskHandle::get_timeout]
    ///   or [TaskHandle::try_get]
    pub fn get(self) -> Result<T, PoolError> {
        match self.receiver.recv() {
            Ok(outcome) => self.take(outcome),
            Err(_) => Err(self.disconnected()),
        }
    }

    /// Wait up to `timeout` for the task to complete.
    ///
    /// On [PoolError::Timeout] the task keeps running and the handle may be waited on again.
    /// Once an outcome was returned, further calls report [PoolError::Consumed].
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, PoolError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => self.take(outcome),
            Err(RecvTimeoutError::Timeout) => Err(PoolError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Return the outcome if the task already completed, `None` if it is still pending.
    pub fn try_get(&self) -> Option<Result<T, PoolError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(self.take(outcome)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.disconnected())),
        }
    }

    fn take(&self, outcome: Outcome<T>) -> Result<T, PoolError> {
        self.taken.set(true);
        outcome.map_err(PoolError::TaskFailed)
    }

    // The sender is gone: either the outcome was already received here, or the job was dropped
    // without running.
    fn disconnected(&self) -> PoolError {
        if self.taken.get() {
            PoolError::Consumed
        } else {
            PoolError::Cancelled
        }
    }
}

/// The producing side of a [TaskHandle]. Completing consumes it, so an outcome is set at most once.
struct Completer<T> {
    sender: Sender<Outcome<T>>,
}

impl<T> Completer<T> {
    fn complete(self, outcome: Outcome<T>) {
        // the channel has room for the single outcome, so send fails only without a receiver
        if let Err(SendError(Err(failure))) = self.sender.send(outcome) {
            warn!("task failed and nobody is waiting for it: {failure}");
        }
    }
}

/// Wrap `f` into a [Job] that runs it exactly once and publishes the outcome to the returned
/// handle. A panic in `f` is caught and published as [TaskFailure::Panicked].
///
/// When nobody holds the handle, the outcome is dropped while publishing. That drop runs task
/// supplied code and may still unwind out of the job; the worker loop guards against it.
pub(crate) fn package<F, T>(f: F) -> (Job, TaskHandle<T>)
    where F: FnOnce() -> Result<T, TaskFailure> + Send + 'static, T: Send + 'static {
    let (sender, receiver) = bounded(1);
    let completer = Completer { sender };
    let job: Job = Box::new(move || {
        let outcome = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(outcome) => outcome,
            Err(payload) => Err(TaskFailure::from_panic(payload)),
        };
        completer.complete(outcome);
    });
    (job, TaskHandle { receiver, taken: Cell::new(false) })
}

#[cfg(test)]
mod tests {
    use std::thread;

    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_value() {
        let (job, handle) = package(|| Ok(42));
        assert!(handle.try_get().is_none());
        job();
        assert_eq!(handle.get().unwrap(), 42);
    }

    #[test]
    fn test_panic_is_captured() {
        let (job, handle) = package::<_, i32>(|| panic!("boom"));
        job();
        match handle.get() {
            Err(PoolError::TaskFailed(TaskFailure::Panicked(message))) => {
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_error_is_captured() {
        let (job, handle) = package::<_, i32>(|| Err(TaskFailure::Error(anyhow!("bad input"))));
        job();
        let e = handle.get().unwrap_err();
        assert!(matches!(e.task_failure(), Some(TaskFailure::Error(_))));
    }

    #[test]
    fn test_dropped_job_cancels() {
        let (job, handle) = package(|| Ok("never"));
        drop(job);
        assert!(matches!(handle.get(), Err(PoolError::Cancelled)));
    }

    #[test]
    fn test_dropped_handle() {
        let (job, handle) = package::<_, i32>(|| Err(TaskFailure::Error(anyhow!("ignored"))));
        drop(handle);
        // the failure goes to the log only
        job();
    }

    #[test]
    fn test_get_timeout() {
        let (job, handle) = package(|| {
            thread::sleep(Duration::from_millis(50));
            Ok(7)
        });
        let worker = thread::spawn(job);
        assert!(matches!(handle.get_timeout(Duration::from_millis(1)), Err(PoolError::Timeout(_))));
        assert_eq!(handle.get_timeout(Duration::from_secs(10)).unwrap(), 7);
        worker.join().expect("failed to join worker");
        assert!(matches!(handle.try_get(), Some(Err(PoolError::Consumed))));
        assert!(matches!(handle.get_timeout(Duration::from_millis(1)), Err(PoolError::Consumed)));
        assert!(matches!(handle.get(), Err(PoolError::Consumed)));
    }

    #[test]
    fn test_try_get_then_get() {
        let (job, handle) = package(|| Ok(5));
        job();
        assert_eq!(handle.try_get().unwrap().unwrap(), 5);
        assert!(matches!(handle.get(), Err(PoolError::Consumed)));
    }

    #[test]
    fn test_failure_then_consumed() {
        let (job, handle) = package::<_, i32>(|| Err(TaskFailure::Error(anyhow!("bad input"))));
        job();
        assert!(matches!(handle.try_get(), Some(Err(PoolError::TaskFailed(_)))));
        assert!(matches!(handle.try_get(), Some(Err(PoolError::Consumed))));
    }
}
