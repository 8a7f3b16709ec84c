use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, Builder, JoinHandle, ThreadId};
use std::time::Duration;

use log::{debug, error};

use crate::blocking_queue::BlockingQueue;
use crate::command::Command;
use crate::errors::{PoolError, TaskFailure};
use crate::shutdown_mode::ShutdownMode;
use crate::task_handle::{package, Job, TaskHandle};
use crate::thread_pool_builder::ThreadPoolBuilder;

/// Decrements the live worker count when a worker thread exits, however it exits
struct WorkerExit {
    live: Arc<AtomicUsize>,
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Execute tasks on a fixed set of threads and deliver their results through handles
///
/// The pool starts all its threads on construction. Each thread takes tasks from a shared FIFO
/// queue and runs them one at a time. Submitting a task returns a [TaskHandle] immediately; the
/// value produced by the task, or the failure it raised, is observed through the handle. A task
/// that panics or returns an error never affects the thread that ran it.
///
/// With a single thread, tasks complete in submission order. With more threads the queue is
/// still served in FIFO order, but tasks may complete in any order.
///
/// Shutting the pool down, explicitly with [ThreadPool::shutdown] or by dropping it, rejects new
/// submissions with [PoolError::Closed] and joins all threads. Whether the tasks that are still
/// queued at that point run or are discarded is decided by the [ShutdownMode].
///
/// Tasks may submit tasks to the pool that runs them. A task that blocks on the handle of such a
/// nested task occupies a thread while waiting; when all threads wait this way the pool
/// deadlocks. Avoiding that is the responsibility of the caller.
///
/// For reference see [Thread Pool](https://en.wikipedia.org/wiki/Thread_pool) and
/// [Producer-Consumer](https://en.wikipedia.org/wiki/Producer%E2%80%93consumer_problem)
pub struct ThreadPool {
    name: String,
    size: usize,
    queue: Arc<BlockingQueue<Job>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    thread_ids: Vec<ThreadId>,
    live: Arc<AtomicUsize>,
    shutdown_mode: ShutdownMode,
}

impl ThreadPool {
    /// Create a pool with `threads` threads and default settings, see [ThreadPoolBuilder]
    pub fn new(threads: usize) -> Result<ThreadPool, PoolError> {
        ThreadPoolBuilder::new()
            .threads(threads)
            .build()
    }

    /// Create a pool with one thread per available CPU
    pub fn with_default_threads() -> Result<ThreadPool, PoolError> {
        ThreadPoolBuilder::new().build()
    }

    pub(crate) fn create(
        name: String,
        threads: usize,
        shutdown_mode: ShutdownMode,
    ) -> Result<ThreadPool, PoolError> {
        if threads == 0 {
            return Err(PoolError::InvalidThreadCount);
        }

        let queue = Arc::new(BlockingQueue::<Job>::new());
        let live = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::<JoinHandle<()>>::with_capacity(threads);
        for i in 0..threads {
            match Self::create_thread(&name, i, queue.clone(), live.clone()) {
                Ok(t) => handles.push(t),
                Err(e) => {
                    error!("failed to start thread {i} of the {name} pool: {e}");
                    queue.close();
                    for t in handles {
                        let name = t.thread().name().unwrap_or("unnamed").to_string();
                        if let Err(e) = t.join() {
                            error!("thread {name} ended with an error {}", TaskFailure::from_panic(e));
                        }
                    }
                    return Err(e);
                }
            }
        }
        debug!("started the {name} pool with {threads} threads");

        let thread_ids = handles.iter().map(|t| t.thread().id()).collect();
        Ok(
            ThreadPool {
                name,
                size: threads,
                queue,
                threads: Mutex::new(handles),
                thread_ids,
                live,
                shutdown_mode,
            }
        )
    }

    fn create_thread(
        name: &str,
        index: usize,
        queue: Arc<BlockingQueue<Job>>,
        live: Arc<AtomicUsize>,
    ) -> Result<JoinHandle<()>, PoolError> {
        live.fetch_add(1, Ordering::SeqCst);
        let exit = WorkerExit { live: live.clone() };
        Builder::new()
            .name(format!("{name}-{index}"))
            .spawn(move || {
                let _exit = exit;
                while let Some(job) = queue.dequeue() {
                    // the task itself is guarded by the job, this catches panics while its
                    // unobserved outcome is dropped
                    if let Err(e) = catch_unwind(AssertUnwindSafe(job)) {
                        error!(
                            "{} recovered from a panic after a task: {}",
                            thread::current().name().unwrap_or("unnamed"),
                            TaskFailure::from_panic(e),
                        );
                    }
                    queue.task_done();
                }
                debug!("{} exits, no more work", thread::current().name().unwrap_or("unnamed"));
            })
            .map_err(PoolError::from)
    }

    /// The base name of the threads in the pool
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of threads in the thread pool. Fixed for the lifetime of the pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The number of threads that have not exited yet. Zero after [ThreadPool::shutdown] returns.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// The number of queued tasks that were not started yet. Diagnostic only.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn shutdown_mode(&self) -> ShutdownMode {
        self.shutdown_mode
    }

    /// `true` once shutdown was initiated
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Submit a closure for execution and return the handle to its result.
    ///
    /// Never blocks on execution. A panic in `f` is reported by the handle as
    /// [PoolError::TaskFailed] with [TaskFailure::Panicked].
    ///
    /// # Errors
    /// [PoolError::Closed] if shutdown was initiated. The closure is dropped without running.
    ///
    /// # Example
    /// ```
    /// use task_pool::thread_pool::ThreadPool;
    ///
    /// let tp = ThreadPool::new(2).unwrap();
    /// let handle = tp.enqueue(|| 6 * 7).unwrap();
    /// assert_eq!(handle.get().unwrap(), 42);
    /// ```
    pub fn enqueue<F, T>(&self, f: F) -> Result<TaskHandle<T>, PoolError>
        where F: FnOnce() -> T + Send + 'static, T: Send + 'static {
        self.schedule(move || Ok(f()))
    }

    /// Submit a fallible closure. An `Err` returned by `f` is reported by the handle as
    /// [PoolError::TaskFailed] with [TaskFailure::Error].
    pub fn enqueue_fallible<F, T>(&self, f: F) -> Result<TaskHandle<T>, PoolError>
        where F: FnOnce() -> Result<T, anyhow::Error> + Send + 'static, T: Send + 'static {
        self.schedule(move || f().map_err(TaskFailure::Error))
    }

    /// Submit a [Command] for execution
    pub fn submit<C>(&self, command: C) -> Result<TaskHandle<C::Output>, PoolError>
        where C: Command {
        self.enqueue_fallible(move || command.execute())
    }

    fn schedule<F, T>(&self, f: F) -> Result<TaskHandle<T>, PoolError>
        where F: FnOnce() -> Result<T, TaskFailure> + Send + 'static, T: Send + 'static {
        let (job, handle) = package(f);
        match self.queue.enqueue(job) {
            Ok(()) => Ok(handle),
            Err(_job) => Err(PoolError::Closed { pool: self.name.clone() }),
        }
    }

    /// Wait until no task is queued and no task is running.
    ///
    /// This is a convenience barrier, tasks submitted concurrently may still be pending when it
    /// returns. Must not be called from a task running in this pool, that task would wait for
    /// itself.
    pub fn wait_for_completion(&self) {
        self.queue.wait_idle();
    }

    /// Same as [ThreadPool::wait_for_completion] but gives up after `timeout`. Returns `true` if
    /// the pool was observed idle.
    pub fn wait_for_completion_timeout(&self, timeout: Duration) -> bool {
        self.queue.wait_idle_timeout(timeout)
    }

    /// Shut down the thread pool.
    ///
    /// New submissions are rejected from this point on. Queued tasks are handled according to
    /// configuration. When configured with
    /// * [ShutdownMode::CompletePending] - run all queued tasks, then terminate the threads
    /// * [ShutdownMode::Immediate] - discard queued tasks, terminate each thread after
    ///   completing its current task
    ///
    /// Blocks until all threads exited. Calling it again is a no-op. When called from a task
    /// running in this pool the threads are not joined, the pool only stops accepting work.
    ///
    /// # Errors
    /// [PoolError::Join] if a thread terminated abnormally
    pub fn shutdown(&self) -> Result<(), PoolError> {
        if self.queue.close() {
            debug!("shutting down the {} pool, mode: {}", self.name, self.shutdown_mode);
        }
        if self.shutdown_mode == ShutdownMode::Immediate {
            let discarded = self.queue.discard();
            if !discarded.is_empty() {
                debug!("discarding {} pending tasks in the {} pool", discarded.len(), self.name);
            }
        }
        if self.thread_ids.contains(&thread::current().id()) {
            debug!("shutdown of the {} pool requested by its own thread, not joining", self.name);
            return Ok(());
        }
        self.join()
    }

    fn join(&self) -> Result<(), PoolError> {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let mut join_errors = Vec::<String>::new();
        while let Some(t) = threads.pop() {
            let name = t.thread().name().unwrap_or("unnamed").to_string();
            if let Err(e) = t.join() {
                let message = TaskFailure::from_panic(e).to_string();
                error!("thread {name} ended with an error {message}");
                join_errors.push(format!("{name}: {message}"));
            }
        }
        if join_errors.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Join { pool: self.name.clone(), errors: join_errors })
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("{e}");
        }
    }
}
