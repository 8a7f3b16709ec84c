/// Trait that specifies a unit of work for [crate::thread_pool::ThreadPool::submit]
///
/// A command is consumed by execution, so each submitted command runs exactly once.
pub trait Command: Send + 'static {
    /// The value produced by a successful execution
    type Output: Send + 'static;

    /// The execute method will be executed in the context of one of the threads of the thread pool.
    ///
    /// A returned error, or a panic, is delivered to the holder of the
    /// [crate::task_handle::TaskHandle] as [crate::errors::PoolError::TaskFailed]. The worker
    /// thread is not affected.
    fn execute(self) -> Result<Self::Output, anyhow::Error>;
}
