use crate::errors::PoolError;
use crate::shutdown_mode::ShutdownMode;
use crate::thread_pool::ThreadPool;

/// Build a [ThreadPool]
///
/// Modify default thread pool parameters and build the thread pool
pub struct ThreadPoolBuilder {
    name: String,
    threads: usize,
    shutdown_mode: ShutdownMode,
}

impl ThreadPoolBuilder {
    /// Create a new builder
    ///
    /// Default values:
    /// * `name` - "task-pool"
    /// * `threads` - the number of available CPUs, at least 1
    /// * `shutdown_mode` - [ShutdownMode::CompletePending]
    ///
    ///  # Example
    /// ```
    ///
    /// use task_pool::errors::PoolError;
    /// use task_pool::shutdown_mode::ShutdownMode;
    /// use task_pool::thread_pool::ThreadPool;
    /// use task_pool::thread_pool_builder::ThreadPoolBuilder;
    ///
    /// fn create_thread_pool() -> Result<ThreadPool, PoolError> {
    ///     ThreadPoolBuilder::new()
    ///         .name_str("example")
    ///         .threads(4)
    ///         .shutdown_mode(ShutdownMode::CompletePending)
    ///         .build()
    /// }
    /// ```
    pub fn new() -> ThreadPoolBuilder {
        ThreadPoolBuilder {
            name: "task-pool".to_string(),
            threads: num_cpus::get().max(1),
            shutdown_mode: ShutdownMode::CompletePending,
        }
    }

    /// Set the base name for threads in the thread pool
    pub fn name(&mut self, name: String) -> &mut ThreadPoolBuilder {
        self.name = name;
        self
    }

    /// Set the base name for threads in the thread pool. A convenience method that accepts &str
    pub fn name_str(&mut self, name: &str) -> &mut ThreadPoolBuilder {
        self.name = name.to_string();
        self
    }

    /// Set the number of threads in the thread pool. The number is fixed for the lifetime of the
    /// pool.
    pub fn threads(&mut self, threads: usize) -> &mut ThreadPoolBuilder {
        self.threads = threads;
        self
    }

    /// Specify the [ShutdownMode]
    pub fn shutdown_mode(&mut self, shutdown_mode: ShutdownMode) -> &mut ThreadPoolBuilder {
        self.shutdown_mode = shutdown_mode;
        self
    }

    /// Build the thread pool and start its threads
    ///
    /// Fails with [PoolError::InvalidThreadCount] when the thread count is zero and with
    /// [PoolError::Spawn] when a thread cannot be created.
    pub fn build(&self) -> Result<ThreadPool, PoolError> {
        ThreadPool::create(
            self.name.clone(),
            self.threads,
            self.shutdown_mode,
        )
    }
}

impl Default for ThreadPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
