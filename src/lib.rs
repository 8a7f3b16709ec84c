//! A fixed size thread pool that returns a handle for every submitted task.
//!
//! ```
//! use task_pool::thread_pool_builder::ThreadPoolBuilder;
//!
//! let tp = ThreadPoolBuilder::new()
//!     .name_str("example")
//!     .threads(4)
//!     .build()
//!     .unwrap();
//!
//! let handles: Vec<_> = (0..8)
//!     .map(|i| tp.enqueue(move || i * i).unwrap())
//!     .collect();
//! let squares: Vec<i32> = handles.into_iter().map(|h| h.get().unwrap()).collect();
//! assert_eq!(squares, vec![0, 1, 4, 9, 16, 25, 36, 49]);
//!
//! tp.shutdown().unwrap();
//! ```
//!
//! Tasks are closures ([thread_pool::ThreadPool::enqueue],
//! [thread_pool::ThreadPool::enqueue_fallible]) or implementations of [command::Command]
//! ([thread_pool::ThreadPool::submit]). A failing task is reported through its
//! [task_handle::TaskHandle] and never terminates the thread that ran it.

pub mod blocking_queue;
pub mod command;
pub mod errors;
pub mod shutdown_mode;
pub mod task_handle;
pub mod thread_pool;
pub mod thread_pool_builder;
