use std::fmt::{Display, Formatter};

/// What happens to tasks that are queued but not started when a [crate::thread_pool::ThreadPool]
/// is shut down. Tasks that already started always run to completion.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Run all pending tasks before the worker threads exit
    #[default]
    CompletePending,
    /// Discard pending tasks. Their handles report [crate::errors::PoolError::Cancelled]
    Immediate,
}

impl Display for ShutdownMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownMode::CompletePending => {
                write!(f, "CompletePending")
            }
            ShutdownMode::Immediate => {
                write!(f, "Immediate")
            }
        }
    }
}
