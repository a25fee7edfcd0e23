//! Execution units for workers.
//!
//! A worker is a plain task; an [`Executor`] decides what runs it.

use std::io;

/// A unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks on independently scheduled execution units.
pub trait Executor: Send + Sync {
    /// Start `task` without waiting for it. On error the task has been dropped
    /// without running.
    fn execute(&self, name: String, task: Task) -> io::Result<()>;
}

/// One named OS thread per task.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, name: String, task: Task) -> io::Result<()> {
        std::thread::Builder::new().name(name).spawn(task)?;
        Ok(())
    }
}

/// Runs tasks on a tokio runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Executor for the runtime the caller is running on.
    /// Panics outside a tokio runtime, like [`tokio::runtime::Handle::current`].
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, _name: String, task: Task) -> io::Result<()> {
        // Dropping the JoinHandle detaches the task.
        drop(self.handle.spawn_blocking(task));
        Ok(())
    }
}
