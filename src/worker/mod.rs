//! Background execution for asynchronous calls.
//!
//! The [`Dispatcher`] moves each [`Task`] onto a Rayon pool thread, runs the
//! transform there, and sends the finished task back over a channel. The
//! [`CompletionBridge`] owns the receiving end on the caller's context and is
//! the only place continuations are invoked.

use std::sync::Arc;

use anyhow::{Context, Result};
use flume::Sender;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::config::{BridgeConfig, WORKER_THREAD_PREFIX};
use crate::engine::Transform;
use crate::types::Task;

pub mod bridge;

pub use bridge::CompletionBridge;

/// Runs tasks on a background pool.
///
/// Tasks share nothing but the transform; each one owns its input and result.
pub struct Dispatcher {
    /// Thread pool executing the transforms.
    pool: ThreadPool,

    /// Shared transform (Arc for use across pool threads).
    transform: Arc<dyn Transform>,

    /// Channel back to the caller's context.
    completions: Sender<Task>,
}

impl Dispatcher {
    /// Creates a dispatcher with a pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread pool cannot be built.
    pub fn new(config: &BridgeConfig, transform: Arc<dyn Transform>, completions: Sender<Task>) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|index| format!("{WORKER_THREAD_PREFIX}-{index}"))
            .build()
            .context("failed to build worker pool")?;

        Ok(Self { pool, transform, completions })
    }

    /// Moves a task onto the pool.
    ///
    /// Returns immediately. The finished task, successful or not, is sent to the
    /// completion channel; it is never delivered from the pool thread.
    pub fn submit(&self, mut task: Task) {
        task.queue();
        debug!(task = task.id(), operation = %task.operation(), "task queued");

        let transform = Arc::clone(&self.transform);
        let completions = self.completions.clone();

        self.pool.spawn(move || {
            task.execute(transform.as_ref());
            debug!(task = task.id(), state = ?task.state(), "task finished");

            // The runtime drains pending tasks before it drops the receiver.
            if let Err(flume::SendError(task)) = completions.send(task) {
                warn!(task = task.id(), "runtime dropped before task could be delivered");
            }
        });
    }

    #[inline]
    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}
