//! Delivery of finished tasks on the caller's context.
//!
//! Pool threads send finished tasks into a channel; the bridge drains it on the
//! thread that owns it and invokes each continuation there. The bridge keeps a
//! count of tasks still in flight so callers can wait for all of them.

use std::cell::Cell;

use flume::{Receiver, TryRecvError};
use tracing::trace;

use crate::types::Task;

/// Receiving end of the completion channel, owned by the caller's context.
///
/// Every continuation is invoked from one of the delivery methods below, so it
/// runs on whichever thread calls them. The bridge is `!Sync` and keeps that
/// thread single.
pub struct CompletionBridge {
    receiver: Receiver<Task>,

    /// Tasks submitted and not yet delivered. Only touched on the owning thread.
    pending: Cell<usize>,
}

impl CompletionBridge {
    /// Wraps the receiver the dispatcher sends finished tasks to.
    #[inline]
    pub fn new(receiver: Receiver<Task>) -> Self {
        Self { receiver, pending: Cell::new(0) }
    }

    /// Records a task about to be submitted.
    #[inline]
    pub fn track(&self) {
        self.pending.set(self.pending.get() + 1);
    }

    /// Tasks tracked and not yet delivered.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    fn deliver(&self, task: Task) {
        self.pending.set(self.pending.get().saturating_sub(1));
        trace!(task = task.id(), pending = self.pending.get(), "delivering");
        task.deliver();
    }

    /// Delivers every completion already available, without blocking.
    ///
    /// Returns the number of continuations invoked.
    pub fn poll(&self) -> usize {
        let mut delivered = 0;

        loop {
            match self.receiver.try_recv() {
                Ok(task) => {
                    self.deliver(task);
                    delivered += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        delivered
    }

    /// Blocks until every in-flight task has been delivered.
    pub fn run(&self) {
        while self.pending() > 0 {
            match self.receiver.recv() {
                Ok(task) => self.deliver(task),
                Err(_) => break,
            }
        }
    }

    /// Awaits and delivers a single completion.
    ///
    /// Returns `false` without waiting when nothing is in flight.
    pub async fn turn(&self) -> bool {
        if self.pending() == 0 {
            return false;
        }

        match self.receiver.recv_async().await {
            Ok(task) => {
                self.deliver(task);
                true
            }
            Err(_) => false,
        }
    }

    /// Awaits until every in-flight task has been delivered.
    pub async fn run_async(&self) {
        while self.turn().await {}
    }
}
