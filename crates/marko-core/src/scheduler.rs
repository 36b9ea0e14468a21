//! Deferred work that runs after the current edit transaction.
//!
//! Some reactions must not happen while an event is still being handled,
//! e.g. reopening the suggestion list after a programmatic tag rename. They
//! are queued here and the [`Editor`](crate::Editor) drains the queue once
//! the triggering event is fully processed. There are no timers: ordering is
//! plain FIFO, which keeps tests deterministic.

use std::collections::VecDeque;

/// A single-shot task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    /// Ask the host to reopen suggestions
    TriggerAutocomplete { activated_manually: bool },
}

/// FIFO queue of deferred tasks for one editing session.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<DeferredTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a task to run after the current transaction.
    pub fn schedule(&mut self, task: DeferredTask) {
        tracing::trace!(?task, "scheduled");
        self.queue.push_back(task);
    }

    /// Takes the next task.
    pub fn pop(&mut self) -> Option<DeferredTask> {
        self.queue.pop_front()
    }

    /// Drops all queued tasks.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
