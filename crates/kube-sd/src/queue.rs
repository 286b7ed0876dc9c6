//! Deduplicating work queue.
//!
//! Bridges change notifications (many producers, arriving at any time) to
//! the reconciliation loop (one consumer, one key at a time). A key is in at
//! most one of three places:
//!
//! - `dirty` and `queue`: waiting to be handed out
//! - `processing`: handed out by [`WorkQueue::get`], not yet [`WorkQueue::done`]
//! - `dirty` and `processing`: re-added while being processed; queued again on `done`

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;

/// Queue of keys awaiting reconciliation.
///
/// Adding a key that is already pending is a no-op, so bursts of
/// notifications for one object collapse into a single work item.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Marks `key` as needing processing.
    fn add(&self, key: String);

    /// Waits for the next key. Returns `None` once the queue is shut down
    /// and drained.
    async fn get(&self) -> Option<String>;

    /// Marks `key`, previously returned by [`WorkQueue::get`], as processed.
    fn done(&self, key: &str);

    /// Stops accepting new keys and wakes every waiting [`WorkQueue::get`].
    fn shut_down(&self);
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    shutting_down: bool,
}

/// In-process [`WorkQueue`] with key deduplication and FIFO delivery.
#[derive(Debug)]
pub struct DedupQueue {
    name: String,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl DedupQueue {
    /// Creates an empty queue. `name` appears in log lines.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Returns the queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of keys waiting to be handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Returns true if no key is waiting to be handed out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once [`WorkQueue::shut_down`] has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    // Every mutation leaves the state consistent, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl WorkQueue for DedupQueue {
    fn add(&self, key: String) {
        let mut state = self.lock();
        if state.shutting_down {
            debug!(queue = %self.name, key = %key, "Dropping key added after shutdown");
            return;
        }
        if !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    async fn get(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    fn done(&self, key: &str) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.to_string());
            drop(state);
            self.notify.notify_one();
        }
    }

    fn shut_down(&self) {
        self.lock().shutting_down = true;
        debug!(queue = %self.name, "Work queue shutting down");
        self.notify.notify_waiters();
    }
}
