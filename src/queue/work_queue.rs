use std::collections::HashSet;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use super::RateLimiter;
use crate::metrics::QUEUE_ADDS;
use crate::metrics::QUEUE_DEPTH;
use crate::metrics::QUEUE_RATE_LIMITED_ADDS;

struct QueueState<T> {
    /// Keys ready to be handed out, in arrival order
    queue: VecDeque<T>,
    /// Keys that need processing (queued, or re-added while processing)
    dirty: HashSet<T>,
    /// Keys currently held by a worker
    processing: HashSet<T>,
    shutting_down: bool,
}

struct Inner<T> {
    name: String,
    state: Mutex<QueueState<T>>,
    notify: Notify,
    rate_limiter: Box<dyn RateLimiter<T>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Cloneable handle to a shared work queue.
///
/// Every `get` must be paired with exactly one `done` for the same item.
pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WorkQueue<T>
where
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    pub fn new(
        name: &str,
        rate_limiter: impl RateLimiter<T>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                notify: Notify::new(),
                rate_limiter: Box::new(rate_limiter),
                shutdown_tx,
            }),
        }
    }

    /// Marks `item` pending. No-op if it is already pending; if it is being
    /// processed it is handed out again once `done` is called.
    pub fn add(
        &self,
        item: T,
    ) {
        let mut state = self.inner.state.lock();
        if state.shutting_down {
            trace!(queue = %self.inner.name, ?item, "queue shutting down, add ignored");
            return;
        }
        if !state.dirty.insert(item.clone()) {
            return;
        }
        QUEUE_ADDS.with_label_values(&[self.inner.name.as_str()]).inc();
        if state.processing.contains(&item) {
            return;
        }
        state.queue.push_back(item);
        QUEUE_DEPTH
            .with_label_values(&[self.inner.name.as_str()])
            .set(state.queue.len() as i64);
        drop(state);

        self.inner.notify.notify_one();
    }

    /// Adds `item` once `delay` has elapsed, unless the queue shuts down first
    pub fn add_after(
        &self,
        item: T,
        delay: Duration,
    ) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(item);
            return;
        }

        let queue = self.clone();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => queue.add(item),
                _ = shutdown_rx.changed() => {}
            }
        });
    }

    /// Adds `item` after the delay chosen by the rate limiter
    pub fn add_rate_limited(
        &self,
        item: T,
    ) {
        let delay = self.inner.rate_limiter.when(&item);
        debug!(queue = %self.inner.name, ?item, ?delay, "rate limited add");
        QUEUE_RATE_LIMITED_ADDS.with_label_values(&[self.inner.name.as_str()]).inc();
        self.add_after(item, delay);
    }

    /// Waits for the next item. Returns `None` once the queue is shut down
    /// and drained.
    pub async fn get(&self) -> Option<T> {
        loop {
            // Registered before inspecting state so a concurrent add or
            // shutdown between the check and the await is not lost.
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    QUEUE_DEPTH
                        .with_label_values(&[self.inner.name.as_str()])
                        .set(state.queue.len() as i64);
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Releases `item` after processing. If it was re-added meanwhile it goes
    /// back to the tail of the queue.
    pub fn done(
        &self,
        item: &T,
    ) {
        let mut state = self.inner.state.lock();
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.queue.push_back(item.clone());
            QUEUE_DEPTH
                .with_label_values(&[self.inner.name.as_str()])
                .set(state.queue.len() as i64);
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Resets the backoff tracked for `item`
    pub fn forget(
        &self,
        item: &T,
    ) {
        self.inner.rate_limiter.forget(item);
    }

    pub fn num_requeues(
        &self,
        item: &T,
    ) -> usize {
        self.inner.rate_limiter.num_requeues(item)
    }

    /// Stops accepting work. Waiting `get` calls drain what is left, then
    /// return `None`. Pending delayed adds are dropped.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;
        }
        debug!(queue = %self.inner.name, "work queue shutting down");
        self.inner.shutdown_tx.send_replace(true);
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }

    /// Number of items ready to be handed out
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}
