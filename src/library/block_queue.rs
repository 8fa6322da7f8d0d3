use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// FIFO handoff between one producer (the connection's dispatch task) and any
/// number of consumers.
///
/// `enqueue` never waits. `dequeue` suspends until an item arrives, the
/// optional timeout runs out, or the queue is closed and drained.
pub struct BlockQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Notify,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> BlockQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item. Returns `false` (and drops the item) once the queue
    /// has been closed.
    pub fn enqueue(&self, item: T) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.items.push_back(item);
        }
        self.available.notify_waiters();
        true
    }

    /// Take the next item, waiting for one if the queue is empty.
    ///
    /// Returns `None` when `timeout` elapses first, or when the queue is
    /// closed and has nothing left to hand out.
    pub async fn dequeue(&self, timeout: Option<Duration>) -> Option<T> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.next_item())
                .await
                .ok()
                .flatten(),
            None => self.next_item().await,
        }
    }

    async fn next_item(&self) -> Option<T> {
        loop {
            // Register before checking so an enqueue between the check and
            // the await is not missed.
            let notified = self.available.notified();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn try_dequeue(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Stop accepting items and wake every waiter. Items already queued can
    /// still be dequeued.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl<T> Default for BlockQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
