//! Blocking FIFO queue with deadline-bounded `get`.

use crate::time::Deadline;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// Multi-producer, multi-consumer FIFO whose consumers can block with a deadline.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append `item` and wake one blocked consumer.
    pub fn put(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// Push `item` to the head so it is the next one taken, and wake one consumer.
    pub fn put_front(&self, item: T) {
        self.items.lock().push_front(item);
        self.available.notify_one();
    }

    /// Remove the head, blocking until an item arrives or `deadline` passes.
    pub fn get(&self, deadline: Deadline) -> Option<T> {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if !deadline.wait(&self.available, &mut items) {
                return items.pop_front();
            }
        }
    }

    /// Remove the head without blocking.
    pub fn try_get(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Inspect the head without removing it.
    pub fn peek<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.items.lock().front())
    }

    /// Whether the queue is empty right now.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Drop every item for which `keep` returns false.
    pub fn retain(&self, keep: impl FnMut(&T) -> bool) {
        self.items.lock().retain(keep);
    }

    /// Take every queued item, leaving the queue empty.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }
}
