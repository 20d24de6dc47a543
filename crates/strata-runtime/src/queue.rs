use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use strata_world::CancelToken;

/// Upper bound on one condvar wait so a blocked consumer rechecks its
/// cancel token even if a wakeup is missed.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// FIFO shared between producers and blocking consumers.
pub struct ConcurrentQueue<T> {
    items: Mutex<VecDeque<T>>,
    ready: Condvar,
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().unwrap().push_back(item);
        self.ready.notify_one();
    }

    /// Non-blocking.
    pub fn pop(&self) -> Option<T> {
        self.items.lock().unwrap().pop_front()
    }

    /// Blocks until an item arrives. `None` once `cancel` fires.
    pub fn wait_and_pop(&self, cancel: &CancelToken) -> Option<T> {
        let mut items = self.items.lock().unwrap();
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            items = self.ready.wait_timeout(items, WAIT_SLICE).unwrap().0;
        }
    }

    /// Stable sort of everything still queued.
    pub fn sort_by_key<K: Ord>(&self, mut key: impl FnMut(&T) -> K) {
        let mut items = self.items.lock().unwrap();
        items.make_contiguous().sort_by_key(|t| key(t));
    }

    pub fn retain(&self, keep: impl FnMut(&T) -> bool) {
        self.items.lock().unwrap().retain(keep);
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.items.lock().unwrap().clear();
    }

    /// Wakes every blocked consumer so it can observe cancellation.
    pub fn wake_all(&self) {
        let _items = self.items.lock().unwrap();
        self.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fifo_and_stable_sort() {
        let q = ConcurrentQueue::new();
        for v in [(3, 'a'), (1, 'b'), (3, 'c'), (0, 'd')] {
            q.push(v);
        }
        q.sort_by_key(|(k, _)| *k);
        let order: Vec<_> = std::iter::from_fn(|| q.pop()).collect();
        assert_eq!(order, vec![(0, 'd'), (1, 'b'), (3, 'a'), (3, 'c')]);
        assert!(q.pop().is_none());
    }

    #[test]
    fn blocked_consumer_wakes_on_push_and_cancel() {
        let q = ConcurrentQueue::new();
        let cancel = CancelToken::new();
        thread::scope(|s| {
            let got = s.spawn(|| q.wait_and_pop(&cancel));
            q.push(7u32);
            assert_eq!(got.join().unwrap(), Some(7));

            let idle = s.spawn(|| q.wait_and_pop(&cancel));
            cancel.cancel();
            q.wake_all();
            assert_eq!(idle.join().unwrap(), None);
        });
    }
}
