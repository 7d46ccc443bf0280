//! Pending output values
//!
//! An output keeps at most one value waiting for the next write cycle. A new
//! value scheduled before that cycle replaces the old one.

use parking_lot::Mutex;

/// Single-slot queue: last write wins
#[derive(Debug)]
pub struct SingleValueQueue<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for SingleValueQueue<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> SingleValueQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`; returns true if an earlier value was replaced
    pub fn enqueue(&self, value: T) -> bool {
        self.slot.lock().replace(value).is_some()
    }

    /// Take the pending value, leaving the queue empty
    pub fn dequeue(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_last_write_wins() {
        let queue = SingleValueQueue::new();
        assert!(!queue.enqueue(1.0));
        assert!(queue.enqueue(2.0));
        assert_eq!(queue.dequeue(), Some(2.0));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_is_pending() {
        let queue = SingleValueQueue::new();
        assert!(!queue.is_pending());
        queue.enqueue(true);
        assert!(queue.is_pending());
        queue.dequeue();
        assert!(!queue.is_pending());
    }

    #[test]
    fn test_concurrent_enqueue_keeps_one_value() {
        let queue = Arc::new(SingleValueQueue::new());
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    queue.enqueue(i);
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.join();
        }

        let value = queue.dequeue();
        assert!(matches!(value, Some(v) if v < 8));
        assert_eq!(queue.dequeue(), None);
    }
}
