//! Deferred destruction of GPU objects
//!
//! Cleanup actions are queued as they are created and run last-in first-out,
//! so an object is always destroyed before anything it was built from. Actions
//! own what they destroy: handles are moved in by value and the device is
//! captured through an `Rc`/`Arc`, so nothing in a queued action can dangle.
//!
//! Flushing is only safe once the GPU no longer references any of the queued
//! objects (after the device is idle, or for a scoped temporary after its
//! submission has completed). The queue does not check this.

/// A deferred cleanup action
pub type Deletor = Box<dyn FnOnce()>;

/// Ordered list of cleanup actions flushed in reverse registration order
#[derive(Default)]
pub struct DeletionQueue {
    deletors: Vec<Deletor>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a cleanup action
    pub fn push<F>(&mut self, action: F)
    where
        F: FnOnce() + 'static,
    {
        self.deletors.push(Box::new(action));
    }

    /// Run every pending action, most recently pushed first, and leave the
    /// queue empty and reusable
    pub fn flush(&mut self) {
        if self.deletors.is_empty() {
            return;
        }
        log::trace!("Flushing {} deferred deletions", self.deletors.len());
        while let Some(action) = self.deletors.pop() {
            action();
        }
    }

    pub fn len(&self) -> usize {
        self.deletors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletors.is_empty()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        // Running the actions here could destroy objects the GPU still uses
        if !self.deletors.is_empty() {
            log::warn!(
                "Deletion queue dropped with {} pending actions; GPU objects leaked",
                self.deletors.len()
            );
        }
    }
}

impl std::fmt::Debug for DeletionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionQueue")
            .field("pending", &self.deletors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_queue(count: usize) -> (DeletionQueue, Rc<RefCell<Vec<usize>>>) {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DeletionQueue::new();
        for i in 0..count {
            let order = Rc::clone(&order);
            queue.push(move || order.borrow_mut().push(i));
        }
        (queue, order)
    }

    #[test]
    fn test_flush_runs_in_reverse_order() {
        for count in [1, 2, 5, 32] {
            let (mut queue, order) = recording_queue(count);
            assert_eq!(queue.len(), count);
            queue.flush();
            let expected: Vec<usize> = (0..count).rev().collect();
            assert_eq!(*order.borrow(), expected);
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let mut queue = DeletionQueue::new();
        queue.flush();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_second_flush_runs_nothing() {
        let (mut queue, order) = recording_queue(3);
        queue.flush();
        queue.flush();
        assert_eq!(order.borrow().len(), 3);
    }

    #[test]
    fn test_queue_is_reusable_after_flush() {
        let (mut queue, order) = recording_queue(2);
        queue.flush();

        let late = Rc::clone(&order);
        queue.push(move || late.borrow_mut().push(99));
        queue.flush();

        assert_eq!(*order.borrow(), vec![1, 0, 99]);
    }

    #[test]
    fn test_actions_own_captured_values() {
        let dropped = Rc::new(RefCell::new(false));
        struct Guard(Rc<RefCell<bool>>);
        impl Drop for Guard {
            fn drop(&mut self) {
                *self.0.borrow_mut() = true;
            }
        }

        let mut queue = DeletionQueue::new();
        let guard = Guard(Rc::clone(&dropped));
        queue.push(move || drop(guard));
        assert!(!*dropped.borrow());

        queue.flush();
        assert!(*dropped.borrow());
    }
}
