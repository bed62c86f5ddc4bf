//! Shared append buffer between source loops and the drain task.
//!
//! All locking operations go through one mutex. The `*_unlocked` operations
//! take `&mut self`, so the borrow checker proves exclusivity instead of the
//! lock; they are meant for teardown once every producer has finished.

use parking_lot::Mutex;

/// Mutex-guarded growable sequence with an atomic drain-if-threshold-met.
#[derive(Debug)]
pub struct LockingBuffer<T> {
    items: Mutex<Vec<T>>,
}

impl<T> LockingBuffer<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Append one value.
    pub fn push(&self, value: T) {
        self.items.lock().push(value);
    }

    /// Append several values under a single lock acquisition, keeping them
    /// contiguous. Returns the length afterwards.
    pub fn extend<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut items = self.items.lock();
        items.extend(values);
        items.len()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Take the whole contents if at least `n` values are buffered.
    ///
    /// The length check and the take happen in one critical section.
    pub fn drain_if_at_least(&self, n: usize) -> Option<Vec<T>> {
        take_if_at_least(&mut self.items.lock(), n)
    }

    /// Take the whole contents if anything is buffered.
    pub fn drain(&self) -> Option<Vec<T>> {
        self.drain_if_at_least(1)
    }

    pub fn push_unlocked(&mut self, value: T) {
        self.items.get_mut().push(value);
    }

    pub fn drain_if_at_least_unlocked(&mut self, n: usize) -> Option<Vec<T>> {
        take_if_at_least(self.items.get_mut(), n)
    }

    pub fn drain_unlocked(&mut self) -> Option<Vec<T>> {
        self.drain_if_at_least_unlocked(1)
    }

    pub fn into_inner(self) -> Vec<T> {
        self.items.into_inner()
    }
}

impl<T> Default for LockingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn take_if_at_least<T>(items: &mut Vec<T>, n: usize) -> Option<Vec<T>> {
    if items.len() >= n {
        Some(std::mem::take(items))
    } else {
        None
    }
}
