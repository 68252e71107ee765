use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::utils::{BrokerError, Result};

/// Bounded FIFO of items waiting to be sent to one subscriber.
///
/// Every operation takes the internal lock only for the list mutation. A
/// push beyond `capacity` fails with `BufferFull` and leaves the queue as it
/// was. A buffer created with zero capacity is never allocated and every
/// operation on it fails with `Uninitialized`.
#[derive(Debug)]
pub struct OutboundBuffer<T> {
    capacity: usize,
    items: Mutex<Option<VecDeque<T>>>,
}

impl<T> OutboundBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let items = (capacity > 0).then(VecDeque::new);
        Self {
            capacity,
            items: Mutex::new(items),
        }
    }

    /// Appends `item` at the tail.
    pub fn push_back(&self, item: T) -> Result<()> {
        let mut guard = self.lock();
        let items = guard.as_mut().ok_or(BrokerError::Uninitialized)?;
        if items.len() >= self.capacity {
            return Err(BrokerError::BufferFull);
        }
        items.push_back(item);
        Ok(())
    }

    /// Prepends `item` so it is the next one popped, subject to the same
    /// capacity as `push_back`.
    pub fn push_front(&self, item: T) -> Result<()> {
        let mut guard = self.lock();
        let items = guard.as_mut().ok_or(BrokerError::Uninitialized)?;
        if items.len() >= self.capacity {
            return Err(BrokerError::BufferFull);
        }
        items.push_front(item);
        Ok(())
    }

    pub fn pop_front(&self) -> Result<T> {
        let mut guard = self.lock();
        let items = guard.as_mut().ok_or(BrokerError::Uninitialized)?;
        items.pop_front().ok_or(BrokerError::BufferEmpty)
    }

    /// Clone of the head, left in place.
    pub fn peek_front(&self) -> Result<T>
    where
        T: Clone,
    {
        let guard = self.lock();
        let items = guard.as_ref().ok_or(BrokerError::Uninitialized)?;
        items.front().cloned().ok_or(BrokerError::BufferEmpty)
    }

    pub fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops everything still queued and returns how many items that was.
    pub fn clear(&self) -> usize {
        self.lock().as_mut().map_or(0, |items| {
            let dropped = items.len();
            items.clear();
            dropped
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<VecDeque<T>>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}
