// Comparison queue for the benchmark driver: crossbeam's segmented
// lock-free queue behind the same trait as `MsQueue`.
use std::convert::Infallible;
use std::fmt;
use std::iter;

use crossbeam_queue::SegQueue;

use crate::MpmcQueue;

pub struct SegQueueBaseline<T> {
    inner: SegQueue<T>,
}

impl<T> SegQueueBaseline<T> {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }
}

impl<T> Default for SegQueueBaseline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SegQueueBaseline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegQueueBaseline")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl<T: Send + 'static> MpmcQueue<T> for SegQueueBaseline<T> {
    type PushError = Infallible;

    fn push(&self, item: T) -> Result<(), Self::PushError> {
        self.inner.push(item);
        Ok(())
    }

    fn pop(&self) -> Option<T> {
        self.inner.pop()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn drain(&mut self) -> Vec<T> {
        iter::from_fn(|| self.inner.pop()).collect()
    }
}
