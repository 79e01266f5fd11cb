// Michael & Scott lock-free queue with generation-tagged head and tail.
//
// The list always starts with a dummy node. Dequeue moves `head` onto the
// first real node, which becomes the new dummy; its payload is what the
// dequeue returns. `tail` may lag the real last node by one link and any
// thread that notices may swing it forward ("helping").
use std::fmt;
use std::iter;
use std::ptr;

use crossbeam_utils::{Backoff, CachePadded};
use tracing::trace;

use super::tagged_ptr::{AtomicTaggedPtr, TaggedPtr};
use crate::sync::{self, AtomicPtr, Ordering};
use crate::MpmcQueue;

/// Returned by [`MsQueue::dequeue_or_empty`] when no element is available.
/// Every payload is a `u32`, so `-1` never collides with a real value.
pub const EMPTY: i64 = -1;

#[repr(C)]
struct Node {
    value: u32,
    next: AtomicPtr<Node>,
}

impl Node {
    fn alloc(value: u32) -> *mut Node {
        Box::into_raw(Box::new(Node {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// What happens to the old dummy node once a dequeue has moved `head` past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reclamation {
    /// Retired nodes stay chained behind `head` and are freed only when the
    /// queue is borrowed exclusively (`reclaim`, `drain_and_count`, drop).
    #[default]
    Deferred,
    /// The dequeuer frees the old dummy right after its head CAS succeeds.
    /// A concurrent thread that loaded the old head may still read the freed
    /// node. See [`MsQueueBuilder::reclaim_immediately`].
    Immediate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MsQueueBuilder {
    reclamation: Reclamation,
    backoff: bool,
}

impl MsQueueBuilder {
    /// Use bounded exponential backoff between failed attempts instead of a
    /// bare spin hint. Observable behavior is unchanged.
    pub fn backoff(mut self, enabled: bool) -> Self {
        self.backoff = enabled;
        self
    }

    /// Free each old dummy node as soon as it is unlinked.
    ///
    /// # Safety
    ///
    /// Nothing stops another thread that loaded the old `head` or `tail`
    /// from dereferencing the node after it was freed. Its reads are
    /// discarded by the generation check, but the access itself is a
    /// use-after-free. Callers must only select this when no two threads
    /// operate on the queue at the same time, or when they accept that
    /// hazard (e.g. to measure the cost of the missing reclamation scheme).
    pub unsafe fn reclaim_immediately(mut self) -> Self {
        self.reclamation = Reclamation::Immediate;
        self
    }

    pub fn build(self) -> MsQueue {
        let dummy = Node::alloc(0);
        MsQueue {
            head: CachePadded::new(AtomicTaggedPtr::new(TaggedPtr::new(dummy, 0))),
            tail: CachePadded::new(AtomicTaggedPtr::new(TaggedPtr::new(dummy, 0))),
            oldest: dummy,
            reclamation: self.reclamation,
            backoff: self.backoff,
        }
    }
}

/// Unbounded lock-free multi-producer/multi-consumer FIFO queue of `u32`.
///
/// `enqueue` always succeeds; `dequeue` never blocks and returns `None` on
/// an empty queue. Both are lock-free: some thread always completes, but an
/// individual thread may retry indefinitely under contention.
///
/// # Memory
///
/// With the default [`Reclamation::Deferred`] every dequeue leaves one
/// retired node allocated until the queue is borrowed mutably. A queue that
/// stays shared for its whole life (for example behind an `Arc` that is never
/// unwrapped) therefore grows by one node per dequeue until it is dropped.
/// Call [`reclaim`](Self::reclaim) at quiescent points to bound this.
pub struct MsQueue {
    head: CachePadded<AtomicTaggedPtr<Node>>,
    tail: CachePadded<AtomicTaggedPtr<Node>>,
    // First node not yet freed under deferred reclamation. Retired nodes keep
    // their `next` link, so walking from here always reaches `head`.
    oldest: *mut Node,
    reclamation: Reclamation,
    backoff: bool,
}

unsafe impl Send for MsQueue {}
unsafe impl Sync for MsQueue {}

impl MsQueue {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MsQueueBuilder {
        MsQueueBuilder::default()
    }

    pub fn reclamation(&self) -> Reclamation {
        self.reclamation
    }

    pub fn uses_backoff(&self) -> bool {
        self.backoff
    }

    /// Appends `value`. Always returns `true`; the only failure mode is
    /// allocation failure, which aborts before any shared state is touched.
    pub fn enqueue(&self, value: u32) -> bool {
        let node = Node::alloc(value);
        let backoff = Backoff::new();

        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let last = tail.ptr();
            // SAFETY: `tail` always references a node reachable from `head`,
            // and `head` is never null.
            let next = unsafe { (*last).next.load(Ordering::Acquire) };

            if tail != self.tail.load(Ordering::Acquire) {
                self.pause(&backoff);
                continue;
            }

            if next.is_null() {
                // SAFETY: as above.
                let linked = unsafe { &(*last).next }
                    .compare_exchange(
                        ptr::null_mut(),
                        node,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                if linked {
                    // Best effort. If this fails someone already advanced
                    // tail on our behalf.
                    let _ = self.tail.compare_exchange(
                        tail,
                        tail.successor(node),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    return true;
                }
                self.pause(&backoff);
            } else {
                // Tail is lagging; help the stalled enqueuer.
                let _ = self.tail.compare_exchange(
                    tail,
                    tail.successor(next),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
        }
    }

    pub fn dequeue(&self) -> Option<u32> {
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire);
            let first = head.ptr();
            let tail = self.tail.load(Ordering::Acquire);
            // SAFETY: `head` is never null. Under deferred reclamation the node
            // stays allocated even if `head` has already moved on.
            let next = unsafe { (*first).next.load(Ordering::Acquire) };

            if head != self.head.load(Ordering::Acquire) {
                self.pause(&backoff);
                continue;
            }

            if first == tail.ptr() {
                if next.is_null() {
                    return None;
                }
                let _ = self.tail.compare_exchange(
                    tail,
                    tail.successor(next),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                continue;
            }

            debug_assert!(!next.is_null(), "head behind tail without a successor");

            // Read before the CAS: once head moves, another dequeuer may
            // retire `next` in turn.
            // SAFETY: `next` was published by a successful CAS on `first.next`
            // and its `value` is never written after that.
            let value = unsafe { (*next).value };

            if self
                .head
                .compare_exchange(
                    head,
                    head.successor(next),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.retire(first);
                return Some(value);
            }
            self.pause(&backoff);
        }
    }

    /// [`dequeue`](Self::dequeue) with the sentinel encoding: the value
    /// widened to `i64`, or [`EMPTY`].
    pub fn dequeue_or_empty(&self) -> i64 {
        self.dequeue().map_or(EMPTY, i64::from)
    }

    /// Racy hint; another thread may change the answer immediately.
    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        // SAFETY: `head` is never null.
        unsafe { (*head.ptr()).next.load(Ordering::Acquire).is_null() }
    }

    pub fn head_generation(&self) -> u64 {
        self.head.load(Ordering::Acquire).generation()
    }

    pub fn tail_generation(&self) -> u64 {
        self.tail.load(Ordering::Acquire).generation()
    }

    pub fn snapshot(&mut self) -> Vec<u32> {
        let mut values = Vec::new();
        let head = self.head.load(Ordering::Relaxed).ptr();
        // SAFETY: exclusive borrow, so every node from `head` on is live and
        // nothing mutates the links while we walk them.
        let mut cur = unsafe { (*head).next.load(Ordering::Relaxed) };
        while !cur.is_null() {
            unsafe {
                values.push((*cur).value);
                cur = (*cur).next.load(Ordering::Relaxed);
            }
        }
        values
    }

    /// Dequeues everything and returns the count and the values in FIFO
    /// order, then frees the retired nodes.
    pub fn drain_and_count(&mut self) -> (usize, Vec<u32>) {
        let values: Vec<u32> = iter::from_fn(|| self.dequeue()).collect();
        self.reclaim();
        (values.len(), values)
    }

    /// Frees nodes retired since the last reclaim. Returns how many were freed.
    /// Always `0` under [`Reclamation::Immediate`].
    pub fn reclaim(&mut self) -> usize {
        if self.reclamation == Reclamation::Immediate {
            return 0;
        }

        let head = self.head.load(Ordering::Relaxed).ptr();
        let mut freed = 0;
        while self.oldest != head {
            // SAFETY: nodes before `head` are unreachable by any other thread
            // once we hold `&mut self`, and each is freed exactly once here.
            unsafe {
                let next = (*self.oldest).next.load(Ordering::Relaxed);
                drop(Box::from_raw(self.oldest));
                self.oldest = next;
            }
            freed += 1;
        }
        trace!(freed, "reclaimed retired nodes");
        freed
    }

    #[inline]
    fn retire(&self, node: *mut Node) {
        if self.reclamation == Reclamation::Immediate {
            // SAFETY: the head CAS made this node unreachable from `head`;
            // only the winner of that CAS gets here. Threads holding a stale
            // snapshot may still touch it, see `reclaim_immediately`.
            unsafe { drop(Box::from_raw(node)) };
        }
    }

    #[inline]
    fn pause(&self, backoff: &Backoff) {
        sync::pause(self.backoff.then_some(backoff));
    }
}

impl Default for MsQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MsQueue {
    fn drop(&mut self) {
        let mut cur = match self.reclamation {
            Reclamation::Deferred => self.oldest,
            Reclamation::Immediate => self.head.load(Ordering::Relaxed).ptr(),
        };
        while !cur.is_null() {
            // SAFETY: exclusive access; every node from `cur` on is owned by
            // the queue and freed once.
            unsafe {
                let next = (*cur).next.load(Ordering::Relaxed);
                drop(Box::from_raw(cur));
                cur = next;
            }
        }
    }
}

impl fmt::Debug for MsQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsQueue")
            .field("head", &*self.head)
            .field("tail", &*self.tail)
            .field("reclamation", &self.reclamation)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl MpmcQueue<u32> for MsQueue {
    type PushError = std::convert::Infallible;

    fn push(&self, item: u32) -> Result<(), Self::PushError> {
        self.enqueue(item);
        Ok(())
    }

    fn pop(&self) -> Option<u32> {
        self.dequeue()
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn drain(&mut self) -> Vec<u32> {
        self.drain_and_count().1
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    // Links `value` after the current last node without touching `tail`,
    // leaving the queue in the state a stalled enqueuer leaves behind.
    fn link_without_tail(queue: &MsQueue, value: u32) {
        let node = Node::alloc(value);
        let last = queue.tail.load(Ordering::Acquire).ptr();
        let next = unsafe { &(*last).next };
        next.compare_exchange(ptr::null_mut(), node, Ordering::AcqRel, Ordering::Acquire)
            .expect("tail should be the last node");
    }

    #[test]
    fn enqueue_helps_lagging_tail() {
        let mut queue = MsQueue::new();
        link_without_tail(&queue, 1);
        assert_eq!(queue.tail_generation(), 0);

        assert!(queue.enqueue(2));
        // One CAS helping the stalled link, one for our own node.
        assert_eq!(queue.tail_generation(), 2);
        assert_eq!(queue.snapshot(), vec![1, 2]);
    }

    #[test]
    fn dequeue_helps_lagging_tail_before_moving_head() {
        let queue = MsQueue::new();
        link_without_tail(&queue, 9);

        assert_eq!(queue.dequeue(), Some(9));
        assert_eq!(queue.tail_generation(), 1);
        assert_eq!(queue.head_generation(), 1);
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn empty_queue_with_lagging_tail_is_not_reported_empty() {
        let queue = MsQueue::new();
        link_without_tail(&queue, 4);
        assert!(!queue.is_empty());
        assert_eq!(queue.dequeue_or_empty(), 4);
        assert_eq!(queue.dequeue_or_empty(), EMPTY);
    }

    #[test]
    fn retired_nodes_stay_chained_to_head() {
        let mut queue = MsQueue::new();
        for i in 0..3 {
            queue.enqueue(i);
        }
        for _ in 0..3 {
            queue.dequeue();
        }

        let mut cur = queue.oldest;
        let mut hops = 0;
        let head = queue.head.load(Ordering::Relaxed).ptr();
        while cur != head {
            cur = unsafe { (*cur).next.load(Ordering::Relaxed) };
            hops += 1;
        }
        assert_eq!(hops, 3);
        assert_eq!(queue.reclaim(), 3);
        assert_eq!(queue.oldest, head);
    }
}
