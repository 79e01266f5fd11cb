pub mod baseline;
pub mod bench;
pub mod error;
pub mod mpmc;
mod sync;

pub use baseline::SegQueueBaseline;

pub use mpmc::AtomicTaggedPtr;
pub use mpmc::MsQueue;
pub use mpmc::MsQueueBuilder;
pub use mpmc::Reclamation;
pub use mpmc::TaggedPtr;
pub use mpmc::EMPTY;

// Common interface for MPMC queues. The benchmark driver is written against
// this so the tagged MS queue can be compared with other implementations.
pub trait MpmcQueue<T: Send>: Send + Sync + 'static {
    type PushError: std::fmt::Debug;

    fn push(&self, item: T) -> Result<(), Self::PushError>;
    fn pop(&self) -> Option<T>;
    fn is_empty(&self) -> bool;
    // Requires exclusive access: only valid once no other thread uses the queue.
    fn drain(&mut self) -> Vec<T>;
}
