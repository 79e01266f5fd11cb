pub mod ms_queue;
pub mod tagged_ptr;

pub use ms_queue::{MsQueue, MsQueueBuilder, Reclamation, EMPTY};
pub use tagged_ptr::{AtomicTaggedPtr, TaggedPtr, GENERATION_BITS};
