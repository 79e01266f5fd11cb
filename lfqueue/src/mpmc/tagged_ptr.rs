// Pointer + generation counter packed into one 64-bit word.
//
// 64-bit targets: bits 0..48 hold the address, bits 48..64 the generation.
// 32-bit targets: bits 0..32 hold the address, bits 32..64 the generation.
// Either way the pair is loaded and CASed as a single AtomicU64, so a CAS can
// never observe an address from one update and a generation from another.
use std::fmt;
use std::marker::PhantomData;

use crate::sync::{AtomicU64, Ordering};

const ADDR_BITS: u32 = if usize::BITS >= 64 { 48 } else { usize::BITS };
const ADDR_MASK: u64 = (1u64 << ADDR_BITS) - 1;

/// Number of bits available to the generation counter on this target.
pub const GENERATION_BITS: u32 = 64 - ADDR_BITS;
pub(crate) const GENERATION_MAX: u64 = u64::MAX >> ADDR_BITS;

/// A versioned reference: node address plus a generation that is bumped on
/// every successful CAS that moves the pointer.
///
/// Two tagged pointers are equal only if both the address and the generation
/// match, which is what makes a delayed CAS carrying a stale pair fail even
/// when the address has been freed and handed out again.
pub struct TaggedPtr<T> {
    raw: u64,
    _marker: PhantomData<*mut T>,
}

impl<T> TaggedPtr<T> {
    /// Packs `ptr` and `generation`. The generation is truncated to
    /// [`GENERATION_BITS`] bits, so it wraps on overflow.
    ///
    /// # Panics
    ///
    /// Panics if the address does not fit in the address field. On 64-bit
    /// targets that field is 48 bits wide, so targets whose heap addresses use
    /// more bits are not supported: x86_64 with 5-level paging (LA57) handing
    /// out addresses above 2^48, or aarch64 with top-byte tagging (TBI, MTE,
    /// HWASan) storing a tag in the upper byte.
    #[inline]
    pub fn new(ptr: *mut T, generation: u64) -> Self {
        let addr = ptr as usize as u64;
        assert!(
            addr & !ADDR_MASK == 0,
            "address {addr:#x} does not fit in {ADDR_BITS} bits"
        );
        Self::from_raw(addr | ((generation & GENERATION_MAX) << ADDR_BITS))
    }

    #[inline]
    pub const fn null() -> Self {
        Self::from_raw(0)
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn into_raw(self) -> u64 {
        self.raw
    }

    #[inline]
    pub fn ptr(self) -> *mut T {
        (self.raw & ADDR_MASK) as usize as *mut T
    }

    #[inline]
    pub const fn generation(self) -> u64 {
        self.raw >> ADDR_BITS
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.raw & ADDR_MASK == 0
    }

    /// The value a CAS installs when it moves this pointer to `ptr`:
    /// `(ptr, generation + 1)`, wrapping.
    #[inline]
    pub fn successor(self, ptr: *mut T) -> Self {
        Self::new(ptr, self.generation().wrapping_add(1))
    }
}

impl<T> Clone for TaggedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TaggedPtr<T> {}

impl<T> PartialEq for TaggedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for TaggedPtr<T> {}

impl<T> fmt::Debug for TaggedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedPtr")
            .field("ptr", &self.ptr())
            .field("generation", &self.generation())
            .finish()
    }
}

pub struct AtomicTaggedPtr<T> {
    inner: AtomicU64,
    _marker: PhantomData<*mut T>,
}

// The cell only stores an address; ownership of the pointee is managed by
// whoever uses the cell.
unsafe impl<T> Send for AtomicTaggedPtr<T> {}
unsafe impl<T> Sync for AtomicTaggedPtr<T> {}

impl<T> AtomicTaggedPtr<T> {
    pub fn new(value: TaggedPtr<T>) -> Self {
        Self {
            inner: AtomicU64::new(value.into_raw()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> TaggedPtr<T> {
        TaggedPtr::from_raw(self.inner.load(order))
    }

    /// Single-word CAS on the packed pair. Like the std atomics, returns the
    /// previous value on success and the value actually stored on failure.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: TaggedPtr<T>,
        new: TaggedPtr<T>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedPtr<T>, TaggedPtr<T>> {
        self.inner
            .compare_exchange(current.into_raw(), new.into_raw(), success, failure)
            .map(TaggedPtr::from_raw)
            .map_err(TaggedPtr::from_raw)
    }
}

impl<T> fmt::Debug for AtomicTaggedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(Ordering::Relaxed), f)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn packs_and_unpacks_both_fields() {
        let mut slot = 0u64;
        let p: *mut u64 = &mut slot;

        let tagged = TaggedPtr::new(p, 7);
        assert_eq!(tagged.ptr(), p);
        assert_eq!(tagged.generation(), 7);
        assert!(!tagged.is_null());
    }

    #[test]
    fn equality_needs_address_and_generation() {
        let mut a = 0u64;
        let mut b = 0u64;
        let pa: *mut u64 = &mut a;
        let pb: *mut u64 = &mut b;

        assert_eq!(TaggedPtr::new(pa, 3), TaggedPtr::new(pa, 3));
        assert_ne!(TaggedPtr::new(pa, 3), TaggedPtr::new(pa, 4));
        assert_ne!(TaggedPtr::new(pa, 3), TaggedPtr::new(pb, 3));
    }

    #[test]
    fn successor_bumps_generation_and_wraps() {
        let mut slot = 0u64;
        let p: *mut u64 = &mut slot;

        let next = TaggedPtr::new(p, 41).successor(p);
        assert_eq!(next.generation(), 42);

        let wrapped = TaggedPtr::new(p, GENERATION_MAX).successor(p);
        assert_eq!(wrapped.generation(), 0);
        assert_eq!(wrapped.ptr(), p);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "does not fit in 48 bits")]
    fn address_above_48_bits_is_rejected() {
        let tagged_high = (1usize << 56) as *mut u64;
        let _ = TaggedPtr::new(tagged_high, 0);
    }

    #[test]
    fn null_is_generation_zero() {
        let null = TaggedPtr::<u64>::null();
        assert!(null.is_null());
        assert!(null.ptr().is_null());
        assert_eq!(null.generation(), 0);
    }

    #[test]
    fn compare_exchange_returns_previous_value() {
        let mut a = 0u64;
        let mut b = 0u64;
        let pa: *mut u64 = &mut a;
        let pb: *mut u64 = &mut b;

        let first = TaggedPtr::new(pa, 0);
        let cell = AtomicTaggedPtr::new(first);
        let next = first.successor(pb);

        let prev = cell
            .compare_exchange(first, next, Ordering::AcqRel, Ordering::Acquire)
            .unwrap();
        assert_eq!(prev, first);
        assert_eq!(cell.load(Ordering::Acquire), next);
    }

    #[test]
    fn stale_pair_fails_cas_after_address_reuse() {
        let mut slot = 0u64;
        let p: *mut u64 = &mut slot;

        let cell = AtomicTaggedPtr::new(TaggedPtr::new(p, 0));
        let stale = cell.load(Ordering::Acquire);

        // A -> B -> A with the same address, as after free + reallocation.
        let mut other = 0u64;
        let q: *mut u64 = &mut other;
        let moved = stale.successor(q);
        cell.compare_exchange(stale, moved, Ordering::AcqRel, Ordering::Acquire)
            .unwrap();
        let back = moved.successor(p);
        cell.compare_exchange(moved, back, Ordering::AcqRel, Ordering::Acquire)
            .unwrap();

        let err = cell
            .compare_exchange(stale, stale.successor(q), Ordering::AcqRel, Ordering::Acquire)
            .unwrap_err();
        assert_eq!(err, back);
        assert_eq!(err.ptr(), stale.ptr());
        assert_eq!(err.generation(), 2);
        assert_eq!(cell.load(Ordering::Acquire), back, "Failed CAS must not store");
    }
}
