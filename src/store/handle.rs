//! Owning handles into a [`PoolAllocator`](crate::store::pool::PoolAllocator).
//!
//! ## Key Components
//!
//! - [`SlotHandle`]: identifies one slot of one pool: pool id, partition
//!   index, slot index and the generation the slot had when it was handed
//!   out. Not `Clone`, so exactly one handle exists per granted slot.
//! - [`Pooled<T>`]: a [`SlotHandle`] plus a typed pointer to the value that
//!   was constructed in that slot. Produced by
//!   [`Allocator::create`](crate::traits::Allocator::create) and consumed by
//!   [`Allocator::destroy`](crate::traits::Allocator::destroy).
//!
//! ## Ownership Flow
//!
//! ```text
//!   allocator.create(value) ──► Pooled<T> ──► cache entry
//!                                                  │ eviction / clear / drop
//!                                                  ▼
//!                               allocator.destroy(pooled) ──► slot free again
//! ```
//!
//! A handle whose slot was released behind its back (for instance through
//! [`release_addr`](crate::store::pool::PoolAllocator::release_addr)) carries
//! an outdated generation and is rejected with
//! [`AllocError::StaleHandle`](crate::error::AllocError::StaleHandle) instead
//! of aliasing the slot's new occupant.
//!
//! Dropping a `Pooled<T>` without destroying it leaks the slot and the
//! value's destructor, like [`std::mem::forget`].

use std::fmt;
use std::ptr::NonNull;

/// Unique reference to one slot of a pool.
#[derive(Debug, PartialEq, Eq)]
pub struct SlotHandle {
    pub(crate) pool: u64,
    pub(crate) class: usize,
    pub(crate) slot: usize,
    pub(crate) generation: u32,
}

impl SlotHandle {
    /// Index of the partition (size class) the slot belongs to.
    #[inline]
    pub fn class_index(&self) -> usize {
        self.class
    }

    /// Index of the slot within its partition.
    #[inline]
    pub fn slot_index(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// A value of type `T` living in a pool slot.
///
/// Access the value through
/// [`Allocator::resolve`](crate::traits::Allocator::resolve) or
/// [`Allocator::resolve_mut`](crate::traits::Allocator::resolve_mut).
#[must_use = "dropping a Pooled value leaks its slot; pass it to Allocator::destroy"]
pub struct Pooled<T: ?Sized> {
    ptr: NonNull<T>,
    handle: SlotHandle,
}

impl<T: ?Sized> Pooled<T> {
    /// Builds a handle from its parts.
    ///
    /// # Safety
    ///
    /// `ptr` must point to an initialized `T` stored in the slot named by
    /// `handle`, and no other `Pooled` may refer to that slot.
    #[inline]
    pub unsafe fn from_raw_parts(ptr: NonNull<T>, handle: SlotHandle) -> Self {
        Self { ptr, handle }
    }

    /// Splits the handle into its pointer and slot.
    #[inline]
    pub fn into_raw_parts(self) -> (NonNull<T>, SlotHandle) {
        (self.ptr, self.handle)
    }

    #[inline]
    pub fn handle(&self) -> &SlotHandle {
        &self.handle
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T: ?Sized> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("class", &self.handle.class)
            .field("slot", &self.handle.slot)
            .field("generation", &self.handle.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_parts_round_trip_keeps_handle() {
        let mut value = 5u32;
        let handle = SlotHandle {
            pool: 1,
            class: 2,
            slot: 3,
            generation: 4,
        };
        let ptr = NonNull::from(&mut value);
        // SAFETY: the pointer is only split back out, never dereferenced
        let pooled = unsafe { Pooled::from_raw_parts(ptr, handle) };
        assert_eq!(pooled.handle().class_index(), 2);
        assert_eq!(pooled.handle().slot_index(), 3);
        assert_eq!(pooled.handle().generation(), 4);

        let (back, handle) = pooled.into_raw_parts();
        assert_eq!(back, ptr);
        assert_eq!(handle.pool, 1);
    }

    #[test]
    fn debug_shows_slot_coordinates() {
        let mut value = 0u8;
        let handle = SlotHandle {
            pool: 9,
            class: 0,
            slot: 7,
            generation: 1,
        };
        // SAFETY: formatting does not dereference the pointer
        let pooled = unsafe { Pooled::from_raw_parts(NonNull::from(&mut value), handle) };
        let dbg = format!("{:?}", pooled);
        assert!(dbg.contains("slot: 7"));
        let _ = pooled.into_raw_parts();
    }
}
