//! Segregated size-class pool allocator.
//!
//! Owns one flat, 16-byte aligned arena split into equally sized partitions
//! ("blocks"), one per distinct element size. Each partition is carved into
//! `block_size / element_size` fixed slots whose occupancy lives in an
//! [`OccupancyBitmap`]; there is no free list.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                 PoolAllocator (block_size = 64, classes = [8, 16, 24])      │
//! │                                                                             │
//! │  arena: [u8; 192]                                                           │
//! │  ┌──────────────────────────┬──────────────────────────┬──────────────────┐ │
//! │  │ class 0: 8 B × 8 slots   │ class 1: 16 B × 4 slots  │ class 2: 24 B × 2│ │
//! │  │ [■][■][□][□][□][□][□][□] │ [■][□][□][□]             │ [□][□] + 16 tail │ │
//! │  └──────────────────────────┴──────────────────────────┴──────────────────┘ │
//! │   offset 0                   offset 64                  offset 128          │
//! │                                                                             │
//! │  classes: sorted by element size, binary searched on allocate               │
//! │  occupancy[i]: OccupancyBitmap, generation[i]: Vec<u32>                     │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Address Arithmetic
//!
//! ```text
//!   allocate:  addr   = base + class_idx * block_size + slot * element_size
//!   release:   offset = addr - base
//!              class  = offset / block_size
//!              slot   = (offset % block_size) / element_size
//! ```
//!
//! ## Core Operations
//!
//! | Operation       | Description                                   | Complexity |
//! |-----------------|-----------------------------------------------|------------|
//! | `allocate`      | Exact-size class lookup, first free slot      | O(log c + n/64) |
//! | `deallocate`    | Release by handle (generation checked)        | O(1)       |
//! | `release_addr`  | Release by address (bounds checked)           | O(1)       |
//! | `create`        | `allocate` + move value into slot             | O(log c + n/64) |
//! | `destroy`       | Drop value in place + `deallocate`            | O(1)       |
//!
//! ## Error Semantics
//!
//! - No class of the requested size, or the class is full:
//!   [`AllocError::OutOfMemory`].
//! - Address outside the arena, or in the unusable tail of a block:
//!   [`AllocError::ForeignPointer`]; the occupancy map is left untouched.
//! - Address of a free slot: [`AllocError::DoubleFree`].
//! - Handle from another pool: [`AllocError::ForeignHandle`]; handle whose
//!   slot has been released since: [`AllocError::StaleHandle`].
//!
//! ## Example Usage
//!
//! ```
//! use poolcache::error::AllocError;
//! use poolcache::store::pool::PoolAllocator;
//!
//! let mut pool = PoolAllocator::new(32, [8, 16]).unwrap();
//! assert_eq!(pool.slot_count(8), Some(4));
//! assert_eq!(pool.slot_count(16), Some(2));
//!
//! let a = pool.allocate(16).unwrap();
//! let b = pool.allocate(16).unwrap();
//! assert_eq!(pool.allocate(16).unwrap_err(), AllocError::OutOfMemory { size: 16 });
//!
//! pool.deallocate(a).unwrap();
//! let c = pool.allocate(16).unwrap();
//! assert_eq!(c.slot_index(), 0);
//! # pool.deallocate(b).unwrap();
//! # pool.deallocate(c).unwrap();
//! ```
//!
//! ## Notes
//!
//! - Values still alive when the pool is dropped are leaked, not dropped;
//!   owners are expected to destroy what they created.
//! - Not thread-safe; the raw arena pointer keeps the type `!Send + !Sync`.

use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use crate::builder::PoolConfig;
use crate::ds::OccupancyBitmap;
use crate::error::{AllocError, ConfigError, InvariantError};
use crate::store::handle::{Pooled, SlotHandle};
use crate::traits::Allocator;

/// Alignment of the arena base address.
pub const ARENA_ALIGN: usize = 16;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct SizeClass {
    element_size: usize,
    occupancy: OccupancyBitmap,
    generations: Vec<u32>,
}

impl SizeClass {
    fn new(element_size: usize, block_size: usize) -> Self {
        let slot_count = block_size / element_size;
        Self {
            element_size,
            occupancy: OccupancyBitmap::new(slot_count),
            generations: vec![0; slot_count],
        }
    }

    #[inline]
    fn slot_count(&self) -> usize {
        self.occupancy.len()
    }
}

/// Per-class occupancy figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassStats {
    pub element_size: usize,
    pub slot_count: usize,
    pub used: usize,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub block_size: usize,
    pub arena_len: usize,
    pub classes: Vec<ClassStats>,
}

impl PoolStats {
    pub fn total_slots(&self) -> usize {
        self.classes.iter().map(|c| c.slot_count).sum()
    }

    pub fn used_slots(&self) -> usize {
        self.classes.iter().map(|c| c.used).sum()
    }
}

/// Fixed-size arena allocator with one partition per element size.
#[derive(Debug)]
pub struct PoolAllocator {
    id: u64,
    base: NonNull<u8>,
    layout: Option<Layout>,
    block_size: usize,
    classes: Vec<SizeClass>,
}

impl PoolAllocator {
    /// Creates a pool of `size_classes.len()` partitions of `block_size`
    /// bytes each.
    ///
    /// Size classes are deduplicated and sorted ascending.
    ///
    /// # Example
    ///
    /// ```
    /// use poolcache::store::pool::PoolAllocator;
    ///
    /// let pool = PoolAllocator::new(64, [16, 8, 16]).unwrap();
    /// assert_eq!(pool.size_classes(), vec![8, 16]);
    /// assert_eq!(pool.arena_len(), 128);
    /// ```
    pub fn new(
        block_size: usize,
        size_classes: impl IntoIterator<Item = usize>,
    ) -> Result<Self, ConfigError> {
        let mut config = PoolConfig::new(block_size);
        for size in size_classes {
            config = config.with_size_class(size);
        }
        Self::from_config(&config)
    }

    /// Creates a pool from a validated [`PoolConfig`].
    pub fn from_config(config: &PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let block_size = config.block_size();
        let sizes = config.normalized_classes();
        let arena_len = block_size
            .checked_mul(sizes.len())
            .ok_or_else(|| ConfigError::new("arena size overflows usize"))?;

        let (base, layout) = if arena_len == 0 {
            (NonNull::dangling(), None)
        } else {
            let layout = Layout::from_size_align(arena_len, ARENA_ALIGN)
                .map_err(|_| ConfigError::new("arena size exceeds isize::MAX"))?;
            // SAFETY: layout has non-zero size
            let raw = unsafe { alloc(layout) };
            let base = match NonNull::new(raw) {
                Some(base) => base,
                None => handle_alloc_error(layout),
            };
            (base, Some(layout))
        };

        let classes: Vec<SizeClass> = sizes
            .iter()
            .map(|&size| SizeClass::new(size, block_size))
            .collect();
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            pool = id,
            block_size,
            arena_len,
            size_classes = ?sizes,
            "created pool allocator"
        );

        Ok(Self {
            id,
            base,
            layout,
            block_size,
            classes,
        })
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total arena length in bytes.
    #[inline]
    pub fn arena_len(&self) -> usize {
        self.block_size * self.classes.len()
    }

    /// Element sizes, ascending.
    pub fn size_classes(&self) -> Vec<usize> {
        self.classes.iter().map(|c| c.element_size).collect()
    }

    /// Number of slots in the class for `element_size`.
    pub fn slot_count(&self, element_size: usize) -> Option<usize> {
        let idx = self.class_index(element_size)?;
        Some(self.classes[idx].slot_count())
    }

    /// Number of occupied slots in the class for `element_size`.
    pub fn used_slots(&self, element_size: usize) -> Option<usize> {
        let idx = self.class_index(element_size)?;
        Some(self.classes[idx].occupancy.count_ones())
    }

    /// Returns `true` if `addr` lies inside the arena.
    pub fn contains_addr(&self, addr: *const u8) -> bool {
        let start = self.base.as_ptr().addr();
        let addr = addr.addr();
        addr >= start && addr - start < self.arena_len()
    }

    /// Returns `true` if `handle` names a slot this pool currently has marked
    /// as used for that handle.
    pub fn is_slot_used(&self, handle: &SlotHandle) -> bool {
        self.check_handle(handle).is_ok()
    }

    /// Bit-for-bit copy of every partition's occupancy map, ascending by
    /// element size.
    pub fn occupancy_snapshot(&self) -> Vec<Vec<bool>> {
        self.classes.iter().map(|c| c.occupancy.to_bools()).collect()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            block_size: self.block_size,
            arena_len: self.arena_len(),
            classes: self
                .classes
                .iter()
                .map(|c| ClassStats {
                    element_size: c.element_size,
                    slot_count: c.slot_count(),
                    used: c.occupancy.count_ones(),
                })
                .collect(),
        }
    }

    /// Reserves the first free slot of the class whose element size equals
    /// `element_size`.
    pub fn allocate(&mut self, element_size: usize) -> Result<SlotHandle, AllocError> {
        let Some(class_idx) = self.class_index(element_size) else {
            trace!(pool = self.id, size = element_size, "no size class for request");
            return Err(AllocError::OutOfMemory { size: element_size });
        };
        let class = &mut self.classes[class_idx];
        let Some(slot) = class.occupancy.first_clear() else {
            trace!(pool = self.id, size = element_size, "size class exhausted");
            return Err(AllocError::OutOfMemory { size: element_size });
        };

        class.occupancy.set(slot);
        let generation = class.generations[slot].wrapping_add(1);
        class.generations[slot] = generation;
        trace!(pool = self.id, size = element_size, slot, "allocated slot");

        Ok(SlotHandle {
            pool: self.id,
            class: class_idx,
            slot,
            generation,
        })
    }

    /// Returns the slot named by `handle` to the pool.
    pub fn deallocate(&mut self, handle: SlotHandle) -> Result<(), AllocError> {
        if let Err(err) = self.check_handle(&handle) {
            warn!(pool = self.id, %err, "rejected slot release");
            return Err(err);
        }
        self.classes[handle.class].occupancy.clear(handle.slot);
        trace!(
            pool = self.id,
            size = self.classes[handle.class].element_size,
            slot = handle.slot,
            "released slot"
        );
        Ok(())
    }

    /// Start address of the slot named by `handle`.
    pub fn slot_ptr(&self, handle: &SlotHandle) -> Result<NonNull<u8>, AllocError> {
        self.check_handle(handle)?;
        Ok(self.slot_addr(handle.class, handle.slot))
    }

    /// Releases the slot containing `addr`.
    ///
    /// Any address inside a slot releases that slot. Addresses outside the
    /// arena, or in the tail of a block that does not hold a whole element,
    /// are rejected with [`AllocError::ForeignPointer`] and change nothing.
    ///
    /// Releasing a slot this way does not run the destructor of a value
    /// constructed there, and invalidates the [`Pooled`] handle for it.
    pub fn release_addr(&mut self, addr: *const u8) -> Result<(), AllocError> {
        let raw = addr.addr();
        if !self.contains_addr(addr) {
            warn!(pool = self.id, addr = raw, "release of address outside arena");
            return Err(AllocError::ForeignPointer { addr: raw });
        }

        let offset = raw - self.base.as_ptr().addr();
        let class_idx = offset / self.block_size;
        let class = &mut self.classes[class_idx];
        let slot = (offset % self.block_size) / class.element_size;
        if slot >= class.slot_count() {
            warn!(pool = self.id, addr = raw, "release of address in block tail");
            return Err(AllocError::ForeignPointer { addr: raw });
        }
        if !class.occupancy.get(slot) {
            warn!(pool = self.id, addr = raw, "release of free slot");
            return Err(AllocError::DoubleFree { addr: raw });
        }

        class.occupancy.clear(slot);
        trace!(pool = self.id, size = class.element_size, slot, "released slot by address");
        Ok(())
    }

    /// Verifies internal bookkeeping.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        for pair in self.classes.windows(2) {
            if pair[0].element_size >= pair[1].element_size {
                return Err(InvariantError::new(format!(
                    "size classes not strictly ascending: {} then {}",
                    pair[0].element_size, pair[1].element_size
                )));
            }
        }
        for class in &self.classes {
            if class.slot_count() != self.block_size / class.element_size {
                return Err(InvariantError::new(format!(
                    "class {} has {} slots, expected {}",
                    class.element_size,
                    class.slot_count(),
                    self.block_size / class.element_size
                )));
            }
            if class.generations.len() != class.slot_count() {
                return Err(InvariantError::new(format!(
                    "class {} tracks {} generations for {} slots",
                    class.element_size,
                    class.generations.len(),
                    class.slot_count()
                )));
            }
        }
        Ok(())
    }

    fn class_index(&self, element_size: usize) -> Option<usize> {
        self.classes
            .binary_search_by_key(&element_size, |c| c.element_size)
            .ok()
    }

    fn check_handle(&self, handle: &SlotHandle) -> Result<(), AllocError> {
        if handle.pool != self.id {
            return Err(AllocError::ForeignHandle);
        }
        let class = self
            .classes
            .get(handle.class)
            .ok_or(AllocError::ForeignHandle)?;
        if handle.slot >= class.slot_count() {
            return Err(AllocError::ForeignHandle);
        }
        if !class.occupancy.get(handle.slot) || class.generations[handle.slot] != handle.generation
        {
            return Err(AllocError::StaleHandle);
        }
        Ok(())
    }

    fn slot_addr(&self, class_idx: usize, slot: usize) -> NonNull<u8> {
        let offset = class_idx * self.block_size + slot * self.classes[class_idx].element_size;
        debug_assert!(offset < self.arena_len());
        // SAFETY: offset is within the arena allocation
        unsafe { self.base.add(offset) }
    }
}

impl Allocator for PoolAllocator {
    fn create<T>(&mut self, value: T) -> Result<Pooled<T>, AllocError> {
        let size = size_of::<T>();
        let align = align_of::<T>();
        let handle = self.allocate(size)?;
        let slot = self.slot_addr(handle.class, handle.slot);
        if slot.as_ptr().addr() % align != 0 {
            self.deallocate(handle)?;
            return Err(AllocError::Misaligned { size, align });
        }

        let ptr = slot.cast::<T>();
        // SAFETY: the slot is exclusively reserved by `handle`, is
        // `size_of::<T>()` bytes long and aligned for `T`
        unsafe { ptr.as_ptr().write(value) };
        // SAFETY: ptr holds an initialized T in the slot owned by handle
        Ok(unsafe { Pooled::from_raw_parts(ptr, handle) })
    }

    fn destroy<T: ?Sized>(&mut self, value: Pooled<T>) -> Result<(), AllocError> {
        let (ptr, handle) = value.into_raw_parts();
        if let Err(err) = self.check_handle(&handle) {
            warn!(pool = self.id, %err, "refusing to destroy value");
            return Err(err);
        }
        // SAFETY: the handle is live, so the slot still holds the value
        // written by `create` and nothing else refers to it
        unsafe { ptr::drop_in_place(ptr.as_ptr()) };
        self.deallocate(handle)
    }

    fn resolve<'a, T: ?Sized>(&'a self, value: &'a Pooled<T>) -> Result<&'a T, AllocError> {
        self.check_handle(value.handle())?;
        // SAFETY: live handle, shared borrow of the pool prevents release
        Ok(unsafe { &*value.as_ptr() })
    }

    fn resolve_mut<'a, T: ?Sized>(
        &'a mut self,
        value: &'a Pooled<T>,
    ) -> Result<&'a mut T, AllocError> {
        self.check_handle(value.handle())?;
        // SAFETY: live handle, exclusive borrow of the pool prevents any
        // other access to the arena
        Ok(unsafe { &mut *value.as_ptr() })
    }
}

impl Drop for PoolAllocator {
    fn drop(&mut self) {
        let live: usize = self.classes.iter().map(|c| c.occupancy.count_ones()).sum();
        if live > 0 {
            debug!(pool = self.id, live, "dropping pool with live slots");
        }
        if let Some(layout) = self.layout {
            // SAFETY: allocated in from_config with this exact layout
            unsafe { dealloc(self.base.as_ptr(), layout) };
        }
    }
}
