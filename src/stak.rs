//! The Guarded Stack
//!
//! One allocation holds the whole buffer, bracketed by two guard words:
//!
//! ```text
//! block                data
//!   |                   |
//!   v                   v
//!   [ guard: u64 ][ T ][ T ] ... [ T ][ guard: u64 ]
//!                 <----- capacity ---->
//! ```
//!
//! `data` is the only pointer the stack keeps, `block` is always recomputed
//! from it. Every slot at or above `size` holds `T::POISON`.

use crate::canary::{self, Canary, CANARY_SZ};
use crate::checksum::{self, Djb2};
use crate::config::Config;
use crate::elem::Element;
use crate::probe;
use crate::status::Status;
use sptr::Strict;
use std::alloc::{alloc_zeroed, dealloc, realloc, Layout};
use std::fmt;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr;
use std::slice;

/// Layout of a block with room for `capacity` elements and both guards.
pub(crate) fn block_layout<T: Element>(capacity: usize) -> Option<Layout> {
    let sz = capacity.checked_mul(size_of::<T>())?
                     .checked_add(2 * CANARY_SZ)?;
    Layout::from_size_align(sz, block_align::<T>()).ok()
}

#[inline]
pub(crate) fn block_align<T: Element>() -> usize {
    align_of::<Canary>().max(align_of::<T>())
}

/// A stack that checks itself for memory corruption before and after every
/// operation.
///
/// The first and last fields are guard words, so a linear overrun coming
/// from either side of the struct hits one of them before it reaches
/// anything else.
#[repr(C)]
pub struct Stack<T: Element> {
    pub(crate) canary_begin: Canary,
    pub(crate) data: *mut T,
    pub(crate) size: usize,
    pub(crate) capacity: usize,
    pub(crate) token: u64,
    pub(crate) cfg: Config,
    pub(crate) struct_hash: u64,
    pub(crate) buffer_hash: u64,
    pub(crate) canary_end: Canary,
    _ph: PhantomData<T>,
}

impl<T: Element> Stack<T> {
    /// A stack in the destroyed state: no buffer, zero size and capacity,
    /// guards and checksums in place.
    pub fn empty(cfg: Config) -> Stack<T> {
        let mut s = Stack { canary_begin: 0,
                            data: ptr::null_mut(),
                            size: 0,
                            capacity: 0,
                            token: canary::token(),
                            cfg,
                            struct_hash: 0,
                            buffer_hash: 0,
                            canary_end: 0,
                            _ph: PhantomData };
        s.seal();
        s
    }

    pub fn new(capacity: usize) -> Result<Stack<T>, Status> {
        Stack::with_config(capacity, Config::default())
    }

    pub fn with_config(capacity: usize, cfg: Config) -> Result<Stack<T>, Status> {
        let mut s = Stack::empty(cfg);
        s.construct(capacity)?;
        Ok(s)
    }

    /// Allocate a buffer for a stack in the destroyed state.
    ///
    /// On failure nothing is allocated and the stack is left as it was.
    pub fn construct(&mut self, capacity: usize) -> Result<(), Status> {
        self.precheck("construct")?;
        if !self.data.is_null()
            || !self.cfg.is_valid()
            || capacity == 0
            || capacity > self.cfg.max_capacity
        {
            return Err(Status::INVALID_ARGUMENT);
        }
        let layout = block_layout::<T>(capacity).ok_or(Status::ALLOCATE_FAIL)?;
        let block = unsafe { alloc_zeroed(layout) };
        if block.is_null() {
            return Err(Status::ALLOCATE_FAIL);
        }
        self.data = unsafe { block.add(CANARY_SZ) } as *mut T;
        self.capacity = capacity;
        self.size = 0;
        unsafe {
            self.poison_from(0);
            self.write_buffer_guards();
        }
        self.seal();
        log::trace!("construct {:p}: {} slots", self.data, capacity);
        self.postcheck("construct")
    }

    /// Construct a stack at an address that nothing has vouched for.
    ///
    /// The target is probed before anything is written to it, and whatever
    /// it held before is overwritten without being dropped.
    ///
    /// # Safety
    ///
    /// If the probe passes, `this` must not alias any live Rust reference.
    pub unsafe fn construct_at(this: *mut Stack<T>,
                               capacity: usize,
                               cfg: Config) -> Status {
        if !probe::is_valid_ref(this) {
            return Status::INVALID_SELF_PTR;
        }
        match Stack::with_config(capacity, cfg) {
            Ok(s) => {
                ptr::write(this, s);
                Status::OK
            }
            Err(st) => st,
        }
    }

    /// Verify a stack through a pointer nothing has vouched for.
    ///
    /// # Safety
    ///
    /// If the probe passes, `this` must point to memory that was, at some
    /// point, initialized as a `Stack<T>`.
    pub unsafe fn verify_at(this: *const Stack<T>) -> Status {
        if !probe::is_valid_ref(this) {
            return Status::INVALID_SELF_PTR;
        }
        (*this).check()
    }

    pub fn push(&mut self, value: T) -> Result<(), Status> {
        self.precheck("push")?;
        if value == T::POISON {
            return Err(Status::INVALID_ARGUMENT);
        }
        if self.size == self.capacity {
            let target = self.cfg.grow_target(self.capacity)
                                 .ok_or(Status::ALLOCATE_FAIL)?;
            self.resize(target)?;
        }
        unsafe {
            self.data.add(self.size).write(value);
        }
        self.size += 1;
        self.seal();
        self.postcheck("push")
    }

    pub fn pop(&mut self) -> Result<T, Status> {
        self.precheck("pop")?;
        if self.size == 0 {
            return Err(Status::EMPTY_STACK);
        }
        self.size -= 1;
        let value = unsafe {
            let slot = self.data.add(self.size);
            let value = slot.read();
            slot.write(T::POISON);
            value
        };
        self.seal();
        if let Some(target) = self.cfg.shrink_target(self.size, self.capacity) {
            // Shrinking is opportunistic, the popped value is already ours.
            if let Err(st) = self.resize(target) {
                log::warn!("shrink to {target} failed, keeping {} slots: {st}",
                           self.capacity);
            }
        }
        self.postcheck("pop")?;
        Ok(value)
    }

    /// Reallocate the buffer to hold `capacity` slots.
    ///
    /// The old block stays untouched if the allocator refuses.
    pub(crate) fn resize(&mut self, capacity: usize) -> Result<(), Status> {
        self.precheck("resize")?;
        if capacity < self.cfg.min_capacity
            || capacity > self.cfg.max_capacity
            || capacity < self.size
        {
            return Err(Status::INVALID_ARGUMENT);
        }
        let new_layout = block_layout::<T>(capacity).ok_or(Status::ALLOCATE_FAIL)?;
        let (block, old_capacity) = if self.data.is_null() {
            (unsafe { alloc_zeroed(new_layout) }, 0)
        } else {
            let old_layout = block_layout::<T>(self.capacity)
                .ok_or(Status::INVALID_CAPACITY)?;
            (unsafe { realloc(self.block(), old_layout, new_layout.size()) },
             self.capacity)
        };
        if block.is_null() {
            return Err(Status::ALLOCATE_FAIL);
        }
        log::trace!("resize {:p} -> {:p}: {} -> {} slots",
                    self.data, block, old_capacity, capacity);
        self.data = unsafe { block.add(CANARY_SZ) } as *mut T;
        self.capacity = capacity;
        unsafe {
            self.poison_from(old_capacity);
            self.write_buffer_guards();
        }
        self.seal();
        self.postcheck("resize")
    }

    /// Free the buffer and return to the destroyed state.
    ///
    /// Refuses to free anything if verification fails: a leak is better than
    /// handing the allocator a pointer that may not be ours.
    pub fn destroy(&mut self) -> Result<(), Status> {
        let st = self.check();
        if !st.is_ok() {
            log::error!("refusing to free stack buffer {:p}: {st}", self.data);
            return Err(st);
        }
        if !self.data.is_null() {
            let layout = block_layout::<T>(self.capacity)
                .ok_or(Status::INVALID_CAPACITY)?;
            unsafe { dealloc(self.block(), layout) }
            log::trace!("destroy {:p}", self.data);
        }
        self.data = ptr::null_mut();
        self.size = 0;
        self.capacity = 0;
        self.seal();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn is_destroyed(&self) -> bool {
        self.data.is_null()
    }

    /// Live elements, bottom first, after a successful verification.
    pub fn to_vec(&self) -> Result<Vec<T>, Status> {
        self.check().into_result()?;
        Ok(unsafe { self.live() }.to_vec())
    }

    /// Start of the allocation, one guard word before `data`.
    #[inline]
    pub(crate) fn block(&self) -> *mut u8 {
        (self.data as *mut u8).wrapping_sub(CANARY_SZ)
    }

    #[inline]
    pub(crate) fn trailer(&self) -> *mut u8 {
        (self.data as *mut u8).wrapping_add(self.capacity.wrapping_mul(size_of::<T>()))
    }

    /// The guard value this stack should carry right now, `None` if the
    /// stored guard mode is not a mode.
    #[inline]
    pub(crate) fn guard(&self) -> Option<Canary> {
        let mode = self.cfg.guard()?;
        let block = if self.data.is_null() { 0 } else { Strict::addr(self.block()) };
        Some(canary::guard_value(mode, self.token, block))
    }

    /// Guard value for writing. Stacks are only sealed after a clean check,
    /// and a clean check rules out a bad mode byte.
    #[inline]
    fn sealing_guard(&self) -> Canary {
        self.guard().unwrap_or(canary::CANARY)
    }

    /// Checksum of every field, with both checksum fields counted as zero.
    pub(crate) fn struct_checksum(&self) -> u64 {
        let mut h = Djb2::default();
        h.write_u64(self.canary_begin);
        h.write_usize(Strict::addr(self.data));
        h.write_usize(self.size);
        h.write_usize(self.capacity);
        h.write_u64(self.token);
        h.write_u32(self.cfg.checks.bits());
        h.write_u8(self.cfg.guard);
        h.write_usize(self.cfg.min_capacity);
        h.write_usize(self.cfg.max_capacity);
        h.write_u64(0);
        h.write_u64(0);
        h.write_u64(self.canary_end);
        h.finish()
    }

    /// # Safety
    ///
    /// `size` must be in bounds and `data` must point at a live block.
    pub(crate) unsafe fn buffer_checksum(&self) -> u64 {
        checksum::checksum(self.live_bytes())
    }

    /// # Safety
    ///
    /// Same as `buffer_checksum`.
    pub(crate) unsafe fn live(&self) -> &[T] {
        if self.data.is_null() {
            &[]
        } else {
            slice::from_raw_parts(self.data, self.size)
        }
    }

    unsafe fn live_bytes(&self) -> &[u8] {
        if self.data.is_null() {
            &[]
        } else {
            slice::from_raw_parts(self.data as *const u8, self.size * size_of::<T>())
        }
    }

    /// # Safety
    ///
    /// `capacity` must be in bounds and `data` must point at a live block.
    pub(crate) unsafe fn slots(&self) -> &[T] {
        if self.data.is_null() {
            &[]
        } else {
            slice::from_raw_parts(self.data, self.capacity)
        }
    }

    unsafe fn poison_from(&mut self, start: usize) {
        for i in start..self.capacity {
            self.data.add(i).write(T::POISON);
        }
    }

    unsafe fn write_buffer_guards(&mut self) {
        let guard = self.sealing_guard();
        canary::write_guard(self.block(), guard);
        canary::write_guard(self.trailer(), guard);
    }

    /// Re-establish struct guards and both checksums after a mutation.
    pub(crate) fn seal(&mut self) {
        let guard = self.sealing_guard();
        self.canary_begin = guard;
        self.canary_end = guard;
        self.buffer_hash = unsafe { self.buffer_checksum() };
        self.struct_hash = self.struct_checksum();
    }

    fn precheck(&self, op: &str) -> Result<(), Status> {
        let st = self.check();
        if !st.is_ok() {
            log::warn!("{op} aborted on {:p}: {st}", self as *const Self);
        }
        st.into_result()
    }

    fn postcheck(&self, op: &str) -> Result<(), Status> {
        let st = self.check();
        if !st.is_ok() {
            log::error!("{op} left {:p} inconsistent: {st}", self as *const Self);
        }
        st.into_result()
    }
}

impl<T: Element> Default for Stack<T> {
    fn default() -> Self {
        Stack::empty(Config::default())
    }
}

impl<T: Element> Drop for Stack<T> {
    fn drop(&mut self) {
        if self.data.is_null() {
            return;
        }
        if let Err(st) = self.destroy() {
            log::error!("leaking {} bytes at {:p}",
                        block_layout::<T>(self.capacity).map(|l| l.size()).unwrap_or(0),
                        self.block());
            log::debug!("{st}");
        }
    }
}

impl<T: Element> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
         .field("canary_begin", &format_args!("{:#018x}", self.canary_begin))
         .field("data", &self.data)
         .field("size", &self.size)
         .field("capacity", &self.capacity)
         .field("cfg", &self.cfg)
         .field("struct_hash", &self.struct_hash)
         .field("buffer_hash", &self.buffer_hash)
         .field("canary_end", &format_args!("{:#018x}", self.canary_end))
         .finish()
    }
}
