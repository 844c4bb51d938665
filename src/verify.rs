//! The Verifier

use crate::canary::{self, CANARY_SZ};
use crate::config::Checks;
use crate::elem::Element;
use crate::probe;
use crate::stak::{block_align, block_layout, Stack};
use crate::status::Status;
use sptr::Strict;

impl<T: Element> Stack<T> {
    /// Run every active integrity check and report all findings at once.
    ///
    /// Nothing is read through `data` until the pointer has been probed and
    /// found to cover the block, and nothing past the leading guard is read
    /// unless `capacity` is in bounds.
    pub fn check(&self) -> Status {
        let checks = self.cfg.checks;
        let mut st = self.check_bounds();

        if !self.data.is_null() && !self.block_is_mapped(st) {
            return st | Status::INVALID_DATA_PTR;
        }

        if checks.contains(Checks::CANARY) {
            st |= self.check_guards(st);
        }

        if checks.contains(Checks::HASH) {
            // A broken struct guard already explains a broken struct checksum.
            if !st.contains(Status::STRUCT_CANARY)
                && self.struct_checksum() != self.struct_hash
            {
                st |= Status::STRUCT_HASH_FAIL;
            }
            if !st.intersects(Status::INVALID_SIZE | Status::INVALID_CAPACITY)
                && unsafe { self.buffer_checksum() } != self.buffer_hash
            {
                st |= Status::BUFFER_HASH_FAIL;
            }
        }

        if checks.contains(Checks::POISON)
            && !self.data.is_null()
            && !st.intersects(Status::INVALID_SIZE
                              | Status::INVALID_CAPACITY
                              | Status::STRUCT_HASH_FAIL)
        {
            st |= self.check_poison();
        }

        st
    }

    /// Shorthand for `check().into_result()`.
    pub fn verify(&self) -> Result<(), Status> {
        self.check().into_result()
    }

    /// Field-only checks, nothing is dereferenced.
    fn check_bounds(&self) -> Status {
        let mut st = Status::OK;
        if self.capacity > self.cfg.max_capacity
            || (!self.data.is_null() && self.capacity == 0)
        {
            st |= Status::INVALID_CAPACITY;
        }
        if self.size > self.capacity {
            st |= Status::INVALID_SIZE;
        }
        if self.data.is_null() && self.capacity != 0 {
            st |= Status::NULL_DATA;
        }
        // No stack is ever sealed with an unknown guard mode.
        if self.cfg.guard().is_none() {
            st |= Status::STRUCT_HASH_FAIL;
        }
        st
    }

    /// Whether reading the block is safe. With an out-of-bounds capacity only
    /// the leading guard word is vouched for.
    fn block_is_mapped(&self, bounds: Status) -> bool {
        let block = self.block();
        if Strict::addr(block) % block_align::<T>() != 0 {
            return false;
        }
        if !self.cfg.checks.contains(Checks::POINTER) {
            return true;
        }
        let len = if bounds.contains(Status::INVALID_CAPACITY) {
            CANARY_SZ
        } else {
            match block_layout::<T>(self.capacity) {
                Some(layout) => layout.size(),
                None => return false,
            }
        };
        probe::is_mapped_rw(block, len)
    }

    fn check_guards(&self, bounds: Status) -> Status {
        let mut st = Status::OK;
        // Without a mode there is nothing to compare against, and
        // `check_bounds` has already reported the struct as broken.
        let Some(guard) = self.guard() else {
            return st;
        };
        if self.canary_begin != guard || self.canary_end != guard {
            st |= Status::STRUCT_CANARY;
        }
        if !self.data.is_null() {
            let lead = unsafe { canary::read_guard(self.block()) };
            let trail_ok = bounds.contains(Status::INVALID_CAPACITY)
                || unsafe { canary::read_guard(self.trailer()) } == guard;
            if lead != guard || !trail_ok {
                st |= Status::BUFFER_CANARY;
            }
        }
        st
    }

    fn check_poison(&self) -> Status {
        let mut st = Status::OK;
        let slots = unsafe { self.slots() };
        for (i, x) in slots.iter().enumerate() {
            if i < self.size {
                if *x == T::POISON {
                    st |= Status::UNEXP_POISON_VAL;
                }
            } else if *x != T::POISON {
                st |= Status::UNEXP_NORMAL_VAL;
            }
            if st.contains(Status::UNEXP_POISON_VAL | Status::UNEXP_NORMAL_VAL) {
                break;
            }
        }
        st
    }
}
