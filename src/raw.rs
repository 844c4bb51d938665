//! Unchecked access to a stack's control fields.
//!
//! Nothing here re-seals the stack: whatever is written stays exactly as
//! written, guards and checksums included, so the verifier sees the same
//! thing a stray write would have left behind. Restoring a field to its old
//! value makes the stack whole again.

use crate::canary::Canary;
use crate::elem::Element;
use crate::stak::Stack;

/// # Safety
///
/// The stack must not be used for anything but verification, dumping and
/// destruction until the field is restored.
pub unsafe fn set_size<T: Element>(s: &mut Stack<T>, size: usize) {
    s.size = size;
}

/// # Safety
///
/// See `set_size`.
pub unsafe fn set_capacity<T: Element>(s: &mut Stack<T>, capacity: usize) {
    s.capacity = capacity;
}

/// # Safety
///
/// See `set_size`. The old buffer is forgotten, not freed.
pub unsafe fn set_data<T: Element>(s: &mut Stack<T>, data: *mut T) {
    s.data = data;
}

/// # Safety
///
/// See `set_size`.
pub unsafe fn set_canary_begin<T: Element>(s: &mut Stack<T>, value: Canary) {
    s.canary_begin = value;
}

/// # Safety
///
/// See `set_size`.
pub unsafe fn set_canary_end<T: Element>(s: &mut Stack<T>, value: Canary) {
    s.canary_end = value;
}

/// The element buffer. Writing through it bypasses every check.
///
/// # Safety
///
/// The pointer is only valid while the stack keeps its current block, and
/// only for the `capacity` slots plus the trailing guard.
pub unsafe fn data_ptr<T: Element>(s: &Stack<T>) -> *mut T {
    s.data
}

/// Start of the allocation, the leading buffer guard.
///
/// # Safety
///
/// See `data_ptr`.
pub unsafe fn block_ptr<T: Element>(s: &Stack<T>) -> *mut u8 {
    s.block()
}
