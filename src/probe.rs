//! Address-space Probing
//!
//! Asks the OS whether a byte range is mapped readable and writable, without
//! ever reading through the pointer. This is the one check that is safe to
//! run on a pointer nothing else has vouched for.

use region::Protection;
use sptr::Strict;

/// True if every byte of `[addr, addr + len)` lies in committed, unguarded
/// memory mapped at least read/write.
pub fn is_mapped_rw<T>(addr: *const T, len: usize) -> bool {
    if addr.is_null() || len == 0 {
        return false;
    }
    let start = Strict::addr(addr);
    let Some(end) = start.checked_add(len) else {
        return false;
    };
    let regions = match region::query_range(addr, len) {
        Ok(it) => it,
        Err(_) => return false,
    };
    let mut regions = match regions.collect::<Result<Vec<_>, _>>() {
        Ok(rs) => rs,
        Err(_) => return false,
    };
    regions.sort_by_key(|r| r.as_range().start);

    // Regions must tile the range with no holes between them.
    let mut covered = start;
    for r in regions.iter() {
        let range = r.as_range();
        if range.end <= covered {
            continue;
        }
        if range.start > covered
            || r.is_guarded()
            || !r.protection().contains(Protection::READ_WRITE)
        {
            return false;
        }
        covered = range.end;
        if covered >= end {
            return true;
        }
    }
    false
}

/// Like `is_mapped_rw`, for a single properly aligned `T`.
pub fn is_valid_ref<T>(p: *const T) -> bool {
    Strict::addr(p) % std::mem::align_of::<T>() == 0
        && is_mapped_rw(p, std::mem::size_of::<T>().max(1))
}
