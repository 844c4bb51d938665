//! Guard Words

use crate::config::GuardMode;
use ahash::RandomState;
use std::hash::BuildHasher;
use std::ptr;

pub type Canary = u64;

pub const CANARY: Canary = 0xBADC_0FFE_E0DD_F00D;
pub const CANARY_SZ: usize = std::mem::size_of::<Canary>();

/// A fresh random token for a new stack.
pub fn token() -> u64 {
    BuildHasher::hash_one(&RandomState::new(), CANARY)
}

/// The guard value a stack with `token` must carry while its block lives at
/// `block_addr`.
#[inline]
pub fn guard_value(mode: GuardMode, token: u64, block_addr: usize) -> Canary {
    match mode {
        GuardMode::Fixed => CANARY,
        GuardMode::Keyed => {
            let keyed = RandomState::with_seeds(token, CANARY, !token, 0);
            BuildHasher::hash_one(&keyed, block_addr)
        }
    }
}

/// # Safety
///
/// `at` must be valid for an 8-byte write, alignment is not required.
#[inline]
pub unsafe fn write_guard(at: *mut u8, value: Canary) {
    ptr::write_unaligned(at as *mut Canary, value)
}

/// # Safety
///
/// `at` must be valid for an 8-byte read, alignment is not required.
#[inline]
pub unsafe fn read_guard(at: *const u8) -> Canary {
    ptr::read_unaligned(at as *const Canary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ignores_token_and_address() {
        assert_eq!(guard_value(GuardMode::Fixed, 1, 0x1000), CANARY);
        assert_eq!(guard_value(GuardMode::Fixed, 2, 0x2000), CANARY);
    }

    #[test]
    fn keyed_is_deterministic() {
        let t = token();
        assert_eq!(guard_value(GuardMode::Keyed, t, 0x1000),
                   guard_value(GuardMode::Keyed, t, 0x1000));
    }

    #[test]
    fn keyed_depends_on_token_and_address() {
        let t = token();
        let g = guard_value(GuardMode::Keyed, t, 0x1000);
        assert_ne!(g, guard_value(GuardMode::Keyed, t, 0x2000));
        assert_ne!(g, guard_value(GuardMode::Keyed, t ^ 1, 0x1000));
    }

    #[test]
    fn tokens_differ() {
        assert_ne!(token(), token());
    }

    #[test]
    fn unaligned_roundtrip() {
        let mut buf = [0u8; 17];
        unsafe {
            write_guard(buf.as_mut_ptr().add(3), CANARY);
            assert_eq!(read_guard(buf.as_ptr().add(3)), CANARY);
        }
        assert_eq!(buf[0..3], [0, 0, 0]);
    }
}
