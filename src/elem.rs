//! Stack Elements

use std::fmt::Debug;
use std::io::{self, Write};

/// Reserved value marking every slot at or above the logical size.
pub const POISON_VALUE: i32 = 0xC0FFEE;

/// Plain data that can live in a `Stack`.
///
/// # Safety
///
/// The stack checksums elements by reading their raw bytes and lays them out
/// right after an 8-byte guard word. Implementors must have no padding bytes,
/// no invalid bit patterns, no drop glue and an alignment of at most 8.
pub unsafe trait Element: Copy + PartialEq + Debug + 'static {
    /// Can never be pushed, see `POISON_VALUE`.
    const POISON: Self;

    /// Default text rendering used by the dumper.
    fn fmt_elem(&self, w: &mut dyn Write) -> io::Result<()>;
}

macro_rules! plain_elements {
    ($($t:ty),+) => {
        $(unsafe impl Element for $t {
            const POISON: $t = POISON_VALUE as $t;

            fn fmt_elem(&self, w: &mut dyn Write) -> io::Result<()> {
                write!(w, "{}", self)
            }
        })+
    };
}

plain_elements!(i32, i64, u32, u64, isize, usize);
