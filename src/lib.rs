//! # Canary Stack
//!
//! A dynamic-array stack that checks itself for memory corruption before and
//! after every operation. Guard words bracket both the control structure and
//! the heap buffer, checksums cover the structure and the live elements,
//! unused slots hold a poison value, and every pointer is probed against the
//! process memory map before it is read.
//!
//! ```rust
//! use canary_stack::{Stack, Status};
//!
//! fn main() -> Result<(), Status> {
//!     let mut stack: Stack<i32> = Stack::new(10)?;
//!     for i in 1..=3 {
//!         stack.push(i)?;
//!     }
//!     assert_eq!(stack.pop()?, 3);
//!     assert_eq!(stack.check(), Status::OK);
//!     stack.destroy()
//! }
//! ```
//!
//! Operations return the full diagnosis on failure, every finding at once:
//!
//! ```rust
//! use canary_stack::{Stack, Status};
//!
//! let mut stack: Stack<i32> = Stack::new(10).unwrap();
//! assert_eq!(stack.pop(), Err(Status::EMPTY_STACK));
//! println!("{}", Status::EMPTY_STACK);
//! ```
//! ```text
//! Error 0000000001000000
//! Pop empty stack
//! ```

pub(crate) mod canary;
pub(crate) mod dump;
pub(crate) mod elem;
pub(crate) mod stak;
pub(crate) mod status;
pub(crate) mod stylize;
pub(crate) mod verify;
pub mod checksum;
pub mod config;
pub mod harness;
pub mod logging;
pub mod probe;
pub mod scenarios;

/// Unchecked access to stack internals.
///
/// Everything in `raw::*` exists to stage corruption on purpose and is *not*
/// a stable public API. Using it incorrectly can cause memory-unsafety issues.
pub mod raw;

pub use crate::canary::{Canary, CANARY};
pub use crate::config::{Checks, Config, GuardMode};
pub use crate::dump::{Dumper, ElemFmt};
pub use crate::elem::{Element, POISON_VALUE};
pub use crate::logging::LogSink;
pub use crate::stak::Stack;
pub use crate::status::Status;
