//! Diagnoses

use bitflags::bitflags;
use std::error;
use std::fmt;

bitflags! {
    /// Everything the verifier, or an operation, found wrong with a stack.
    ///
    /// Bits are independent: a corrupted stack usually reports several at
    /// once, and all of them are kept. The empty set means fully healthy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u64 {
        /// Data pointer is null while capacity is not zero
        const NULL_DATA        = 1 << 0;
        /// Size is larger than capacity
        const INVALID_SIZE     = 1 << 1;
        /// Capacity is above the configured maximum, or zero with a buffer
        const INVALID_CAPACITY = 1 << 2;
        /// Poison value found below size
        const UNEXP_POISON_VAL = 1 << 3;
        /// Live value found at or above size
        const UNEXP_NORMAL_VAL = 1 << 4;
        /// Invalid argument given to an operation
        const INVALID_ARGUMENT = 1 << 5;
        /// No elements to pop
        const EMPTY_STACK      = 1 << 6;
        /// The allocator refused, or the capacity limit was reached
        const ALLOCATE_FAIL    = 1 << 7;
        /// Guard word of the control structure was overwritten
        const STRUCT_CANARY    = 1 << 8;
        /// Guard word around the buffer was overwritten
        const BUFFER_CANARY    = 1 << 9;
        /// Wrong buffer checksum
        const BUFFER_HASH_FAIL = 1 << 10;
        /// Wrong control structure checksum
        const STRUCT_HASH_FAIL = 1 << 11;
        /// The stack itself does not live in mapped, writable memory
        const INVALID_SELF_PTR = 1 << 12;
        /// The buffer does not live in mapped, writable memory
        const INVALID_DATA_PTR = 1 << 13;
    }
}

const MESSAGES: &[(Status, &str)] = &[
    (Status::INVALID_SIZE, "Invalid size"),
    (Status::INVALID_CAPACITY, "Invalid capacity"),
    (Status::NULL_DATA, "Stack has NULL data"),
    (Status::UNEXP_NORMAL_VAL, "Unexpected normal value"),
    (Status::UNEXP_POISON_VAL, "Unexpected poison value"),
    (Status::STRUCT_CANARY, "Wrong struct canary"),
    (Status::BUFFER_CANARY, "Wrong buffer canary"),
    (Status::EMPTY_STACK, "Pop empty stack"),
    (Status::INVALID_ARGUMENT, "Invalid argument given to the function"),
    (Status::ALLOCATE_FAIL, "Failed to allocate memory"),
    (Status::BUFFER_HASH_FAIL, "Wrong buffer hash"),
    (Status::STRUCT_HASH_FAIL, "Wrong struct hash"),
    (Status::INVALID_SELF_PTR, "Stack pointer is not mapped read/write"),
    (Status::INVALID_DATA_PTR, "Data pointer is not mapped read/write"),
];

impl Status {
    pub const OK: Status = Status::empty();

    /// Findings that mean the memory itself cannot be trusted, as opposed to
    /// a caller mistake or an allocator refusal.
    pub const CORRUPTION: Status = Status::NULL_DATA
        .union(Status::INVALID_SIZE)
        .union(Status::INVALID_CAPACITY)
        .union(Status::UNEXP_POISON_VAL)
        .union(Status::UNEXP_NORMAL_VAL)
        .union(Status::STRUCT_CANARY)
        .union(Status::BUFFER_CANARY)
        .union(Status::BUFFER_HASH_FAIL)
        .union(Status::STRUCT_HASH_FAIL)
        .union(Status::INVALID_SELF_PTR)
        .union(Status::INVALID_DATA_PTR);

    /// Findings after which reading the element buffer is not safe.
    pub const UNREADABLE: Status = Status::NULL_DATA
        .union(Status::INVALID_CAPACITY)
        .union(Status::STRUCT_CANARY)
        .union(Status::BUFFER_CANARY)
        .union(Status::STRUCT_HASH_FAIL)
        .union(Status::BUFFER_HASH_FAIL)
        .union(Status::INVALID_SELF_PTR)
        .union(Status::INVALID_DATA_PTR);

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.is_empty()
    }

    #[inline]
    pub fn is_corruption(&self) -> bool {
        self.intersects(Status::CORRUPTION)
    }

    #[inline]
    pub fn into_result(self) -> Result<(), Status> {
        if self.is_ok() { Ok(()) } else { Err(self) }
    }

    /// Human-readable line for every set bit, in a stable order.
    pub fn messages(&self) -> impl Iterator<Item = &'static str> + '_ {
        MESSAGES.iter()
                .filter(|(bit, _)| self.contains(*bit))
                .map(|(_, msg)| *msg)
    }

    /// The low 16 bits, most significant first.
    pub fn binary(&self) -> String {
        format!("{:016b}", self.bits() & 0xffff)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "Ok");
        }
        write!(f, "Error {}", self.binary())?;
        for msg in self.messages() {
            write!(f, "\n{msg}")?;
        }
        Ok(())
    }
}

impl error::Error for Status {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_is_empty() {
        assert!(Status::OK.is_ok());
        assert_eq!(Status::OK.into_result(), Ok(()));
        assert_eq!(format!("{}", Status::OK), "Ok");
    }

    #[test]
    fn bit_values_are_stable() {
        assert_eq!(Status::NULL_DATA.bits(), 1);
        assert_eq!(Status::EMPTY_STACK.bits(), 64);
        assert_eq!(Status::STRUCT_CANARY.bits(), 256);
        assert_eq!(Status::STRUCT_HASH_FAIL.bits(), 2048);
    }

    #[test]
    fn every_bit_has_a_message() {
        assert_eq!(Status::all().messages().count(), MESSAGES.len());
        assert_eq!(MESSAGES.len(), Status::all().iter().count());
    }

    #[test]
    fn display_lists_all_findings() {
        let st = Status::INVALID_SIZE | Status::STRUCT_HASH_FAIL;
        assert_eq!(format!("{st}"),
                   "Error 0000100000000010\nInvalid size\nWrong struct hash");
    }

    #[test]
    fn classes() {
        assert!(Status::STRUCT_CANARY.is_corruption());
        assert!(!Status::EMPTY_STACK.is_corruption());
        assert!(!Status::ALLOCATE_FAIL.is_corruption());
        assert!(!(Status::EMPTY_STACK | Status::INVALID_ARGUMENT).is_corruption());
        assert!(!Status::UNEXP_NORMAL_VAL.intersects(Status::UNREADABLE));
    }

    #[test]
    fn usable_as_error() {
        fn fails() -> Result<(), Box<dyn error::Error>> {
            Status::EMPTY_STACK.into_result()?;
            Ok(())
        }
        let e = fails().unwrap_err();
        assert!(e.to_string().contains("Pop empty stack"));
    }
}
