//! Post-mortem Dumps

use crate::canary;
use crate::elem::Element;
use crate::logging::LogSink;
use crate::stak::Stack;
use crate::status::Status;
use std::io::{self, Write};

pub type ElemFmt<T> = fn(&T, &mut dyn Write) -> io::Result<()>;

/// Renders a diagnosis and everything about the stack it is safe to read.
///
/// The buffer is only touched when neither the given diagnosis nor a fresh
/// check of the stack has any of the findings in `Status::UNREADABLE`, so
/// dumping a wrecked stack cannot crash on top of whatever wrecked it.
pub struct Dumper<'a, T: Element> {
    out: &'a mut dyn Write,
    fmt: ElemFmt<T>,
}

impl<'a, T: Element> Dumper<'a, T> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Dumper { out, fmt: T::fmt_elem }
    }

    pub fn to_sink(sink: &'a mut LogSink) -> Self {
        Dumper::new(sink.writer())
    }

    /// Replace the element formatter, decimal by default.
    pub fn with_formatter(mut self, fmt: ElemFmt<T>) -> Self {
        self.fmt = fmt;
        self
    }

    /// Print `st` as the diagnosis. Whether the buffer gets read is decided
    /// by `st` together with the stack's own check, never by `st` alone.
    pub fn dump(&mut self, s: &Stack<T>, st: Status) -> io::Result<()> {
        let seen = st | s.check();
        let out = &mut *self.out;
        writeln!(out, "Stack[{:p}]:", s as *const Stack<T>)?;
        writeln!(out, "{st}")?;
        writeln!(out, "Capacity: {}", s.capacity)?;
        writeln!(out, "Size: {}", s.size)?;
        writeln!(out, "Buffer hash: {}", s.buffer_hash)?;
        writeln!(out, "Struct hash: {}", s.struct_hash)?;
        writeln!(out, "Struct canaries: {:#018x} {:#018x}",
                 s.canary_begin, s.canary_end)?;
        writeln!(out, "Data[{:p}]:", s.data)?;

        if s.data.is_null() || seen.intersects(Status::UNREADABLE) {
            writeln!(out, "    (not read)")?;
            return out.flush();
        }

        // Neither diagnosis argues against `capacity` slots plus both guards
        // being ours to read.
        let slots = unsafe { s.slots() };
        for (i, x) in slots.iter().enumerate() {
            write!(out, "    [{i}] ")?;
            (self.fmt)(x, out)?;
            if *x == T::POISON {
                write!(out, " (POISON)")?;
            }
            writeln!(out)?;
        }
        let (lead, trail) = unsafe {
            (canary::read_guard(s.block()), canary::read_guard(s.trailer()))
        };
        writeln!(out, "Buffer canaries: {lead:#018x} {trail:#018x}")?;
        writeln!(out)?;
        out.flush()
    }
}

impl<T: Element> Stack<T> {
    /// Verify, then dump the result to `sink`.
    pub fn dump_to(&self, sink: &mut LogSink) -> io::Result<Status> {
        let st = self.check();
        Dumper::to_sink(sink).dump(self, st)?;
        Ok(st)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw;

    fn render(s: &Stack<i32>, st: Status) -> String {
        let mut out = Vec::new();
        Dumper::new(&mut out).dump(s, st).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn clean_dump_shows_every_slot() {
        let mut s: Stack<i32> = Stack::new(10).unwrap();
        for i in 1..=3 {
            s.push(i).unwrap();
        }
        let text = render(&s, s.check());
        assert!(text.contains("\nOk\n"));
        assert!(text.contains("Capacity: 10\n"));
        assert!(text.contains("Size: 3\n"));
        assert!(text.contains("    [0] 1\n"));
        assert!(text.contains("    [2] 3\n"));
        assert!(text.contains("    [3] 12648430 (POISON)\n"));
        assert!(text.contains("    [9] 12648430 (POISON)\n"));
        assert!(text.contains("Buffer canaries: "));
        assert_eq!(text.matches("(POISON)").count(), 7);
    }

    #[test]
    fn corrupted_dump_skips_buffer() {
        let mut s: Stack<i32> = Stack::new(10).unwrap();
        s.push(1).unwrap();
        unsafe { raw::set_canary_begin(&mut s, 7) };
        let st = s.check();
        let text = render(&s, st);
        assert!(text.contains("Wrong struct canary"));
        assert!(text.contains("(not read)"));
        assert!(!text.contains("[0]"));
        assert!(!text.contains("Buffer canaries"));
    }

    #[test]
    fn absurd_capacity_is_not_walked() {
        let mut s: Stack<i32> = Stack::new(10).unwrap();
        unsafe { raw::set_capacity(&mut s, 1 << 40) };
        let text = render(&s, s.check());
        assert!(text.contains("Invalid capacity"));
        assert!(text.contains("(not read)"));
        unsafe { raw::set_capacity(&mut s, 10) };
    }

    #[test]
    fn stale_status_does_not_unlock_the_buffer() {
        let mut s: Stack<i32> = Stack::new(10).unwrap();
        s.push(1).unwrap();
        unsafe { raw::set_capacity(&mut s, 1 << 26) };
        let text = render(&s, Status::OK);
        assert!(text.contains("\nOk\n"));
        assert!(text.contains("Capacity: 67108864\n"));
        assert!(text.contains("(not read)"));
        assert!(!text.contains("[0]"));
        Dumper::new(&mut io::sink()).dump(&s, Status::OK).unwrap();
        unsafe { raw::set_capacity(&mut s, 10) };
        assert_eq!(render(&s, Status::OK).matches("(POISON)").count(), 9);
    }

    #[test]
    fn destroyed_dump() {
        let s: Stack<i32> = Stack::default();
        let text = render(&s, s.check());
        assert!(text.contains("Capacity: 0\n"));
        assert!(text.contains("(not read)"));
    }

    #[test]
    fn custom_formatter() {
        let mut s: Stack<u32> = Stack::new(10).unwrap();
        s.push(255).unwrap();
        let mut out = Vec::new();
        Dumper::new(&mut out)
            .with_formatter(|x, w| write!(w, "{x:#x}"))
            .dump(&s, Status::OK)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("    [0] 0xff\n"));
        assert!(text.contains("    [1] 0xc0ffee (POISON)\n"));
    }

    #[test]
    fn dump_to_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt");
        let mut sink = LogSink::open(&path).unwrap();
        let s: Stack<i32> = Stack::new(10).unwrap();
        assert_eq!(s.dump_to(&mut sink).unwrap(), Status::OK);
        sink.close().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Stack["));
    }
}
