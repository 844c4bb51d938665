//! Stock Failure Scenarios
//!
//! Each scenario corrupts one thing about a live stack, runs an operation on
//! it and reports the diagnosis. Corrupted fields are restored afterwards so
//! the stack can still be freed.

use crate::dump::Dumper;
use crate::elem::Element;
use crate::harness::Scenario;
use crate::logging::LogSink;
use crate::raw;
use crate::stak::Stack;
use crate::status::Status;
use std::io::Write;

macro_rules! or_return {
    ($e:expr) => {
        match $e {
            Ok(x) => x,
            Err(st) => return st,
        }
    };
}

pub const STOCK: &[Scenario] = &[
    Scenario { name: "normal", run: normal, expect: Status::OK },
    Scenario { name: "thousand and one", run: thousand_and_one, expect: Status::OK },
    Scenario { name: "corrupted size",
               run: corrupted_size,
               expect: Status::INVALID_SIZE.union(Status::STRUCT_HASH_FAIL) },
    Scenario { name: "corrupted canary", run: corrupted_canary, expect: Status::STRUCT_CANARY },
    Scenario { name: "absurd capacity",
               run: absurd_capacity,
               expect: Status::INVALID_CAPACITY.union(Status::STRUCT_HASH_FAIL) },
    Scenario { name: "pop empty", run: pop_empty, expect: Status::EMPTY_STACK },
    Scenario { name: "buffer overrun", run: buffer_overrun, expect: Status::BUFFER_CANARY },
    Scenario { name: "stray write", run: stray_write, expect: Status::BUFFER_HASH_FAIL },
    Scenario { name: "dangling data", run: dangling_data, expect: Status::INVALID_DATA_PTR },
];

const ABSURD_CAPACITY: usize = 1_000_000_000;

fn banner(sink: &mut LogSink, name: &str) {
    if let Err(e) = writeln!(sink.writer(), "=== {name} ===") {
        log::warn!("could not write to scenario log: {e}");
    }
}

/// Dump `s` into the sink unless `st` is clean, then hand `st` back.
fn report<T: Element>(sink: &mut LogSink, s: &Stack<T>, st: Status) -> Status {
    if !st.is_ok() {
        if let Err(e) = Dumper::to_sink(sink).dump(s, st) {
            log::warn!("could not dump stack: {e}");
        }
    }
    st
}

fn status_of<T>(res: Result<T, Status>) -> Status {
    res.err().unwrap_or(Status::OK)
}

fn filled(n: i32) -> Result<Stack<i32>, Status> {
    let mut s = Stack::new(10)?;
    for i in 1..=n {
        s.push(i)?;
    }
    Ok(s)
}

/// Push `1..=n`, then pop `pops` times expecting them back in reverse.
fn push_then_pop(s: &mut Stack<i32>, n: i32, pops: i32) -> Result<(), Status> {
    for i in 1..=n {
        s.push(i)?;
    }
    for want in (n - pops + 1..=n).rev() {
        let got = s.pop()?;
        if got != want {
            log::error!("popped {got}, expected {want}");
            return Err(Status::UNEXP_NORMAL_VAL);
        }
    }
    Ok(())
}

fn expect_contents(s: &Stack<i32>, want: &[i32]) -> Result<(), Status> {
    let got = s.to_vec()?;
    if got != want {
        log::error!("stack holds {got:?}, expected {want:?}");
        return Err(Status::UNEXP_NORMAL_VAL);
    }
    Ok(())
}

fn normal(sink: &mut LogSink) -> Status {
    banner(sink, "normal");
    let mut s = or_return!(Stack::<i32>::new(10));
    let res = push_then_pop(&mut s, 10, 5)
        .and_then(|()| expect_contents(&s, &[1, 2, 3, 4, 5]))
        .and_then(|()| s.destroy());
    report(sink, &s, status_of(res))
}

fn thousand_and_one(sink: &mut LogSink) -> Status {
    banner(sink, "thousand and one");
    let mut s = or_return!(Stack::<i32>::new(10));
    let res = push_then_pop(&mut s, 1001, 1001)
        .and_then(|()| expect_contents(&s, &[]))
        .and_then(|()| s.destroy());
    report(sink, &s, status_of(res))
}

fn corrupted_size(sink: &mut LogSink) -> Status {
    banner(sink, "corrupted size");
    let mut s = or_return!(filled(10));
    let size = s.len();
    unsafe { raw::set_size(&mut s, 100_000) };
    let st = status_of(s.destroy());
    report(sink, &s, st);
    unsafe { raw::set_size(&mut s, size) };
    st
}

fn corrupted_canary(sink: &mut LogSink) -> Status {
    banner(sink, "corrupted canary");
    let mut s = or_return!(filled(10));
    let begin = s.canary_begin;
    unsafe { raw::set_canary_begin(&mut s, 100_000) };
    let st = status_of(s.push(11));
    report(sink, &s, st);
    unsafe { raw::set_canary_begin(&mut s, begin) };
    st
}

fn absurd_capacity(sink: &mut LogSink) -> Status {
    banner(sink, "absurd capacity");
    let mut s = or_return!(filled(10));
    let capacity = s.capacity();
    unsafe { raw::set_capacity(&mut s, ABSURD_CAPACITY) };
    let st = status_of(s.destroy());
    report(sink, &s, st);
    unsafe { raw::set_capacity(&mut s, capacity) };
    st
}

fn pop_empty(sink: &mut LogSink) -> Status {
    banner(sink, "pop empty");
    let mut s = or_return!(Stack::<i32>::new(10));
    let st = status_of(s.pop());
    report(sink, &s, st)
}

fn buffer_overrun(sink: &mut LogSink) -> Status {
    banner(sink, "buffer overrun");
    let mut s = or_return!(filled(10));
    // One slot past the end lands in the trailing guard.
    unsafe {
        let slot = raw::data_ptr(&s).add(s.capacity());
        let saved = slot.read_unaligned();
        slot.write_unaligned(11);
        let st = status_of(s.push(12));
        report(sink, &s, st);
        slot.write_unaligned(saved);
        st
    }
}

fn stray_write(sink: &mut LogSink) -> Status {
    banner(sink, "stray write");
    let mut s = or_return!(filled(5));
    unsafe {
        let slot = raw::data_ptr(&s).add(2);
        let saved = slot.read();
        slot.write(42);
        let st = status_of(s.pop());
        report(sink, &s, st);
        slot.write(saved);
        st
    }
}

fn dangling_data(sink: &mut LogSink) -> Status {
    banner(sink, "dangling data");
    let mut s = or_return!(filled(5));
    let data = unsafe { raw::data_ptr(&s) };
    let dangling = sptr::invalid_mut::<i32>(0x1000 + crate::canary::CANARY_SZ);
    unsafe { raw::set_data(&mut s, dangling) };
    let st = status_of(s.pop());
    report(sink, &s, st);
    unsafe { raw::set_data(&mut s, data) };
    st
}
