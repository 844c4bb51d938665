//! Scenario Runner

use crate::logging::LogSink;
use crate::status::Status;
use crate::stylize::Stylize;
use std::error::Error;
use std::fmt;
use std::io::Write;

/// A named sequence of stack operations and the diagnosis it should end in.
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub run: fn(&mut LogSink) -> Status,
    pub expect: Status,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
         .field("name", &self.name)
         .field("expect", &self.expect)
         .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioError {
    pub name: &'static str,
    pub expect: Status,
    pub got: Status,
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}: expected {}, got {}",
               self.name, self.expect.binary(), self.got.binary())
    }
}

impl Error for ScenarioError {}

/// Run every scenario in order and collect the ones that mismatched.
pub fn run_scenarios(scenarios: &[Scenario], sink: &mut LogSink) -> Vec<ScenarioError> {
    let mut err_results = vec![];

    println!("{}", "Running scenarios ...".style_heading());
    for sc in scenarios {
        let got = (sc.run)(sink);
        if got == sc.expect {
            println!("  - {} [{}]", sc.name.style_name(), "✓".style_pass());
            continue;
        }

        println!("  - {} [{}]", sc.name.style_fail(), "✘".style_fail());
        println!("    Expected:");
        for line in sc.expect.to_string().lines() {
            println!("      {}", line.style_status());
        }
        println!("    Got:");
        for line in got.to_string().lines() {
            println!("      {}", line.style_status());
        }
        if let Err(e) = writeln!(sink.writer(), "Scenario {} mismatched: expected {}, got {}",
                                 sc.name, sc.expect.binary(), got.binary()) {
            log::warn!("could not write to scenario log: {e}");
        }
        err_results.push(ScenarioError { name: sc.name, expect: sc.expect, got });
    }

    if let Err(e) = sink.writer().flush() {
        log::warn!("could not flush scenario log: {e}");
    }
    err_results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(_: &mut LogSink) -> Status {
        Status::OK
    }

    fn empty_pop(sink: &mut LogSink) -> Status {
        writeln!(sink.writer(), "popping nothing").unwrap();
        Status::EMPTY_STACK
    }

    #[test]
    fn collects_mismatches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut sink = LogSink::open(&path).unwrap();
        let scenarios = [
            Scenario { name: "clean", run: clean, expect: Status::OK },
            Scenario { name: "empty pop", run: empty_pop, expect: Status::EMPTY_STACK },
            Scenario { name: "wrong", run: clean, expect: Status::NULL_DATA },
        ];
        let errs = run_scenarios(&scenarios, &mut sink);
        assert_eq!(errs, vec![ScenarioError { name: "wrong",
                                              expect: Status::NULL_DATA,
                                              got: Status::OK }]);
        assert_eq!(errs[0].to_string(),
                   "wrong: expected 0000000000000001, got 0000000000000000");
        sink.close().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("popping nothing"));
        assert!(text.contains("Scenario wrong mismatched"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn full_sink_does_not_stop_the_run() {
        let mut sink = LogSink::open("/dev/full").unwrap();
        let wrong = Scenario { name: "wrong", run: clean, expect: Status::NULL_DATA };
        // Enough mismatch lines to overflow the sink's buffer.
        let scenarios = vec![wrong; 32];
        let errs = run_scenarios(&scenarios, &mut sink);
        assert_eq!(errs.len(), 32);
        assert!(sink.close().is_err());
    }

    #[test]
    fn nothing_to_run() {
        assert!(run_scenarios(&[], &mut LogSink::none()).is_empty());
    }
}
