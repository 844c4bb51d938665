#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
use jemallocator::Jemalloc;
#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use canary_stack::harness::run_scenarios;
use canary_stack::logging::{setup_logging, LogSink};
use canary_stack::scenarios::STOCK;
use std::env;
use std::process::exit;

const DEFAULT_LOG: &str = "log.txt";

fn main() {
    setup_logging();
    let args: Vec<String> = env::args().skip(1).collect();
    let path = match &args[..] {
        [path] => path.as_str(),
        [] => DEFAULT_LOG,
        _ => {
            eprintln!("usage: canary-stack [LOG_PATH]");
            exit(2)
        }
    };

    let mut sink = match LogSink::open(path) {
        Ok(sink) => sink,
        Err(e) => {
            log::error!("could not open {path}, dumping to stderr: {e}");
            LogSink::none()
        }
    };

    let errs = run_scenarios(STOCK, &mut sink);

    if sink.is_open() {
        if let Err(e) = sink.close() {
            log::error!("could not close {path}: {e}");
        }
    }

    if !errs.is_empty() {
        for e in errs.iter() {
            eprintln!("{e}");
        }
        exit(1)
    }
}
