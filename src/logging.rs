//! Logging and Diagnostic Sinks

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Once;

const SINK_BUF_SZ: usize = 512;

static INIT: Once = Once::new();

/// Install the `log` backend, once per process. Filtered by `RUST_LOG`.
pub fn setup_logging() {
    #[cfg(feature = "pretty_env_logger")]
    INIT.call_once(pretty_env_logger::init);
    #[cfg(not(feature = "pretty_env_logger"))]
    INIT.call_once(|| ());
}

/// Where stack dumps go.
///
/// The sink owns its file: open it, hand out `writer()` as often as needed,
/// `close()` it when done. A sink without a file writes to stderr instead.
#[derive(Debug)]
pub struct LogSink {
    file: Option<BufWriter<File>>,
    stderr: io::Stderr,
}

impl LogSink {
    /// Create or truncate `path`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<LogSink> {
        let file = File::create(path.as_ref())?;
        log::trace!("opened log sink {}", path.as_ref().display());
        Ok(LogSink { file: Some(BufWriter::with_capacity(SINK_BUF_SZ, file)),
                     stderr: io::stderr() })
    }

    /// A sink with no file behind it.
    pub fn none() -> LogSink {
        LogSink { file: None, stderr: io::stderr() }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn writer(&mut self) -> &mut dyn Write {
        match self.file.as_mut() {
            Some(f) => f,
            None => &mut self.stderr,
        }
    }

    /// Flush and close the file. Closing a sink without one is an error.
    pub fn close(mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut f) => {
                f.flush()?;
                f.into_inner().map_err(|e| e.into_error())?.sync_all()
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound,
                                       "no log file to close")),
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        if let Some(f) = self.file.as_mut() {
            if let Err(e) = f.flush() {
                log::warn!("could not flush log sink: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn writes_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut sink = LogSink::open(&path).unwrap();
        assert!(sink.is_open());
        writeln!(sink.writer(), "hello").unwrap();
        writeln!(sink.writer(), "again").unwrap();
        sink.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\nagain\n");
    }

    #[test]
    fn open_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "old contents").unwrap();
        LogSink::open(&path).unwrap().close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn drop_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        {
            let mut sink = LogSink::open(&path).unwrap();
            write!(sink.writer(), "unflushed").unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "unflushed");
    }

    #[test]
    fn missing_file_falls_back() {
        let mut sink = LogSink::none();
        assert!(!sink.is_open());
        sink.writer().flush().unwrap();
        assert!(sink.close().is_err());
    }

    #[test]
    fn unopenable_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LogSink::open(dir.path().join("no/such/dir/log.txt")).is_err());
    }
}
