//! Line-oriented record emitter.
//!
//! This is the protocol-facing sink described by the line-format contract:
//! every decoded record becomes one or more lines written to stdout at a
//! configured verbosity. It is distinct from `tracing`, which carries this
//! crate's own operational log (startup, shutdown, capture/backoff errors).

use std::io::{self, Write};
use std::sync::Mutex;

/// Verbosity levels, lowest-detail first. A record tagged above the
/// configured level is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

pub struct Emitter {
    level: Verbosity,
    out: Mutex<Box<dyn Write + Send>>,
}

impl Emitter {
    pub fn new(level: Verbosity) -> Self {
        Emitter {
            level,
            out: Mutex::new(Box::new(io::stdout())),
        }
    }

    #[cfg(test)]
    pub fn with_writer(level: Verbosity, writer: Box<dyn Write + Send>) -> Self {
        Emitter {
            level,
            out: Mutex::new(writer),
        }
    }

    pub fn level(&self) -> Verbosity {
        self.level
    }

    fn enabled(&self, at: Verbosity) -> bool {
        at <= self.level
    }

    /// Writes a single line at the given level, appending a newline.
    /// Suppressed entirely if `at` is more detailed than the configured level.
    pub fn line(&self, at: Verbosity, text: &str) {
        if !self.enabled(at) {
            return;
        }
        let mut out = self.out.lock().unwrap();
        let _ = writeln!(out, "{text}");
    }

    pub fn info(&self, text: &str) {
        self.line(Verbosity::Info, text);
    }

    pub fn warn(&self, text: &str) {
        self.line(Verbosity::Warn, text);
    }

    pub fn debug(&self, text: &str) {
        self.line(Verbosity::Debug, text);
    }
}

#[cfg(test)]
pub(crate) struct SharedBuf(pub std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
