//! Console progress channel
//!
//! Dots and status lines go to standard output and are flushed on every write
//! so they show up while a poll or rush is still in flight.

use std::io::{self, Write};

pub struct Progress {
    out: Box<dyn Write + Send>,
}

impl Progress {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn new(out: impl Write + Send + 'static) -> Self {
        Progress { out: Box::new(out) }
    }

    /// Write `text` as-is and flush. Write failures are logged, not returned.
    pub fn print(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to write progress: {}", e);
        }
    }
}
