//! Newline framing for the inbound byte stream.
//!
//! CR is treated exactly like LF and empty lines are never reported, so CRLF
//! yields a single line. A line that outgrows the buffer is dropped whole:
//! everything up to the next terminator is discarded rather than parsed from
//! a truncated tail.

/// Content bytes per line (a 256 byte buffer less its terminator slot).
pub const DEFAULT_LINE_CAPACITY: usize = 255;

#[derive(Clone, Default, Debug)]
pub struct FramerStats {
    pub lines: u64,
    pub overflows: u64,
}

#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    capacity: usize,
    discarding: bool,
    stats: FramerStats,
}

impl LineFramer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            discarding: false,
            stats: FramerStats::default(),
        }
    }

    /// Consumes `bytes`, calling `on_line` once per completed line.
    pub fn feed<F>(&mut self, bytes: &[u8], mut on_line: F)
    where
        F: FnMut(&str),
    {
        for &byte in bytes {
            let byte = if byte == b'\r' { b'\n' } else { byte };

            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else if !self.buf.is_empty() {
                    on_line(&String::from_utf8_lossy(&self.buf));
                    self.buf.clear();
                    self.stats.lines += 1;
                }
                continue;
            }

            if self.discarding {
                continue;
            }

            if self.buf.len() < self.capacity {
                self.buf.push(byte);
            } else {
                log::trace!("line exceeded {} bytes, dropping", self.capacity);
                self.buf.clear();
                self.discarding = true;
                self.stats.overflows += 1;
            }
        }
    }

    /// Forgets any partial line, e.g. when the link drops.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> &FramerStats {
        &self.stats
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_CAPACITY)
    }
}
