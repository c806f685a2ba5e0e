//! Bounded output capture
//!
//! Each running spec owns one buffer that collects its stdout and stderr.

/// Default ceiling for captured output per spec (10 MiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Byte buffer with a hard size ceiling
#[derive(Debug)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl OutputBuffer {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            overflowed: false,
        }
    }

    /// Append a chunk, keeping at most `limit` bytes in total
    ///
    /// Returns `false` once the ceiling has been exceeded; the part of the
    /// chunk that still fits is kept.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.bytes.extend_from_slice(&chunk[..room]);
            self.overflowed = true;
            return false;
        }

        self.bytes.extend_from_slice(chunk);
        true
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Decode the captured bytes, replacing invalid UTF-8
    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_OUTPUT_BYTES)
    }
}
