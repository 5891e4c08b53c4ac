//! Chunking and adaptive retry policy for large array transfers.
//!
//! Reads are split into fixed chunks; writes start large and halve whenever
//! the controller rejects the request as too long, keeping the last size that
//! went through as a ceiling for the rest of the transfer.

/// Maximum elements per read request for 4-byte element types.
pub const READ_CHUNK_ELEMENTS: usize = 124;

/// Initial elements per write request for 4-byte element types.
pub const WRITE_CHUNK_START: usize = 490;

/// Yields `(element_offset, chunk_len)` pairs covering `count` elements.
pub fn read_chunks(count: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..count)
        .step_by(READ_CHUNK_ELEMENTS)
        .map(move |offset| (offset, READ_CHUNK_ELEMENTS.min(count - offset)))
}

/// Cursor over an adaptive array write.
///
/// The driving loop asks for the next chunk, attempts it, and reports the
/// outcome; on an oversize rejection the chunk size halves (floor 1) and the
/// same span is offered again. The ceiling never grows back within one
/// transfer.
#[derive(Debug)]
pub struct WritePlan {
    total: usize,
    written: usize,
    ceiling: usize,
}

impl WritePlan {
    /// Plans a write of `total` elements.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            written: 0,
            ceiling: WRITE_CHUNK_START,
        }
    }

    /// Next `(element_offset, chunk_len)` to attempt, or `None` when done.
    pub fn next_chunk(&self) -> Option<(usize, usize)> {
        if self.written >= self.total {
            return None;
        }
        Some((self.written, self.ceiling.min(self.total - self.written)))
    }

    /// Records a successful chunk of `len` elements.
    pub fn advance(&mut self, len: usize) {
        self.written += len;
    }

    /// Halves the chunk size after an oversize rejection.
    ///
    /// Returns `false` when the size is already 1 and cannot shrink further.
    pub fn shrink(&mut self) -> bool {
        if self.ceiling <= 1 {
            return false;
        }
        self.ceiling = (self.ceiling / 2).max(1);
        true
    }
}
