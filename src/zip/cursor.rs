use crate::error::{Result, ZipError};

/// Position within an entry's decoded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    consumed: u64,
    total: u64,
}

impl StreamCursor {
    pub fn new(total: u64) -> Self {
        Self { consumed: 0, total }
    }

    /// Decoded bytes handed out so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Declared uncompressed size of the entry.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn remaining(&self) -> u64 {
        self.total - self.consumed
    }

    pub fn is_complete(&self) -> bool {
        self.consumed == self.total
    }

    /// Record `n` more bytes as consumed.
    ///
    /// Never moves past `total`; an attempt to do so leaves the cursor
    /// untouched and returns `OverRead`.
    pub fn advance(&mut self, n: u64) -> Result<()> {
        if n > self.remaining() {
            return Err(ZipError::OverRead {
                requested: n,
                remaining: self.remaining(),
            });
        }
        self.consumed += n;
        Ok(())
    }
}
