use std::io::{self, Read, Write};
use std::iter::FusedIterator;
use std::ops::Range;

use tracing::error;

use crate::error::Result;
use crate::io::ReadAt;

use super::decoder::Decoder;
use super::entry::Entry;

/// Read cursor over one entry's decoded data.
///
/// Obtained from [`Archive::open_data`](super::Archive::open_data). It
/// borrows the archive mutably, so no header scan or second entry read can
/// interleave with it. Dropping it abandons the read.
pub struct EntryReader<'a, R: ReadAt + ?Sized> {
    source: &'a R,
    entry: Entry,
    decoder: Decoder,
    /// Part of the last decoded block not yet handed out through `Read`.
    pending: Range<usize>,
}

impl<'a, R: ReadAt + ?Sized> EntryReader<'a, R> {
    pub(crate) fn new(source: &'a R, entry: Entry, decoder: Decoder) -> Self {
        Self {
            source,
            entry,
            decoder,
            pending: 0..0,
        }
    }

    /// The entry being read.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Decoded bytes handed to the caller so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.decoder.cursor().consumed() - self.pending.len() as u64
    }

    /// Decoded bytes the caller has yet to receive.
    pub fn remaining(&self) -> u64 {
        self.decoder.cursor().remaining() + self.pending.len() as u64
    }

    /// Whether every block has been handed out (or the read failed).
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty() && self.decoder.is_done()
    }

    /// Next block of decoded data.
    ///
    /// Returns `Ok(None)` once the entry is exhausted and keeps doing so on
    /// later calls. Any bytes left over from a partial [`Read::read`] come
    /// first.
    pub fn next_block(&mut self) -> Result<Option<&[u8]>> {
        if !self.pending.is_empty() {
            let range = std::mem::replace(&mut self.pending, 0..0);
            return Ok(Some(&self.decoder.output()[range]));
        }
        let len = self.decode_next()?;
        Ok(len.map(|len| &self.decoder.output()[..len]))
    }

    /// Copy the rest of the entry into `output`, returning the byte count.
    pub fn copy_to<W: Write>(&mut self, mut output: W) -> Result<u64> {
        let mut written = 0u64;
        while let Some(block) = self.next_block()? {
            output.write_all(block)?;
            written += block.len() as u64;
        }
        Ok(written)
    }

    /// Turn the reader into an iterator of owned blocks.
    ///
    /// Each item is a copy of what [`next_block`](Self::next_block) would
    /// return. The iterator ends after the last block or the first error.
    pub fn blocks(self) -> Blocks<'a, R> {
        Blocks { reader: self }
    }

    fn decode_next(&mut self) -> Result<Option<usize>> {
        match self.decoder.next_block(self.source) {
            Ok(block) => Ok(block.map(<[u8]>::len)),
            Err(e) => {
                error!(entry = %self.entry.name(), error = %e, "entry read failed");
                Err(e)
            }
        }
    }
}

impl<R: ReadAt + ?Sized> Read for EntryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            match self.decode_next()? {
                Some(len) => self.pending = 0..len,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        let start = self.pending.start;
        buf[..n].copy_from_slice(&self.decoder.output()[start..start + n]);
        self.pending.start += n;
        Ok(n)
    }
}

/// Owned blocks of one entry, from [`EntryReader::blocks`].
pub struct Blocks<'a, R: ReadAt + ?Sized> {
    reader: EntryReader<'a, R>,
}

impl<'a, R: ReadAt + ?Sized> Blocks<'a, R> {
    pub fn into_inner(self) -> EntryReader<'a, R> {
        self.reader
    }
}

impl<R: ReadAt + ?Sized> Iterator for Blocks<'_, R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_block().transpose().map(|block| block.map(<[u8]>::to_vec))
    }
}

// a failed read reports Ok(None) afterwards
impl<R: ReadAt + ?Sized> FusedIterator for Blocks<'_, R> {}
