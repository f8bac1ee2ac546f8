//! Block-wise decoding of an entry's raw byte range.
//!
//! A [`Decoder`] pulls compressed bytes from the source on demand and hands
//! out decoded blocks no larger than the configured block size. It keeps no
//! reference to the source, so the caller decides which reader feeds it.

use crc32fast::Hasher;
use flate2::{Decompress, FlushDecompress, Status};
use tracing::{debug, trace};

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::cursor::StreamCursor;
use super::entry::Entry;
use super::parser::read_exact_at;
use super::structures::CompressionMethod;

enum Method {
    Stored,
    Deflate(Box<Inflate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Done,
}

/// The entry's raw byte range and how much of it has been pulled.
struct RawRange {
    start: u64,
    len: u64,
    read: u64,
}

impl RawRange {
    fn remaining(&self) -> u64 {
        self.len - self.read
    }

    /// Fill as much of `buf` as the range still holds.
    fn read_into<R: ReadAt + ?Sized>(&mut self, reader: &R, buf: &mut [u8]) -> Result<usize> {
        let len = clamp_len(self.remaining(), buf.len());
        if len == 0 {
            return Ok(0);
        }
        read_exact_at(reader, self.start + self.read, &mut buf[..len])?;
        self.read += len as u64;
        Ok(len)
    }
}

/// Raw inflate state with its window of compressed input.
struct Inflate {
    inflater: Decompress,
    stream_end: bool,
    input: Vec<u8>,
    in_pos: usize,
    in_len: usize,
}

impl Inflate {
    fn new(input_len: usize) -> Self {
        Self {
            inflater: Decompress::new(false),
            stream_end: false,
            input: vec![0u8; input_len],
            in_pos: 0,
            in_len: 0,
        }
    }

    fn fill<R: ReadAt + ?Sized>(
        &mut self,
        reader: &R,
        raw: &mut RawRange,
        output: &mut [u8],
    ) -> Result<Option<usize>> {
        loop {
            if self.stream_end {
                return Ok(None);
            }

            if self.in_pos == self.in_len && raw.remaining() > 0 {
                self.in_len = raw.read_into(reader, &mut self.input)?;
                self.in_pos = 0;
            }

            let input_done = raw.remaining() == 0;

            // never Finish: miniz treats it as one-shot into a single buffer
            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();
            let status = self
                .inflater
                .decompress(
                    &self.input[self.in_pos..self.in_len],
                    output,
                    FlushDecompress::None,
                )
                .map_err(|e| ZipError::CorruptData(format!("invalid deflate stream: {e}")))?;
            let used = (self.inflater.total_in() - before_in) as usize;
            let produced = (self.inflater.total_out() - before_out) as usize;
            self.in_pos += used;

            if status == Status::StreamEnd {
                self.stream_end = true;
                let unused = (self.in_len - self.in_pos) as u64 + raw.remaining();
                if unused > 0 {
                    debug!(unused, "deflate stream ended before the entry's compressed size");
                }
            }

            if produced > 0 {
                return Ok(Some(produced));
            }
            if self.stream_end {
                return Ok(None);
            }
            if used == 0 {
                let starved = self.in_pos == self.in_len;
                if starved && input_done {
                    return Err(ZipError::CorruptData(
                        "deflate stream ends before its final block".to_string(),
                    ));
                }
                if !starved {
                    return Err(ZipError::CorruptData(
                        "deflate decoder made no progress".to_string(),
                    ));
                }
            }
        }
    }
}

/// Decoding state of one open entry.
pub struct Decoder {
    method: Method,
    state: State,
    cursor: StreamCursor,
    raw: RawRange,
    expected_crc: u32,
    hasher: Option<Hasher>,
    output: Vec<u8>,
}

impl Decoder {
    /// Set up decoding of `entry` with blocks of at most `block_size` bytes.
    ///
    /// Fails with `UnsupportedMethod` for methods other than stored and
    /// deflate, and with `SizeMismatch` for stored entries whose two sizes
    /// disagree.
    pub fn new(entry: &Entry, block_size: usize, verify_checksum: bool) -> Result<Self> {
        let block_size = block_size.max(1);
        let method = match entry.method() {
            CompressionMethod::Stored => {
                if entry.compressed_size() != entry.uncompressed_size() {
                    return Err(ZipError::SizeMismatch {
                        expected: entry.uncompressed_size(),
                        actual: entry.compressed_size(),
                    });
                }
                // stored data is copied straight into the output buffer
                Method::Stored
            }
            CompressionMethod::Deflate => Method::Deflate(Box::new(Inflate::new(clamp_len(
                entry.compressed_size(),
                block_size,
            )))),
            CompressionMethod::Unknown(code) => return Err(ZipError::UnsupportedMethod(code)),
        };
        let output_len = clamp_len(entry.uncompressed_size().max(1), block_size);

        Ok(Self {
            method,
            state: State::Active,
            cursor: StreamCursor::new(entry.uncompressed_size()),
            raw: RawRange {
                start: entry.data_offset(),
                len: entry.compressed_size(),
                read: 0,
            },
            expected_crc: entry.crc32(),
            hasher: verify_checksum.then(Hasher::new),
            output: vec![0u8; output_len],
        })
    }

    pub fn cursor(&self) -> &StreamCursor {
        &self.cursor
    }

    /// Buffer the blocks returned by `next_block` point into.
    pub(crate) fn output(&self) -> &[u8] {
        &self.output
    }

    /// Whether the entry is exhausted or its read was terminated by an error.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Decode the next block.
    ///
    /// Returns `Ok(None)` once the entry is exhausted, and on every call
    /// after that. An error ends the entry as well.
    pub fn next_block<R: ReadAt + ?Sized>(&mut self, reader: &R) -> Result<Option<&[u8]>> {
        if self.state == State::Done {
            return Ok(None);
        }

        let filled = match self.fill(reader) {
            Ok(filled) => filled,
            Err(e) => {
                self.state = State::Done;
                return Err(e);
            }
        };

        match filled {
            Some(len) => {
                trace!(len, consumed = self.cursor.consumed(), "decoded block");
                Ok(Some(&self.output[..len]))
            }
            None => {
                self.state = State::Done;
                self.finish()?;
                Ok(None)
            }
        }
    }

    fn fill<R: ReadAt + ?Sized>(&mut self, reader: &R) -> Result<Option<usize>> {
        let len = match &mut self.method {
            Method::Stored => match self.raw.read_into(reader, &mut self.output)? {
                0 => None,
                len => Some(len),
            },
            Method::Deflate(inflate) => inflate.fill(reader, &mut self.raw, &mut self.output)?,
        };
        let Some(len) = len else {
            return Ok(None);
        };

        let decoded = self.cursor.consumed() + len as u64;
        if decoded > self.cursor.total() {
            return Err(ZipError::SizeMismatch {
                expected: self.cursor.total(),
                actual: decoded,
            });
        }
        self.cursor.advance(len as u64)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&self.output[..len]);
        }
        Ok(Some(len))
    }

    /// Validate the totals of an exhausted entry.
    fn finish(&mut self) -> Result<()> {
        if !self.cursor.is_complete() {
            return Err(ZipError::SizeMismatch {
                expected: self.cursor.total(),
                actual: self.cursor.consumed(),
            });
        }
        if let Some(hasher) = self.hasher.take() {
            let actual = hasher.finalize();
            if actual != self.expected_crc {
                return Err(ZipError::CorruptData(format!(
                    "CRC-32 mismatch: expected {:#010x}, computed {actual:#010x}",
                    self.expected_crc
                )));
            }
        }
        Ok(())
    }
}

fn clamp_len(len: u64, max: usize) -> usize {
    len.min(max as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::entry::test_entry;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn drain(decoder: &mut Decoder, source: &Vec<u8>) -> Result<Vec<Vec<u8>>> {
        let mut blocks = Vec::new();
        while let Some(block) = decoder.next_block(source)? {
            blocks.push(block.to_vec());
        }
        Ok(blocks)
    }

    #[test]
    fn stored_blocks_are_bounded() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let mut source = b"junk".to_vec();
        source.extend_from_slice(&payload);

        let entry = test_entry(
            CompressionMethod::Stored,
            4,
            1000,
            1000,
            crc32fast::hash(&payload),
        );
        let mut decoder = Decoder::new(&entry, 300, true).unwrap();
        let blocks = drain(&mut decoder, &source).unwrap();

        assert_eq!(
            blocks.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![300, 300, 300, 100]
        );
        assert_eq!(blocks.concat(), payload);
        assert!(decoder.is_done());
        assert!(decoder.next_block(&source).unwrap().is_none());
    }

    #[test]
    fn deflate_round_trip_with_small_blocks() {
        let payload = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(200);
        let compressed = deflate(payload.as_bytes());

        let entry = test_entry(
            CompressionMethod::Deflate,
            0,
            compressed.len() as u64,
            payload.len() as u64,
            crc32fast::hash(payload.as_bytes()),
        );
        let mut decoder = Decoder::new(&entry, 64, true).unwrap();
        let blocks = drain(&mut decoder, &compressed).unwrap();

        assert!(blocks.iter().all(|b| !b.is_empty() && b.len() <= 64));
        assert_eq!(blocks.concat(), payload.as_bytes());
        assert_eq!(decoder.cursor().remaining(), 0);
    }

    #[test]
    fn deflate_longer_than_declared_is_size_mismatch() {
        let payload = vec![7u8; 500];
        let compressed = deflate(&payload);
        let entry = test_entry(CompressionMethod::Deflate, 0, compressed.len() as u64, 400, 0);

        let mut decoder = Decoder::new(&entry, 128, false).unwrap();
        assert!(matches!(
            drain(&mut decoder, &compressed),
            Err(ZipError::SizeMismatch { expected: 400, .. })
        ));
        // an error ends the entry
        assert!(decoder.next_block(&compressed).unwrap().is_none());
    }

    #[test]
    fn deflate_shorter_than_declared_is_size_mismatch() {
        let payload = vec![7u8; 500];
        let compressed = deflate(&payload);
        let entry = test_entry(CompressionMethod::Deflate, 0, compressed.len() as u64, 600, 0);

        let mut decoder = Decoder::new(&entry, 4096, false).unwrap();
        assert!(matches!(
            drain(&mut decoder, &compressed),
            Err(ZipError::SizeMismatch { expected: 600, actual: 500 })
        ));
    }

    #[test]
    fn invalid_bitstream_is_corrupt() {
        // block type 3 is reserved
        let garbage = vec![0xFFu8; 32];
        let entry = test_entry(CompressionMethod::Deflate, 0, 32, 100, 0);
        let mut decoder = Decoder::new(&entry, 4096, false).unwrap();
        assert!(matches!(
            drain(&mut decoder, &garbage),
            Err(ZipError::CorruptData(_))
        ));
    }

    #[test]
    fn cut_deflate_stream_is_corrupt() {
        let payload: Vec<u8> = (0..5000u32).flat_map(|i| i.to_le_bytes()).collect();
        let compressed = deflate(&payload);
        let cut = compressed[..compressed.len() / 2].to_vec();
        let entry = test_entry(
            CompressionMethod::Deflate,
            0,
            cut.len() as u64,
            payload.len() as u64,
            0,
        );

        let mut decoder = Decoder::new(&entry, 4096, false).unwrap();
        assert!(matches!(
            drain(&mut decoder, &cut),
            Err(ZipError::CorruptData(_))
        ));
    }

    #[test]
    fn crc_mismatch_is_corrupt() {
        let source = b"hello".to_vec();
        let entry = test_entry(CompressionMethod::Stored, 0, 5, 5, 0xDEAD_BEEF);
        let mut decoder = Decoder::new(&entry, 4096, true).unwrap();
        assert_eq!(decoder.next_block(&source).unwrap(), Some(&b"hello"[..]));
        assert!(matches!(
            decoder.next_block(&source),
            Err(ZipError::CorruptData(_))
        ));

        let mut unchecked = Decoder::new(&entry, 4096, false).unwrap();
        assert_eq!(drain(&mut unchecked, &source).unwrap().concat(), b"hello");
    }

    #[test]
    fn unknown_method_and_lying_stored_sizes() {
        let entry = test_entry(CompressionMethod::Unknown(14), 0, 10, 10, 0);
        assert!(matches!(
            Decoder::new(&entry, 4096, true),
            Err(ZipError::UnsupportedMethod(14))
        ));

        let entry = test_entry(CompressionMethod::Stored, 0, 10, 12, 0);
        assert!(matches!(
            Decoder::new(&entry, 4096, true),
            Err(ZipError::SizeMismatch { expected: 12, actual: 10 })
        ));
    }

    #[test]
    fn stored_data_past_end_of_source_is_truncated() {
        let source = b"abc".to_vec();
        let entry = test_entry(CompressionMethod::Stored, 0, 10, 10, 0);
        let mut decoder = Decoder::new(&entry, 4096, false).unwrap();
        assert!(matches!(
            decoder.next_block(&source),
            Err(ZipError::TruncatedInput { expected: 10, actual: 3, .. })
        ));
    }

    #[test]
    fn empty_entries_are_exhausted_immediately() {
        let source = Vec::new();
        let entry = test_entry(CompressionMethod::Stored, 0, 0, 0, 0);
        let mut decoder = Decoder::new(&entry, 4096, true).unwrap();
        assert!(decoder.next_block(&source).unwrap().is_none());

        let compressed = deflate(b"");
        let entry = test_entry(CompressionMethod::Deflate, 0, compressed.len() as u64, 0, 0);
        let mut decoder = Decoder::new(&entry, 4096, true).unwrap();
        assert!(decoder.next_block(&compressed).unwrap().is_none());
        assert!(decoder.next_block(&compressed).unwrap().is_none());
    }
}
