use std::io::Write;
use std::iter::FusedIterator;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, ZipError};
use crate::io::{LocalFileReader, ReadAt};

use super::decoder::Decoder;
use super::entry::Entry;
use super::parser::{ScanMode, ZipParser};
use super::reader::EntryReader;
use super::structures::CompressionMethod;

/// Default upper bound on the size of a decoded block.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Per-archive configuration, fixed when the archive is opened.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    block_size: usize,
    scan_mode: ScanMode,
    verify_checksums: bool,
    stored: bool,
    deflate: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            scan_mode: ScanMode::default(),
            verify_checksums: true,
            stored: true,
            deflate: true,
        }
    }
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound, in bytes, on every block returned by
    /// [`EntryReader::next_block`]. Values below 1 are raised to 1.
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Restore the default block size (64 KiB).
    pub fn reset_block_size(self) -> Self {
        self.block_size(DEFAULT_BLOCK_SIZE)
    }

    pub fn scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    /// Check each entry's CRC-32 once its data is exhausted.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn enable_method(self, method: CompressionMethod) -> Self {
        self.set_method(method, true)
    }

    /// Refuse to decode entries using `method`; opening one fails with
    /// [`ZipError::UnsupportedMethod`].
    pub fn disable_method(self, method: CompressionMethod) -> Self {
        self.set_method(method, false)
    }

    fn set_method(mut self, method: CompressionMethod, enabled: bool) -> Self {
        match method {
            CompressionMethod::Stored => self.stored = enabled,
            CompressionMethod::Deflate => self.deflate = enabled,
            // nothing to toggle, unknown methods are never decodable
            CompressionMethod::Unknown(_) => {}
        }
        self
    }

    pub fn get_block_size(&self) -> usize {
        self.block_size
    }

    pub fn get_scan_mode(&self) -> ScanMode {
        self.scan_mode
    }

    pub fn is_method_enabled(&self, method: CompressionMethod) -> bool {
        match method {
            CompressionMethod::Stored => self.stored,
            CompressionMethod::Deflate => self.deflate,
            CompressionMethod::Unknown(_) => false,
        }
    }
}

/// An open ZIP archive.
///
/// Owns the byte source, the scan position and every entry discovered so
/// far. Headers are scanned lazily: nothing beyond the end records (or
/// nothing at all, in [`ScanMode::LocalHeaders`]) is read until
/// [`next_header`](Self::next_header) asks for it.
pub struct Archive<R: ReadAt> {
    source: R,
    options: ArchiveOptions,
    parser: ZipParser,
    entries: Vec<Entry>,
}

impl Archive<LocalFileReader> {
    /// Open the archive at `path` with default options.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = LocalFileReader::new(path.as_ref())?;
        Self::open(reader)
    }
}

impl<R: ReadAt> Archive<R> {
    /// Open an archive over `source` with default options.
    pub fn open(source: R) -> Result<Self> {
        Self::with_options(source, ArchiveOptions::default())
    }

    pub fn with_options(source: R, options: ArchiveOptions) -> Result<Self> {
        let parser = ZipParser::new(&source, options.scan_mode)?;
        debug!(
            size = source.size(),
            block_size = options.block_size,
            verify_checksums = options.verify_checksums,
            "opened archive"
        );
        Ok(Self {
            source,
            options,
            parser,
            entries: Vec::new(),
        })
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Scan the next entry header.
    ///
    /// Returns `Ok(None)` at the end of the archive. Entries come in the
    /// order their records are stored, duplicates included.
    pub fn next_header(&mut self) -> Result<Option<Entry>> {
        let entry = self.parser.next_header(&self.source)?;
        if let Some(entry) = &entry {
            self.entries.push(entry.clone());
        }
        Ok(entry)
    }

    /// Iterate over the entries not yet scanned.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries {
            archive: self,
            done: false,
        }
    }

    /// Scan forward to the first entry matching `predicate`.
    ///
    /// Entries skipped on the way stay in [`discovered`](Self::discovered).
    pub fn find<P>(&mut self, mut predicate: P) -> Result<Option<Entry>>
    where
        P: FnMut(&Entry) -> bool,
    {
        while let Some(entry) = self.next_header()? {
            if predicate(&entry) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Entries scanned so far, in scan order.
    pub fn discovered(&self) -> &[Entry] {
        &self.entries
    }

    /// Start reading `entry`'s data.
    ///
    /// The returned reader borrows the archive, so scanning resumes only
    /// after it is dropped.
    pub fn open_data(&mut self, entry: &Entry) -> Result<EntryReader<'_, R>> {
        if !self.options.is_method_enabled(entry.method()) {
            return Err(ZipError::UnsupportedMethod(entry.method().as_u16()));
        }
        if entry.is_encrypted() {
            return Err(ZipError::Unsupported("encrypted entries"));
        }

        let decoder = Decoder::new(
            entry,
            self.options.block_size,
            self.options.verify_checksums,
        )?;
        debug!(
            name = %entry.name(),
            method = %entry.method(),
            uncompressed_size = entry.uncompressed_size(),
            "opened entry data"
        );
        Ok(EntryReader::new(&self.source, entry.clone(), decoder))
    }

    /// Decode all of `entry` into `output`, returning the byte count.
    pub fn read_entry_to<W: Write>(&mut self, entry: &Entry, output: W) -> Result<u64> {
        self.open_data(entry)?.copy_to(output)
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Close the archive and hand back its source.
    pub fn close(self) -> R {
        self.source
    }
}

/// Lazy, forward-only sequence of entry headers.
///
/// Each call to `next` scans exactly one header. After an error the
/// iterator is exhausted.
pub struct Entries<'a, R: ReadAt> {
    archive: &'a mut Archive<R>,
    done: bool,
}

impl<R: ReadAt> Iterator for Entries<'_, R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.archive.next_header() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: ReadAt> FusedIterator for Entries<'_, R> {}
