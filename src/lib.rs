//! # zipcursor
//!
//! A streaming ZIP reader: entries are discovered one header at a time and
//! an entry's data is decoded in bounded blocks, so nothing is buffered
//! beyond the block being handed out.
//!
//! Any source with random access can back an archive through the
//! [`ReadAt`] trait: in-memory buffers, local files, and (with the `http`
//! feature) remote files fetched with HTTP Range requests.
//!
//! ## Features
//!
//! - Central directory scanning, or local header scanning for archives
//!   without a usable tail
//! - Support for ZIP64 format (archives larger than 4GB)
//! - Support for STORED (uncompressed) and DEFLATE compression methods
//! - CRC-32 verification of decoded data
//! - Per-archive configuration of block size and enabled methods
//!
//! ## Example
//!
//! ```no_run
//! use zipcursor::Archive;
//!
//! fn main() -> zipcursor::Result<()> {
//!     let mut archive = Archive::open_file("/tmp/test.zip")?;
//!
//!     if let Some(entry) = archive.find(|e| e.name() == "content/nested/second")? {
//!         let mut reader = archive.open_data(&entry)?;
//!         if let Some(block) = reader.next_block()? {
//!             println!("{}", String::from_utf8_lossy(block));
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod io;
pub mod zip;

pub use error::{Result, ZipError};
#[cfg(feature = "http")]
pub use io::HttpRangeReader;
pub use io::{LocalFileReader, ReadAt};
pub use zip::{
    Archive, ArchiveOptions, Blocks, CompressionMethod, Entries, Entry, EntryReader, ScanMode,
    StreamCursor,
};
