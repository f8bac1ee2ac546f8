//! ZIP archive scanning and streaming decoding.
//!
//! This module provides a reader for ZIP archives that discovers entries one
//! header at a time and decodes an entry's data in bounded blocks.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Sequential header scanning over a [`ReadAt`](crate::ReadAt) source
//! - [`decoder`]: Stored and deflate decoding of one entry's raw bytes
//! - [`cursor`]: Bookkeeping of decoded bytes within an entry
//! - [`archive`]: The archive handle, its options and the entry iterator
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! By default the EOCD is read first, then the Central Directory is walked
//! entry by entry. Archives can also be walked through their local headers.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED (no compression) method
//! - DEFLATE compression method
//! - CRC-32 verification
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods
//! - No writing

pub mod archive;
pub mod cursor;
pub mod decoder;
mod entry;
pub mod parser;
mod reader;
pub mod structures;

pub use archive::{Archive, ArchiveOptions, Entries, DEFAULT_BLOCK_SIZE};
pub use cursor::StreamCursor;
pub use entry::Entry;
pub use parser::ScanMode;
pub use reader::{Blocks, EntryReader};
pub use structures::CompressionMethod;
