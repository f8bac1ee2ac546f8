//! Low-level ZIP archive scanner.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Scanning Strategy
//!
//! In [`ScanMode::CentralDirectory`] the archive is read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Walk the Central Directory one header per [`ZipParser::next_header`] call
//! 4. Resolve each entry's data offset from its Local File Header
//!
//! In [`ScanMode::LocalHeaders`] the archive is walked from the front,
//! local header after local header, which also works for archives whose
//! tail is missing. Central directory mode drops to this walk on its own
//! when no end record exists but the source opens with a local header.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::entry::Entry;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Which records the scanner walks to discover entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Walk the central directory located through the EOCD record.
    #[default]
    CentralDirectory,
    /// Walk local file headers from the start of the source.
    LocalHeaders,
}

/// Read exactly `buf.len()` bytes at `offset`, or fail with `TruncatedInput`.
pub(crate) fn read_exact_at<R: ReadAt + ?Sized>(
    reader: &R,
    offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    let read = reader.read_full_at(offset, buf)?;
    if read < buf.len() {
        return Err(ZipError::TruncatedInput {
            offset,
            expected: buf.len() as u64,
            actual: read as u64,
        });
    }
    Ok(())
}

/// Find and parse the End of Central Directory record.
///
/// The EOCD is located at the end of the ZIP file. This handles both the
/// simple case (no comment) and archives with comments by searching
/// backwards for the signature.
///
/// Returns the EOCD record and its offset in the file.
pub fn find_eocd<R: ReadAt + ?Sized>(reader: &R) -> Result<(EndOfCentralDirectory, u64)> {
    let size = reader.size();
    let eocd_size = EndOfCentralDirectory::SIZE as u64;
    if size < eocd_size {
        return Err(ZipError::TruncatedInput {
            offset: 0,
            expected: eocd_size,
            actual: size,
        });
    }

    // Try the common case of an archive without a comment first.
    let offset = size - eocd_size;
    let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
    read_exact_at(reader, offset, &mut buf)?;
    if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
        let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
        return Ok((eocd, offset));
    }

    let search_size = (MAX_COMMENT_SIZE + eocd_size).min(size);
    let search_start = size - search_size;

    let mut buf = vec![0u8; search_size as usize];
    read_exact_at(reader, search_start, &mut buf)?;

    for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
        if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
            // The comment length must account for exactly the remaining bytes.
            let comment_len = LittleEndian::read_u16(&buf[i + 20..i + 22]) as usize;

            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
        }
    }

    Err(ZipError::malformed("end of central directory record not found"))
}

/// Read the ZIP64 End of Central Directory record.
///
/// Called when the regular EOCD indicates ZIP64 extensions are needed
/// (fields set to 0xFFFF or 0xFFFFFFFF). The locator sits immediately
/// before the regular EOCD.
pub fn read_zip64_eocd<R: ReadAt + ?Sized>(reader: &R, eocd_offset: u64) -> Result<Zip64EOCD> {
    let locator_offset = eocd_offset
        .checked_sub(Zip64EOCDLocator::SIZE as u64)
        .ok_or_else(|| ZipError::malformed("ZIP64 locator would start before the archive"))?;
    let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
    read_exact_at(reader, locator_offset, &mut locator_buf)?;
    let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

    let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
    read_exact_at(reader, locator.eocd64_offset, &mut eocd64_buf)?;
    Zip64EOCD::from_bytes(&eocd64_buf)
}

fn starts_with_local_header<R: ReadAt + ?Sized>(reader: &R) -> Result<bool> {
    let mut signature = [0u8; 4];
    let read = reader.read_full_at(0, &mut signature)?;
    Ok(read == signature.len() && &signature[..] == LocalFileHeader::SIGNATURE)
}

#[derive(Debug)]
enum ScanState {
    CentralDirectory { position: u64, end: u64, remaining: u64 },
    LocalHeaders { position: u64 },
    Finished,
}

/// Sequential header scanner.
///
/// Holds only the parse position; the source is passed into every call so
/// the owning archive decides who gets to read from it.
#[derive(Debug)]
pub struct ZipParser {
    state: ScanState,
    next_index: usize,
}

impl ZipParser {
    /// Prepare a scan according to `mode`.
    ///
    /// In central directory mode this locates the directory immediately.
    /// A source without an EOCD is walked through its local headers if it
    /// starts with one, and fails here otherwise.
    pub fn new<R: ReadAt + ?Sized>(reader: &R, mode: ScanMode) -> Result<Self> {
        let state = match mode {
            ScanMode::CentralDirectory => Self::locate_central_directory(reader)?,
            ScanMode::LocalHeaders => ScanState::LocalHeaders { position: 0 },
        };
        debug!(?mode, ?state, "prepared archive scan");
        Ok(Self {
            state,
            next_index: 0,
        })
    }

    fn locate_central_directory<R: ReadAt + ?Sized>(reader: &R) -> Result<ScanState> {
        let (eocd, eocd_offset) = match find_eocd(reader) {
            Ok(found) => found,
            Err(e @ (ZipError::MalformedHeader(_) | ZipError::TruncatedInput { .. })) => {
                if !starts_with_local_header(reader)? {
                    return Err(e);
                }
                debug!(error = %e, "no end record, scanning local headers instead");
                return Ok(ScanState::LocalHeaders { position: 0 });
            }
            Err(e) => return Err(e),
        };

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = read_zip64_eocd(reader, eocd_offset)?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        let end = cd_offset
            .checked_add(cd_size)
            .filter(|end| *end <= eocd_offset)
            .ok_or_else(|| {
                ZipError::malformed(format!(
                    "central directory at {cd_offset} (+{cd_size}) overlaps the end record at {eocd_offset}"
                ))
            })?;

        Ok(ScanState::CentralDirectory {
            position: cd_offset,
            end,
            remaining: total_entries,
        })
    }

    /// Read exactly one entry's metadata and move past its header.
    ///
    /// Returns `Ok(None)` once no headers remain. After an error the scan
    /// is over and later calls also return `Ok(None)`.
    pub fn next_header<R: ReadAt + ?Sized>(&mut self, reader: &R) -> Result<Option<Entry>> {
        let result = match self.state {
            ScanState::CentralDirectory {
                position,
                end,
                remaining,
            } => {
                if remaining == 0 {
                    Ok(None)
                } else {
                    self.next_central_header(reader, position, end, remaining)
                        .map(Some)
                }
            }
            ScanState::LocalHeaders { position } => self.next_local_header(reader, position),
            ScanState::Finished => return Ok(None),
        };

        match &result {
            Ok(Some(entry)) => {
                debug!(
                    index = entry.index,
                    name = %entry.name,
                    method = %entry.method,
                    compressed_size = entry.compressed_size,
                    uncompressed_size = entry.uncompressed_size,
                    data_offset = entry.data_offset,
                    "read entry header"
                );
                self.next_index += 1;
            }
            Ok(None) => {
                debug!(entries = self.next_index, "reached end of archive");
                self.state = ScanState::Finished;
            }
            Err(_) => self.state = ScanState::Finished,
        }
        result
    }

    fn next_central_header<R: ReadAt + ?Sized>(
        &mut self,
        reader: &R,
        position: u64,
        end: u64,
        remaining: u64,
    ) -> Result<Entry> {
        let mut fixed = [0u8; CentralDirectoryHeader::SIZE];
        read_exact_at(reader, position, &mut fixed)?;
        let header = CentralDirectoryHeader::from_bytes(&fixed)?;

        let variable_offset = position + CentralDirectoryHeader::SIZE as u64;
        let mut variable = vec![0u8; header.variable_len()];
        read_exact_at(reader, variable_offset, &mut variable)?;

        let next_position = variable_offset + variable.len() as u64;
        if next_position > end {
            return Err(ZipError::malformed(format!(
                "central directory header at {position} runs past the directory end at {end}"
            )));
        }

        let name_len = header.file_name_length as usize;
        let extra_end = name_len + header.extra_field_length as usize;
        let name_raw = variable[..name_len].to_vec();
        let wide = WideFields::from_extra(
            header.uncompressed_size,
            header.compressed_size,
            Some(header.lfh_offset),
            &variable[name_len..extra_end],
        )?;

        let data_offset = Self::resolve_data_offset(reader, wide.header_offset)?;

        self.state = ScanState::CentralDirectory {
            position: next_position,
            end,
            remaining: remaining - 1,
        };

        Ok(Entry {
            index: self.next_index,
            name: String::from_utf8_lossy(&name_raw).into_owned(),
            name_raw,
            method: CompressionMethod::from_u16(header.compression_method),
            compressed_size: wide.compressed_size,
            uncompressed_size: wide.uncompressed_size,
            crc32: header.crc32,
            header_offset: wide.header_offset,
            data_offset,
            flags: header.flags,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
        })
    }

    /// Get the actual data offset for an entry.
    ///
    /// The Local File Header has variable-length fields (file name, extra
    /// field) that may differ from the Central Directory entry, so the data
    /// start is computed from the local header itself.
    fn resolve_data_offset<R: ReadAt + ?Sized>(reader: &R, header_offset: u64) -> Result<u64> {
        let mut lfh_buf = [0u8; LocalFileHeader::SIZE];
        read_exact_at(reader, header_offset, &mut lfh_buf)?;
        let lfh = LocalFileHeader::from_bytes(&lfh_buf)?;
        Ok(header_offset + LocalFileHeader::SIZE as u64 + lfh.variable_len() as u64)
    }

    fn next_local_header<R: ReadAt + ?Sized>(
        &mut self,
        reader: &R,
        position: u64,
    ) -> Result<Option<Entry>> {
        let mut signature = [0u8; 4];
        let read = reader.read_full_at(position, &mut signature)?;
        if read == 0 {
            // Archive without a central directory; the data simply stops.
            return Ok(None);
        }
        if read < signature.len() {
            return Err(ZipError::TruncatedInput {
                offset: position,
                expected: signature.len() as u64,
                actual: read as u64,
            });
        }
        if signature == CentralDirectoryHeader::SIGNATURE
            || signature == EndOfCentralDirectory::SIGNATURE
            || signature == Zip64EOCD::SIGNATURE
        {
            return Ok(None);
        }

        let mut fixed = [0u8; LocalFileHeader::SIZE];
        read_exact_at(reader, position, &mut fixed)?;
        let header = LocalFileHeader::from_bytes(&fixed)?;

        let variable_offset = position + LocalFileHeader::SIZE as u64;
        let mut variable = vec![0u8; header.variable_len()];
        read_exact_at(reader, variable_offset, &mut variable)?;

        let name_len = header.file_name_length as usize;
        let name_raw = variable[..name_len].to_vec();
        let extra = &variable[name_len..];
        let wide = WideFields::from_extra(
            header.uncompressed_size,
            header.compressed_size,
            None,
            extra,
        )?;

        let data_offset = variable_offset + variable.len() as u64;
        let data_end = data_offset
            .checked_add(wide.compressed_size)
            .ok_or_else(|| ZipError::malformed("entry data range overflows"))?;

        let (crc32, next_position) = if header.flags & flags::DATA_DESCRIPTOR != 0 {
            if wide.compressed_size == 0 && wide.uncompressed_size == 0 {
                return Err(ZipError::Unsupported(
                    "data descriptor sizes are only known from the central directory",
                ));
            }
            let zip64 = extra_has_zip64(extra);
            Self::read_data_descriptor(reader, data_end, zip64)?
        } else {
            (header.crc32, data_end)
        };

        self.state = ScanState::LocalHeaders {
            position: next_position,
        };

        Ok(Some(Entry {
            index: self.next_index,
            name: String::from_utf8_lossy(&name_raw).into_owned(),
            name_raw,
            method: CompressionMethod::from_u16(header.compression_method),
            compressed_size: wide.compressed_size,
            uncompressed_size: wide.uncompressed_size,
            crc32,
            header_offset: position,
            data_offset,
            flags: header.flags,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
        }))
    }

    /// Read the descriptor trailing an entry's data.
    ///
    /// Returns the CRC-32 it carries and the offset just past it.
    fn read_data_descriptor<R: ReadAt + ?Sized>(
        reader: &R,
        offset: u64,
        zip64: bool,
    ) -> Result<(u32, u64)> {
        let sizes_len: u64 = if zip64 { 16 } else { 8 };
        let mut head = [0u8; 8];
        read_exact_at(reader, offset, &mut head)?;

        if head[0..4] == *DATA_DESCRIPTOR_SIGNATURE {
            let crc32 = LittleEndian::read_u32(&head[4..8]);
            Ok((crc32, offset + 8 + sizes_len))
        } else {
            let crc32 = LittleEndian::read_u32(&head[0..4]);
            Ok((crc32, offset + 4 + sizes_len))
        }
    }
}

fn extra_has_zip64(extra: &[u8]) -> bool {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let id = LittleEndian::read_u16(&extra[pos..pos + 2]);
        let len = LittleEndian::read_u16(&extra[pos + 2..pos + 4]) as usize;
        if id == ZIP64_EXTRA_ID {
            return true;
        }
        pos += 4 + len;
    }
    false
}
