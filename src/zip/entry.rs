use super::structures::{flags, CompressionMethod};

/// Metadata of one entry, as found by the scanner.
///
/// Entries are never mutated after scanning. The archive keeps the
/// original in its entry table and hands out clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) name_raw: Vec<u8>,
    pub(crate) method: CompressionMethod,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) crc32: u32,
    pub(crate) header_offset: u64,
    pub(crate) data_offset: u64,
    pub(crate) flags: u16,
    pub(crate) last_mod_time: u16,
    pub(crate) last_mod_date: u16,
}

impl Entry {
    /// Position of the entry in scan order, starting at zero.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Entry path, decoded lossily as UTF-8.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry path exactly as stored, for callers with their own decoder.
    pub fn name_bytes(&self) -> &[u8] {
        &self.name_raw
    }

    /// Whether the archive marks the name as UTF-8 (flag bit 11).
    pub fn is_utf8(&self) -> bool {
        self.flags & flags::UTF8 != 0
    }

    pub fn method(&self) -> CompressionMethod {
        self.method
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Offset of the local file header from the start of the container.
    pub fn header_offset(&self) -> u64 {
        self.header_offset
    }

    /// Offset of the first data byte from the start of the container.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// General purpose flag bits.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// Directory entries end with '/'
    pub fn is_dir(&self) -> bool {
        self.name_raw.last() == Some(&b'/')
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

#[cfg(test)]
pub(crate) fn test_entry(
    method: CompressionMethod,
    data_offset: u64,
    compressed_size: u64,
    uncompressed_size: u64,
    crc32: u32,
) -> Entry {
    Entry {
        index: 0,
        name: "test".to_string(),
        name_raw: b"test".to_vec(),
        method,
        compressed_size,
        uncompressed_size,
        crc32,
        header_offset: 0,
        data_offset,
        flags: 0,
        last_mod_time: 0,
        last_mod_date: 0,
    }
}
