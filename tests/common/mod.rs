#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;

pub const STORED: u16 = 0;
pub const DEFLATE: u16 = 8;
pub const DATA_DESCRIPTOR_FLAG: u16 = 1 << 3;
pub const ENCRYPTED_FLAG: u16 = 1 << 0;

/// One entry as it will be written, header fields included verbatim so
/// tests can make them lie.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub name: Vec<u8>,
    pub method: u16,
    pub flags: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub payload: Vec<u8>,
    /// Written after the payload when `flags` has the descriptor bit.
    pub descriptor: Option<Vec<u8>>,
}

impl RawEntry {
    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            method: STORED,
            flags: 0,
            crc32: crc32fast::hash(data),
            compressed_size: data.len() as u32,
            uncompressed_size: data.len() as u32,
            payload: data.to_vec(),
            descriptor: None,
        }
    }

    pub fn deflated(name: &str, data: &[u8]) -> Self {
        let payload = deflate(data);
        Self {
            name: name.as_bytes().to_vec(),
            method: DEFLATE,
            flags: 0,
            crc32: crc32fast::hash(data),
            compressed_size: payload.len() as u32,
            uncompressed_size: data.len() as u32,
            payload,
            descriptor: None,
        }
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Assembles archives byte by byte.
#[derive(Default)]
pub struct ArchiveBuilder {
    data: Vec<u8>,
    records: Vec<(RawEntry, u64)>,
    comment: Vec<u8>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(RawEntry::stored(name, data))
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.entry(RawEntry::deflated(name, data))
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn entry(mut self, entry: RawEntry) -> Self {
        let offset = self.data.len() as u64;
        let w = &mut self.data;
        w.extend_from_slice(b"PK\x03\x04");
        w.write_u16::<LittleEndian>(20).unwrap();
        w.write_u16::<LittleEndian>(entry.flags).unwrap();
        w.write_u16::<LittleEndian>(entry.method).unwrap();
        w.write_u16::<LittleEndian>(0).unwrap();
        w.write_u16::<LittleEndian>(0x21).unwrap();
        if entry.descriptor.is_some() {
            w.write_u32::<LittleEndian>(0).unwrap();
            w.write_u32::<LittleEndian>(entry.compressed_size).unwrap();
            w.write_u32::<LittleEndian>(entry.uncompressed_size).unwrap();
        } else {
            w.write_u32::<LittleEndian>(entry.crc32).unwrap();
            w.write_u32::<LittleEndian>(entry.compressed_size).unwrap();
            w.write_u32::<LittleEndian>(entry.uncompressed_size).unwrap();
        }
        w.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
        w.write_u16::<LittleEndian>(0).unwrap();
        w.extend_from_slice(&entry.name);
        w.extend_from_slice(&entry.payload);
        if let Some(descriptor) = &entry.descriptor {
            w.extend_from_slice(descriptor);
        }
        self.records.push((entry, offset));
        self
    }

    /// Offset of the local header of the entry at `index`.
    pub fn header_offset(&self, index: usize) -> u64 {
        self.records[index].1
    }

    /// Archive bytes with only local headers, no central directory.
    pub fn finish_without_directory(self) -> Vec<u8> {
        self.data
    }

    pub fn finish(self) -> Vec<u8> {
        self.finish_with(false)
    }

    /// Archive whose central directory stores sizes and offsets in ZIP64
    /// extra fields and is located through the ZIP64 end records.
    pub fn finish_zip64(self) -> Vec<u8> {
        self.finish_with(true)
    }

    fn finish_with(self, zip64: bool) -> Vec<u8> {
        let mut out = self.data;
        let cd_offset = out.len() as u64;

        for (entry, offset) in &self.records {
            let w = &mut out;
            w.extend_from_slice(b"PK\x01\x02");
            w.write_u16::<LittleEndian>(0x031E).unwrap();
            w.write_u16::<LittleEndian>(if zip64 { 45 } else { 20 }).unwrap();
            w.write_u16::<LittleEndian>(entry.flags).unwrap();
            w.write_u16::<LittleEndian>(entry.method).unwrap();
            w.write_u16::<LittleEndian>(0).unwrap();
            w.write_u16::<LittleEndian>(0x21).unwrap();
            w.write_u32::<LittleEndian>(entry.crc32).unwrap();
            if zip64 {
                w.write_u32::<LittleEndian>(u32::MAX).unwrap();
                w.write_u32::<LittleEndian>(u32::MAX).unwrap();
            } else {
                w.write_u32::<LittleEndian>(entry.compressed_size).unwrap();
                w.write_u32::<LittleEndian>(entry.uncompressed_size).unwrap();
            }
            w.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
            w.write_u16::<LittleEndian>(if zip64 { 28 } else { 0 }).unwrap();
            w.write_u16::<LittleEndian>(0).unwrap();
            w.write_u16::<LittleEndian>(0).unwrap();
            w.write_u16::<LittleEndian>(0).unwrap();
            w.write_u32::<LittleEndian>(0).unwrap();
            if zip64 {
                w.write_u32::<LittleEndian>(u32::MAX).unwrap();
            } else {
                w.write_u32::<LittleEndian>(*offset as u32).unwrap();
            }
            w.extend_from_slice(&entry.name);
            if zip64 {
                w.write_u16::<LittleEndian>(0x0001).unwrap();
                w.write_u16::<LittleEndian>(24).unwrap();
                w.write_u64::<LittleEndian>(entry.uncompressed_size as u64).unwrap();
                w.write_u64::<LittleEndian>(entry.compressed_size as u64).unwrap();
                w.write_u64::<LittleEndian>(*offset).unwrap();
            }
        }

        let cd_size = out.len() as u64 - cd_offset;
        let count = self.records.len() as u64;

        if zip64 {
            let eocd64_offset = out.len() as u64;
            let w = &mut out;
            w.extend_from_slice(b"PK\x06\x06");
            w.write_u64::<LittleEndian>(44).unwrap();
            w.write_u16::<LittleEndian>(45).unwrap();
            w.write_u16::<LittleEndian>(45).unwrap();
            w.write_u32::<LittleEndian>(0).unwrap();
            w.write_u32::<LittleEndian>(0).unwrap();
            w.write_u64::<LittleEndian>(count).unwrap();
            w.write_u64::<LittleEndian>(count).unwrap();
            w.write_u64::<LittleEndian>(cd_size).unwrap();
            w.write_u64::<LittleEndian>(cd_offset).unwrap();

            w.extend_from_slice(b"PK\x06\x07");
            w.write_u32::<LittleEndian>(0).unwrap();
            w.write_u64::<LittleEndian>(eocd64_offset).unwrap();
            w.write_u32::<LittleEndian>(1).unwrap();
        }

        let w = &mut out;
        w.extend_from_slice(b"PK\x05\x06");
        w.write_u16::<LittleEndian>(0).unwrap();
        w.write_u16::<LittleEndian>(0).unwrap();
        if zip64 {
            w.write_u16::<LittleEndian>(0xFFFF).unwrap();
            w.write_u16::<LittleEndian>(0xFFFF).unwrap();
            w.write_u32::<LittleEndian>(u32::MAX).unwrap();
            w.write_u32::<LittleEndian>(u32::MAX).unwrap();
        } else {
            w.write_u16::<LittleEndian>(count as u16).unwrap();
            w.write_u16::<LittleEndian>(count as u16).unwrap();
            w.write_u32::<LittleEndian>(cd_size as u32).unwrap();
            w.write_u32::<LittleEndian>(cd_offset as u32).unwrap();
        }
        w.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        w.extend_from_slice(&self.comment);
        out
    }
}

/// The two-entry archive used by several scenarios: `a.txt` stored with
/// "hello" and `b.bin` deflated with 100 bytes.
pub fn hello_archive() -> Vec<u8> {
    ArchiveBuilder::new()
        .stored("a.txt", b"hello")
        .deflated("b.bin", &b_bin_contents())
        .finish()
}

pub fn b_bin_contents() -> Vec<u8> {
    (0..100u8).map(|i| b'0' + i % 10).collect()
}
