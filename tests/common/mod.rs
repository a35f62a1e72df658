//! Synthetic SqPack container builders shared by the integration tests
//!
//! These produce byte-exact miniature archives: real container headers,
//! index hash tables with packed offsets, and data files with standard,
//! model and texture records.

#![allow(dead_code)]

use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const STORED_SENTINEL: u32 = 32000;

/// Route decode tracing through the test harness. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Records inside a data file are addressed in units the packed index
/// offset can express, so fixtures align them to 128 bytes.
pub const RECORD_ALIGN: usize = 128;

const MODEL_SECTION_COUNT: usize = 11;

/// Container header region (0..0x400) plus the section header at 0x400.
fn container_prelude() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"SqPack\0\0");
    buf.extend_from_slice(&0u32.to_le_bytes()); // zero
    buf.extend_from_slice(&0x400u32.to_le_bytes()); // size
    buf.extend_from_slice(&1u32.to_le_bytes()); // version
    buf.extend_from_slice(&0u32.to_le_bytes()); // kind
    buf.resize(0x400, 0);
    buf.extend_from_slice(&0u32.to_le_bytes()); // section size
    buf.extend_from_slice(&0u32.to_le_bytes()); // section kind
    buf
}

/// 72-byte index block record: offset, size, 64-byte hash buffer.
fn index_block_record(offset: u32, size: u32) -> Vec<u8> {
    let mut rec = Vec::with_capacity(72);
    rec.extend_from_slice(&offset.to_le_bytes());
    rec.extend_from_slice(&size.to_le_bytes());
    rec.extend_from_slice(&[0u8; 64]);
    rec
}

/// One logical index entry before packing.
pub struct IndexEntrySpec {
    pub dir_hash: u32,
    pub filename_hash: u32,
    pub data_file_id: u32,
    /// Must be a multiple of 128 so the packed encoding can express it.
    pub data_offset: u64,
}

/// Pack an entry's data file number and offset into the raw offset field.
pub fn pack_offset(data_file_id: u32, data_offset: u64) -> u32 {
    assert_eq!(data_offset % RECORD_ALIGN as u64, 0, "unencodable offset");
    ((data_offset / 8) as u32 & 0xFFFF_FFF0) | (data_file_id * 2)
}

/// Build a complete index container from raw 16-byte table entries.
pub fn build_index_raw(dat_count: u32, raw_entries: &[(u32, u32, u32)]) -> Vec<u8> {
    const TABLE_OFFSET: u32 = 0x500;

    let mut buf = container_prelude();
    buf.extend_from_slice(&index_block_record(
        TABLE_OFFSET,
        raw_entries.len() as u32 * 16,
    ));
    buf.extend_from_slice(&dat_count.to_le_bytes());
    buf.extend_from_slice(&index_block_record(0, 0)); // free list
    buf.extend_from_slice(&index_block_record(0, 0)); // directory hash table

    buf.resize(TABLE_OFFSET as usize, 0);
    for (filename_hash, dir_hash, packed) in raw_entries {
        buf.extend_from_slice(&filename_hash.to_le_bytes());
        buf.extend_from_slice(&dir_hash.to_le_bytes());
        buf.extend_from_slice(&packed.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
    }
    buf
}

/// Build a complete index container from logical entries.
pub fn build_index(dat_count: u32, entries: &[IndexEntrySpec]) -> Vec<u8> {
    let raw: Vec<(u32, u32, u32)> = entries
        .iter()
        .map(|e| {
            (
                e.filename_hash,
                e.dir_hash,
                pack_offset(e.data_file_id, e.data_offset),
            )
        })
        .collect();
    build_index_raw(dat_count, &raw)
}

/// 16-byte block header plus its payload, stored raw or deflated.
pub fn block_bytes(payload: &[u8], compress: bool) -> Vec<u8> {
    let (compressed_size, data) = if compress {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        let data = encoder.finish().unwrap();
        (data.len() as u32, data)
    } else {
        (STORED_SENTINEL, payload.to_vec())
    };

    let mut block = Vec::new();
    block.extend_from_slice(&(16 + data.len() as u32).to_le_bytes());
    block.extend_from_slice(&0u32.to_le_bytes());
    block.extend_from_slice(&compressed_size.to_le_bytes());
    block.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    block.extend_from_slice(&data);
    block
}

/// One asset record to place in a data file. Each section of the model and
/// texture variants is written as a single block.
pub enum RecordSpec<'a> {
    Empty,
    /// Blocks of the single section: (payload, compress?).
    Standard(Vec<(&'a [u8], bool)>),
    /// Exactly 11 section payloads.
    Model(Vec<(&'a [u8], bool)>),
    Texture {
        raw_header: &'a [u8],
        sections: Vec<(&'a [u8], bool)>,
    },
    /// A record header with an out-of-range kind discriminant.
    UnknownKind(u32),
    /// Pre-assembled record bytes, for malformed-layout cases.
    Raw(Vec<u8>),
}

fn record_header(size: u32, kind: u32, total_uncompressed: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(24);
    buf.extend_from_slice(&size.to_le_bytes());
    buf.extend_from_slice(&kind.to_le_bytes());
    buf.extend_from_slice(&total_uncompressed.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf
}

fn record_bytes(spec: &RecordSpec) -> Vec<u8> {
    match spec {
        RecordSpec::Empty => record_header(24, 1, 0),

        RecordSpec::Standard(blocks) => {
            let encoded: Vec<Vec<u8>> = blocks
                .iter()
                .map(|(payload, compress)| block_bytes(payload, *compress))
                .collect();
            let total_uncompressed: u32 = blocks.iter().map(|(p, _)| p.len() as u32).sum();
            let header_size = 20 + 4 + 8 * blocks.len() as u32;

            let mut buf = record_header(header_size, 2, total_uncompressed);
            buf.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
            let mut offset = 0u32;
            for (i, block) in encoded.iter().enumerate() {
                buf.extend_from_slice(&offset.to_le_bytes());
                buf.extend_from_slice(&(block.len() as u16).to_le_bytes());
                buf.extend_from_slice(&(blocks[i].0.len() as u16).to_le_bytes());
                offset += block.len() as u32;
            }
            for block in &encoded {
                buf.extend_from_slice(block);
            }
            buf
        }

        RecordSpec::Model(sections) => {
            assert_eq!(sections.len(), MODEL_SECTION_COUNT);
            let encoded: Vec<Vec<u8>> = sections
                .iter()
                .map(|(payload, compress)| block_bytes(payload, *compress))
                .collect();
            let total_uncompressed: u32 = sections.iter().map(|(p, _)| p.len() as u32).sum();
            // header + block-info table + one u16 block size per section
            let header_size = 20 + 188 + 2 * MODEL_SECTION_COUNT as u32;

            let mut buf = record_header(header_size, 3, total_uncompressed);
            buf.extend_from_slice(&0u32.to_le_bytes()); // reserved
            for (payload, _) in sections {
                buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            }
            for block in &encoded {
                buf.extend_from_slice(&(block.len() as u32).to_le_bytes());
            }
            let mut offset = 0u32;
            for block in &encoded {
                buf.extend_from_slice(&offset.to_le_bytes());
                offset += block.len() as u32;
            }
            for i in 0..MODEL_SECTION_COUNT {
                buf.extend_from_slice(&(i as u16).to_le_bytes()); // block_ids
            }
            for _ in 0..MODEL_SECTION_COUNT {
                buf.extend_from_slice(&1u16.to_le_bytes()); // block_counts
            }
            buf.extend_from_slice(&0u32.to_le_bytes());
            buf.extend_from_slice(&0u32.to_le_bytes());
            for block in &encoded {
                buf.extend_from_slice(&(block.len() as u16).to_le_bytes());
            }
            for block in &encoded {
                buf.extend_from_slice(block);
            }
            buf
        }

        RecordSpec::Texture {
            raw_header,
            sections,
        } => {
            let encoded: Vec<Vec<u8>> = sections
                .iter()
                .map(|(payload, compress)| block_bytes(payload, *compress))
                .collect();
            let total_uncompressed: u32 = sections.iter().map(|(p, _)| p.len() as u32).sum();
            let header_size = 20 + 4 + 20 * sections.len() as u32 + 2 * sections.len() as u32;

            let mut buf = record_header(header_size, 4, total_uncompressed);
            buf.extend_from_slice(&(sections.len() as u32).to_le_bytes());
            let mut offset = raw_header.len() as u32;
            for (i, block) in encoded.iter().enumerate() {
                buf.extend_from_slice(&offset.to_le_bytes());
                buf.extend_from_slice(&(block.len() as u32).to_le_bytes());
                buf.extend_from_slice(&(sections[i].0.len() as u32).to_le_bytes());
                buf.extend_from_slice(&(i as u32).to_le_bytes()); // block_id
                buf.extend_from_slice(&1u32.to_le_bytes()); // block_count
                offset += block.len() as u32;
            }
            for block in &encoded {
                buf.extend_from_slice(&(block.len() as u16).to_le_bytes());
            }
            buf.extend_from_slice(raw_header);
            for block in &encoded {
                buf.extend_from_slice(block);
            }
            buf
        }

        RecordSpec::UnknownKind(kind) => record_header(24, *kind, 0),

        RecordSpec::Raw(bytes) => bytes.clone(),
    }
}

/// Build a data container holding the given records, returning the bytes
/// and the 128-byte-aligned record offsets in order.
pub fn build_dat(records: &[RecordSpec]) -> (Vec<u8>, Vec<u64>) {
    let mut buf = container_prelude();

    // Structural sanity record: offset, size, 4 reserved words, hash buffer.
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&[0u8; 16]);
    buf.extend_from_slice(&[0u8; 64]);

    let mut offsets = Vec::with_capacity(records.len());
    for record in records {
        let aligned = buf.len().div_ceil(RECORD_ALIGN) * RECORD_ALIGN;
        buf.resize(aligned, 0);
        offsets.push(aligned as u64);
        buf.extend_from_slice(&record_bytes(record));
    }
    (buf, offsets)
}

/// Container file name prefix for a category number.
pub fn category_prefix(number: u32) -> String {
    format!("{number:02x}0000.win32")
}

/// Write a whole category (index plus data files) into a directory.
pub fn write_category(dir: &Path, number: u32, index: &[u8], dats: &[Vec<u8>]) {
    let prefix = category_prefix(number);
    fs::write(dir.join(format!("{prefix}.index")), index).unwrap();
    for (id, dat) in dats.iter().enumerate() {
        fs::write(dir.join(format!("{prefix}.dat{id}")), dat).unwrap();
    }
}
