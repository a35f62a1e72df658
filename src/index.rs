//! Per-category index file: the on-disk two-level hash table
//!
//! An index container maps `(dir_hash, filename_hash)` pairs to a data-file
//! number and a byte offset inside that data file. The whole table is parsed
//! eagerly at open time; lookups afterwards are pure map reads.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

use crate::container::{structural, Container, IndexBlockRecord};
use crate::error::{Result, SqPackError};
use crate::types::HashTableEntry;

/// Size of one packed hash-table entry on disk.
const HASH_TABLE_ENTRY_SIZE: u32 = 16;

/// Filename hash -> entry, for one directory.
pub type DirTable = HashMap<u32, HashTableEntry>;
/// Directory hash -> per-directory table.
pub type HashTable = HashMap<u32, DirTable>;

/// Packed 16-byte hash-table entry as stored in the index.
struct RawHashTableEntry {
    filename_hash: u32,
    dir_hash: u32,
    packed_offset: u32,
    #[allow(dead_code)]
    padding: u32,
}

impl RawHashTableEntry {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            filename_hash: reader.read_u32::<LittleEndian>()?,
            dir_hash: reader.read_u32::<LittleEndian>()?,
            packed_offset: reader.read_u32::<LittleEndian>()?,
            padding: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Decode the packed offset field: the low nibble holds the data-file
/// number times two, the remaining bits hold the byte offset divided by 8.
fn decode_packed_offset(raw: u32) -> (u32, u64) {
    let data_file_id = (raw & 0xF) / 2;
    let data_offset = u64::from(raw & 0xFFFF_FFF0) * 8;
    (data_file_id, data_offset)
}

/// One parsed index container.
#[derive(Debug)]
pub struct IndexFile {
    #[allow(dead_code)]
    container: Container,
    dat_count: u32,
    hash_table: HashTable,
}

impl IndexFile {
    /// Open and parse an index file.
    pub fn open(path: &Path) -> Result<Self> {
        let mut container = Container::open(path)?;

        // Hash table region pointer.
        let table_record = IndexBlockRecord::read_from(container.handle_mut())
            .map_err(|e| structural(e, "index hash-table record"))?;
        container.validate_block(
            u64::from(table_record.offset),
            table_record.size,
            &table_record.hash,
        )?;

        // The dat count and the trailing records sit right after the hash
        // table pointer; remember where we are while we go read the table.
        let saved_pos = container.handle_mut().stream_position()?;
        container
            .handle_mut()
            .seek(SeekFrom::Start(u64::from(table_record.offset)))?;

        let entry_count = table_record.size / HASH_TABLE_ENTRY_SIZE;
        let mut hash_table = HashTable::new();
        for _ in 0..entry_count {
            let raw = RawHashTableEntry::read_from(container.handle_mut())
                .map_err(|e| structural(e, "index hash-table entry"))?;
            let (data_file_id, data_offset) = decode_packed_offset(raw.packed_offset);
            // Duplicate (dir, filename) pairs never occur in well-formed
            // archives; if they do, the last entry wins.
            hash_table.entry(raw.dir_hash).or_default().insert(
                raw.filename_hash,
                HashTableEntry {
                    data_file_id,
                    dir_hash: raw.dir_hash,
                    filename_hash: raw.filename_hash,
                    data_offset,
                },
            );
        }
        debug!(
            "Parsed index hash table: {} entries in {} directories",
            entry_count,
            hash_table.len()
        );

        container.handle_mut().seek(SeekFrom::Start(saved_pos))?;
        let dat_count = container
            .handle_mut()
            .read_u32::<LittleEndian>()
            .map_err(|e| structural(e, "index dat count"))?;
        debug!("Index references {} data files", dat_count);

        // Free list and directory hash table. Bounds-checked for structural
        // sanity, contents opaque to this layer.
        let free_list = IndexBlockRecord::read_from(container.handle_mut())
            .map_err(|e| structural(e, "index free-list record"))?;
        container.validate_block(u64::from(free_list.offset), free_list.size, &free_list.hash)?;

        let dir_record = IndexBlockRecord::read_from(container.handle_mut())
            .map_err(|e| structural(e, "index directory-table record"))?;
        container.validate_block(u64::from(dir_record.offset), dir_record.size, &dir_record.hash)?;

        Ok(Self {
            container,
            dat_count,
            hash_table,
        })
    }

    /// Number of data files this index is linked to.
    pub fn dat_count(&self) -> u32 {
        self.dat_count
    }

    /// The whole two-level hash table.
    pub fn hash_table(&self) -> &HashTable {
        &self.hash_table
    }

    pub fn file_exists(&self, dir_hash: u32, filename_hash: u32) -> bool {
        self.hash_table
            .get(&dir_hash)
            .is_some_and(|dir| dir.contains_key(&filename_hash))
    }

    pub fn dir_exists(&self, dir_hash: u32) -> bool {
        self.hash_table.contains_key(&dir_hash)
    }

    /// Per-directory table for one directory hash.
    pub fn dir_table(&self, dir_hash: u32) -> Result<&DirTable> {
        self.hash_table
            .get(&dir_hash)
            .ok_or(SqPackError::DirNotFound(dir_hash))
    }

    /// Entry for one `(dir_hash, filename_hash)` pair.
    pub fn entry(&self, dir_hash: u32, filename_hash: u32) -> Result<HashTableEntry> {
        self.dir_table(dir_hash)?
            .get(&filename_hash)
            .copied()
            .ok_or(SqPackError::FileNotFound {
                dir_hash,
                filename_hash,
            })
    }
}
