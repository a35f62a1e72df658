//! Common container-file layer shared by index and data files
//!
//! Every physical SqPack file starts with the same fixed header, followed by
//! a secondary header at offset 0x400 describing the logical section that
//! comes after it. This module owns the file handle, parses both headers at
//! open time, and hosts the block-integrity validation hook.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SqPackError};

/// Byte offset of the secondary (section) header inside every container.
pub const SECTION_HEADER_OFFSET: u64 = 0x400;

/// Map a short read during header parsing to a structural format error.
pub(crate) fn structural(err: io::Error, what: &str) -> SqPackError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        SqPackError::InvalidFormat(format!("truncated {what}"))
    } else {
        SqPackError::Io(err)
    }
}

/// Fixed header at offset 0 of every container file.
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub magic: [u8; 8],
    pub zero: u32,
    pub size: u32,
    pub version: u32,
    pub kind: u32,
}

impl ContainerHeader {
    pub(crate) fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        Ok(Self {
            magic,
            zero: reader.read_u32::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
            version: reader.read_u32::<LittleEndian>()?,
            kind: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Secondary header at offset 0x400, describing the section that follows.
#[derive(Debug, Clone)]
pub struct SectionHeader {
    pub size: u32,
    pub kind: u32,
}

impl SectionHeader {
    pub(crate) fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            size: reader.read_u32::<LittleEndian>()?,
            kind: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Reserved integrity-hash buffer attached to every block record: a 20-byte
/// SHA-1 slot followed by 11 reserved words.
#[derive(Debug, Clone)]
pub struct BlockHash {
    pub hash: [u8; 20],
    pub padding: [u32; 11],
}

impl BlockHash {
    pub(crate) fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut hash = [0u8; 20];
        reader.read_exact(&mut hash)?;
        let mut padding = [0u32; 11];
        for word in &mut padding {
            *word = reader.read_u32::<LittleEndian>()?;
        }
        Ok(Self { hash, padding })
    }
}

/// Block pointer record inside an index file: region offset and size plus
/// the integrity-hash buffer for that region.
#[derive(Debug, Clone)]
pub(crate) struct IndexBlockRecord {
    pub offset: u32,
    pub size: u32,
    pub hash: BlockHash,
}

impl IndexBlockRecord {
    pub(crate) fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            offset: reader.read_u32::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
            hash: BlockHash::read_from(reader)?,
        })
    }
}

/// Block pointer record at the start of a data file. Same shape as the index
/// variant with four extra reserved words, and its offset is stored
/// pre-divided by 0x80.
#[derive(Debug, Clone)]
pub(crate) struct DataBlockRecord {
    pub offset: u32,
    pub size: u32,
    pub reserved: [u32; 4],
    pub hash: BlockHash,
}

impl DataBlockRecord {
    pub(crate) fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let offset = reader.read_u32::<LittleEndian>()?;
        let size = reader.read_u32::<LittleEndian>()?;
        let mut reserved = [0u32; 4];
        for word in &mut reserved {
            *word = reader.read_u32::<LittleEndian>()?;
        }
        Ok(Self {
            offset,
            size,
            reserved,
            hash: BlockHash::read_from(reader)?,
        })
    }
}

/// One opened container file with both headers parsed.
///
/// The cursor is left just past the section header, where the per-kind
/// payload (index hash-table records, data sanity record) begins.
#[derive(Debug)]
pub struct Container {
    handle: BufReader<File>,
    header: ContainerHeader,
    section_header: SectionHeader,
}

impl Container {
    /// Open a container file and parse its headers.
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening container: {}", path.display());

        let file = File::open(path).map_err(|source| SqPackError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut handle = BufReader::new(file);

        let header = ContainerHeader::read_from(&mut handle)
            .map_err(|e| structural(e, "container header"))?;
        debug!(
            "Container header: size={}, version={:#x}, kind={}",
            header.size, header.version, header.kind
        );

        handle.seek(SeekFrom::Start(SECTION_HEADER_OFFSET))?;
        let section_header =
            SectionHeader::read_from(&mut handle).map_err(|e| structural(e, "section header"))?;
        debug!(
            "Section header: size={}, kind={}",
            section_header.size, section_header.kind
        );

        Ok(Self {
            handle,
            header,
            section_header,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn section_header(&self) -> &SectionHeader {
        &self.section_header
    }

    pub(crate) fn handle_mut(&mut self) -> &mut BufReader<File> {
        &mut self.handle
    }

    /// Integrity hook for a block of the container.
    ///
    /// Deliberately a no-op: the on-disk hash buffer is a vestigial slot and
    /// real-world archives are not rejected on mismatch. Kept as an explicit
    /// seam so verification can be added without touching callers.
    pub fn validate_block(&self, _offset: u64, _size: u32, _hash: &BlockHash) -> Result<()> {
        Ok(())
    }
}
