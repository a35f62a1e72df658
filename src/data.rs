//! Per-category numbered data file: record decode and block inflation
//!
//! A data file holds the actual asset bytes as a sequence of records, each
//! addressed by the byte offset stored in the index. A record starts with a
//! small header naming its kind; the kind decides how the compressed blocks
//! that follow are laid out. Blocks are either stored raw (signalled by the
//! 32000 sentinel in the compressed-size field) or raw-DEFLATE streams.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;
use parking_lot::Mutex;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

use crate::container::{structural, Container, DataBlockRecord};
use crate::error::{Result, SqPackError};
use crate::types::{Asset, AssetKind};

/// Compressed-size sentinel meaning "block is stored uncompressed".
const STORED_SENTINEL: u32 = 32000;

/// Model records always carry this many sections.
const MODEL_SECTION_COUNT: usize = 11;

/// Header of one file record inside a data file.
struct FileRecordHeader {
    /// Total size of the header plus the block-info tables that follow it;
    /// block offsets are relative to the record start plus this.
    size: u32,
    kind: u32,
    total_uncompressed_size: u32,
    #[allow(dead_code)]
    reserved: [u32; 2],
}

impl FileRecordHeader {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            size: reader.read_u32::<LittleEndian>()?,
            kind: reader.read_u32::<LittleEndian>()?,
            total_uncompressed_size: reader.read_u32::<LittleEndian>()?,
            reserved: [
                reader.read_u32::<LittleEndian>()?,
                reader.read_u32::<LittleEndian>()?,
            ],
        })
    }
}

/// Header of one compressed block.
struct BlockHeader {
    #[allow(dead_code)]
    size: u32,
    #[allow(dead_code)]
    reserved: u32,
    compressed_size: u32,
    uncompressed_size: u32,
}

impl BlockHeader {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            size: reader.read_u32::<LittleEndian>()?,
            reserved: reader.read_u32::<LittleEndian>()?,
            compressed_size: reader.read_u32::<LittleEndian>()?,
            uncompressed_size: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Block-info entry of a standard record.
struct StandardBlockInfo {
    offset: u32,
    #[allow(dead_code)]
    compressed_size: u16,
    #[allow(dead_code)]
    uncompressed_size: u16,
}

impl StandardBlockInfo {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            offset: reader.read_u32::<LittleEndian>()?,
            compressed_size: reader.read_u16::<LittleEndian>()?,
            uncompressed_size: reader.read_u16::<LittleEndian>()?,
        })
    }
}

/// Block-info table of a model record, describing its 11 fixed sections.
struct ModelBlockInfo {
    #[allow(dead_code)]
    reserved: u32,
    uncompressed_sizes: [u32; MODEL_SECTION_COUNT],
    #[allow(dead_code)]
    compressed_sizes: [u32; MODEL_SECTION_COUNT],
    section_offsets: [u32; MODEL_SECTION_COUNT],
    block_ids: [u16; MODEL_SECTION_COUNT],
    block_counts: [u16; MODEL_SECTION_COUNT],
    #[allow(dead_code)]
    reserved2: [u32; 2],
}

impl ModelBlockInfo {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let reserved = reader.read_u32::<LittleEndian>()?;
        let mut uncompressed_sizes = [0u32; MODEL_SECTION_COUNT];
        for v in &mut uncompressed_sizes {
            *v = reader.read_u32::<LittleEndian>()?;
        }
        let mut compressed_sizes = [0u32; MODEL_SECTION_COUNT];
        for v in &mut compressed_sizes {
            *v = reader.read_u32::<LittleEndian>()?;
        }
        let mut section_offsets = [0u32; MODEL_SECTION_COUNT];
        for v in &mut section_offsets {
            *v = reader.read_u32::<LittleEndian>()?;
        }
        let mut block_ids = [0u16; MODEL_SECTION_COUNT];
        for v in &mut block_ids {
            *v = reader.read_u16::<LittleEndian>()?;
        }
        let mut block_counts = [0u16; MODEL_SECTION_COUNT];
        for v in &mut block_counts {
            *v = reader.read_u16::<LittleEndian>()?;
        }
        let reserved2 = [
            reader.read_u32::<LittleEndian>()?,
            reader.read_u32::<LittleEndian>()?,
        ];
        Ok(Self {
            reserved,
            uncompressed_sizes,
            compressed_sizes,
            section_offsets,
            block_ids,
            block_counts,
            reserved2,
        })
    }
}

/// Block-info entry of a texture record, one per mip/layer section.
struct TextureBlockInfo {
    offset: u32,
    #[allow(dead_code)]
    size: u32,
    uncompressed_size: u32,
    block_id: u32,
    block_count: u32,
}

impl TextureBlockInfo {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            offset: reader.read_u32::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
            uncompressed_size: reader.read_u32::<LittleEndian>()?,
            block_id: reader.read_u32::<LittleEndian>()?,
            block_count: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// One numbered data container of a category.
///
/// The underlying file cursor is stateful, so every record decode runs under
/// an exclusive lock on the handle. Decodes against different data files
/// proceed in parallel.
#[derive(Debug)]
pub struct DataFile {
    id: u32,
    container: Mutex<Container>,
}

impl DataFile {
    /// Open a data file and run its structural sanity check.
    pub fn open(path: &Path, id: u32) -> Result<Self> {
        let mut container = Container::open(path)?;

        // The sanity record stores its region offset pre-divided by 0x80.
        let record = DataBlockRecord::read_from(container.handle_mut())
            .map_err(|e| structural(e, "data block record"))?;
        container.validate_block(u64::from(record.offset) * 0x80, record.size, &record.hash)?;

        Ok(Self {
            id,
            container: Mutex::new(container),
        })
    }

    /// Number of this data file within its category.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Decode the asset record at the given byte offset.
    ///
    /// Holds the file-cursor lock for the whole decode; a failure leaves no
    /// residue, so the same or another offset can be requested afterwards.
    pub fn get_file(&self, offset: u64) -> Result<Asset> {
        debug!("Get file: dat{} offset {:#x}", self.id, offset);

        let mut container = self.container.lock();
        let handle = container.handle_mut();

        handle.seek(SeekFrom::Start(offset))?;
        let header =
            FileRecordHeader::read_from(handle).map_err(|e| structural(e, "file record header"))?;
        let kind = AssetKind::from_raw(header.kind).ok_or_else(|| {
            SqPackError::InvalidFormat(format!("unrecognized entry kind {}", header.kind))
        })?;

        match kind {
            AssetKind::Empty => {
                warn!("Empty file record: dat{} offset {:#x}", self.id, offset);
                Ok(Asset::new(AssetKind::Empty, Vec::new()))
            }
            AssetKind::Standard => read_standard(handle, offset, &header),
            AssetKind::Model => read_model(handle, offset, &header),
            AssetKind::Texture => read_texture(handle, offset, &header),
        }
    }
}

fn read_standard<R: Read + Seek>(
    reader: &mut R,
    record_offset: u64,
    header: &FileRecordHeader,
) -> Result<Asset> {
    let block_count = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| structural(e, "standard block count"))?;
    let mut infos = Vec::with_capacity(block_count as usize);
    for _ in 0..block_count {
        infos.push(
            StandardBlockInfo::read_from(reader)
                .map_err(|e| structural(e, "standard block info"))?,
        );
    }

    let mut section = Vec::with_capacity(header.total_uncompressed_size as usize);
    for info in &infos {
        let offset = record_offset + u64::from(header.size) + u64::from(info.offset);
        extract_block(reader, offset, &mut section)?;
    }

    Ok(Asset::new(AssetKind::Standard, vec![section]))
}

fn read_model<R: Read + Seek>(
    reader: &mut R,
    record_offset: u64,
    header: &FileRecordHeader,
) -> Result<Asset> {
    let info =
        ModelBlockInfo::read_from(reader).map_err(|e| structural(e, "model block info"))?;

    let last = MODEL_SECTION_COUNT - 1;
    let total_blocks = usize::from(info.block_ids[last]) + usize::from(info.block_counts[last]);
    let block_sizes = read_block_sizes(reader, total_blocks)?;

    let mut sections = Vec::with_capacity(MODEL_SECTION_COUNT);
    for i in 0..MODEL_SECTION_COUNT {
        let mut section = Vec::with_capacity(info.uncompressed_sizes[i] as usize);
        let mut offset =
            record_offset + u64::from(header.size) + u64::from(info.section_offsets[i]);
        for j in 0..usize::from(info.block_counts[i]) {
            extract_block(reader, offset, &mut section)?;
            // Advance by the recorded compressed size of the block just
            // read, not by whatever it inflated to.
            offset += u64::from(block_size_at(
                &block_sizes,
                usize::from(info.block_ids[i]) + j,
            )?);
        }
        sections.push(section);
    }

    Ok(Asset::new(AssetKind::Model, sections))
}

fn read_texture<R: Read + Seek>(
    reader: &mut R,
    record_offset: u64,
    header: &FileRecordHeader,
) -> Result<Asset> {
    let section_count = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| structural(e, "texture section count"))?;
    if section_count == 0 {
        return Err(SqPackError::InvalidFormat(
            "texture record with zero sections".into(),
        ));
    }

    let mut infos = Vec::with_capacity(section_count as usize);
    for _ in 0..section_count {
        infos.push(
            TextureBlockInfo::read_from(reader).map_err(|e| structural(e, "texture block info"))?,
        );
    }

    let last = &infos[infos.len() - 1];
    let total_blocks = last.block_id as usize + last.block_count as usize;
    let block_sizes = read_block_sizes(reader, total_blocks)?;

    let mut sections = Vec::with_capacity(section_count as usize + 1);

    // Everything before the first declared section is the raw texture
    // header, copied verbatim into section 0.
    let header_size = infos[0].offset as usize;
    let mut header_section = vec![0u8; header_size];
    reader.seek(SeekFrom::Start(record_offset + u64::from(header.size)))?;
    reader.read_exact(&mut header_section)?;
    sections.push(header_section);

    for info in &infos {
        let mut section = Vec::with_capacity(info.uncompressed_size as usize);
        let mut offset = record_offset + u64::from(header.size) + u64::from(info.offset);
        for j in 0..info.block_count as usize {
            extract_block(reader, offset, &mut section)?;
            offset += u64::from(block_size_at(&block_sizes, info.block_id as usize + j)?);
        }
        sections.push(section);
    }

    Ok(Asset::new(AssetKind::Texture, sections))
}

/// Read the flat per-block compressed-size array that follows a model or
/// texture block-info table.
fn read_block_sizes<R: Read>(reader: &mut R, count: usize) -> Result<Vec<u16>> {
    let mut sizes = Vec::with_capacity(count);
    for _ in 0..count {
        sizes.push(
            reader
                .read_u16::<LittleEndian>()
                .map_err(|e| structural(e, "block size table"))?,
        );
    }
    Ok(sizes)
}

/// Look up one recorded block size. The table is sized from the last
/// section's block range, so a malformed record can declare an earlier
/// section whose blocks run past it.
fn block_size_at(block_sizes: &[u16], index: usize) -> Result<u16> {
    block_sizes.get(index).copied().ok_or_else(|| {
        SqPackError::InvalidFormat(format!(
            "block {index} outside the size table ({} entries)",
            block_sizes.len()
        ))
    })
}

/// Extract one block at an absolute offset, appending its decoded bytes to
/// the caller's buffer.
fn extract_block<R: Read + Seek>(reader: &mut R, offset: u64, out: &mut Vec<u8>) -> Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    let header = BlockHeader::read_from(reader).map_err(|e| structural(e, "block header"))?;

    if header.compressed_size == STORED_SENTINEL {
        let start = out.len();
        out.resize(start + header.uncompressed_size as usize, 0);
        reader.read_exact(&mut out[start..])?;
        return Ok(());
    }

    let mut compressed = vec![0u8; header.compressed_size as usize];
    reader.read_exact(&mut compressed)?;

    // Headerless DEFLATE stream, not zlib-wrapped.
    let mut decoder = DeflateDecoder::new(compressed.as_slice());
    let produced = decoder
        .read_to_end(out)
        .map_err(|e| SqPackError::Decompression(format!("inflate failed: {e}")))?;
    if produced != header.uncompressed_size as usize {
        return Err(SqPackError::Decompression(format!(
            "inflated {} bytes, block declared {}",
            produced, header.uncompressed_size
        )));
    }
    Ok(())
}
