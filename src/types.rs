//! Common types used throughout the SqPack storage system

/// Location of one asset inside a category, decoded from a packed index
/// hash-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashTableEntry {
    /// Number of the data file holding the asset (`.dat0`, `.dat1`, ...)
    pub data_file_id: u32,
    /// CRC-32 hash of the lower-cased directory part of the path
    pub dir_hash: u32,
    /// CRC-32 hash of the lower-cased filename part of the path
    pub filename_hash: u32,
    /// Absolute byte offset of the asset record inside that data file
    pub data_offset: u64,
}

/// Record kind of an asset inside a data file, controlling how its blocks
/// are laid out and decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Empty,
    Standard,
    Model,
    Texture,
}

impl AssetKind {
    /// Decode the on-disk `entry_kind` discriminant.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Empty),
            2 => Some(Self::Standard),
            3 => Some(Self::Model),
            4 => Some(Self::Texture),
            _ => None,
        }
    }
}

/// One decoded asset: the record kind plus its ordered byte sections.
///
/// Section layout is kind-dependent: standard assets have exactly one
/// section, model assets eleven, texture assets one raw header section
/// followed by one section per mip/layer. Empty assets have none.
#[derive(Debug)]
pub struct Asset {
    kind: AssetKind,
    sections: Vec<Vec<u8>>,
}

impl Asset {
    pub(crate) fn new(kind: AssetKind, sections: Vec<Vec<u8>>) -> Self {
        Self { kind, sections }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn sections(&self) -> &[Vec<u8>] {
        &self.sections
    }

    /// Consume the asset, yielding its sections.
    pub fn into_sections(self) -> Vec<Vec<u8>> {
        self.sections
    }

    /// The single data section of a standard asset, if this is one.
    pub fn data(&self) -> Option<&[u8]> {
        match self.kind {
            AssetKind::Standard => self.sections.first().map(Vec::as_slice),
            _ => None,
        }
    }
}
