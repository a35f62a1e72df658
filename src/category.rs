//! One category: an index file bound to its numbered data files

use std::path::Path;
use tracing::info;

use crate::data::DataFile;
use crate::error::{Result, SqPackError};
use crate::index::IndexFile;
use crate::types::Asset;

/// Platform tag embedded in every container file name.
const PLATFORM_TAG: &str = "win32";

/// A named/numbered partition of the archive: one index plus the data files
/// it references.
#[derive(Debug)]
pub struct Category {
    number: u32,
    name: Option<String>,
    index: IndexFile,
    data_files: Vec<DataFile>,
}

impl Category {
    /// Open a category from its base directory and number.
    ///
    /// Container names derive from the number: `<2-hex>0000.win32.index`
    /// plus `.dat0 .. datN-1` for however many data files the index names.
    pub fn open(base_path: &Path, number: u32, name: Option<String>) -> Result<Self> {
        info!(
            "Opening category {:#04x} ({}) in {}",
            number,
            name.as_deref().unwrap_or("unnamed"),
            base_path.display()
        );

        let prefix = format!("{number:02x}0000.{PLATFORM_TAG}");
        let index = IndexFile::open(&base_path.join(format!("{prefix}.index")))?;

        let mut data_files = Vec::with_capacity(index.dat_count() as usize);
        for id in 0..index.dat_count() {
            data_files.push(DataFile::open(
                &base_path.join(format!("{prefix}.dat{id}")),
                id,
            )?);
        }

        Ok(Self {
            number,
            name,
            index,
            data_files,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn index(&self) -> &IndexFile {
        &self.index
    }

    /// Fetch an asset by its directory and filename hashes.
    pub fn get_file(&self, dir_hash: u32, filename_hash: u32) -> Result<Asset> {
        let entry = self.index.entry(dir_hash, filename_hash)?;
        let data_file = self
            .data_files
            .get(entry.data_file_id as usize)
            .ok_or_else(|| {
                SqPackError::InvalidFormat(format!(
                    "index names data file {} but category {:#04x} only has {}",
                    entry.data_file_id,
                    self.number,
                    self.data_files.len()
                ))
            })?;
        data_file.get_file(entry.data_offset)
    }

    pub fn file_exists(&self, dir_hash: u32, filename_hash: u32) -> bool {
        self.index.file_exists(dir_hash, filename_hash)
    }

    pub fn dir_exists(&self, dir_hash: u32) -> bool {
        self.index.dir_exists(dir_hash)
    }
}
