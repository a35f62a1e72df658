//! Top-level registry over a directory of SqPack containers
//!
//! Discovers which categories exist at open time but parses each one only
//! on first use, under a per-category creation lock so concurrent first
//! accesses construct it exactly once.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::error::{Result, SqPackError};
use crate::types::Asset;
use crate::utils::hash::path_hashes;

/// Static category number <-> name table, as shipped by the client
/// executable. Names double as the first segment of archive paths.
const CATEGORY_NAMES: &[(&str, u32)] = &[
    ("common", 0x00),
    ("bgcommon", 0x01),
    ("bg", 0x02),
    ("cut", 0x03),
    ("chara", 0x04),
    ("shader", 0x05),
    ("ui", 0x06),
    ("sound", 0x07),
    ("vfx", 0x08),
    ("ui_script", 0x09),
    ("exd", 0x0A),
    ("game_script", 0x0B),
    ("music", 0x0C),
];

/// Resolve a category name to its number.
pub fn category_number(name: &str) -> Option<u32> {
    CATEGORY_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, nb)| *nb)
}

/// Resolve a category number to its name, if it has one.
pub fn category_name(number: u32) -> Option<&'static str> {
    CATEGORY_NAMES
        .iter()
        .find(|(_, nb)| *nb == number)
        .map(|(n, _)| *n)
}

/// Suffix identifying index containers during discovery.
const INDEX_SUFFIX: &str = ".win32.index";

/// Construction counter observed by the concurrency tests.
#[cfg(test)]
static CATEGORY_CONSTRUCTIONS: std::sync::atomic::AtomicUsize =
    std::sync::atomic::AtomicUsize::new(0);

/// A discovered category: known to exist from the directory scan, parsed at
/// most once on first access.
#[derive(Debug)]
struct CategorySlot {
    creation: Mutex<()>,
    category: OnceLock<Category>,
}

/// Read-only view over every category found in one archive directory.
///
/// Shareable by reference across threads; see [`Self::category`] for the
/// lazy-construction guarantees.
#[derive(Debug)]
pub struct SqPackStorage {
    path: PathBuf,
    slots: HashMap<u32, CategorySlot>,
    numbers: Vec<u32>,
}

impl SqPackStorage {
    /// Scan a directory for index containers and record the categories they
    /// belong to, without parsing any of them yet.
    ///
    /// An unreadable directory is fatal and propagates as-is.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening SqPack storage at {}", path.display());

        let mut slots = HashMap::new();
        let mut numbers = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let filename = entry.file_name();
            let Some(filename) = filename.to_str() else {
                continue;
            };
            if !filename.ends_with(INDEX_SUFFIX) {
                continue;
            }

            // Index names are XX0000.win32.index; the leading two hex
            // digits are the category number.
            let Some(number) = filename
                .get(0..2)
                .and_then(|digits| u32::from_str_radix(digits, 16).ok())
            else {
                warn!("Skipping index with unparsable category number: {filename}");
                continue;
            };

            debug!("Discovered category {number:#04x} ({filename})");
            numbers.push(number);
            slots.insert(
                number,
                CategorySlot {
                    creation: Mutex::new(()),
                    category: OnceLock::new(),
                },
            );
        }
        numbers.sort_unstable();
        numbers.dedup();
        info!("Discovered {} categories", numbers.len());

        Ok(Self {
            path,
            slots,
            numbers,
        })
    }

    /// Numbers of all discovered categories, ascending.
    pub fn category_numbers(&self) -> &[u32] {
        &self.numbers
    }

    /// Get a category by number, constructing it on first access.
    ///
    /// Double-checked: the populated slot is read lock-free; only a miss
    /// takes the creation lock and re-checks, so a category is parsed at
    /// most once per storage lifetime even under concurrent first access.
    pub fn category(&self, number: u32) -> Result<&Category> {
        let slot = self
            .slots
            .get(&number)
            .ok_or(SqPackError::CategoryNotFound(number))?;

        if let Some(category) = slot.category.get() {
            return Ok(category);
        }

        let _guard = slot.creation.lock();
        // Another thread may have finished construction while we waited.
        if let Some(category) = slot.category.get() {
            return Ok(category);
        }

        let name = category_name(number).map(str::to_owned);
        #[cfg(test)]
        CATEGORY_CONSTRUCTIONS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let category = Category::open(&self.path, number, name)?;
        Ok(slot.category.get_or_init(|| category))
    }

    /// Get a category by name (`"exd"`, `"chara"`, ...).
    pub fn category_by_name(&self, name: &str) -> Result<&Category> {
        let number = category_number(name)
            .ok_or_else(|| SqPackError::CategoryNameNotFound(name.to_owned()))?;
        self.category(number)
    }

    /// Fetch an asset by its full archive path, e.g. `"exd/root.exl"`.
    ///
    /// The first path segment names the category; the rest is hashed.
    /// Addressing is case-insensitive.
    pub fn get_file(&self, path: &str) -> Result<Asset> {
        debug!("Get file: {path}");
        let (dir_hash, filename_hash) = Self::hashes(path)?;
        self.category_from_path(path)?
            .get_file(dir_hash, filename_hash)
    }

    /// Whether a file exists at the given archive path.
    pub fn file_exists(&self, path: &str) -> Result<bool> {
        let (dir_hash, filename_hash) = Self::hashes(path)?;
        Ok(self
            .category_from_path(path)?
            .file_exists(dir_hash, filename_hash))
    }

    /// Whether a directory exists. The path needs a trailing `/`, and a
    /// directory containing no files is not discoverable.
    pub fn dir_exists(&self, path: &str) -> Result<bool> {
        let (dir_hash, _) = Self::hashes(path)?;
        Ok(self.category_from_path(path)?.dir_exists(dir_hash))
    }

    fn category_from_path(&self, path: &str) -> Result<&Category> {
        let (category_name, _) = path
            .split_once('/')
            .ok_or_else(|| SqPackError::InvalidFormat(format!("path has no '/': {path:?}")))?;
        self.category_by_name(category_name)
    }

    fn hashes(path: &str) -> Result<(u32, u32)> {
        path_hashes(path)
            .ok_or_else(|| SqPackError::InvalidFormat(format!("path has no '/': {path:?}")))
    }
}
