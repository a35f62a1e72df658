//! Read-only access to SqPack archives: a small number of sequential
//! container files holding a large set of named binary assets.
//!
//! Clients address assets by hierarchical path (`"category/dir/.../name"`).
//! The path resolves to a category, the directory and filename parts are
//! hashed, a per-category on-disk hash table maps the pair to a data file
//! and byte offset, and the addressed record is decoded out of that data
//! file block by block.
//!
//! The top-level entry point is [`SqPackStorage`]:
//!
//! ```no_run
//! use sqpack_storage::SqPackStorage;
//!
//! # fn main() -> sqpack_storage::Result<()> {
//! let storage = SqPackStorage::open("/path/to/game/sqpack/ffxiv")?;
//! let asset = storage.get_file("exd/root.exl")?;
//! # Ok(())
//! # }
//! ```

pub mod category;
pub mod container;
pub mod data;
pub mod error;
pub mod index;
pub mod storage;
pub mod types;
pub mod utils;

pub use category::Category;
pub use container::{Container, ContainerHeader, SectionHeader};
pub use data::DataFile;
pub use error::{Result, SqPackError};
pub use index::{DirTable, HashTable, IndexFile};
pub use storage::{category_name, category_number, SqPackStorage};
pub use types::{Asset, AssetKind, HashTableEntry};
