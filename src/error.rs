//! Error types for SqPack storage operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqPackError {
    #[error("failed to open container {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid container format: {0}")]
    InvalidFormat(String),

    #[error("category {0:#04x} not found")]
    CategoryNotFound(u32),

    #[error("category name {0:?} not found")]
    CategoryNameNotFound(String),

    #[error("directory hash {0:#010x} not found")]
    DirNotFound(u32),

    #[error("file not found: dir hash {dir_hash:#010x}, filename hash {filename_hash:#010x}")]
    FileNotFound { dir_hash: u32, filename_hash: u32 },

    #[error("decompression error: {0}")]
    Decompression(String),
}

impl SqPackError {
    /// Whether this error means "the addressed thing does not exist", the
    /// recoverable condition callers are expected to branch on, as opposed
    /// to a structural or IO failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CategoryNotFound(_)
                | Self::CategoryNameNotFound(_)
                | Self::DirNotFound(_)
                | Self::FileNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SqPackError>;
