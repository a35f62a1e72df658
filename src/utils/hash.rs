//! Path hashing: archive paths address files by per-segment CRC-32

/// Hash one path segment.
///
/// The format uses the zlib-polynomial CRC-32 of the segment's UTF-8 bytes,
/// XORed with `0xFFFFFFFF` to compensate for the client's non-finalizing
/// CRC variant. Callers must lower-case the segment first; addressing is
/// case-insensitive.
pub fn segment_hash(segment: &str) -> u32 {
    crc32fast::hash(segment.as_bytes()) ^ 0xFFFF_FFFF
}

/// Split an archive path at the last `/` and hash both halves, yielding
/// `(dir_hash, filename_hash)`. The path is lower-cased before hashing.
///
/// Returns `None` for paths without a `/`.
pub fn path_hashes(path: &str) -> Option<(u32, u32)> {
    let lower = path.to_lowercase();
    let (dir, filename) = lower.rsplit_once('/')?;
    Some((segment_hash(dir), segment_hash(filename)))
}
