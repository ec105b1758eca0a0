//! File and directory metadata.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::path::TargetPath;

/// What kind of filesystem entry a [`FileMetadata`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata for a single path as seen by a target.
///
/// For files, `hash` is the SHA-256 hex digest of the content and uniquely
/// identifies it; for directories `hash` is empty and `size` is zero.
/// `last_modified` is preserved bit-exactly across a sync (milliseconds
/// since the Unix epoch, matching the writer-supplied value rather than
/// whatever the local clock reads after the write).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: TargetPath,
    pub kind: EntryKind,
    pub hash: String,
    pub size: u64,
    pub last_modified: i64,
}

impl FileMetadata {
    /// Builds file metadata from raw content, hashing it here so every
    /// caller gets consistent hashes.
    pub fn for_file(path: TargetPath, content: &[u8], last_modified: i64) -> Self {
        Self {
            path,
            kind: EntryKind::File,
            hash: hex_sha256(content),
            size: content.len() as u64,
            last_modified,
        }
    }

    /// Builds directory metadata (empty hash, zero size).
    pub fn for_directory(path: TargetPath, last_modified: i64) -> Self {
        Self {
            path,
            kind: EntryKind::Directory,
            hash: String::new(),
            size: 0,
            last_modified,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

/// SHA-256 hex digest of `content`.
pub fn hex_sha256(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_metadata_hashes_content() {
        let path = TargetPath::new("a.txt").unwrap();
        let m = FileMetadata::for_file(path, b"hello", 1000);
        assert!(m.is_file());
        assert_eq!(m.size, 5);
        assert_eq!(m.hash, hex_sha256(b"hello"));
        assert_eq!(m.last_modified, 1000);
    }

    #[test]
    fn directory_metadata_is_empty() {
        let path = TargetPath::new("dir").unwrap();
        let m = FileMetadata::for_directory(path, 1000);
        assert!(m.is_directory());
        assert_eq!(m.size, 0);
        assert_eq!(m.hash, "");
    }

    #[test]
    fn identical_content_hashes_equal() {
        assert_eq!(hex_sha256(b"same"), hex_sha256(b"same"));
        assert_ne!(hex_sha256(b"same"), hex_sha256(b"different"));
    }
}
