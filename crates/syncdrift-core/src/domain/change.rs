//! Change descriptors produced by a target's watcher and routed by the
//! manager.

use serde::{Deserialize, Serialize};

use super::chunk::FileContentStream;
use super::metadata::FileMetadata;
use super::path::TargetPath;

/// The kind of change a watcher observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Modify,
    Delete,
}

/// A change observed (or to be applied) at a path, without its content.
///
/// `delete` changes never carry metadata; `create`/`modify` always carry
/// the metadata current as of detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeInfo {
    pub path: TargetPath,
    pub change_type: ChangeType,
    pub metadata: Option<FileMetadata>,
    pub source_target: String,
    pub timestamp: i64,
}

impl FileChangeInfo {
    pub fn create(path: TargetPath, metadata: FileMetadata, source_target: impl Into<String>, timestamp: i64) -> Self {
        Self {
            path,
            change_type: ChangeType::Create,
            metadata: Some(metadata),
            source_target: source_target.into(),
            timestamp,
        }
    }

    pub fn modify(path: TargetPath, metadata: FileMetadata, source_target: impl Into<String>, timestamp: i64) -> Self {
        Self {
            path,
            change_type: ChangeType::Modify,
            metadata: Some(metadata),
            source_target: source_target.into(),
            timestamp,
        }
    }

    pub fn delete(path: TargetPath, source_target: impl Into<String>, timestamp: i64) -> Self {
        Self {
            path,
            change_type: ChangeType::Delete,
            metadata: None,
            source_target: source_target.into(),
            timestamp,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.change_type, ChangeType::Delete)
    }
}

/// A [`FileChangeInfo`] paired with its content, when the change carries
/// any (absent for deletes).
pub struct FileChange {
    pub info: FileChangeInfo,
    pub stream: Option<FileContentStream>,
}

impl FileChange {
    pub fn new(info: FileChangeInfo, stream: Option<FileContentStream>) -> Self {
        Self { info, stream }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_carries_no_metadata() {
        let change = FileChangeInfo::delete(TargetPath::new("a.txt").unwrap(), "primary", 100);
        assert!(change.is_delete());
        assert!(change.metadata.is_none());
    }

    #[test]
    fn create_carries_metadata() {
        let path = TargetPath::new("a.txt").unwrap();
        let metadata = FileMetadata::for_file(path.clone(), b"hi", 100);
        let change = FileChangeInfo::create(path, metadata.clone(), "primary", 100);
        assert!(!change.is_delete());
        assert_eq!(change.metadata, Some(metadata));
    }

    #[test]
    fn serde_roundtrip() {
        let path = TargetPath::new("a.txt").unwrap();
        let metadata = FileMetadata::for_file(path.clone(), b"hi", 100);
        let change = FileChangeInfo::modify(path, metadata, "secondary-1", 200);
        let json = serde_json::to_string(&change).unwrap();
        let back: FileChangeInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }
}
