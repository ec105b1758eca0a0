//! The error kind taxonomy shared across every component of the sync core.
//!
//! These are kinds, not adapter-specific error types: a `FileSystem`
//! implementation wraps whatever its backing store throws into one of
//! these variants at the boundary, so callers above the adapter layer can
//! match on a closed set.

use thiserror::Error;

use crate::domain::TargetPath;

/// A sync-core error, tagged with the §7 taxonomy kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Path missing.
    #[error("not found: {0}")]
    NotFound(TargetPath),

    /// `createDirectory` against an existing non-recursive target.
    #[error("already exists: {0}")]
    AlreadyExists(TargetPath),

    /// Recursive-needed, not-a-directory, or wrong state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A `FileSystem` lock blocks this write.
    #[error("locked: {reason} (owner={owner:?})")]
    Locked { reason: String, owner: Option<String> },

    /// Target setup failed (e.g. secondary with a non-empty root).
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// Write or delete during sync failed.
    #[error("apply failed for {path}: {reason}")]
    ApplyFailed { path: TargetPath, reason: String },

    /// The source target could not produce content for a path.
    #[error("content retrieval failed for {path}: {reason}")]
    ContentRetrievalFailed { path: TargetPath, reason: String },

    /// Streamed content did not match the metadata hash.
    #[error("hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: TargetPath,
        expected: String,
        actual: String,
    },

    /// `dispose` called while a batch is in flight.
    #[error("sync in progress")]
    SyncInProgress,
}

impl SyncError {
    /// The taxonomy kind as a stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::NotFound(_) => "NOT_FOUND",
            SyncError::AlreadyExists(_) => "ALREADY_EXISTS",
            SyncError::InvalidOperation(_) => "INVALID_OPERATION",
            SyncError::Locked { .. } => "LOCKED",
            SyncError::InitializationFailed(_) => "INITIALIZATION_FAILED",
            SyncError::ApplyFailed { .. } => "APPLY_FAILED",
            SyncError::ContentRetrievalFailed { .. } => "CONTENT_RETRIEVAL_FAILED",
            SyncError::HashMismatch { .. } => "HASH_MISMATCH",
            SyncError::SyncInProgress => "SYNC_IN_PROGRESS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_taxonomy() {
        let path = TargetPath::new("a.txt").unwrap();
        assert_eq!(SyncError::NotFound(path.clone()).kind(), "NOT_FOUND");
        assert_eq!(
            SyncError::Locked {
                reason: "sync in progress".into(),
                owner: Some("t1".into())
            }
            .kind(),
            "LOCKED"
        );
        assert_eq!(SyncError::SyncInProgress.kind(), "SYNC_IN_PROGRESS");
    }

    #[test]
    fn display_includes_path() {
        let path = TargetPath::new("a.txt").unwrap();
        let err = SyncError::NotFound(path);
        assert!(err.to_string().contains("a.txt"));
    }
}
