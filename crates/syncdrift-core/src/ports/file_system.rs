//! The `FileSystem` port: the backing-store contract every adapter
//! (`syncdrift-fs`'s local implementation, or a test double) must satisfy.

use async_trait::async_trait;

use crate::domain::{EntryKind, FileMetadata, TargetPath};
use crate::error::SyncError;

/// One entry returned by `list_directory`: just enough to tell files from
/// directories without a second round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemItem {
    pub path: TargetPath,
    pub kind: EntryKind,
}

/// Options for `create_directory`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateDirectoryOptions {
    pub recursive: bool,
}

/// Options for `delete_item`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    pub recursive: bool,
}

/// Lock acquisition mode, see [`crate::domain::LockMode`].
pub use crate::domain::LockMode;

/// Backing-store abstraction. All paths are relative to a configured root
/// that the implementation normalizes and joins internally; callers never
/// see or construct absolute filesystem paths.
///
/// Lock semantics are mode+owner-tagged advisory: writes check
/// `is_locked ∧ mode=external ∧ owner≠requester`; reads never check a
/// lock at all.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Idempotent; ensures the root exists. Fails with
    /// [`SyncError::InvalidOperation`] if the filesystem is already in an
    /// error state.
    async fn initialize(&self) -> Result<(), SyncError>;

    /// Fails [`SyncError::NotFound`] when missing. Always permitted, even
    /// while locked.
    async fn read_file(&self, path: &TargetPath) -> Result<Vec<u8>, SyncError>;

    /// Fails [`SyncError::Locked`] when the filesystem is locked and
    /// `is_sync_operation` is false. Updates `last_modified` to
    /// `last_modified` on success. `is_sync_operation=true` bypasses the
    /// lock for the current lock owner only.
    async fn write_file(
        &self,
        path: &TargetPath,
        content: &[u8],
        last_modified: i64,
        is_sync_operation: bool,
        owner: Option<&str>,
    ) -> Result<(), SyncError>;

    /// Fails [`SyncError::AlreadyExists`] (non-recursive, exists) or
    /// [`SyncError::NotFound`] (non-recursive, missing parent). Recursive
    /// mode succeeds silently if the target already exists and creates
    /// missing parents.
    async fn create_directory(
        &self,
        path: &TargetPath,
        options: CreateDirectoryOptions,
    ) -> Result<(), SyncError>;

    /// Fails [`SyncError::NotFound`]; for non-empty directories fails
    /// [`SyncError::InvalidOperation`] unless `options.recursive`. Blocked
    /// by a lock the same way `write_file` is.
    async fn delete_item(
        &self,
        path: &TargetPath,
        options: DeleteOptions,
        is_sync_operation: bool,
        owner: Option<&str>,
    ) -> Result<(), SyncError>;

    /// Direct children only. Fails [`SyncError::NotFound`] on a missing
    /// path. Permitted while locked.
    async fn list_directory(&self, path: &TargetPath) -> Result<Vec<FileSystemItem>, SyncError>;

    /// Metadata computed (or cached) from content for files; empty hash
    /// for directories.
    async fn get_metadata(&self, path: &TargetPath) -> Result<FileMetadata, SyncError>;

    async fn exists(&self, path: &TargetPath) -> Result<bool, SyncError>;

    /// Acquires the whole-filesystem lock. Auto-releases after
    /// `timeout_ms`. A second call while held fails unless it comes from
    /// the same `owner`.
    async fn lock(
        &self,
        timeout_ms: u64,
        reason: &str,
        mode: LockMode,
        owner: &str,
    ) -> Result<(), SyncError>;

    /// Releases the lock if `owner` matches the current holder.
    async fn unlock(&self, owner: &str) -> Result<(), SyncError>;

    /// Unconditional release, used on dispose and recovery.
    async fn force_unlock(&self);

    /// Best-effort teardown. Must not fail the caller even if the backing
    /// store does something unexpected.
    async fn dispose(&self);
}
