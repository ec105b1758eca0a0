//! Local-disk [`FileSystem`] adapter: every path a target sees is relative
//! to a configured root directory on this machine.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use syncdrift_core::domain::{EntryKind, FileMetadata, LockMode, TargetPath};
use syncdrift_core::error::SyncError;
use syncdrift_core::ports::file_system::{
    CreateDirectoryOptions, DeleteOptions, FileSystem, FileSystemItem,
};

#[derive(Debug, Default)]
struct LockInner {
    mode: Option<LockMode>,
    owner: Option<String>,
    expires_at: Option<Instant>,
}

impl LockInner {
    /// An expired lock is treated as released without anyone having to
    /// explicitly unlock it.
    fn is_held(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => self.owner.is_some() && Instant::now() < expires_at,
            None => false,
        }
    }

    fn clear(&mut self) {
        self.mode = None;
        self.owner = None;
        self.expires_at = None;
    }
}

/// Syncs a single target's files against a directory on local disk.
///
/// All `TargetPath`s are resolved relative to `root`; callers never see the
/// absolute path. Locking is advisory and in-process only: it protects
/// against concurrent writers inside this one adapter instance, not against
/// other processes touching the same directory.
#[derive(Debug)]
pub struct LocalFileSystem {
    root: PathBuf,
    lock: Mutex<LockInner>,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(LockInner::default()),
        }
    }

    fn resolve(&self, path: &TargetPath) -> PathBuf {
        if path.is_root() {
            self.root.clone()
        } else {
            self.root.join(path.as_str())
        }
    }

    /// Any held lock blocks every write except the holder's own sync
    /// writes: `is_sync_operation ∧ owner == requester` bypasses regardless
    /// of `mode`. Everyone else — including a non-sync writer during a
    /// `Sync`-mode lock — gets `LOCKED` for as long as the lock is held.
    fn check_write_allowed(&self, is_sync_operation: bool, owner: Option<&str>) -> Result<(), SyncError> {
        let guard = self.lock.lock().expect("lock poisoned");
        if !guard.is_held() {
            return Ok(());
        }
        if is_sync_operation && guard.owner.as_deref() == owner {
            return Ok(());
        }
        Err(SyncError::Locked {
            reason: "filesystem is locked".to_string(),
            owner: guard.owner.clone(),
        })
    }

    async fn metadata_for(&self, path: &TargetPath, disk_path: &Path) -> Result<FileMetadata, SyncError> {
        let meta = tokio::fs::metadata(disk_path)
            .await
            .map_err(|_| SyncError::NotFound(path.clone()))?;
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        if meta.is_dir() {
            return Ok(FileMetadata::for_directory(path.clone(), last_modified));
        }

        let content = tokio::fs::read(disk_path)
            .await
            .map_err(|e| SyncError::ContentRetrievalFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(FileMetadata::for_file(path.clone(), &content, last_modified))
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SyncError::InitializationFailed(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn read_file(&self, path: &TargetPath) -> Result<Vec<u8>, SyncError> {
        let disk_path = self.resolve(path);
        tokio::fs::read(&disk_path)
            .await
            .map_err(|_| SyncError::NotFound(path.clone()))
    }

    #[instrument(skip(self, content))]
    async fn write_file(
        &self,
        path: &TargetPath,
        content: &[u8],
        last_modified: i64,
        is_sync_operation: bool,
        owner: Option<&str>,
    ) -> Result<(), SyncError> {
        self.check_write_allowed(is_sync_operation, owner)?;

        let disk_path = self.resolve(path);
        if let Some(parent) = disk_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::ApplyFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
        }

        let tmp_path = {
            let mut p = disk_path.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| SyncError::ApplyFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        tokio::fs::rename(&tmp_path, &disk_path)
            .await
            .map_err(|e| SyncError::ApplyFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let mtime = filetime::FileTime::from_unix_time(last_modified / 1000, 0);
        if let Err(e) = filetime::set_file_mtime(&disk_path, mtime) {
            warn!(error = %e, "failed to preserve last_modified");
        }

        debug!(bytes = content.len(), "write complete");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_directory(
        &self,
        path: &TargetPath,
        options: CreateDirectoryOptions,
    ) -> Result<(), SyncError> {
        let disk_path = self.resolve(path);

        if options.recursive {
            return tokio::fs::create_dir_all(&disk_path)
                .await
                .map_err(|e| SyncError::ApplyFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                });
        }

        if tokio::fs::try_exists(&disk_path).await.unwrap_or(false) {
            return Err(SyncError::AlreadyExists(path.clone()));
        }
        tokio::fs::create_dir(&disk_path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SyncError::NotFound(path.parent().unwrap_or_else(TargetPath::root))
            } else {
                SyncError::ApplyFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            }
        })
    }

    #[instrument(skip(self))]
    async fn delete_item(
        &self,
        path: &TargetPath,
        options: DeleteOptions,
        is_sync_operation: bool,
        owner: Option<&str>,
    ) -> Result<(), SyncError> {
        self.check_write_allowed(is_sync_operation, owner)?;

        let disk_path = self.resolve(path);
        let meta = tokio::fs::metadata(&disk_path)
            .await
            .map_err(|_| SyncError::NotFound(path.clone()))?;

        if meta.is_dir() {
            let mut entries = tokio::fs::read_dir(&disk_path)
                .await
                .map_err(|e| SyncError::ApplyFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            let has_children = entries
                .next_entry()
                .await
                .map_err(|e| SyncError::ApplyFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
                .is_some();

            if has_children && !options.recursive {
                return Err(SyncError::InvalidOperation(format!(
                    "directory not empty: {path}"
                )));
            }
            tokio::fs::remove_dir_all(&disk_path)
                .await
                .map_err(|e| SyncError::ApplyFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                })
        } else {
            tokio::fs::remove_file(&disk_path)
                .await
                .map_err(|e| SyncError::ApplyFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                })
        }
    }

    #[instrument(skip(self))]
    async fn list_directory(&self, path: &TargetPath) -> Result<Vec<FileSystemItem>, SyncError> {
        let disk_path = self.resolve(path);
        let mut read_dir = tokio::fs::read_dir(&disk_path)
            .await
            .map_err(|_| SyncError::NotFound(path.clone()))?;

        let mut items = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| SyncError::ApplyFailed {
            path: path.clone(),
            reason: e.to_string(),
        })? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_path = path.join(&name)?;
            let kind = if entry
                .file_type()
                .await
                .map_err(|e| SyncError::ApplyFailed {
                    path: child_path.clone(),
                    reason: e.to_string(),
                })?
                .is_dir()
            {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            items.push(FileSystemItem {
                path: child_path,
                kind,
            });
        }
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn get_metadata(&self, path: &TargetPath) -> Result<FileMetadata, SyncError> {
        let disk_path = self.resolve(path);
        self.metadata_for(path, &disk_path).await
    }

    async fn exists(&self, path: &TargetPath) -> Result<bool, SyncError> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await.unwrap_or(false))
    }

    #[instrument(skip(self))]
    async fn lock(
        &self,
        timeout_ms: u64,
        reason: &str,
        mode: LockMode,
        owner: &str,
    ) -> Result<(), SyncError> {
        let mut guard = self.lock.lock().expect("lock poisoned");
        if guard.is_held() && guard.owner.as_deref() != Some(owner) {
            return Err(SyncError::Locked {
                reason: reason.to_string(),
                owner: guard.owner.clone(),
            });
        }
        guard.mode = Some(mode);
        guard.owner = Some(owner.to_string());
        guard.expires_at = Some(Instant::now() + Duration::from_millis(timeout_ms));
        Ok(())
    }

    async fn unlock(&self, owner: &str) -> Result<(), SyncError> {
        let mut guard = self.lock.lock().expect("lock poisoned");
        if guard.is_held() && guard.owner.as_deref() != Some(owner) {
            return Err(SyncError::Locked {
                reason: "unlock requested by non-owner".to_string(),
                owner: guard.owner.clone(),
            });
        }
        guard.clear();
        Ok(())
    }

    async fn force_unlock(&self) {
        self.lock.lock().expect("lock poisoned").clear();
    }

    async fn dispose(&self) {
        self.force_unlock().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fs(dir: &TempDir) -> LocalFileSystem {
        LocalFileSystem::new(dir.path())
    }

    fn p(s: &str) -> TargetPath {
        TargetPath::new(s).unwrap()
    }

    #[tokio::test]
    async fn read_write_roundtrip() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.initialize().await.unwrap();
        f.write_file(&p("a.txt"), b"hello", 1000, true, None)
            .await
            .unwrap();
        assert_eq!(f.read_file(&p("a.txt")).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.write_file(&p("a/b/c.txt"), b"nested", 1000, true, None)
            .await
            .unwrap();
        assert_eq!(f.read_file(&p("a/b/c.txt")).await.unwrap(), b"nested");
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        let err = f.read_file(&p("missing.txt")).await.unwrap_err();
        assert_eq!(err.kind(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn create_directory_non_recursive_rejects_existing() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.create_directory(&p("sub"), CreateDirectoryOptions::default())
            .await
            .unwrap();
        let err = f
            .create_directory(&p("sub"), CreateDirectoryOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn create_directory_recursive_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        let opts = CreateDirectoryOptions { recursive: true };
        f.create_directory(&p("a/b/c"), opts).await.unwrap();
        f.create_directory(&p("a/b/c"), opts).await.unwrap();
    }

    #[tokio::test]
    async fn delete_non_empty_directory_requires_recursive() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.write_file(&p("sub/file.txt"), b"x", 0, true, None)
            .await
            .unwrap();

        let err = f
            .delete_item(&p("sub"), DeleteOptions::default(), true, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_OPERATION");

        f.delete_item(&p("sub"), DeleteOptions { recursive: true }, true, None)
            .await
            .unwrap();
        assert!(!f.exists(&p("sub")).await.unwrap());
    }

    #[tokio::test]
    async fn list_directory_reports_direct_children() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.write_file(&p("a.txt"), b"1", 0, true, None).await.unwrap();
        f.create_directory(&p("sub"), CreateDirectoryOptions::default())
            .await
            .unwrap();

        let mut items = f.list_directory(&p("")).await.unwrap();
        items.sort_by(|a, b| a.path.as_str().cmp(b.path.as_str()));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, p("a.txt"));
        assert_eq!(items[0].kind, EntryKind::File);
        assert_eq!(items[1].path, p("sub"));
        assert_eq!(items[1].kind, EntryKind::Directory);
    }

    #[tokio::test]
    async fn get_metadata_hashes_file_content() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.write_file(&p("a.txt"), b"hello", 1000, true, None)
            .await
            .unwrap();
        let meta = f.get_metadata(&p("a.txt")).await.unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.hash, syncdrift_core::domain::hex_sha256(b"hello"));
    }

    #[tokio::test]
    async fn lock_blocks_external_writers_but_not_owner() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.lock(5_000, "syncing", LockMode::External, "target-1")
            .await
            .unwrap();

        let err = f
            .write_file(&p("a.txt"), b"x", 0, false, Some("target-2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "LOCKED");

        f.write_file(&p("a.txt"), b"x", 0, true, Some("target-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unlock_by_non_owner_is_rejected() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.lock(5_000, "syncing", LockMode::External, "target-1")
            .await
            .unwrap();
        assert!(f.unlock("target-2").await.is_err());
        f.unlock("target-1").await.unwrap();
    }

    #[tokio::test]
    async fn lock_expires_after_timeout() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.lock(10, "syncing", LockMode::External, "target-1")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        f.write_file(&p("a.txt"), b"x", 0, false, Some("someone-else"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn force_unlock_clears_regardless_of_owner() {
        let dir = TempDir::new().unwrap();
        let f = fs(&dir);
        f.lock(5_000, "syncing", LockMode::External, "target-1")
            .await
            .unwrap();
        f.force_unlock().await;
        f.write_file(&p("a.txt"), b"x", 0, false, Some("anyone"))
            .await
            .unwrap();
    }
}
