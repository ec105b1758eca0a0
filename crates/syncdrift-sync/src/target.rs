//! `SyncTarget`: one registered backing plus its watcher and apply logic.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, instrument, warn};

use syncdrift_core::domain::{
    ChangeType, FileChange, FileChangeInfo, FileConflict, FileContentStream, FileMetadata,
    LockMode, TargetPath, TargetRole, TargetState, TargetStatus,
};
use syncdrift_core::error::SyncError;
use syncdrift_core::ports::{CreateDirectoryOptions, DeleteOptions, FileSystem, GlobIgnoreService, IgnoreService};

use crate::watcher::{PollingWatcher, WatchHandle};

/// A closure the manager installs so `recover("fromPrimary")` can trigger a
/// full resync into this target without the target holding a reference back
/// to the manager.
pub type ResolveFromPrimary =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send>> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct InitializeOptions {
    pub skip_file_scan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverStrategy {
    FromPrimary,
    Clear,
    None,
}

const CONTENT_CHUNK_SIZE: usize = 64 * 1024;

pub struct SyncTarget {
    id: String,
    role: TargetRole,
    fs: Arc<dyn FileSystem>,
    ignore: Arc<RwLock<dyn IgnoreService>>,
    state: Mutex<TargetState>,
    watcher: Mutex<Option<Arc<PollingWatcher>>>,
    watch_handle: Mutex<Option<WatchHandle>>,
    resolve_from_primary: Mutex<Option<ResolveFromPrimary>>,
    poll_interval: std::time::Duration,
    debounce_delay: std::time::Duration,
    sync_lock_timeout_ms: u64,
}

impl SyncTarget {
    pub fn new(
        id: impl Into<String>,
        role: TargetRole,
        fs: Arc<dyn FileSystem>,
        poll_interval: std::time::Duration,
        debounce_delay: std::time::Duration,
        sync_lock_timeout_ms: u64,
    ) -> Self {
        let id = id.into();
        Self {
            state: Mutex::new(TargetState::new(id.clone(), role)),
            id,
            role,
            fs,
            ignore: Arc::new(RwLock::new(GlobIgnoreService::default())),
            watcher: Mutex::new(None),
            watch_handle: Mutex::new(None),
            resolve_from_primary: Mutex::new(None),
            poll_interval,
            debounce_delay,
            sync_lock_timeout_ms,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> TargetRole {
        self.role
    }

    /// Replaces the ignore patterns in place. The watcher holds the same
    /// `Arc<RwLock<..>>`, so changes are visible on its next tick without
    /// restarting it.
    pub async fn set_ignore_patterns(&self, patterns: Vec<String>) {
        self.ignore.write().await.set_patterns(patterns);
    }

    /// `initialize(fs, isPrimary, {skipFileScan?, resolutionFunctions?})`.
    /// A secondary whose root is non-empty fails and transitions to
    /// `error`, never touching the existing files.
    #[instrument(skip(self, resolve_from_primary))]
    pub async fn initialize(
        &self,
        options: InitializeOptions,
        resolve_from_primary: Option<ResolveFromPrimary>,
    ) -> Result<(), SyncError> {
        self.fs.initialize().await?;

        if self.role == TargetRole::Secondary && !options.skip_file_scan {
            let root_entries = self.fs.list_directory(&TargetPath::root()).await?;
            if !root_entries.is_empty() {
                let reason = "secondary target root is not empty".to_string();
                self.state.lock().await.fail(reason.clone());
                return Err(SyncError::InitializationFailed(reason));
            }
        }

        *self.resolve_from_primary.lock().await = resolve_from_primary;

        let mut state = self.state.lock().await;
        state.transition_to(TargetStatus::Idle)
    }

    pub async fn get_state(&self) -> TargetState {
        self.state.lock().await.clone()
    }

    #[instrument(skip(self))]
    pub async fn get_metadata(&self, paths: &[TargetPath]) -> Result<Vec<FileMetadata>, SyncError> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            out.push(self.fs.get_metadata(path).await?);
        }
        Ok(out)
    }

    /// Every path under this target's root, used by the manager to drive a
    /// full resync. Not part of the observer surface: outer glue only ever
    /// sees `get_metadata`/`get_state`.
    pub async fn list_all_paths(&self) -> Result<Vec<TargetPath>, SyncError> {
        let mut out = Vec::new();
        let mut stack = vec![TargetPath::root()];
        while let Some(dir) = stack.pop() {
            for item in self.fs.list_directory(&dir).await? {
                if item.kind == syncdrift_core::domain::EntryKind::Directory {
                    stack.push(item.path.clone());
                }
                out.push(item.path);
            }
        }
        Ok(out)
    }

    /// Builds a chunked content stream for `path`, spawning the chunk
    /// producer so the reader isn't held by whoever calls this.
    #[instrument(skip(self))]
    pub async fn get_file_content(&self, path: &TargetPath) -> Result<FileContentStream, SyncError> {
        let metadata = self.fs.get_metadata(path).await?;
        let content = self
            .fs
            .read_file(path)
            .await
            .map_err(|e| SyncError::ContentRetrievalFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let (tx, rx) = mpsc::channel(8);
        let total_chunks = content.len().div_ceil(CONTENT_CHUNK_SIZE).max(1) as u32;
        tokio::spawn(async move {
            for (index, chunk) in content.chunks(CONTENT_CHUNK_SIZE).enumerate() {
                let hash = syncdrift_core::domain::hex_sha256(chunk);
                let chunk = syncdrift_core::domain::FileChunk {
                    content: chunk.to_vec(),
                    chunk_index: index as u32,
                    total_chunks,
                    chunk_hash: hash,
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });

        Ok(FileContentStream::new(metadata, rx))
    }

    /// Locks the underlying filesystem with `mode=sync`, transitions to
    /// `collecting`.
    #[instrument(skip(self))]
    pub async fn notify_incoming_changes(&self, paths: &[TargetPath]) -> Result<(), SyncError> {
        let _ = paths;
        self.fs
            .lock(self.sync_lock_timeout_ms, "Sync in progress", LockMode::Sync, &self.id)
            .await?;
        self.state.lock().await.transition_to(TargetStatus::Collecting)
    }

    /// `delete`: applies unconditionally. `create`/`modify`: compares
    /// existing content's hash against the incoming metadata hash; a
    /// mismatch on an existing path is reported as a conflict instead of
    /// being overwritten.
    #[instrument(skip(self, change))]
    pub async fn apply_file_change(&self, change: FileChange) -> Result<Option<FileConflict>, SyncError> {
        {
            let mut state = self.state.lock().await;
            if state.status == TargetStatus::Collecting {
                state.transition_to(TargetStatus::Syncing)?;
            }
        }

        let info = &change.info;
        let result = self.apply_one(info, change.stream).await;

        if let Err(e) = &result {
            self.state.lock().await.fail(e.to_string());
        }
        result
    }

    async fn apply_one(
        &self,
        info: &FileChangeInfo,
        stream: Option<FileContentStream>,
    ) -> Result<Option<FileConflict>, SyncError> {
        match info.change_type {
            ChangeType::Delete => {
                match self
                    .fs
                    .delete_item(&info.path, DeleteOptions { recursive: true }, true, Some(&self.id))
                    .await
                {
                    Ok(()) => Ok(None),
                    Err(SyncError::NotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            }
            ChangeType::Create | ChangeType::Modify => {
                let incoming_meta = info
                    .metadata
                    .clone()
                    .ok_or_else(|| SyncError::ApplyFailed {
                        path: info.path.clone(),
                        reason: "non-delete change carries no metadata".to_string(),
                    })?;

                if self.fs.exists(&info.path).await? {
                    let existing = self.fs.get_metadata(&info.path).await?;
                    if existing.is_file() && existing.hash != incoming_meta.hash {
                        return Ok(Some(FileConflict::new(
                            info.path.clone(),
                            info.source_target.clone(),
                            self.id.clone(),
                            info.timestamp,
                        )));
                    }
                }

                if let Some(parent) = info.path.parent() {
                    if !parent.is_root() {
                        let _ = self
                            .fs
                            .create_directory(&parent, CreateDirectoryOptions { recursive: true })
                            .await;
                    }
                }

                let stream = stream.ok_or_else(|| SyncError::ApplyFailed {
                    path: info.path.clone(),
                    reason: "non-delete change carries no content stream".to_string(),
                })?;
                let content = stream.drain_to_vec().await;

                let actual_hash = syncdrift_core::domain::hex_sha256(&content);
                if actual_hash != incoming_meta.hash {
                    return Err(SyncError::HashMismatch {
                        path: info.path.clone(),
                        expected: incoming_meta.hash,
                        actual: actual_hash,
                    });
                }

                self.fs
                    .write_file(&info.path, &content, incoming_meta.last_modified, true, Some(&self.id))
                    .await?;
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn sync_complete(&self) -> Result<(), SyncError> {
        self.fs.unlock(&self.id).await.ok();
        self.state.lock().await.transition_to(TargetStatus::Idle)
    }

    /// Clears the in-memory snapshot so the next poll re-emits every
    /// present file as a create; `FromPrimary` additionally invokes the
    /// installed resolver closure.
    #[instrument(skip(self))]
    pub async fn recover(&self, strategy: RecoverStrategy) -> Result<(), SyncError> {
        if let Some(watcher) = self.watcher.lock().await.as_ref() {
            watcher.reset_snapshot().await;
        }

        if strategy == RecoverStrategy::FromPrimary {
            let resolver = self.resolve_from_primary.lock().await.clone();
            if let Some(resolver) = resolver {
                resolver().await?;
            } else {
                warn!("recover(fromPrimary) requested but no resolver installed");
            }
        }

        self.fs.force_unlock().await;
        self.state.lock().await.recover_to_idle();
        Ok(())
    }

    /// Starts the polling watcher, routing settled batches to `on_batch`.
    pub async fn watch(
        self: &Arc<Self>,
        on_batch: impl Fn(String, Vec<FileChangeInfo>) + Send + Sync + 'static,
    ) {
        let watcher = Arc::new(PollingWatcher::new(
            self.id.clone(),
            self.fs.clone(),
            self.ignore.clone(),
            self.poll_interval,
            self.debounce_delay,
        ));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = watcher.clone().start(tx);

        *self.watcher.lock().await = Some(watcher);
        *self.watch_handle.lock().await = Some(handle);

        let id = self.id.clone();
        tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                on_batch(id.clone(), batch);
            }
        });
    }

    /// Idempotent: a second call with no active watcher is a no-op.
    pub async fn unwatch(&self) {
        self.watch_handle.lock().await.take();
        self.watcher.lock().await.take();
    }

    pub async fn dispose(&self) {
        self.unwatch().await;
        self.fs.dispose().await;
        info!(target = %self.id, "target disposed");
    }
}
