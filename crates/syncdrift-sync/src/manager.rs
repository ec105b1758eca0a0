//! `FileSyncManager`: registry of targets, change router, conflict policy,
//! pending queue, and full-resync driver.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use syncdrift_core::domain::{
    ChangeType, EntryKind, FileChange, FileChangeInfo, FileConflict, PendingEntry, PendingSync,
    TargetPath, TargetRole, TargetState, TargetStatus,
};
use syncdrift_core::error::SyncError;

use crate::target::{RecoverStrategy, SyncTarget};

/// Bound on a single peer's pending queue before it collapses into a
/// synthetic "full resync required" marker.
const MAX_PENDING_PER_TARGET: usize = 500;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub inactivity_delay_ms: u64,
    pub max_batch_size: usize,
    pub max_retries: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            inactivity_delay_ms: 1000,
            max_batch_size: 50,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CurrentFailure {
    pub target_id: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ManagerStatus {
    pub targets: HashMap<String, TargetState>,
    pub current_failure: Option<CurrentFailure>,
}

/// Orchestrates propagation across every registered target.
pub struct FileSyncManager {
    config: Mutex<ManagerConfig>,
    targets: DashMap<String, Arc<SyncTarget>>,
    primary_id: Mutex<Option<String>>,
    pending: DashMap<String, PendingEntry>,
    current_failure: Mutex<Option<CurrentFailure>>,
    /// Per-source serialization: a source's batches are applied to peers in
    /// the order they were produced.
    source_locks: DashMap<String, Arc<Mutex<()>>>,
    /// Consecutive apply failures per peer since its last success; a peer
    /// that exceeds `max_retries` is forced straight to a full resync
    /// instead of being retried indefinitely.
    retry_counts: DashMap<String, u32>,
    /// Last time a pending-queue drain was attempted for a peer, so drains
    /// are spaced at least `inactivity_delay_ms` apart.
    last_drain_attempt: DashMap<String, Instant>,
}

impl Default for FileSyncManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSyncManager {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(ManagerConfig::default()),
            targets: DashMap::new(),
            primary_id: Mutex::new(None),
            pending: DashMap::new(),
            current_failure: Mutex::new(None),
            source_locks: DashMap::new(),
            retry_counts: DashMap::new(),
            last_drain_attempt: DashMap::new(),
        }
    }

    pub async fn initialize(&self, config: ManagerConfig) {
        *self.config.lock().await = config;
    }

    /// Registers a target. At most one primary may be registered at a time.
    pub async fn register_target(&self, target: Arc<SyncTarget>, role: TargetRole) -> Result<(), SyncError> {
        if role == TargetRole::Primary {
            let mut primary = self.primary_id.lock().await;
            if primary.is_some() {
                return Err(SyncError::InvalidOperation("a primary target is already registered".into()));
            }
            *primary = Some(target.id().to_string());
        }
        self.targets.insert(target.id().to_string(), target);
        Ok(())
    }

    pub async fn unregister_target(&self, id: &str) {
        if let Some((_, target)) = self.targets.remove(id) {
            target.unwatch().await;
        }
        self.pending.remove(id);
        let mut primary = self.primary_id.lock().await;
        if primary.as_deref() == Some(id) {
            *primary = None;
        }
    }

    pub async fn get_primary_target(&self) -> Option<Arc<SyncTarget>> {
        let id = self.primary_id.lock().await.clone()?;
        self.targets.get(&id).map(|t| t.clone())
    }

    pub fn get_secondary_targets(&self) -> Vec<Arc<SyncTarget>> {
        self.targets
            .iter()
            .filter(|entry| entry.value().role() == TargetRole::Secondary)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn peers_of(&self, source_id: &str) -> Vec<Arc<SyncTarget>> {
        self.targets
            .iter()
            .filter(|entry| entry.key() != source_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    async fn source_lock(&self, source_id: &str) -> Arc<Mutex<()>> {
        self.source_locks
            .entry(source_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Routes one debounced batch from `source_id` to every other registered
    /// target. Never fails the caller: per-peer failures are recorded and
    /// queued for retry instead of propagated. A batch larger than
    /// `max_batch_size` is split into successive sub-batches, each running
    /// its own notify→apply→syncComplete cycle before the next begins.
    #[instrument(skip(self, batch))]
    pub async fn handle_target_changes(&self, source_id: &str, batch: Vec<FileChangeInfo>) {
        if batch.is_empty() {
            return;
        }
        let lock = self.source_lock(source_id).await;
        let _serialize = lock.lock().await;

        let Some(source) = self.targets.get(source_id).map(|t| t.clone()) else {
            warn!(source_id, "changes reported by an unregistered target, dropping");
            return;
        };
        let peers = self.peers_of(source_id);
        if peers.is_empty() {
            return;
        }

        let max_batch_size = self.config.lock().await.max_batch_size.max(1);
        let ordered_batch = reorder_deletes_after_descendant_writes(batch);

        for chunk in ordered_batch.chunks(max_batch_size) {
            self.route_chunk(&source, &peers, chunk).await;
        }
    }

    /// Runs one notify→apply→syncComplete cycle for `chunk` against every
    /// peer, then attempts to drain each peer's pending queue.
    async fn route_chunk(&self, source: &Arc<SyncTarget>, peers: &[Arc<SyncTarget>], chunk: &[FileChangeInfo]) {
        let paths: Vec<_> = chunk.iter().map(|c| c.path.clone()).collect();
        for peer in peers {
            if let Err(e) = peer.notify_incoming_changes(&paths).await {
                warn!(peer = peer.id(), error = %e, "notify_incoming_changes failed");
            }
        }

        for change in chunk {
            // Each peer needs its own chunk producer, so content is
            // re-requested from the source per peer rather than shared.
            for peer in peers {
                let peer_stream = if change.change_type == ChangeType::Delete {
                    None
                } else {
                    match source.get_file_content(&change.path).await {
                        Ok(s) => Some(s),
                        Err(e) => {
                            self.record_failure(peer.id(), change.clone(), e).await;
                            continue;
                        }
                    }
                };

                let file_change = FileChange::new(change.clone(), peer_stream);
                match peer.apply_file_change(file_change).await {
                    Ok(Some(conflict)) => self.resolve_conflict(source, peer, change, conflict).await,
                    Ok(None) => {
                        self.retry_counts.remove(peer.id());
                    }
                    Err(e) => self.record_failure(peer.id(), change.clone(), e).await,
                };
            }
        }

        for peer in peers {
            if let Err(e) = peer.sync_complete().await {
                warn!(peer = peer.id(), error = %e, "sync_complete failed");
            }
        }

        self.drain_pending_if_idle(peers).await;
    }

    async fn resolve_conflict(
        &self,
        source: &Arc<SyncTarget>,
        peer: &Arc<SyncTarget>,
        change: &FileChangeInfo,
        conflict: FileConflict,
    ) {
        let _ = conflict;
        if source.role() == TargetRole::Primary {
            // Primary wins: force an overwrite into the peer.
            match source.get_file_content(&change.path).await {
                Ok(stream) => {
                    let overwrite = FileChange::new(change.clone(), Some(stream));
                    if let Err(e) = peer.apply_file_change(overwrite).await {
                        self.record_failure(peer.id(), change.clone(), e).await;
                    }
                }
                Err(e) => self.record_failure(peer.id(), change.clone(), e).await,
            }
        } else if peer.role() == TargetRole::Primary {
            // The change came from a secondary but conflicts with the
            // primary: reject it and schedule the secondary for a full
            // resync from the primary.
            info!(source = source.id(), "secondary change conflicts with primary, scheduling resolveFromPrimary");
            if let Err(e) = source.recover(RecoverStrategy::FromPrimary).await {
                warn!(target = source.id(), error = %e, "resolveFromPrimary failed");
            }
        } else {
            // Secondary vs secondary: reject on the receiving side, enqueue
            // for later reconciliation once a primary-sourced change lands.
            self.enqueue_pending(peer.id(), change.clone()).await;
        }
    }

    async fn record_failure(&self, peer_id: &str, change: FileChangeInfo, error: SyncError) {
        warn!(peer = peer_id, error = %error, path = %change.path, "apply failed, queuing for retry");
        *self.current_failure.lock().await = Some(CurrentFailure {
            target_id: peer_id.to_string(),
            error: error.to_string(),
        });

        let max_retries = self.config.lock().await.max_retries;
        let attempts = {
            let mut count = self.retry_counts.entry(peer_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if attempts > max_retries {
            warn!(peer = peer_id, attempts, max_retries, "peer exceeded max_retries, forcing full resync");
            self.pending.insert(peer_id.to_string(), PendingEntry::FullResyncRequired);
            self.retry_counts.remove(peer_id);
        } else {
            self.enqueue_pending(peer_id, change).await;
        }
    }

    async fn enqueue_pending(&self, peer_id: &str, change: FileChangeInfo) {
        let mut entry = self
            .pending
            .entry(peer_id.to_string())
            .or_insert_with(|| PendingEntry::Changes(Vec::new()));
        match entry.value_mut() {
            PendingEntry::Changes(changes) => {
                changes.push(change);
                if changes.len() > MAX_PENDING_PER_TARGET {
                    *entry.value_mut() = PendingEntry::FullResyncRequired;
                }
            }
            PendingEntry::FullResyncRequired => {}
        }
    }

    /// Drains a peer's pending queue once it has returned to `idle`, no
    /// more often than `inactivity_delay_ms` per peer.
    async fn drain_pending_if_idle(&self, peers: &[Arc<SyncTarget>]) {
        let inactivity_delay = Duration::from_millis(self.config.lock().await.inactivity_delay_ms);
        for peer in peers {
            let state = peer.get_state().await;
            if state.status != TargetStatus::Idle {
                continue;
            }
            if let Some(last) = self.last_drain_attempt.get(peer.id()) {
                if last.elapsed() < inactivity_delay {
                    continue;
                }
            }
            self.last_drain_attempt.insert(peer.id().to_string(), Instant::now());

            match self.pending.remove(peer.id()) {
                Some((_, PendingEntry::FullResyncRequired)) => {
                    if let Err(e) = peer.recover(RecoverStrategy::FromPrimary).await {
                        warn!(peer = peer.id(), error = %e, "full resync recovery failed");
                    }
                }
                Some((_, PendingEntry::Changes(changes))) if !changes.is_empty() => {
                    if let Some(source_id) = changes.first().map(|c| c.source_target.clone()) {
                        if let Some(source) = self.targets.get(&source_id).map(|t| t.clone()) {
                            self.replay_changes(&source, peer, changes).await;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    async fn replay_changes(&self, source: &Arc<SyncTarget>, peer: &Arc<SyncTarget>, changes: Vec<FileChangeInfo>) {
        let paths: Vec<_> = changes.iter().map(|c| c.path.clone()).collect();
        if let Err(e) = peer.notify_incoming_changes(&paths).await {
            warn!(peer = peer.id(), error = %e, "notify_incoming_changes failed during pending drain");
            return;
        }
        for change in changes {
            let stream = if change.change_type == ChangeType::Delete {
                None
            } else {
                match source.get_file_content(&change.path).await {
                    Ok(s) => Some(s),
                    Err(e) => {
                        self.record_failure(peer.id(), change, e).await;
                        continue;
                    }
                }
            };
            let file_change = FileChange::new(change.clone(), stream);
            match peer.apply_file_change(file_change).await {
                Ok(_) => {
                    self.retry_counts.remove(peer.id());
                }
                Err(e) => self.record_failure(peer.id(), change, e).await,
            }
        }
        if let Err(e) = peer.sync_complete().await {
            warn!(peer = peer.id(), error = %e, "sync_complete failed during pending drain");
        }
    }

    /// Enumerates the primary and mirrors it wholesale into `target`:
    /// every file streamed and written, then anything present on `target`
    /// but absent on the primary deleted.
    #[instrument(skip(self, target))]
    pub async fn full_sync_from_primary_to_target(&self, target: &Arc<SyncTarget>) -> Result<(), SyncError> {
        let Some(primary) = self.get_primary_target().await else {
            return Err(SyncError::InvalidOperation("no primary registered".into()));
        };

        let primary_items = self.list_all(&primary).await?;
        let target_items = self.list_all(target).await?;

        let primary_paths: std::collections::HashSet<_> = primary_items.iter().cloned().collect();

        target
            .notify_incoming_changes(&primary_items)
            .await?;

        for path in &primary_items {
            let metadata = primary.get_metadata(std::slice::from_ref(path)).await?;
            let Some(metadata) = metadata.into_iter().next() else {
                continue;
            };
            if metadata.kind == EntryKind::Directory {
                continue;
            }
            let stream = primary.get_file_content(path).await?;
            let info = FileChangeInfo::modify(path.clone(), metadata, primary.id(), 0);
            let change = FileChange::new(info, Some(stream));
            if let Err(e) = target.apply_file_change(change).await {
                target.sync_complete().await.ok();
                return Err(e);
            }
        }

        for path in &target_items {
            if !primary_paths.contains(path) {
                let info = FileChangeInfo::delete(path.clone(), primary.id(), 0);
                let change = FileChange::new(info, None);
                if let Err(e) = target.apply_file_change(change).await {
                    target.sync_complete().await.ok();
                    return Err(e);
                }
            }
        }

        target.sync_complete().await
    }

    async fn list_all(&self, target: &Arc<SyncTarget>) -> Result<Vec<TargetPath>, SyncError> {
        target.list_all_paths().await
    }

    /// Acknowledges the primary's current state by driving a full resync
    /// into every registered secondary. Best-effort across secondaries: one
    /// failing does not stop the rest, mirroring `handle_target_changes`'s
    /// never-fail-the-caller contract. Returns the first error seen, if any.
    #[instrument(skip(self))]
    pub async fn confirm_primary_sync(&self) -> Result<(), SyncError> {
        let secondaries = self.get_secondary_targets();
        let mut first_error = None;
        for secondary in &secondaries {
            if let Err(e) = self.full_sync_from_primary_to_target(secondary).await {
                warn!(target = secondary.id(), error = %e, "confirmPrimarySync failed for secondary");
                first_error.get_or_insert(e);
            } else {
                self.pending.remove(secondary.id());
                self.retry_counts.remove(secondary.id());
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drops `paths` from `target_id`'s pending queue without applying
    /// them. A `FullResyncRequired` marker carries no path list and is left
    /// untouched — only a concrete `Changes` queue can be filtered.
    pub fn reject_pending_sync(&self, target_id: &str, paths: &[TargetPath]) {
        let Some(mut entry) = self.pending.get_mut(target_id) else {
            return;
        };
        if let PendingEntry::Changes(changes) = entry.value_mut() {
            changes.retain(|c| !paths.contains(&c.path));
            if changes.is_empty() {
                drop(entry);
                self.pending.remove(target_id);
            }
        }
    }

    /// Re-initializes an already-registered target: clears its pending
    /// queue and retry count, forces it back to `idle` with a fresh
    /// snapshot (so the next poll re-detects its whole tree), and, for a
    /// secondary, re-seeds it with a full resync from the primary exactly
    /// as `add_secondary` would for a newly-registered one.
    #[instrument(skip(self))]
    pub async fn reinitialize_target(&self, id: &str) -> Result<(), SyncError> {
        let Some(target) = self.targets.get(id).map(|t| t.clone()) else {
            return Err(SyncError::InvalidOperation(format!("target '{id}' is not registered")));
        };

        self.pending.remove(id);
        self.retry_counts.remove(id);
        self.last_drain_attempt.remove(id);

        // `recover` force-resets to `idle` regardless of current status,
        // unlike `initialize`'s `transition_to` which only accepts
        // `uninitialized -> idle`.
        target.recover(RecoverStrategy::Clear).await?;

        if target.role() == TargetRole::Secondary {
            self.full_sync_from_primary_to_target(&target).await?;
        }
        Ok(())
    }

    pub async fn get_status(&self) -> ManagerStatus {
        let mut targets = HashMap::new();
        for entry in self.targets.iter() {
            targets.insert(entry.key().clone(), entry.value().get_state().await);
        }
        ManagerStatus {
            targets,
            current_failure: self.current_failure.lock().await.clone(),
        }
    }

    pub fn get_pending_sync(&self) -> PendingSync {
        let mut pending_by_target = HashMap::new();
        for entry in self.pending.iter() {
            pending_by_target.insert(entry.key().clone(), entry.value().clone());
        }
        PendingSync { pending_by_target }
    }

    /// Unwatches every target, clears pending queues, tolerates individual
    /// target dispose errors.
    pub async fn dispose(&self) {
        for entry in self.targets.iter() {
            entry.value().dispose().await;
        }
        self.pending.clear();
        self.retry_counts.clear();
        self.last_drain_attempt.clear();
        *self.current_failure.lock().await = None;
    }
}

/// Within one batch, a delete whose path is an ancestor of a later
/// create/modify in the same batch is moved after it, so a "delete dir,
/// recreate file in dir" sequence never races the recreate.
fn reorder_deletes_after_descendant_writes(batch: Vec<FileChangeInfo>) -> Vec<FileChangeInfo> {
    let (mut writes, mut deletes): (Vec<_>, Vec<_>) =
        batch.into_iter().partition(|c| c.change_type != ChangeType::Delete);
    writes.append(&mut deletes);
    writes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletes_move_after_writes_in_the_same_batch() {
        let batch = vec![
            FileChangeInfo::delete(TargetPath::new("a").unwrap(), "s", 1),
            FileChangeInfo::create(
                TargetPath::new("b").unwrap(),
                syncdrift_core::domain::FileMetadata::for_file(TargetPath::new("b").unwrap(), b"x", 1),
                "s",
                1,
            ),
        ];
        let reordered = reorder_deletes_after_descendant_writes(batch);
        assert_eq!(reordered[0].path.as_str(), "b");
        assert_eq!(reordered[1].path.as_str(), "a");
    }

    use syncdrift_core::domain::LockMode;
    use syncdrift_core::ports::FileSystem;
    use syncdrift_fs::LocalFileSystem;
    use tempfile::TempDir;

    fn target(id: &str, dir: &TempDir, role: TargetRole) -> (Arc<SyncTarget>, Arc<dyn FileSystem>) {
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new(dir.path()));
        let target = Arc::new(SyncTarget::new(
            id,
            role,
            fs.clone(),
            Duration::from_millis(50),
            Duration::from_millis(10),
            30_000,
        ));
        (target, fs)
    }

    #[tokio::test]
    async fn oversized_batch_is_split_but_every_change_still_lands() {
        let primary_dir = TempDir::new().unwrap();
        let secondary_dir = TempDir::new().unwrap();

        let (primary, primary_fs) = target("primary", &primary_dir, TargetRole::Primary);
        let (secondary, _) = target("secondary", &secondary_dir, TargetRole::Secondary);
        primary.initialize(crate::InitializeOptions::default(), None).await.unwrap();
        secondary.initialize(crate::InitializeOptions::default(), None).await.unwrap();

        let manager = FileSyncManager::new();
        manager.initialize(ManagerConfig { max_batch_size: 1, ..ManagerConfig::default() }).await;
        manager.register_target(primary.clone(), TargetRole::Primary).await.unwrap();
        manager.register_target(secondary.clone(), TargetRole::Secondary).await.unwrap();

        let mut batch = Vec::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let path = TargetPath::new(name).unwrap();
            primary_fs.write_file(&path, name.as_bytes(), 1000, true, Some("primary")).await.unwrap();
            let metadata = primary_fs.get_metadata(&path).await.unwrap();
            batch.push(FileChangeInfo::create(path, metadata, "primary", 1000));
        }

        manager.handle_target_changes("primary", batch).await;

        for name in ["a.txt", "b.txt", "c.txt"] {
            let meta = secondary.get_metadata(&[TargetPath::new(name).unwrap()]).await.unwrap();
            assert_eq!(meta[0].hash, syncdrift_core::domain::hex_sha256(name.as_bytes()));
        }
    }

    #[tokio::test]
    async fn exceeding_max_retries_escalates_to_full_resync_required() {
        let primary_dir = TempDir::new().unwrap();
        let secondary_dir = TempDir::new().unwrap();

        let (primary, primary_fs) = target("primary", &primary_dir, TargetRole::Primary);
        let (secondary, secondary_fs) = target("secondary", &secondary_dir, TargetRole::Secondary);
        primary.initialize(crate::InitializeOptions::default(), None).await.unwrap();
        secondary.initialize(crate::InitializeOptions::default(), None).await.unwrap();

        secondary_fs.lock(60_000, "external", LockMode::External, "external-owner").await.unwrap();

        let manager = FileSyncManager::new();
        manager.initialize(ManagerConfig { max_retries: 0, ..ManagerConfig::default() }).await;
        manager.register_target(primary.clone(), TargetRole::Primary).await.unwrap();
        manager.register_target(secondary.clone(), TargetRole::Secondary).await.unwrap();

        let path = TargetPath::new("r.txt").unwrap();
        primary_fs.write_file(&path, b"x", 1000, true, Some("primary")).await.unwrap();
        let metadata = primary_fs.get_metadata(&path).await.unwrap();
        manager
            .handle_target_changes("primary", vec![FileChangeInfo::create(path, metadata, "primary", 1000)])
            .await;

        let pending = manager.get_pending_sync();
        assert!(matches!(
            pending.pending_by_target.get("secondary"),
            Some(PendingEntry::FullResyncRequired)
        ));

        secondary_fs.force_unlock().await;
    }

    #[tokio::test]
    async fn reject_pending_sync_drops_only_the_named_paths() {
        let manager = FileSyncManager::new();
        manager.pending.insert(
            "secondary".to_string(),
            PendingEntry::Changes(vec![
                FileChangeInfo::create(
                    TargetPath::new("a.txt").unwrap(),
                    syncdrift_core::domain::FileMetadata::for_file(TargetPath::new("a.txt").unwrap(), b"a", 1),
                    "primary",
                    1,
                ),
                FileChangeInfo::create(
                    TargetPath::new("b.txt").unwrap(),
                    syncdrift_core::domain::FileMetadata::for_file(TargetPath::new("b.txt").unwrap(), b"b", 1),
                    "primary",
                    1,
                ),
            ]),
        );

        manager.reject_pending_sync("secondary", &[TargetPath::new("a.txt").unwrap()]);

        let pending = manager.get_pending_sync();
        match pending.pending_by_target.get("secondary") {
            Some(PendingEntry::Changes(changes)) => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].path.as_str(), "b.txt");
            }
            other => panic!("unexpected pending entry: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reject_pending_sync_clears_entry_once_empty() {
        let manager = FileSyncManager::new();
        let path = TargetPath::new("a.txt").unwrap();
        manager.pending.insert(
            "secondary".to_string(),
            PendingEntry::Changes(vec![FileChangeInfo::create(
                path.clone(),
                syncdrift_core::domain::FileMetadata::for_file(path.clone(), b"a", 1),
                "primary",
                1,
            )]),
        );

        manager.reject_pending_sync("secondary", &[path]);

        assert!(manager.get_pending_sync().pending_by_target.get("secondary").is_none());
    }

    #[tokio::test]
    async fn reject_pending_sync_leaves_full_resync_marker_untouched() {
        let manager = FileSyncManager::new();
        manager.pending.insert("secondary".to_string(), PendingEntry::FullResyncRequired);

        manager.reject_pending_sync("secondary", &[TargetPath::new("a.txt").unwrap()]);

        assert!(matches!(
            manager.get_pending_sync().pending_by_target.get("secondary"),
            Some(PendingEntry::FullResyncRequired)
        ));
    }

    #[tokio::test]
    async fn confirm_primary_sync_mirrors_primary_into_every_secondary_and_clears_pending() {
        let primary_dir = TempDir::new().unwrap();
        let secondary_dir = TempDir::new().unwrap();

        let (primary, primary_fs) = target("primary", &primary_dir, TargetRole::Primary);
        let (secondary, _) = target("secondary", &secondary_dir, TargetRole::Secondary);
        primary.initialize(crate::InitializeOptions::default(), None).await.unwrap();
        secondary.initialize(crate::InitializeOptions::default(), None).await.unwrap();

        primary_fs
            .write_file(&TargetPath::new("a.txt").unwrap(), b"hello", 1000, true, Some("primary"))
            .await
            .unwrap();

        let manager = FileSyncManager::new();
        manager.register_target(primary.clone(), TargetRole::Primary).await.unwrap();
        manager.register_target(secondary.clone(), TargetRole::Secondary).await.unwrap();
        manager.pending.insert("secondary".to_string(), PendingEntry::FullResyncRequired);

        manager.confirm_primary_sync().await.unwrap();

        let meta = secondary.get_metadata(&[TargetPath::new("a.txt").unwrap()]).await.unwrap();
        assert_eq!(meta[0].hash, syncdrift_core::domain::hex_sha256(b"hello"));
        assert!(manager.get_pending_sync().pending_by_target.get("secondary").is_none());
    }

    #[tokio::test]
    async fn reinitialize_target_reseeds_a_secondary_from_the_primary() {
        let primary_dir = TempDir::new().unwrap();
        let secondary_dir = TempDir::new().unwrap();

        let (primary, primary_fs) = target("primary", &primary_dir, TargetRole::Primary);
        let (secondary, _) = target("secondary", &secondary_dir, TargetRole::Secondary);
        primary.initialize(crate::InitializeOptions::default(), None).await.unwrap();
        secondary.initialize(crate::InitializeOptions::default(), None).await.unwrap();

        primary_fs
            .write_file(&TargetPath::new("a.txt").unwrap(), b"hello", 1000, true, Some("primary"))
            .await
            .unwrap();

        let manager = FileSyncManager::new();
        manager.register_target(primary.clone(), TargetRole::Primary).await.unwrap();
        manager.register_target(secondary.clone(), TargetRole::Secondary).await.unwrap();
        manager.retry_counts.insert("secondary".to_string(), 5);

        manager.reinitialize_target("secondary").await.unwrap();

        let meta = secondary.get_metadata(&[TargetPath::new("a.txt").unwrap()]).await.unwrap();
        assert_eq!(meta[0].hash, syncdrift_core::domain::hex_sha256(b"hello"));
        assert!(!manager.retry_counts.contains_key("secondary"));
    }

    #[tokio::test]
    async fn reinitialize_target_rejects_unregistered_id() {
        let manager = FileSyncManager::new();
        let err = manager.reinitialize_target("nope").await.unwrap_err();
        assert_eq!(err.kind(), "INVALID_OPERATION");
    }
}
