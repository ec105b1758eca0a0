//! Polling watcher: lists a target's tree on a fixed interval, diffs it
//! against the previous snapshot, and coalesces the result through a short
//! debounce window before handing a batch to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, instrument, warn};

use syncdrift_core::domain::{ChangeType, EntryKind, FileChangeInfo, FileMetadata, TargetPath};
use syncdrift_core::error::SyncError;
use syncdrift_core::ports::{FileSystem, FileSystemItem, IgnoreService};

/// An in-flight change waiting out the debounce window before it is
/// flushed to the caller. Re-detecting the same path resets its timer,
/// mirroring how a burst of writes to one file collapses into one change.
#[derive(Debug)]
pub struct DebouncedChangeQueue {
    pending: HashMap<TargetPath, (FileChangeInfo, Instant)>,
    debounce: Duration,
}

impl DebouncedChangeQueue {
    pub fn new(debounce: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            debounce,
        }
    }

    pub fn push(&mut self, change: FileChangeInfo) {
        self.pending.insert(change.path.clone(), (change, Instant::now()));
    }

    /// Removes and returns every entry whose debounce window has elapsed,
    /// in path order (stable, arbitrary but deterministic for tests).
    pub fn poll(&mut self) -> Vec<FileChangeInfo> {
        let now = Instant::now();
        let ready: Vec<TargetPath> = self
            .pending
            .iter()
            .filter(|(_, (_, seen))| now.duration_since(*seen) >= self.debounce)
            .map(|(path, _)| path.clone())
            .collect();

        let mut flushed: Vec<FileChangeInfo> = ready
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|(change, _)| change))
            .collect();
        flushed.sort_by(|a, b| a.path.as_str().cmp(b.path.as_str()));
        flushed
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// RAII handle returned by [`PollingWatcher::start`]. Dropping it, or
/// calling [`unwatch`](WatchHandle::unwatch) explicitly, stops the polling
/// task. Idempotent: a second `unwatch` is a no-op.
pub struct WatchHandle {
    cleanup: std::sync::Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl WatchHandle {
    pub fn new(cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cleanup: std::sync::Mutex::new(Some(Box::new(cleanup))),
        }
    }

    pub fn unwatch(&self) {
        if let Some(cleanup) = self.cleanup.lock().expect("poisoned").take() {
            cleanup();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.unwatch();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").finish()
    }
}

/// Fixed-interval recursive poller for one target's root.
pub struct PollingWatcher {
    source_id: String,
    fs: Arc<dyn FileSystem>,
    ignore: Arc<RwLock<dyn IgnoreService>>,
    snapshot: Mutex<HashMap<TargetPath, FileMetadata>>,
    queue: Mutex<DebouncedChangeQueue>,
    running: AtomicBool,
    poll_interval: Duration,
}

impl PollingWatcher {
    pub fn new(
        source_id: impl Into<String>,
        fs: Arc<dyn FileSystem>,
        ignore: Arc<RwLock<dyn IgnoreService>>,
        poll_interval: Duration,
        debounce_delay: Duration,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            fs,
            ignore,
            snapshot: Mutex::new(HashMap::new()),
            queue: Mutex::new(DebouncedChangeQueue::new(debounce_delay)),
            running: AtomicBool::new(false),
            poll_interval,
        }
    }

    /// Discards the in-memory snapshot so the next tick re-detects every
    /// present file as a `create`. Used by `SyncTarget::recover`.
    pub async fn reset_snapshot(&self) {
        self.snapshot.lock().await.clear();
    }

    async fn list_recursive(&self, root: &TargetPath) -> Result<Vec<FileSystemItem>, SyncError> {
        let mut out = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            for item in self.fs.list_directory(&dir).await? {
                if item.kind == EntryKind::Directory {
                    stack.push(item.path.clone());
                }
                out.push(item);
            }
        }
        Ok(out)
    }

    /// One poll cycle: skip if the previous tick is still in flight, walk
    /// the tree, diff against the snapshot, push raw changes into the
    /// debounce queue, then return whatever has settled past the debounce
    /// window.
    #[instrument(skip(self), fields(source = %self.source_id))]
    pub async fn tick(&self) -> Vec<FileChangeInfo> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("previous tick still running, skipping");
            return Vec::new();
        }

        let result = self.tick_inner().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn tick_inner(&self) -> Vec<FileChangeInfo> {
        let items = match self.list_recursive(&TargetPath::root()).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "watcher listing failed");
                return Vec::new();
            }
        };

        let mut current = HashMap::new();
        for item in items {
            if item.kind != EntryKind::File {
                continue;
            }
            if self.ignore.read().await.is_ignored(&item.path) {
                continue;
            }
            match self.fs.get_metadata(&item.path).await {
                Ok(meta) => {
                    current.insert(item.path, meta);
                }
                Err(e) => warn!(path = %item.path, error = %e, "metadata read failed during poll"),
            }
        }

        let mut snapshot = self.snapshot.lock().await;
        let mut queue = self.queue.lock().await;
        let now = chrono::Utc::now().timestamp_millis();

        for (path, meta) in &current {
            match snapshot.get(path) {
                None => queue.push(FileChangeInfo::create(
                    path.clone(),
                    meta.clone(),
                    self.source_id.clone(),
                    now,
                )),
                Some(prev) if prev.last_modified < meta.last_modified => {
                    queue.push(FileChangeInfo::modify(
                        path.clone(),
                        meta.clone(),
                        self.source_id.clone(),
                        now,
                    ))
                }
                _ => {}
            }
        }
        for path in snapshot.keys() {
            if !current.contains_key(path) {
                queue.push(FileChangeInfo::delete(path.clone(), self.source_id.clone(), now));
            }
        }

        *snapshot = current;
        queue.poll()
    }

    /// Spawns the polling loop. The loop exits once `stop` fires; settled
    /// batches are sent on `sender`. Returns a [`WatchHandle`] that
    /// triggers the stop signal on drop.
    pub fn start(self: Arc<Self>, sender: mpsc::Sender<Vec<FileChangeInfo>>) -> WatchHandle {
        let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
        let watcher = self.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(watcher.poll_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let batch = watcher.tick().await;
                        if !batch.is_empty() && sender.send(batch).await.is_err() {
                            break;
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        WatchHandle::new(move || {
            let _ = stop_tx.send(true);
            task.abort();
        })
    }
}
