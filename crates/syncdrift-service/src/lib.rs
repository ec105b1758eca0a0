//! Composition root: wires one primary [`FileSystem`] to a
//! [`FileSyncManager`] and owns the init/dispose lifecycle.

pub mod config;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, instrument};

use syncdrift_core::ports::FileSystem;
use syncdrift_fs::LocalFileSystem;
use syncdrift_sync::{FileSyncManager, InitializeOptions, ManagerConfig, SyncTarget};

use config::Config;

/// Thin façade: one primary target, one manager, an init/dispose guard.
pub struct FileManagementService {
    config: Config,
    manager: Arc<FileSyncManager>,
    primary: Arc<SyncTarget>,
    initialized: AtomicBool,
}

impl FileManagementService {
    /// Builds the service against `config` without touching the filesystem
    /// or manager state yet; call [`initialize`](Self::initialize) to bring
    /// it up.
    pub fn new(config: Config) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new(config.sync.root.clone()));
        let primary = Arc::new(SyncTarget::new(
            "primary",
            syncdrift_core::domain::TargetRole::Primary,
            fs,
            Duration::from_millis(config.sync.poll_interval_ms),
            Duration::from_millis(config.sync.debounce_delay_ms),
            config.sync.lock_timeout_ms,
        ));
        Self {
            config,
            manager: Arc::new(FileSyncManager::new()),
            primary,
            initialized: AtomicBool::new(false),
        }
    }

    /// Starts `target`'s watcher, spawning one task per settled batch so the
    /// non-async callback can drive the manager's async routing.
    async fn start_watching(&self, target: &Arc<SyncTarget>) {
        let manager = self.manager.clone();
        target
            .watch(move |source_id, batch| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager.handle_target_changes(&source_id, batch).await;
                });
            })
            .await;
    }

    /// Initializes the primary target's filesystem, then the manager, then
    /// registers the primary. Fatal if called twice.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> anyhow::Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            bail!("Service already initialized");
        }

        self.primary
            .initialize(InitializeOptions::default(), None)
            .await
            .context("primary target initialization failed")?;

        self.manager
            .initialize(ManagerConfig {
                inactivity_delay_ms: self.config.sync.inactivity_delay_ms,
                max_batch_size: self.config.sync.max_batch_size,
                max_retries: self.config.sync.max_retries,
            })
            .await;

        self.manager
            .register_target(self.primary.clone(), syncdrift_core::domain::TargetRole::Primary)
            .await
            .context("registering primary target failed")?;

        self.start_watching(&self.primary).await;

        info!(root = %self.config.sync.root.display(), "service initialized");
        Ok(())
    }

    /// Registers an additional secondary target rooted at `root`.
    #[instrument(skip(self))]
    pub async fn add_secondary(&self, id: &str, root: std::path::PathBuf) -> anyhow::Result<Arc<SyncTarget>> {
        self.require_initialized()?;

        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new(root));
        let target = Arc::new(SyncTarget::new(
            id,
            syncdrift_core::domain::TargetRole::Secondary,
            fs,
            Duration::from_millis(self.config.sync.poll_interval_ms),
            Duration::from_millis(self.config.sync.debounce_delay_ms),
            self.config.sync.lock_timeout_ms,
        ));
        target
            .initialize(InitializeOptions::default(), None)
            .await
            .context("secondary target initialization failed")?;
        self.manager
            .register_target(target.clone(), syncdrift_core::domain::TargetRole::Secondary)
            .await?;
        self.manager.full_sync_from_primary_to_target(&target).await?;
        self.start_watching(&target).await;
        Ok(target)
    }

    pub fn manager(&self) -> &FileSyncManager {
        &self.manager
    }

    pub fn primary(&self) -> &Arc<SyncTarget> {
        &self.primary
    }

    fn require_initialized(&self) -> anyhow::Result<()> {
        if !self.initialized.load(Ordering::SeqCst) {
            bail!("Service not initialized");
        }
        Ok(())
    }

    /// Unwatches and disposes every target, clears pending queues. Never
    /// fails the caller; manager errors are logged and swallowed.
    #[instrument(skip(self))]
    pub async fn dispose(&self) {
        self.manager.dispose().await;
        info!("service disposed");
    }
}
