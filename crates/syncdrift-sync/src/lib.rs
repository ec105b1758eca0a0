//! `SyncTarget` state machine, polling watcher, and the `FileSyncManager`
//! change router that keeps every registered target converged on the
//! primary.

pub mod manager;
pub mod target;
pub mod watcher;

pub use manager::{CurrentFailure, FileSyncManager, ManagerConfig, ManagerStatus};
pub use target::{InitializeOptions, RecoverStrategy, ResolveFromPrimary, SyncTarget};
pub use watcher::{DebouncedChangeQueue, PollingWatcher, WatchHandle};
