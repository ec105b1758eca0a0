//! Domain model and port traits for the multi-target file synchronization
//! core.
//!
//! This crate has no I/O of its own: it defines the entities, the state
//! machine, the error taxonomy, and the `FileSystem`/`IgnoreService` ports
//! that `syncdrift-fs` and `syncdrift-sync` implement and drive.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::SyncError;
