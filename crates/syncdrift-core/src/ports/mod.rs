//! Port traits: the boundaries `syncdrift-fs` and `syncdrift-sync`
//! implement or consume.

pub mod file_system;
pub mod ignore_service;

pub use file_system::{CreateDirectoryOptions, DeleteOptions, FileSystem, FileSystemItem};
pub use ignore_service::{GlobIgnoreService, IgnoreService};
