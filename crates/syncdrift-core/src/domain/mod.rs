//! Domain entities: the data model of §3.

pub mod change;
pub mod chunk;
pub mod conflict;
pub mod metadata;
pub mod path;
pub mod pending;
pub mod target_state;

pub use change::{ChangeType, FileChange, FileChangeInfo};
pub use chunk::{FileChunk, FileContentStream};
pub use conflict::FileConflict;
pub use metadata::{hex_sha256, EntryKind, FileMetadata};
pub use path::TargetPath;
pub use pending::{PendingEntry, PendingSync};
pub use target_state::{LockMode, LockState, TargetRole, TargetState, TargetStatus};
