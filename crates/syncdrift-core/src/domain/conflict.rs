//! Conflict reporting.
//!
//! A [`FileConflict`] is produced when a peer's existing content hash
//! differs from the incoming change's metadata hash. It carries no
//! `incomingContent`/`currentContent` payload, only the identifying
//! path and targets.

use serde::{Deserialize, Serialize};

use super::path::TargetPath;

/// Reported by [`SyncTarget::apply_file_change`](crate) when the target's
/// existing content hash disagrees with the incoming metadata hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConflict {
    pub path: TargetPath,
    pub source_target: String,
    pub target_id: String,
    pub timestamp: i64,
}

impl FileConflict {
    pub fn new(
        path: TargetPath,
        source_target: impl Into<String>,
        target_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            path,
            source_target: source_target.into(),
            target_id: target_id.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_records_both_targets() {
        let conflict = FileConflict::new(
            TargetPath::new("c.txt").unwrap(),
            "primary",
            "secondary-1",
            2000,
        );
        assert_eq!(conflict.source_target, "primary");
        assert_eq!(conflict.target_id, "secondary-1");
    }
}
