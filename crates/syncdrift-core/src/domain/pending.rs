//! Per-peer queue of changes that failed to apply and are awaiting retry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::change::FileChangeInfo;

/// A queue entry: either a concrete list of unapplied changes, or a
/// synthetic marker recorded once the queue for a target overflows its
/// bound, meaning the target needs a full resync instead of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingEntry {
    Changes(Vec<FileChangeInfo>),
    FullResyncRequired,
}

/// Snapshot of every target's pending (unapplied) changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingSync {
    pub pending_by_target: HashMap<String, PendingEntry>,
}

impl PendingSync {
    pub fn is_empty(&self) -> bool {
        self.pending_by_target.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_by_default() {
        assert!(PendingSync::default().is_empty());
    }
}
