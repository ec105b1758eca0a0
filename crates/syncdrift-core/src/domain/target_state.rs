//! `SyncTarget` state machine and observability shapes.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Role assigned at registration. At most one primary per manager; a
/// secondary's writes may never overwrite the primary unless the change
/// originated there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRole {
    Primary,
    Secondary,
}

/// Lock acquisition mode: `external` callers are blocked by a held lock
/// unless they are the owner; `sync` is the mode the target itself uses
/// while applying changes (its own writes bypass via `is_sync_operation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    External,
    Sync,
}

/// Current lock state of a target's underlying `FileSystem`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub is_locked: bool,
    pub mode: Option<LockMode>,
    pub owner: Option<String>,
}

impl LockState {
    pub fn unlocked() -> Self {
        Self::default()
    }

    pub fn locked(mode: LockMode, owner: impl Into<String>) -> Self {
        Self {
            is_locked: true,
            mode: Some(mode),
            owner: Some(owner.into()),
        }
    }
}

/// The `SyncTarget` state machine's legal states.
///
/// Legal transitions:
/// `uninitialized -initialize-> idle`,
/// `idle -notify_incoming_changes-> collecting`,
/// `collecting -apply_file_change-> syncing`,
/// `syncing -sync_complete-> idle`,
/// `{collecting,syncing} -failure-> error`.
/// `error -recover-> idle` is not one of these: it is a forced reset
/// ([`TargetState::recover_to_idle`]), not a guarded transition, so a
/// target can only leave `error` through `recover()`.
/// All other transitions are illegal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Uninitialized,
    Idle,
    Collecting,
    Notifying,
    Syncing,
    Error,
}

impl TargetStatus {
    /// Whether `self -> next` is a legal transition per the state machine.
    pub fn can_transition_to(&self, next: TargetStatus) -> bool {
        use TargetStatus::*;
        matches!(
            (*self, next),
            (Uninitialized, Idle)
                | (Idle, Collecting)
                | (Idle, Notifying)
                | (Notifying, Collecting)
                | (Collecting, Syncing)
                | (Syncing, Idle)
                | (Collecting, Error)
                | (Syncing, Error)
        )
    }
}

/// Observable state of one registered target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetState {
    pub id: String,
    pub role: TargetRole,
    pub status: TargetStatus,
    pub pending_changes: usize,
    pub lock_state: LockState,
    pub error: Option<String>,
}

impl TargetState {
    pub fn new(id: impl Into<String>, role: TargetRole) -> Self {
        Self {
            id: id.into(),
            role,
            status: TargetStatus::Uninitialized,
            pending_changes: 0,
            lock_state: LockState::unlocked(),
            error: None,
        }
    }

    /// Applies a transition, returning an error if illegal. On success the
    /// `error` field is cleared unless the new status is `Error`.
    pub fn transition_to(&mut self, next: TargetStatus) -> Result<(), SyncError> {
        if !self.status.can_transition_to(next) {
            return Err(SyncError::InvalidOperation(format!(
                "illegal transition {:?} -> {:?} for target {}",
                self.status, next, self.id
            )));
        }
        self.status = next;
        if next != TargetStatus::Error {
            self.error = None;
        }
        Ok(())
    }

    /// Force-transitions to `error`, recording the cause. Used by the
    /// `failure` edge, which is reachable from any in-flight state.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = TargetStatus::Error;
        self.error = Some(reason.into());
        self.lock_state = LockState::unlocked();
    }

    /// The only way out of `error`: used exclusively by `SyncTarget::recover`.
    /// Unlike `transition_to`, this is not gated by `can_transition_to` — it
    /// is the recovery edge itself, not a state a caller can reach any other
    /// way (in particular, `sync_complete` can never reset an errored target).
    pub fn recover_to_idle(&mut self) {
        self.status = TargetStatus::Idle;
        self.error = None;
    }
}
