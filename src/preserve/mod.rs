//! Migration preserver.
//!
//! A destructive schema upgrade loses the state the provider does not track:
//! favorite flags and group memberships. The preserver bridges the upgrade
//! in two phases:
//!
//! - **Capture** runs inside the upgrade transaction, before the legacy
//!   tables are dropped. It reads what it can, keyed by old contact id, and
//!   stages one row per contact worth preserving.
//! - **Restore** runs once, after the next sync pass has repopulated
//!   contacts under their new ids. Each staged row is matched by phone,
//!   then email, then name, and its state re-attached.
//!
//! The staging table is the hand-off channel. Its existence means a
//! restoration is pending; it is dropped at the end of every restoration
//! attempt, successful or not.
//!
//! ```text
//! PendingCapture ──capture──▶ Staged ──restore──▶ Restored
//!                                    └──unreadable──▶ Abandoned
//! ```

mod capture;
mod restore;
pub mod staging;

use crate::error::{Error, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub use capture::{capture, stage, CapturedState};
pub use restore::restore;

/// Where a schema hand-off currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    PendingCapture,
    Staged,
    Restored,
    Abandoned,
}

impl MigrationPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingCapture => "pending_capture",
            Self::Staged => "staged",
            Self::Restored => "restored",
            Self::Abandoned => "abandoned",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Restored | Self::Abandoned)
    }

    /// Move to `next`, rejecting transitions the hand-off does not allow.
    ///
    /// # Errors
    ///
    /// Returns an error for any transition other than
    /// `PendingCapture -> Staged` and `Staged -> Restored | Abandoned`.
    pub fn advance(self, next: Self) -> Result<Self> {
        let allowed = matches!(
            (self, next),
            (Self::PendingCapture, Self::Staged)
                | (Self::Staged, Self::Restored | Self::Abandoned)
        );
        if allowed {
            Ok(next)
        } else {
            Err(Error::Other(format!(
                "Invalid migration phase transition: {} -> {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

/// Current hand-off phase, or `None` when nothing is staged.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn pending_phase(conn: &Connection) -> Result<Option<MigrationPhase>> {
    Ok(staging::exists(conn)?.then_some(MigrationPhase::Staged))
}

/// What the capture phase managed to read and stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTally {
    pub contacts_read: usize,
    pub phones_read: usize,
    pub emails_read: usize,
    pub groups_preserved: usize,
    pub memberships_read: usize,
    pub entries_staged: usize,
    /// Legacy reads that failed and were skipped
    pub reads_failed: usize,
}

/// Outcome of a restoration attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Terminal phase reached, or `None` when nothing was staged.
    pub phase: Option<MigrationPhase>,
    /// Staged entries matched to a current contact.
    pub restored: usize,
    /// Staged entries with no matching contact (dropped).
    pub unmatched: usize,
    pub favorites_restored: usize,
    pub memberships_restored: usize,
    /// Memberships that could not be written (logged and skipped).
    pub memberships_skipped: usize,
}

impl RestoreReport {
    /// Report for a store with no pending restoration.
    #[must_use]
    pub fn nothing_pending() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        let staged = MigrationPhase::PendingCapture
            .advance(MigrationPhase::Staged)
            .unwrap();
        assert_eq!(
            staged.advance(MigrationPhase::Restored).unwrap(),
            MigrationPhase::Restored
        );
        assert_eq!(
            staged.advance(MigrationPhase::Abandoned).unwrap(),
            MigrationPhase::Abandoned
        );

        assert!(MigrationPhase::Restored
            .advance(MigrationPhase::Staged)
            .is_err());
        assert!(MigrationPhase::PendingCapture
            .advance(MigrationPhase::Restored)
            .is_err());
        assert!(MigrationPhase::Abandoned.is_terminal());
        assert!(!MigrationPhase::Staged.is_terminal());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&MigrationPhase::PendingCapture).unwrap();
        assert_eq!(json, "\"pending_capture\"");
    }
}
