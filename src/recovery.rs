use chrono::{Days, NaiveDateTime, NaiveTime};
use tracing::{error, info};

use crate::config::{ConfigError, DELETE_START_DATE_SPACE_FRAME};
use crate::error::BatchError;
use crate::model::FrameId;
use crate::store::FrameStore;

/// Where a run stands with respect to rolling back a previous attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryState {
    /// Nothing to roll back; generation may proceed.
    Clean,
    /// Frames created after `cutoff` belong to an incomplete earlier run.
    Retrying { cutoff: NaiveDateTime },
    /// Some of those frames were already claimed. Terminal.
    Aborted { cutoff: NaiveDateTime, claimed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    NotRequested,
    RolledBack { cutoff: NaiveDateTime, removed: Vec<FrameId> },
}

/// Midnight of the storage date `days` away from `now`, or `None` when that
/// date is outside the calendar.
pub fn rollback_cutoff(now: NaiveDateTime, days: i64) -> Option<NaiveDateTime> {
    let shift = Days::new(days.unsigned_abs());
    let date = if days < 0 {
        now.date().checked_sub_days(shift)
    } else {
        now.date().checked_add_days(shift)
    };
    date.map(|d| d.and_time(NaiveTime::MIN))
}

pub struct RecoveryController {
    state: RecoveryState,
}

impl RecoveryController {
    pub fn new(retry: bool, now: NaiveDateTime, delete_offset_days: i64) -> Result<Self, ConfigError> {
        let state = if retry {
            let cutoff = rollback_cutoff(now, delete_offset_days)
                .ok_or(ConfigError::InvalidData(DELETE_START_DATE_SPACE_FRAME))?;
            RecoveryState::Retrying { cutoff }
        } else {
            RecoveryState::Clean
        };
        Ok(Self { state })
    }

    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    /// Roll back the incomplete batch if this is a retry run.
    ///
    /// Checks for claimed frames first and deletes nothing if any exist.
    pub async fn recover(&mut self, store: &dyn FrameStore) -> Result<RecoveryOutcome, BatchError> {
        let cutoff = match &self.state {
            RecoveryState::Clean => return Ok(RecoveryOutcome::NotRequested),
            RecoveryState::Retrying { cutoff } => *cutoff,
            RecoveryState::Aborted { cutoff, claimed } => {
                return Err(BatchError::RecoveryConflict { cutoff: *cutoff, claimed: *claimed });
            }
        };

        let claimed = store.claimed_frames_created_after(cutoff).await?;
        if !claimed.is_empty() {
            error!(%cutoff, claimed = claimed.len(), "incomplete frames already claimed, aborting");
            self.state = RecoveryState::Aborted { cutoff, claimed: claimed.len() };
            return Err(BatchError::RecoveryConflict { cutoff, claimed: claimed.len() });
        }

        let removed = store.delete_frames_created_after(cutoff).await?;
        info!(%cutoff, rows = removed.len(), "removed incomplete frames");
        metrics::counter!(crate::observability::FRAMES_ROLLED_BACK_TOTAL).increment(removed.len() as u64);
        self.state = RecoveryState::Clean;
        Ok(RecoveryOutcome::RolledBack { cutoff, removed })
    }
}
