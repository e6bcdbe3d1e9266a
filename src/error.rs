use chrono::NaiveDateTime;

use crate::config::ConfigError;
use crate::store::StoreError;

/// The single error a batch run reports.
#[derive(Debug)]
pub enum BatchError {
    Config(ConfigError),
    /// Frames from an incomplete earlier run were claimed before this retry.
    RecoveryConflict { cutoff: NaiveDateTime, claimed: usize },
    Store(StoreError),
}

impl BatchError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchError::Config(_) => "config",
            BatchError::RecoveryConflict { .. } => "recovery_conflict",
            BatchError::Store(_) => "store",
        }
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::Config(e) => write!(f, "{e}"),
            BatchError::RecoveryConflict { cutoff, claimed } => write!(
                f,
                "batch error occurred. --remove incomplete frames ({claimed} claimed since {cutoff})"
            ),
            BatchError::Store(e) => write!(f, "batch error occurred. --{e}"),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::Config(e) => Some(e),
            BatchError::Store(e) => Some(e),
            BatchError::RecoveryConflict { .. } => None,
        }
    }
}

impl From<ConfigError> for BatchError {
    fn from(e: ConfigError) -> Self {
        BatchError::Config(e)
    }
}

impl From<StoreError> for BatchError {
    fn from(e: StoreError) -> Self {
        BatchError::Store(e)
    }
}
