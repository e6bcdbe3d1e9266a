mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    Connect(String),
    Query(String),
    /// A row came back in a shape the adapter cannot read.
    Decode(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connect(e) => write!(f, "store connect error: {e}"),
            StoreError::Query(e) => write!(f, "store query error: {e}"),
            StoreError::Decode(e) => write!(f, "store decode error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence for spaces and frames. Every call is one request/response;
/// nothing spans calls, so a failed run may leave earlier statements applied.
#[async_trait]
pub trait FrameStore: Send + Sync {
    /// Active, non-deleted spaces with their weekly hours.
    async fn active_spaces(&self) -> Result<Vec<Space>, StoreError>;

    /// One row per space holding its most recent frame start, newest first.
    async fn latest_frame_starts(&self) -> Result<Vec<LatestFrame>, StoreError>;

    async fn insert_frames(&self, frames: &[NewFrame]) -> Result<Vec<FrameId>, StoreError>;

    /// Purge: frames starting before midnight of `cutoff`.
    async fn delete_frames_starting_before(&self, cutoff: NaiveDate) -> Result<Vec<FrameId>, StoreError>;

    /// Rollback: frames created strictly after `cutoff`.
    async fn delete_frames_created_after(&self, cutoff: NaiveDateTime) -> Result<Vec<FrameId>, StoreError>;

    /// Frames created strictly after `cutoff` whose status is no longer available.
    async fn claimed_frames_created_after(&self, cutoff: NaiveDateTime) -> Result<Vec<Frame>, StoreError>;
}
