use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::{FrameStore, StoreError};

/// Process-local store. Backs the test suite and the planner benchmark.
pub struct InMemoryStore {
    spaces: DashMap<String, Space>,
    frames: DashMap<FrameId, Frame>,
    fail_writes: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            spaces: DashMap::new(),
            frames: DashMap::new(),
            fail_writes: AtomicBool::new(false),
        }
    }

    // ── Seeding & inspection ─────────────────────────────────

    pub fn put_space(&self, space: Space) {
        self.spaces.insert(space.id.clone(), space);
    }

    pub fn put_frame(&self, frame: Frame) {
        self.frames.insert(frame.id.clone(), frame);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn get_frame(&self, id: &FrameId) -> Option<Frame> {
        self.frames.get(id).map(|e| e.value().clone())
    }

    /// Frames for one space, ordered by start.
    pub fn frames_for(&self, space_id: &str) -> Vec<Frame> {
        let mut out: Vec<Frame> = self
            .frames
            .iter()
            .filter(|e| e.value().space_id == space_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|f| f.start);
        out
    }

    /// Simulate downstream booking activity.
    pub fn set_status(&self, id: &FrameId, status: FrameStatus) -> bool {
        match self.frames.get_mut(id) {
            Some(mut frame) => {
                frame.status = status;
                true
            }
            None => false,
        }
    }

    /// Make every following write fail, for exercising error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Query("writes disabled".into()));
        }
        Ok(())
    }

    fn remove_where(&self, pred: impl Fn(&Frame) -> bool) -> Vec<FrameId> {
        let ids: Vec<FrameId> = self
            .frames
            .iter()
            .filter(|e| pred(e.value()))
            .map(|e| e.key().clone())
            .collect();
        for id in &ids {
            self.frames.remove(id);
        }
        ids
    }
}

#[async_trait]
impl FrameStore for InMemoryStore {
    async fn active_spaces(&self) -> Result<Vec<Space>, StoreError> {
        let mut spaces: Vec<Space> = self
            .spaces
            .iter()
            .filter(|e| e.value().is_live())
            .map(|e| e.value().clone())
            .collect();
        spaces.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(spaces)
    }

    async fn latest_frame_starts(&self) -> Result<Vec<LatestFrame>, StoreError> {
        let mut latest: HashMap<String, NaiveDateTime> = HashMap::new();
        for entry in self.frames.iter() {
            let f = entry.value();
            latest
                .entry(f.space_id.clone())
                .and_modify(|s| *s = (*s).max(f.start))
                .or_insert(f.start);
        }
        let mut rows: Vec<LatestFrame> = latest
            .into_iter()
            .map(|(space_id, start)| LatestFrame { space_id, start })
            .collect();
        rows.sort_by(|a, b| b.start.cmp(&a.start).then_with(|| a.space_id.cmp(&b.space_id)));
        Ok(rows)
    }

    async fn insert_frames(&self, frames: &[NewFrame]) -> Result<Vec<FrameId>, StoreError> {
        self.check_writable()?;
        let mut ids = Vec::with_capacity(frames.len());
        for nf in frames {
            let id = Ulid::new().to_string();
            self.frames.insert(id.clone(), nf.clone().into_frame(id.clone()));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn delete_frames_starting_before(&self, cutoff: NaiveDate) -> Result<Vec<FrameId>, StoreError> {
        self.check_writable()?;
        let cutoff = cutoff.and_time(NaiveTime::MIN);
        Ok(self.remove_where(|f| f.start < cutoff))
    }

    async fn delete_frames_created_after(&self, cutoff: NaiveDateTime) -> Result<Vec<FrameId>, StoreError> {
        self.check_writable()?;
        Ok(self.remove_where(|f| f.created_at > cutoff))
    }

    async fn claimed_frames_created_after(&self, cutoff: NaiveDateTime) -> Result<Vec<Frame>, StoreError> {
        Ok(self
            .frames
            .iter()
            .filter(|e| e.value().created_at > cutoff && !e.value().is_available())
            .map(|e| e.value().clone())
            .collect())
    }
}
