use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Identifier the store assigns to a frame row at insert time. Opaque text.
pub type FrameId = String;

/// Frame status as stored. `0` is the only value the generator ever writes.
pub type FrameStatus = i32;

/// A frame nobody has claimed yet.
pub const STATUS_AVAILABLE: FrameStatus = 0;

/// Opening and closing time for one weekday. Either bound missing means closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayHours {
    pub open: Option<NaiveTime>,
    pub close: Option<NaiveTime>,
}

impl DayHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            open: Some(open),
            close: Some(close),
        }
    }

    pub fn closed() -> Self {
        Self::default()
    }
}

/// A bookable space and its weekly opening hours.
///
/// `week` is indexed Sunday-first: `week[0]` is Sunday, `week[6]` is Saturday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Space {
    pub id: String,
    pub shop_id: String,
    pub active: bool,
    pub deleted: bool,
    pub week: [DayHours; 7],
}

impl Space {
    pub fn new(id: impl Into<String>, shop_id: impl Into<String>, week: [DayHours; 7]) -> Self {
        Self {
            id: id.into(),
            shop_id: shop_id.into(),
            active: true,
            deleted: false,
            week,
        }
    }

    /// True when the space takes part in frame generation.
    pub fn is_live(&self) -> bool {
        self.active && !self.deleted
    }
}

/// A frame row as it exists in the store. Timestamps are storage time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub id: FrameId,
    pub space_id: String,
    pub shop_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: FrameStatus,
    pub created_at: NaiveDateTime,
}

impl Frame {
    pub fn is_available(&self) -> bool {
        self.status == STATUS_AVAILABLE
    }
}

/// A frame row waiting to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFrame {
    pub space_id: String,
    pub shop_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: FrameStatus,
    pub created_at: NaiveDateTime,
}

impl NewFrame {
    pub fn into_frame(self, id: FrameId) -> Frame {
        Frame {
            id,
            space_id: self.space_id,
            shop_id: self.shop_id,
            start: self.start,
            end: self.end,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Most recent frame start for one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestFrame {
    pub space_id: String,
    pub start: NaiveDateTime,
}
