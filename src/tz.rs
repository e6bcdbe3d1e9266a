use chrono::{Duration, NaiveDateTime};

/// Fixed conversion between the spaces' business-local wall clock and the
/// storage clock (UTC). No daylight saving: the offset never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneShift {
    /// Local minus storage, in seconds.
    offset_secs: i32,
}

impl TimezoneShift {
    /// Opening hours are kept in Japan Standard Time.
    pub const DEFAULT_OFFSET_HOURS: i32 = 9;

    /// `hours` is local minus storage. `None` outside -23..=23.
    pub fn from_hours(hours: i32) -> Option<Self> {
        (-23..=23).contains(&hours).then_some(Self {
            offset_secs: hours * 3600,
        })
    }

    pub fn offset_hours(&self) -> i32 {
        self.offset_secs / 3600
    }

    fn delta(&self) -> Duration {
        Duration::seconds(i64::from(self.offset_secs))
    }

    pub fn to_storage(&self, local: NaiveDateTime) -> NaiveDateTime {
        local - self.delta()
    }

    pub fn to_local(&self, storage: NaiveDateTime) -> NaiveDateTime {
        storage + self.delta()
    }
}

impl Default for TimezoneShift {
    fn default() -> Self {
        Self {
            offset_secs: Self::DEFAULT_OFFSET_HOURS * 3600,
        }
    }
}
