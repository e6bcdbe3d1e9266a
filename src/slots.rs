use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Length of one frame, in whole minutes. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDuration(u32);

impl SlotDuration {
    pub const DEFAULT_MINUTES: u32 = 30;

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes > 0).then_some(Self(minutes))
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }
}

impl Default for SlotDuration {
    fn default() -> Self {
        Self(Self::DEFAULT_MINUTES)
    }
}

/// Slot start instants for one day, in local time.
///
/// Cloning yields an independent cursor, so the sequence can be replayed.
#[derive(Debug, Clone)]
pub struct DaySlots {
    cursor: NaiveDateTime,
    close: NaiveDateTime,
    step: Duration,
}

impl Iterator for DaySlots {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor + self.step > self.close {
            return None;
        }
        let current = self.cursor;
        self.cursor = current + self.step;
        Some(current)
    }
}

/// Slots from `open` up to (not including) `close` on `date`.
///
/// Only whole slots are produced: the last slot ends at or before `close`.
/// `open >= close` produces nothing.
pub fn day_slots(date: NaiveDate, open: NaiveTime, close: NaiveTime, slot: SlotDuration) -> DaySlots {
    DaySlots {
        cursor: date.and_time(open),
        close: date.and_time(close),
        step: slot.as_duration(),
    }
}
