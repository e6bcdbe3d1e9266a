use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use crate::model::Space;

/// Opening hours for one weekday as seen by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hours {
    Open { open: NaiveTime, close: NaiveTime },
    Closed,
}

/// Hours for a Sunday-first weekday index (0 = Sunday .. 6 = Saturday).
/// Out-of-range indices are reported as closed.
pub fn hours_for_index(space: &Space, weekday: usize) -> Hours {
    match space.week.get(weekday) {
        Some(day) => match (day.open, day.close) {
            (Some(open), Some(close)) => Hours::Open { open, close },
            _ => Hours::Closed,
        },
        None => Hours::Closed,
    }
}

pub fn hours_for(space: &Space, weekday: Weekday) -> Hours {
    hours_for_index(space, weekday.num_days_from_sunday() as usize)
}

pub fn hours_on(space: &Space, date: NaiveDate) -> Hours {
    hours_for(space, date.weekday())
}
