use std::collections::HashMap;

use chrono::{Days, Months, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::calendar::{hours_on, Hours};
use crate::config::{GenerationConfig, Step, StepUnit};
use crate::model::*;
use crate::slots::{day_slots, SlotDuration};
use crate::tz::TimezoneShift;

/// Everything one generation run needs to decide what to insert.
/// Built once per run and never mutated.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Run time in storage time; stamped on every new frame.
    pub now: NaiveDateTime,
    /// Run date on the local wall clock.
    pub today: NaiveDate,
    /// First local date that does not need coverage.
    pub horizon: NaiveDate,
    pub offset_months: u32,
    pub step: Step,
    pub slot: SlotDuration,
    pub tz: TimezoneShift,
    /// Latest materialized frame start per space, storage time.
    pub coverage: HashMap<String, NaiveDateTime>,
}

impl RunContext {
    pub fn new(config: &GenerationConfig, now: NaiveDateTime, latest: Vec<LatestFrame>) -> Self {
        let today = config.tz.to_local(now).date();
        let mut coverage: HashMap<String, NaiveDateTime> = HashMap::with_capacity(latest.len());
        for row in latest {
            coverage
                .entry(row.space_id)
                .and_modify(|s| *s = (*s).max(row.start))
                .or_insert(row.start);
        }
        Self {
            now,
            today,
            horizon: add_months(today, config.offset_months),
            offset_months: config.offset_months,
            step: config.step.clone(),
            slot: config.slot,
            tz: config.tz,
            coverage,
        }
    }
}

/// What the planner decided for one space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpacePlan {
    /// No frames yet: cover `[from, until)` in one pass.
    Bootstrap { from: NaiveDate, until: NaiveDate },
    /// Extend existing coverage over `[from, until)`.
    Extend { from: NaiveDate, until: NaiveDate },
    /// Already covered up to the horizon.
    Covered { next: NaiveDate },
    /// Step unit not understood; nothing generated.
    Skipped,
}

impl SpacePlan {
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            SpacePlan::Bootstrap { from, until } | SpacePlan::Extend { from, until } => Some((from, until)),
            SpacePlan::Covered { .. } | SpacePlan::Skipped => None,
        }
    }
}

pub fn classify(ctx: &RunContext, space: &Space) -> SpacePlan {
    let Some(latest) = ctx.coverage.get(&space.id) else {
        return SpacePlan::Bootstrap {
            from: ctx.today,
            until: add_months(ctx.today, ctx.offset_months),
        };
    };

    let next = add_days(ctx.tz.to_local(*latest).date(), 1);
    if next >= ctx.horizon {
        return SpacePlan::Covered { next };
    }

    let until = match &ctx.step.unit {
        StepUnit::Day => add_days(next, u64::from(ctx.step.size)),
        StepUnit::Month => add_months(next, ctx.step.size),
        StepUnit::Unrecognized(_) => return SpacePlan::Skipped,
    };
    SpacePlan::Extend { from: next, until }
}

/// Local slot starts for `space` over `[from, until)`.
///
/// The walk ends at the first closed day; later open days are not visited.
pub fn expand(space: &Space, from: NaiveDate, until: NaiveDate, slot: SlotDuration) -> Vec<NaiveDateTime> {
    let mut starts = Vec::new();
    for date in from.iter_days().take_while(|d| *d < until) {
        match hours_on(space, date) {
            Hours::Open { open, close } => {
                let before = starts.len();
                starts.extend(day_slots(date, open, close, slot));
                if starts.len() == before && open >= close {
                    warn!(space = %space.id, %date, %open, %close, "closing time not after opening time, no frames");
                }
            }
            Hours::Closed => {
                debug!(space = %space.id, %date, "closed day, stopping walk");
                break;
            }
        }
    }
    starts
}

/// Frames to insert so every live space reaches the coverage horizon.
pub fn plan_frames(ctx: &RunContext, spaces: &[Space]) -> Vec<NewFrame> {
    let step = ctx.slot.as_duration();
    let mut rows = Vec::new();

    for space in spaces.iter().filter(|s| s.is_live()) {
        let plan = classify(ctx, space);
        match &plan {
            SpacePlan::Bootstrap { .. } => {
                info!(space = %space.id, months = ctx.offset_months, "new space found");
                metrics::counter!(crate::observability::SPACES_TOTAL, "plan" => "bootstrap").increment(1);
            }
            SpacePlan::Extend { from, until } => {
                debug!(space = %space.id, %from, %until, "extending coverage");
                metrics::counter!(crate::observability::SPACES_TOTAL, "plan" => "extend").increment(1);
            }
            SpacePlan::Covered { next } => {
                debug!(space = %space.id, %next, horizon = %ctx.horizon, "frames already created, skipping");
                metrics::counter!(crate::observability::SPACES_TOTAL, "plan" => "covered").increment(1);
            }
            SpacePlan::Skipped => {
                warn!(space = %space.id, unit = %ctx.step.unit, "unrecognized step unit, no frames generated");
                metrics::counter!(crate::observability::SPACES_TOTAL, "plan" => "skipped").increment(1);
            }
        }

        let Some((from, until)) = plan.range() else {
            continue;
        };
        rows.extend(expand(space, from, until, ctx.slot).into_iter().map(|local| NewFrame {
            space_id: space.id.clone(),
            shop_id: space.shop_id.clone(),
            start: ctx.tz.to_storage(local),
            end: ctx.tz.to_storage(local + step),
            status: STATUS_AVAILABLE,
            created_at: ctx.now,
        }));
    }

    metrics::counter!(crate::observability::FRAMES_PLANNED_TOTAL).increment(rows.len() as u64);
    rows
}

/// Calendar month addition; the day clamps to the end of a shorter month.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(NaiveDate::MAX)
}

pub fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, NaiveTime, Weekday};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn every_day(open: NaiveTime, close: NaiveTime) -> Space {
        Space::new("sp1", "shop1", [DayHours::new(open, close); 7])
    }

    /// 2024-06-10 (Monday) 10:00 local, expressed in storage time.
    fn now() -> NaiveDateTime {
        date(2024, 6, 10).and_hms_opt(1, 0, 0).unwrap()
    }

    fn ctx(config: &GenerationConfig, latest: Vec<LatestFrame>) -> RunContext {
        RunContext::new(config, now(), latest)
    }

    fn latest(space: &str, local: NaiveDateTime) -> LatestFrame {
        LatestFrame {
            space_id: space.into(),
            start: TimezoneShift::default().to_storage(local),
        }
    }

    #[test]
    fn context_uses_local_date_for_today_and_horizon() {
        // 2024-06-10 20:00 storage is already 06-11 05:00 local.
        let late = date(2024, 6, 10).and_hms_opt(20, 0, 0).unwrap();
        let c = RunContext::new(&GenerationConfig::default(), late, vec![]);
        assert_eq!(c.today, date(2024, 6, 11));
        assert_eq!(c.horizon, date(2024, 9, 11));
    }

    #[test]
    fn context_keeps_latest_start_per_space() {
        let cfg = GenerationConfig::default();
        let a = date(2024, 7, 1).and_hms_opt(0, 0, 0).unwrap();
        let b = date(2024, 7, 5).and_hms_opt(0, 0, 0).unwrap();
        let c = ctx(&cfg, vec![
            LatestFrame { space_id: "sp1".into(), start: a },
            LatestFrame { space_id: "sp1".into(), start: b },
        ]);
        assert_eq!(c.coverage.get("sp1"), Some(&b));
    }

    #[test]
    fn new_space_bootstraps_offset_months() {
        let cfg = GenerationConfig::default();
        let c = ctx(&cfg, vec![]);
        let plan = classify(&c, &every_day(t(9, 0), t(10, 0)));
        assert_eq!(plan, SpacePlan::Bootstrap { from: date(2024, 6, 10), until: date(2024, 9, 10) });
    }

    #[test]
    fn new_space_ignores_step_settings() {
        let cfg = GenerationConfig {
            step: Step { unit: StepUnit::Unrecognized("W".into()), size: 0 },
            ..GenerationConfig::default()
        };
        let c = ctx(&cfg, vec![]);
        assert!(matches!(classify(&c, &every_day(t(9, 0), t(10, 0))), SpacePlan::Bootstrap { .. }));
    }

    #[test]
    fn existing_space_extends_by_days() {
        let cfg = GenerationConfig {
            step: Step { unit: StepUnit::Day, size: 2 },
            ..GenerationConfig::default()
        };
        let c = ctx(&cfg, vec![latest("sp1", date(2024, 8, 1).and_hms_opt(17, 30, 0).unwrap())]);
        let plan = classify(&c, &every_day(t(9, 0), t(10, 0)));
        assert_eq!(plan, SpacePlan::Extend { from: date(2024, 8, 2), until: date(2024, 8, 4) });
    }

    #[test]
    fn existing_space_extends_by_months() {
        let cfg = GenerationConfig {
            step: Step { unit: StepUnit::Month, size: 1 },
            ..GenerationConfig::default()
        };
        let c = ctx(&cfg, vec![latest("sp1", date(2024, 7, 30).and_hms_opt(9, 0, 0).unwrap())]);
        let plan = classify(&c, &every_day(t(9, 0), t(10, 0)));
        // 07-31 + 1 month clamps to 08-31.
        assert_eq!(plan, SpacePlan::Extend { from: date(2024, 7, 31), until: date(2024, 8, 31) });
    }

    #[test]
    fn month_step_runs_past_the_horizon() {
        // Horizon is 09-10; one day short of it still earns a whole month.
        let cfg = GenerationConfig {
            step: Step { unit: StepUnit::Month, size: 1 },
            ..GenerationConfig::default()
        };
        let c = ctx(&cfg, vec![latest("sp1", date(2024, 9, 8).and_hms_opt(9, 0, 0).unwrap())]);
        assert_eq!(c.horizon, date(2024, 9, 10));
        let space = every_day(t(9, 0), t(10, 0));
        assert_eq!(classify(&c, &space), SpacePlan::Extend { from: date(2024, 9, 9), until: date(2024, 10, 9) });

        let frames = plan_frames(&c, &[space]);
        assert_eq!(frames.len(), 30 * 2);
        let last = c.tz.to_local(frames.last().unwrap().start);
        assert_eq!(last, date(2024, 10, 8).and_hms_opt(9, 30, 0).unwrap());
        assert!(last.date() > c.horizon);
    }

    #[test]
    fn early_local_frame_counts_on_its_local_date() {
        // 08:00 local on 09-08 is stored on 09-07; the next day is still 09-09.
        let cfg = GenerationConfig::default();
        let c = ctx(&cfg, vec![latest("sp1", date(2024, 9, 8).and_hms_opt(8, 0, 0).unwrap())]);
        let plan = classify(&c, &every_day(t(8, 0), t(9, 0)));
        assert_eq!(plan, SpacePlan::Extend { from: date(2024, 9, 9), until: date(2024, 9, 10) });
    }

    #[test]
    fn covered_space_is_skipped() {
        let cfg = GenerationConfig::default();
        let c = ctx(&cfg, vec![latest("sp1", date(2024, 9, 9).and_hms_opt(9, 0, 0).unwrap())]);
        let space = every_day(t(9, 0), t(10, 0));
        assert_eq!(classify(&c, &space), SpacePlan::Covered { next: date(2024, 9, 10) });
        assert!(plan_frames(&c, &[space]).is_empty());
    }

    #[test]
    fn unrecognized_unit_skips_existing_space() {
        let cfg = GenerationConfig {
            step: Step { unit: StepUnit::Unrecognized("W".into()), size: 1 },
            ..GenerationConfig::default()
        };
        let c = ctx(&cfg, vec![latest("sp1", date(2024, 7, 1).and_hms_opt(9, 0, 0).unwrap())]);
        let space = every_day(t(9, 0), t(10, 0));
        assert_eq!(classify(&c, &space), SpacePlan::Skipped);
        assert!(plan_frames(&c, &[space]).is_empty());
    }

    #[test]
    fn walk_stops_at_first_closed_day() {
        // Closed Wednesdays. 2024-06-10 is a Monday.
        let mut space = every_day(t(9, 0), t(10, 0));
        space.week[Weekday::Wed.num_days_from_sunday() as usize] = DayHours::closed();
        let starts = expand(&space, date(2024, 6, 10), date(2024, 6, 17), SlotDuration::default());
        let days: Vec<_> = starts.iter().map(|s| s.date()).collect();
        assert_eq!(
            days,
            vec![date(2024, 6, 10), date(2024, 6, 10), date(2024, 6, 11), date(2024, 6, 11)]
        );
    }

    #[test]
    fn malformed_day_yields_nothing_but_walk_continues() {
        let mut space = every_day(t(9, 0), t(10, 0));
        space.week[Weekday::Tue.num_days_from_sunday() as usize] = DayHours::new(t(12, 0), t(9, 0));
        let starts = expand(&space, date(2024, 6, 10), date(2024, 6, 13), SlotDuration::default());
        let days: Vec<_> = starts.iter().map(|s| s.date()).collect();
        assert_eq!(
            days,
            vec![date(2024, 6, 10), date(2024, 6, 10), date(2024, 6, 12), date(2024, 6, 12)]
        );
    }

    #[test]
    fn frames_are_shifted_to_storage_time() {
        let cfg = GenerationConfig {
            offset_months: 0,
            ..GenerationConfig::default()
        };
        let c = ctx(&cfg, vec![latest("sp1", date(2024, 6, 9).and_hms_opt(9, 0, 0).unwrap())]);
        // Horizon equals today, so the space counts as covered.
        assert!(plan_frames(&c, &[every_day(t(9, 0), t(10, 0))]).is_empty());

        let cfg = GenerationConfig::default();
        let c = ctx(&cfg, vec![latest("sp1", date(2024, 6, 9).and_hms_opt(9, 0, 0).unwrap())]);
        let rows = plan_frames(&c, &[every_day(t(9, 0), t(10, 0))]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].start, date(2024, 6, 10).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(rows[0].end, date(2024, 6, 10).and_hms_opt(0, 30, 0).unwrap());
        assert_eq!(rows[1].start, rows[0].end);
        for row in &rows {
            assert_eq!(row.space_id, "sp1");
            assert_eq!(row.shop_id, "shop1");
            assert_eq!(row.status, STATUS_AVAILABLE);
            assert_eq!(row.created_at, now());
        }
    }

    #[test]
    fn bootstrap_spans_exactly_offset_months() {
        let cfg = GenerationConfig::default();
        let c = ctx(&cfg, vec![]);
        let rows = plan_frames(&c, &[every_day(t(9, 0), t(12, 0))]);
        // 2024-06-10 .. 2024-09-10: 92 days, 6 slots each.
        assert_eq!(rows.len(), 92 * 6);
        let tz = TimezoneShift::default();
        let first = tz.to_local(rows.first().unwrap().start);
        let last = tz.to_local(rows.last().unwrap().start);
        assert_eq!(first, date(2024, 6, 10).and_hms_opt(9, 0, 0).unwrap());
        assert_eq!(last, date(2024, 9, 9).and_hms_opt(11, 30, 0).unwrap());
    }

    #[test]
    fn frames_within_a_day_are_contiguous() {
        let cfg = GenerationConfig::default();
        let c = ctx(&cfg, vec![]);
        let rows = plan_frames(&c, &[every_day(t(9, 0), t(18, 0))]);
        for pair in rows.windows(2) {
            if pair[0].start.date() == pair[1].start.date() {
                assert_eq!(pair[0].end, pair[1].start);
                assert_eq!(pair[1].start - pair[0].start, Duration::minutes(30));
            }
        }
    }

    #[test]
    fn inactive_and_deleted_spaces_are_ignored() {
        let cfg = GenerationConfig::default();
        let c = ctx(&cfg, vec![]);
        let mut inactive = every_day(t(9, 0), t(10, 0));
        inactive.active = false;
        let mut deleted = every_day(t(9, 0), t(10, 0));
        deleted.id = "sp2".into();
        deleted.deleted = true;
        assert!(plan_frames(&c, &[inactive, deleted]).is_empty());
    }

    #[test]
    fn second_run_after_bootstrap_adds_nothing() {
        let cfg = GenerationConfig::default();
        let space = every_day(t(9, 0), t(10, 0));
        let first = plan_frames(&ctx(&cfg, vec![]), std::slice::from_ref(&space));
        let newest = first.iter().map(|f| f.start).max().unwrap();
        let again = ctx(&cfg, vec![LatestFrame { space_id: "sp1".into(), start: newest }]);
        assert!(plan_frames(&again, &[space]).is_empty());
    }

    #[test]
    fn month_addition_clamps() {
        assert_eq!(add_months(date(2024, 1, 31), 1), date(2024, 2, 29));
        assert_eq!(add_months(date(2024, 11, 30), 3), date(2025, 2, 28));
        assert_eq!(add_months(date(2024, 6, 10), 0), date(2024, 6, 10));
        assert_eq!(add_days(date(2024, 12, 31), 1).year(), 2025);
    }
}
