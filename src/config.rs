//! Batch configuration, read from the environment and validated before any I/O.

use crate::slots::SlotDuration;
use crate::tz::TimezoneShift;

pub const OFFSET_SPACE_FRAME_GEN: &str = "OFFSET_SPACE_FRAME_GEN";
pub const DAYS_MONTHS_SPACE_FRAME_GEN: &str = "DAYS_MONTHS_SPACE_FRAME_GEN";
pub const DAY_OR_MONTH_SPACE_FRAME: &str = "DAY_OR_MONTH_SPACE_FRAME";
pub const DELETE_START_DATE_SPACE_FRAME: &str = "DELETE_START_DATE_SPACE_FRAME";
pub const IS_RETRY_SPACE_FRAME_GEN: &str = "IS_RETRY_SPACE_FRAME_GEN";
pub const MONTHS_SPACE_FRAME_DEL: &str = "MONTHS_SPACE_FRAME_DEL";
pub const UNIT_TIME_SPACE_FRAME: &str = "UNIT_TIME_SPACE_FRAME";
pub const TZ_OFFSET_HOURS_SPACE_FRAME: &str = "TZ_OFFSET_HOURS_SPACE_FRAME";

/// Largest coverage horizon accepted, in months.
pub const MAX_OFFSET_MONTHS: i64 = 120;
/// Largest incremental step accepted, in days or months.
pub const MAX_STEP_SIZE: i64 = 366;
/// Furthest back a rollback cutoff may reach, in days.
pub const MAX_ROLLBACK_DAYS: i64 = 3650;
/// Furthest back a purge cutoff may reach, in months.
pub const MAX_PURGE_MONTHS: i64 = 1200;
/// Longest slot accepted, in minutes.
pub const MAX_SLOT_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Value is not an integer (or not a recognised boolean).
    InvalidType(&'static str),
    /// Value parsed but violates its sign or range constraint.
    InvalidData(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidType(name) => write!(f, "invalid data type. --{name}"),
            ConfigError::InvalidData(name) => write!(f, "invalid data. --{name}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// How far each incremental run advances an existing space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepUnit {
    Day,
    Month,
    /// Kept verbatim so the planner can log it; generates nothing.
    Unrecognized(String),
}

impl StepUnit {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "D" => StepUnit::Day,
            "M" => StepUnit::Month,
            other => StepUnit::Unrecognized(other.to_string()),
        }
    }
}

impl std::fmt::Display for StepUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepUnit::Day => f.write_str("D"),
            StepUnit::Month => f.write_str("M"),
            StepUnit::Unrecognized(raw) => write!(f, "{raw:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub unit: StepUnit,
    pub size: u32,
}

/// Settings for the frame generation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Coverage horizon, months ahead of today.
    pub offset_months: u32,
    pub step: Step,
    /// Days added to the run time to get the rollback cutoff. Never positive.
    pub delete_offset_days: i64,
    pub retry: bool,
    pub slot: SlotDuration,
    pub tz: TimezoneShift,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            offset_months: 3,
            step: Step {
                unit: StepUnit::Day,
                size: 1,
            },
            delete_offset_days: 0,
            retry: false,
            slot: SlotDuration::default(),
            tz: TimezoneShift::default(),
        }
    }
}

impl GenerationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unset and empty values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let offset_months = match get(OFFSET_SPACE_FRAME_GEN) {
            Some(raw) => non_negative(OFFSET_SPACE_FRAME_GEN, &raw, MAX_OFFSET_MONTHS)?,
            None => defaults.offset_months,
        };
        let size = match get(DAYS_MONTHS_SPACE_FRAME_GEN) {
            Some(raw) => non_negative(DAYS_MONTHS_SPACE_FRAME_GEN, &raw, MAX_STEP_SIZE)?,
            None => defaults.step.size,
        };
        let unit = match get(DAY_OR_MONTH_SPACE_FRAME) {
            Some(raw) => StepUnit::parse(raw.trim()),
            None => defaults.step.unit,
        };
        let delete_offset_days = match get(DELETE_START_DATE_SPACE_FRAME) {
            Some(raw) => non_positive(DELETE_START_DATE_SPACE_FRAME, &raw, MAX_ROLLBACK_DAYS)?,
            None => defaults.delete_offset_days,
        };
        let retry = match get(IS_RETRY_SPACE_FRAME_GEN) {
            Some(raw) => parse_flag(IS_RETRY_SPACE_FRAME_GEN, &raw)?,
            None => defaults.retry,
        };
        let slot = match get(UNIT_TIME_SPACE_FRAME) {
            Some(raw) => {
                let minutes = non_negative(UNIT_TIME_SPACE_FRAME, &raw, MAX_SLOT_MINUTES)?;
                SlotDuration::from_minutes(minutes)
                    .ok_or(ConfigError::InvalidData(UNIT_TIME_SPACE_FRAME))?
            }
            None => defaults.slot,
        };
        let tz = match get(TZ_OFFSET_HOURS_SPACE_FRAME) {
            Some(raw) => {
                let hours = parse_int(TZ_OFFSET_HOURS_SPACE_FRAME, &raw)?;
                i32::try_from(hours)
                    .ok()
                    .and_then(TimezoneShift::from_hours)
                    .ok_or(ConfigError::InvalidData(TZ_OFFSET_HOURS_SPACE_FRAME))?
            }
            None => defaults.tz,
        };

        Ok(Self {
            offset_months,
            step: Step { unit, size },
            delete_offset_days,
            retry,
            slot,
            tz,
        })
    }
}

/// Settings for the purge batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeConfig {
    /// Months added to today to get the retention cutoff. Never positive.
    pub months: i64,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self { months: -1 }
    }
}

impl PurgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        match lookup(MONTHS_SPACE_FRAME_DEL).filter(|v| !v.trim().is_empty()) {
            Some(raw) => Ok(Self {
                months: non_positive(MONTHS_SPACE_FRAME_DEL, &raw, MAX_PURGE_MONTHS)?,
            }),
            None => Ok(Self::default()),
        }
    }
}

fn parse_int(name: &'static str, raw: &str) -> Result<i64, ConfigError> {
    raw.trim().parse::<i64>().map_err(|_| ConfigError::InvalidType(name))
}

/// Integer in `0..=max`.
fn non_negative(name: &'static str, raw: &str, max: i64) -> Result<u32, ConfigError> {
    let v = parse_int(name, raw)?;
    if !(0..=max).contains(&v) {
        return Err(ConfigError::InvalidData(name));
    }
    u32::try_from(v).map_err(|_| ConfigError::InvalidData(name))
}

/// Integer in `-max..=0`.
fn non_positive(name: &'static str, raw: &str, max: i64) -> Result<i64, ConfigError> {
    let v = parse_int(name, raw)?;
    if !(-max..=0).contains(&v) {
        return Err(ConfigError::InvalidData(name));
    }
    Ok(v)
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidType(name)),
    }
}
