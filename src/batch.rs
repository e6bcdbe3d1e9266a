use chrono::{Months, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::{error, info};

use crate::config::{GenerationConfig, PurgeConfig};
use crate::error::BatchError;
use crate::model::FrameId;
use crate::planner::{plan_frames, RunContext};
use crate::recovery::{RecoveryController, RecoveryOutcome};
use crate::store::FrameStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub inserted: Vec<FrameId>,
    /// Frames deleted by a retry rollback before generation.
    pub rolled_back: usize,
    pub spaces: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub deleted: Vec<FrameId>,
}

/// Run the generation batch and report its outcome. Failures are logged here.
pub async fn run_generation(
    store: &dyn FrameStore,
    config: &GenerationConfig,
    now: NaiveDateTime,
) -> Result<GenerationReport, BatchError> {
    info!("======start to execute batch=======");
    let started = std::time::Instant::now();
    let result = generate(store, config, now).await;
    finish("generate", started, &result);
    result
}

/// Run the purge batch and report its outcome. Failures are logged here.
pub async fn run_purge(
    store: &dyn FrameStore,
    config: &PurgeConfig,
    now: NaiveDateTime,
) -> Result<PurgeReport, BatchError> {
    info!("======start to execute batch=======");
    let started = std::time::Instant::now();
    let result = purge(store, config, now).await;
    finish("purge", started, &result);
    result
}

fn finish<T>(batch: &'static str, started: std::time::Instant, result: &Result<T, BatchError>) {
    metrics::histogram!(crate::observability::BATCH_DURATION_SECONDS, "batch" => batch)
        .record(started.elapsed().as_secs_f64());
    match result {
        Ok(_) => {
            metrics::counter!(crate::observability::BATCH_RUNS_TOTAL, "batch" => batch, "status" => "ok").increment(1);
            info!("============exit batch=============");
        }
        Err(e) => {
            metrics::counter!(crate::observability::BATCH_RUNS_TOTAL, "batch" => batch, "status" => e.kind()).increment(1);
            error!(kind = e.kind(), "{batch} batch failed: {e}");
        }
    }
}

async fn generate(
    store: &dyn FrameStore,
    config: &GenerationConfig,
    now: NaiveDateTime,
) -> Result<GenerationReport, BatchError> {
    info!(
        retry = config.retry,
        offset_months = config.offset_months,
        unit = %config.step.unit,
        step = config.step.size,
        delete_offset_days = config.delete_offset_days,
        slot_minutes = config.slot.minutes(),
        tz_offset_hours = config.tz.offset_hours(),
        "generation settings"
    );

    let mut recovery = RecoveryController::new(config.retry, now, config.delete_offset_days)?;
    let rolled_back = match recovery.recover(store).await? {
        RecoveryOutcome::NotRequested => 0,
        RecoveryOutcome::RolledBack { removed, .. } => removed.len(),
    };

    info!("start to query spaces...");
    let spaces = store.active_spaces().await?;
    info!(rows = spaces.len(), "query spaces completed");

    info!("start to query latest frames...");
    let latest = store.latest_frame_starts().await?;
    info!(rows = latest.len(), "query frames completed");

    let ctx = RunContext::new(config, now, latest);
    info!(today = %ctx.today, horizon = %ctx.horizon, "frames would be generated up to horizon");

    let frames = plan_frames(&ctx, &spaces);
    info!(rows = frames.len(), "frames for insert are ready");

    let inserted = if frames.is_empty() {
        Vec::new()
    } else {
        store.insert_frames(&frames).await?
    };
    metrics::counter!(crate::observability::FRAMES_INSERTED_TOTAL).increment(inserted.len() as u64);
    info!(rows = inserted.len(), "create frames completed");

    Ok(GenerationReport {
        inserted,
        rolled_back,
        spaces: spaces.len(),
    })
}

async fn purge(store: &dyn FrameStore, config: &PurgeConfig, now: NaiveDateTime) -> Result<PurgeReport, BatchError> {
    info!(months = config.months, "purge settings");
    let cutoff = purge_cutoff(now, config.months);
    info!(%cutoff, "start to delete old space frames");
    let deleted = store.delete_frames_starting_before(cutoff.date()).await?;
    metrics::counter!(crate::observability::FRAMES_PURGED_TOTAL).increment(deleted.len() as u64);
    info!(rows = deleted.len(), "remove old space frames completed");
    Ok(PurgeReport { deleted })
}

/// Midnight of the storage date `months` (never positive) away from `now`.
pub fn purge_cutoff(now: NaiveDateTime, months: i64) -> NaiveDateTime {
    let back = Months::new(u32::try_from(months.unsigned_abs()).unwrap_or(u32::MAX));
    let date = if months <= 0 {
        now.date().checked_sub_months(back)
    } else {
        now.date().checked_add_months(back)
    };
    date.unwrap_or(chrono::NaiveDate::MIN).and_time(NaiveTime::MIN)
}
