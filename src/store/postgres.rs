use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};

use crate::model::*;

use super::{FrameStore, StoreError};

const SPACES_TABLE: &str = "salesforce.reserve_shop_space__c";
const FRAMES_TABLE: &str = "custom.reserve_space_frames__c";

/// Column prefixes for the weekly hours, Sunday first. `tus` is the column's real spelling.
const DAY_PREFIXES: [&str; 7] = ["sun", "mon", "tus", "wed", "thu", "fri", "sat"];

/// Columns bound per inserted frame. `uid` is left to the table default.
const INSERT_COLUMNS: usize = 6;

/// Rows per INSERT statement; keeps well under the 65535 bind-parameter limit.
const INSERT_CHUNK_ROWS: usize = 1000;

/// PostgreSQL-backed store. Frame `uid`s are assigned by the database and read back as text.
pub struct PgStore {
    client: Client,
}

impl PgStore {
    /// Connect and spawn the connection driver task.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("postgres connection error: {e}");
            }
        });
        Ok(Self { client })
    }

    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>, StoreError> {
        self.client
            .query(sql, params)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}

fn spaces_query() -> String {
    let hours: Vec<String> = DAY_PREFIXES
        .iter()
        .map(|d| format!("{d}_openingtime__c::text AS {d}_open, {d}_closingtime__c::text AS {d}_close"))
        .collect();
    format!(
        "SELECT sfid, shop__c, isactive__c, isdeleted, {} FROM {SPACES_TABLE} \
         WHERE isdeleted = false AND isactive__c = true",
        hours.join(", ")
    )
}

fn latest_query() -> String {
    format!(
        "SELECT space__c, start_time__c FROM ( \
         SELECT DISTINCT ON (space__c) space__c, start_time__c FROM {FRAMES_TABLE} \
         ORDER BY space__c, start_time__c DESC ) p ORDER BY start_time__c DESC"
    )
}

/// `INSERT ... VALUES ($1, ..., $6), ($7, ...)` for `rows` frames.
fn insert_query(rows: usize) -> String {
    let tuples: Vec<String> = (0..rows)
        .map(|r| {
            let base = r * INSERT_COLUMNS;
            let params: Vec<String> = (1..=INSERT_COLUMNS).map(|c| format!("${}", base + c)).collect();
            format!("({})", params.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {FRAMES_TABLE} \
         (space__c, shop_id__c, start_time__c, end_time__c, status__c, createddate_utc) \
         VALUES {} RETURNING uid::text AS uid",
        tuples.join(", ")
    )
}

fn delete_before_query() -> String {
    format!("DELETE FROM {FRAMES_TABLE} WHERE start_time__c < $1 RETURNING uid::text AS uid")
}

fn delete_created_after_query() -> String {
    format!("DELETE FROM {FRAMES_TABLE} WHERE createddate_utc > $1 RETURNING uid::text AS uid")
}

/// Accepts `HH:MM:SS`, `HH:MM:SS.fff` and `HH:MM`.
fn parse_time(raw: Option<String>, column: &str) -> Result<Option<NaiveTime>, StoreError> {
    let Some(raw) = raw else { return Ok(None) };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(Some)
        .map_err(|_| StoreError::Decode(format!("{column}: bad time {raw:?}")))
}

fn get<'a, T: tokio_postgres::types::FromSql<'a>>(row: &'a Row, column: &str) -> Result<T, StoreError> {
    row.try_get(column)
        .map_err(|e| StoreError::Decode(format!("{column}: {e}")))
}

fn space_from_row(row: &Row) -> Result<Space, StoreError> {
    let mut week = [DayHours::closed(); 7];
    for (day, prefix) in week.iter_mut().zip(DAY_PREFIXES) {
        let open_col = format!("{prefix}_open");
        let close_col = format!("{prefix}_close");
        *day = DayHours {
            open: parse_time(get(row, &open_col)?, &open_col)?,
            close: parse_time(get(row, &close_col)?, &close_col)?,
        };
    }
    Ok(Space {
        id: get(row, "sfid")?,
        shop_id: get::<Option<String>>(row, "shop__c")?.unwrap_or_default(),
        active: get::<Option<bool>>(row, "isactive__c")?.unwrap_or(false),
        deleted: get::<Option<bool>>(row, "isdeleted")?.unwrap_or(false),
        week,
    })
}

fn frame_from_row(row: &Row) -> Result<Frame, StoreError> {
    Ok(Frame {
        id: get(row, "uid")?,
        space_id: get(row, "space__c")?,
        shop_id: get::<Option<String>>(row, "shop_id__c")?.unwrap_or_default(),
        start: get(row, "start_time__c")?,
        end: get(row, "end_time__c")?,
        status: get(row, "status__c")?,
        created_at: get(row, "createddate_utc")?,
    })
}

fn uids(rows: &[Row]) -> Result<Vec<FrameId>, StoreError> {
    rows.iter().map(|row| get(row, "uid")).collect()
}

#[async_trait]
impl FrameStore for PgStore {
    async fn active_spaces(&self) -> Result<Vec<Space>, StoreError> {
        let rows = self.query(&spaces_query(), &[]).await?;
        rows.iter().map(space_from_row).collect()
    }

    async fn latest_frame_starts(&self) -> Result<Vec<LatestFrame>, StoreError> {
        let rows = self.query(&latest_query(), &[]).await?;
        rows.iter()
            .map(|row| {
                Ok(LatestFrame {
                    space_id: get(row, "space__c")?,
                    start: get(row, "start_time__c")?,
                })
            })
            .collect()
    }

    async fn insert_frames(&self, frames: &[NewFrame]) -> Result<Vec<FrameId>, StoreError> {
        let mut inserted = Vec::with_capacity(frames.len());
        for chunk in frames.chunks(INSERT_CHUNK_ROWS) {
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * INSERT_COLUMNS);
            for frame in chunk {
                params.push(&frame.space_id);
                params.push(&frame.shop_id);
                params.push(&frame.start);
                params.push(&frame.end);
                params.push(&frame.status);
                params.push(&frame.created_at);
            }
            let rows = self.query(&insert_query(chunk.len()), &params).await?;
            inserted.extend(uids(&rows)?);
        }
        Ok(inserted)
    }

    async fn delete_frames_starting_before(&self, cutoff: NaiveDate) -> Result<Vec<FrameId>, StoreError> {
        let cutoff = cutoff.and_time(NaiveTime::MIN);
        uids(&self.query(&delete_before_query(), &[&cutoff]).await?)
    }

    async fn delete_frames_created_after(&self, cutoff: NaiveDateTime) -> Result<Vec<FrameId>, StoreError> {
        uids(&self.query(&delete_created_after_query(), &[&cutoff]).await?)
    }

    async fn claimed_frames_created_after(&self, cutoff: NaiveDateTime) -> Result<Vec<Frame>, StoreError> {
        let sql = format!(
            "SELECT uid::text AS uid, space__c, shop_id__c, start_time__c, end_time__c, status__c, createddate_utc \
             FROM {FRAMES_TABLE} WHERE createddate_utc > $1 AND status__c <> {STATUS_AVAILABLE}"
        );
        self.query(&sql, &[&cutoff]).await?.iter().map(frame_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_query_numbers_params_per_row() {
        let sql = insert_query(2);
        assert!(sql.contains("VALUES ($1, $2, $3, $4, $5, $6), ($7, $8, $9, $10, $11, $12)"));
        assert!(sql.ends_with("RETURNING uid::text AS uid"));
    }

    #[test]
    fn spaces_query_reads_all_seven_days() {
        let sql = spaces_query();
        for d in DAY_PREFIXES {
            assert!(sql.contains(&format!("{d}_openingtime__c::text AS {d}_open")));
            assert!(sql.contains(&format!("{d}_closingtime__c::text AS {d}_close")));
        }
        assert!(sql.contains("isdeleted = false AND isactive__c = true"));
    }

    #[test]
    fn latest_query_is_distinct_per_space() {
        assert!(latest_query().contains("DISTINCT ON (space__c)"));
    }

    #[test]
    fn time_parsing() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0);
        assert_eq!(parse_time(Some("09:00:00".into()), "c").unwrap(), nine);
        assert_eq!(parse_time(Some("09:00:00.000".into()), "c").unwrap(), nine);
        assert_eq!(parse_time(Some("09:00".into()), "c").unwrap(), nine);
        assert_eq!(parse_time(None, "c").unwrap(), None);
        assert_eq!(parse_time(Some(" ".into()), "c").unwrap(), None);
        assert!(matches!(parse_time(Some("nine".into()), "c"), Err(StoreError::Decode(_))));
    }

    #[test]
    fn insert_leaves_uid_to_the_database() {
        let sql = insert_query(1);
        assert!(sql.contains("(space__c, shop_id__c, start_time__c, end_time__c, status__c, createddate_utc)"));
        assert!(!sql.contains("(uid,"));
    }

    #[test]
    fn every_returning_clause_reads_uid_as_text() {
        for sql in [insert_query(3), delete_before_query(), delete_created_after_query()] {
            assert!(sql.ends_with("RETURNING uid::text AS uid"), "{sql}");
        }
    }
}
