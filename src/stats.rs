//! Dashboard statistics over stored files.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::datetime::day_range_bounds;
use crate::db::Database;
use crate::{CabinetError, Result};

/// How many entries the ranked lists keep.
pub const TOP_LIMIT: i64 = 5;

/// Uploads on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DailyCount {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Files uploaded that day.
    pub count: i64,
}

/// One entry of a ranking (username or MIME type with a count or byte total).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RankedEntry {
    pub key: String,
    pub value: i64,
}

/// Aggregated dashboard numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Statistics {
    pub total_files: i64,
    pub total_folders: i64,
    pub total_bytes: i64,
    /// Megabytes, rounded to 2 decimals.
    pub total_mb: f64,
    /// Gigabytes, rounded to 2 decimals.
    pub total_gb: f64,
    /// Ascending by date.
    pub uploads_per_day: Vec<DailyCount>,
    pub top_users_by_uploads: Vec<RankedEntry>,
    pub top_users_by_space: Vec<RankedEntry>,
    /// Every MIME type with its file count, most common first.
    pub files_by_type: Vec<RankedEntry>,
    pub top_types_by_space: Vec<RankedEntry>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bytes to megabytes, rounded to 2 decimals.
pub fn bytes_to_mb(bytes: i64) -> f64 {
    round2(bytes as f64 / 1024.0 / 1024.0)
}

/// Bytes to gigabytes, rounded to 2 decimals.
pub fn bytes_to_gb(bytes: i64) -> f64 {
    round2(bytes as f64 / 1024.0 / 1024.0 / 1024.0)
}

// Every file query shares this filter; ?1/?2 are NULL when no range is set.
const RANGE_FILTER: &str = "(?1 IS NULL OR f.created_at BETWEEN ?1 AND ?2)";

/// Statistics service.
pub struct StatsService<'a> {
    db: &'a Database,
}

impl<'a> StatsService<'a> {
    /// Create a new StatsService.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Gather statistics.
    ///
    /// The date range is inclusive and only applied when both ends are
    /// given. It filters files by upload date; the folder total is global.
    pub async fn collect(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Statistics> {
        let (start, end) = match (from, to) {
            (Some(from), Some(to)) => {
                let (start, end) = day_range_bounds(from, to).ok_or_else(|| {
                    CabinetError::Validation("'from' must not be after 'to'".to_string())
                })?;
                (Some(start), Some(end))
            }
            _ => (None, None),
        };
        let pool = self.db.pool();

        let (total_files, total_bytes): (i64, i64) = sqlx::query_as(&format!(
            "SELECT COUNT(*), COALESCE(SUM(f.size), 0) FROM files f WHERE {RANGE_FILTER}"
        ))
        .bind(&start)
        .bind(&end)
        .fetch_one(pool)
        .await?;

        let total_folders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders")
            .fetch_one(pool)
            .await?;

        let uploads_per_day = sqlx::query_as::<_, DailyCount>(&format!(
            "SELECT date(f.created_at) AS date, COUNT(*) AS count
             FROM files f WHERE {RANGE_FILTER}
             GROUP BY date(f.created_at) ORDER BY date"
        ))
        .bind(&start)
        .bind(&end)
        .fetch_all(pool)
        .await?;

        let top_users_by_uploads = self.user_ranking("COUNT(*)", &start, &end).await?;
        let top_users_by_space = self.user_ranking("SUM(f.size)", &start, &end).await?;
        let files_by_type = self.type_ranking("COUNT(*)", None, &start, &end).await?;
        let top_types_by_space = self
            .type_ranking("SUM(f.size)", Some(TOP_LIMIT), &start, &end)
            .await?;

        Ok(Statistics {
            total_files,
            total_folders,
            total_bytes,
            total_mb: bytes_to_mb(total_bytes),
            total_gb: bytes_to_gb(total_bytes),
            uploads_per_day,
            top_users_by_uploads,
            top_users_by_space,
            files_by_type,
            top_types_by_space,
        })
    }

    // Files whose uploader was deleted have no username and are left out.
    async fn user_ranking(
        &self,
        aggregate: &str,
        start: &Option<String>,
        end: &Option<String>,
    ) -> Result<Vec<RankedEntry>> {
        let rows = sqlx::query_as::<_, RankedEntry>(&format!(
            r#"SELECT u.username AS "key", {aggregate} AS value
             FROM files f JOIN users u ON u.id = f.created_by
             WHERE {RANGE_FILTER}
             GROUP BY u.id
             ORDER BY value DESC, "key" COLLATE NOCASE
             LIMIT {TOP_LIMIT}"#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    async fn type_ranking(
        &self,
        aggregate: &str,
        limit: Option<i64>,
        start: &Option<String>,
        end: &Option<String>,
    ) -> Result<Vec<RankedEntry>> {
        let limit = limit.unwrap_or(-1);
        let rows = sqlx::query_as::<_, RankedEntry>(&format!(
            r#"SELECT f.mime_type AS "key", {aggregate} AS value
             FROM files f
             WHERE {RANGE_FILTER}
             GROUP BY f.mime_type
             ORDER BY value DESC, "key"
             LIMIT {limit}"#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}
