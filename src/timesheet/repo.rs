use std::collections::BTreeMap;

use anyhow::Context;
use axum::async_trait;
use sqlx::{migrate::Migrator, types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::debug;

use super::repo_types::{DateKey, LegacyNote, MealTimes, RecordPatch, TimesheetRecord};

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_all(&self) -> anyhow::Result<BTreeMap<String, TimesheetRecord>>;
    /// Merges `patch` into the record for `date_key`, creating it if absent.
    async fn upsert(&self, date_key: &DateKey, patch: &RecordPatch) -> anyhow::Result<TimesheetRecord>;
    async fn delete_all(&self) -> anyhow::Result<()>;
}

#[derive(Debug, FromRow)]
struct TimesheetRow {
    date_key: String,
    meal1: bool,
    meal2: bool,
    meal3: bool,
    meal4: bool,
    note: String,
    meal_times: Option<Json<MealTimes>>,
    extra: Option<Json<BTreeMap<String, serde_json::Value>>>,
}

impl TimesheetRow {
    fn into_record(self) -> (String, TimesheetRecord) {
        // rows without meal_times predate the structured columns
        let (note, times, extra) = match self.meal_times {
            Some(Json(times)) => (
                self.note,
                times,
                self.extra.map(|Json(e)| e).unwrap_or_default(),
            ),
            None => {
                let legacy = LegacyNote::decode(&self.note);
                (legacy.note, legacy.times, legacy.extra)
            }
        };
        let mut record = TimesheetRecord {
            meal1: self.meal1,
            meal2: self.meal2,
            meal3: self.meal3,
            meal4: self.meal4,
            note,
            times,
            videos: BTreeMap::new(),
            extra,
        };
        record.drop_orphan_times();
        (self.date_key, record)
    }
}

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const SELECT_COLUMNS: &str = "date_key, meal1, meal2, meal3, meal4, note, meal_times, extra";

#[derive(Clone)]
pub struct PgRecordStore {
    db: PgPool,
}

impl PgRecordStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Brings the schema up to date. Startup stops on failure.
    pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
        MIGRATOR.run(db).await.context("run migrations")
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_all(&self) -> anyhow::Result<BTreeMap<String, TimesheetRecord>> {
        let rows = sqlx::query_as::<_, TimesheetRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM timesheet ORDER BY date_key"
        ))
        .fetch_all(&self.db)
        .await
        .context("list timesheet rows")?;
        Ok(rows.into_iter().map(TimesheetRow::into_record).collect())
    }

    async fn upsert(&self, date_key: &DateKey, patch: &RecordPatch) -> anyhow::Result<TimesheetRecord> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let existing = sqlx::query_as::<_, TimesheetRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM timesheet WHERE date_key = $1 FOR UPDATE"
        ))
        .bind(date_key.as_str())
        .fetch_optional(&mut *tx)
        .await
        .context("load timesheet row")?;

        let mut record = existing
            .map(|row| row.into_record().1)
            .unwrap_or_default();
        record.apply(patch, OffsetDateTime::now_utc());

        sqlx::query(
            r#"
            INSERT INTO timesheet (date_key, meal1, meal2, meal3, meal4, note, meal_times, extra, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (date_key) DO UPDATE SET
                meal1 = EXCLUDED.meal1,
                meal2 = EXCLUDED.meal2,
                meal3 = EXCLUDED.meal3,
                meal4 = EXCLUDED.meal4,
                note = EXCLUDED.note,
                meal_times = EXCLUDED.meal_times,
                extra = EXCLUDED.extra,
                updated_at = NOW()
            "#,
        )
        .bind(date_key.as_str())
        .bind(record.meal1)
        .bind(record.meal2)
        .bind(record.meal3)
        .bind(record.meal4)
        .bind(&record.note)
        .bind(Json(&record.times))
        .bind(Json(&record.extra))
        .execute(&mut *tx)
        .await
        .context("upsert timesheet row")?;

        tx.commit().await.context("commit tx")?;
        debug!(%date_key, "timesheet row upserted");
        Ok(record)
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        let res = sqlx::query("DELETE FROM timesheet")
            .execute(&self.db)
            .await
            .context("delete timesheet rows")?;
        debug!(rows = res.rows_affected(), "timesheet cleared");
        Ok(())
    }
}
