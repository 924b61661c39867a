//! Special (endurance) events maintained by admins.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::DbResult;

/// One special event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecialEvent {
    pub id: i64,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub notes: Option<String>,
}

/// Special event repository
pub struct SpecialEventRepository;

impl SpecialEventRepository {
    pub async fn insert(
        pool: &SqlitePool,
        name: &str,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
        notes: Option<&str>,
    ) -> DbResult<SpecialEvent> {
        let result = sqlx::query(
            r#"
            INSERT INTO special_events (name, starts_on, ends_on, notes)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(starts_on.to_string())
        .bind(ends_on.to_string())
        .bind(notes)
        .execute(pool)
        .await?;

        Ok(SpecialEvent {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            starts_on,
            ends_on,
            notes: notes.map(str::to_string),
        })
    }

    /// Events that have not ended before `today`, soonest first.
    pub async fn list_upcoming(pool: &SqlitePool, today: NaiveDate) -> DbResult<Vec<SpecialEvent>> {
        let rows = sqlx::query_as::<_, SpecialEventRow>(
            r#"
            SELECT id, name, starts_on, ends_on, notes
            FROM special_events
            WHERE ends_on >= ?
            ORDER BY starts_on ASC
            "#,
        )
        .bind(today.to_string())
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().filter_map(|r| r.try_into().ok()).collect())
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM special_events WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct SpecialEventRow {
    id: i64,
    name: String,
    starts_on: String,
    ends_on: String,
    notes: Option<String>,
}

impl TryFrom<SpecialEventRow> for SpecialEvent {
    type Error = chrono::ParseError;

    fn try_from(row: SpecialEventRow) -> Result<Self, Self::Error> {
        Ok(SpecialEvent {
            id: row.id,
            name: row.name,
            starts_on: row.starts_on.parse()?,
            ends_on: row.ends_on.parse()?,
            notes: row.notes,
        })
    }
}
