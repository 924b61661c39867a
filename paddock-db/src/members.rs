//! League member management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};

/// League member record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub discord_id: String,
    pub display_name: String,
    pub iracing_id: i64,
    pub timezone: String,
    /// Optional hex color used when plotting this member.
    pub color_tag: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Convert SQLite timestamp (seconds since epoch) to DateTime<Utc>
pub(crate) fn from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

/// Convert DateTime<Utc> to SQLite timestamp
pub(crate) fn to_timestamp(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Member repository for database operations
pub struct MemberRepository;

impl MemberRepository {
    /// Create a new member. Fails on a duplicate Discord or iRacing id.
    pub async fn create(
        pool: &SqlitePool,
        discord_id: &str,
        display_name: &str,
        iracing_id: i64,
        timezone: &str,
        color_tag: Option<&str>,
    ) -> DbResult<Member> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO members (discord_id, display_name, iracing_id, timezone, color_tag, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(discord_id)
        .bind(display_name)
        .bind(iracing_id)
        .bind(timezone)
        .bind(color_tag)
        .bind(to_timestamp(now))
        .bind(to_timestamp(now))
        .execute(pool)
        .await?;

        info!("Created member {} ({})", display_name, discord_id);

        Self::get_by_discord_id(pool, discord_id)
            .await?
            .ok_or_else(|| DbError::MemberNotFound(discord_id.to_string()))
    }

    /// Update the editable fields of an existing member. `None` leaves a
    /// field unchanged.
    pub async fn update(
        pool: &SqlitePool,
        discord_id: &str,
        display_name: Option<&str>,
        iracing_id: Option<i64>,
        timezone: Option<&str>,
        color_tag: Option<&str>,
    ) -> DbResult<Member> {
        let existing = Self::get_by_discord_id(pool, discord_id)
            .await?
            .ok_or_else(|| DbError::MemberNotFound(discord_id.to_string()))?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE members
            SET display_name = ?, iracing_id = ?, timezone = ?, color_tag = ?, updated_at = ?
            WHERE discord_id = ?
            "#,
        )
        .bind(display_name.unwrap_or(&existing.display_name))
        .bind(iracing_id.unwrap_or(existing.iracing_id))
        .bind(timezone.unwrap_or(&existing.timezone))
        .bind(color_tag.or(existing.color_tag.as_deref()))
        .bind(to_timestamp(now))
        .bind(discord_id)
        .execute(pool)
        .await?;

        info!("Updated member {}", discord_id);

        Self::get_by_discord_id(pool, discord_id)
            .await?
            .ok_or_else(|| DbError::MemberNotFound(discord_id.to_string()))
    }

    /// Get member by Discord id
    pub async fn get_by_discord_id(pool: &SqlitePool, discord_id: &str) -> DbResult<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT discord_id, display_name, iracing_id, timezone, color_tag, created_at, updated_at
            FROM members
            WHERE discord_id = ?
            "#,
        )
        .bind(discord_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// Get member by iRacing customer id
    pub async fn get_by_iracing_id(pool: &SqlitePool, iracing_id: i64) -> DbResult<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT discord_id, display_name, iracing_id, timezone, color_tag, created_at, updated_at
            FROM members
            WHERE iracing_id = ?
            "#,
        )
        .bind(iracing_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// Find a member by display name, case-insensitively.
    pub async fn get_by_name(pool: &SqlitePool, name: &str) -> DbResult<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT discord_id, display_name, iracing_id, timezone, color_tag, created_at, updated_at
            FROM members
            WHERE display_name = ? COLLATE NOCASE
            "#,
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// List all members ordered by display name.
    pub async fn list_all(pool: &SqlitePool) -> DbResult<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT discord_id, display_name, iracing_id, timezone, color_tag, created_at, updated_at
            FROM members
            ORDER BY display_name COLLATE NOCASE ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

/// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct MemberRow {
    discord_id: String,
    display_name: String,
    iracing_id: i64,
    timezone: String,
    color_tag: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            discord_id: row.discord_id,
            display_name: row.display_name,
            iracing_id: row.iracing_id,
            timezone: row.timezone,
            color_tag: row.color_tag,
            created_at: from_timestamp(row.created_at),
            updated_at: from_timestamp(row.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_helpers::create_test_pool;

    #[tokio::test]
    async fn test_create_and_lookup_member() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let member = MemberRepository::create(pool, "1001", "Alice", 55555, "Europe/Helsinki", None)
            .await
            .unwrap();

        assert_eq!(member.display_name, "Alice");
        assert_eq!(member.iracing_id, 55555);
        assert_eq!(member.color_tag, None);

        let by_ir = MemberRepository::get_by_iracing_id(pool, 55555)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_ir.discord_id, "1001");

        let by_name = MemberRepository::get_by_name(pool, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.discord_id, "1001");
    }

    #[tokio::test]
    async fn test_duplicate_iracing_id_rejected() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", "Alice", 55555, "UTC", None)
            .await
            .unwrap();
        let dup = MemberRepository::create(pool, "1002", "Bob", 55555, "UTC", None).await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", "Alice", 55555, "UTC", Some("#ff0000"))
            .await
            .unwrap();

        let updated = MemberRepository::update(pool, "1001", Some("Alina"), None, None, None)
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Alina");
        assert_eq!(updated.iracing_id, 55555);
        assert_eq!(updated.color_tag.as_deref(), Some("#ff0000"));
    }

    #[tokio::test]
    async fn test_update_unknown_member() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let result = MemberRepository::update(pool, "nope", Some("X"), None, None, None).await;
        assert!(matches!(result, Err(DbError::MemberNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1", "charlie", 1, "UTC", None)
            .await
            .unwrap();
        MemberRepository::create(pool, "2", "Alice", 2, "UTC", None)
            .await
            .unwrap();
        MemberRepository::create(pool, "3", "Bob", 3, "UTC", None)
            .await
            .unwrap();

        let names: Vec<String> = MemberRepository::list_all(pool)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.display_name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "charlie"]);
    }
}
