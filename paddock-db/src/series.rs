//! Series metadata, refreshed periodically from the racing service.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// One series' metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeriesInfo {
    pub series_id: i64,
    pub name: String,
    /// Comma-separated keyword aliases used for autocomplete matching.
    pub keywords: String,
    pub car_classes: String,
    pub last_year: Option<u16>,
    pub last_quarter: Option<u8>,
}

impl SeriesInfo {
    /// Whether a user-typed fragment matches the name or any keyword alias.
    pub fn matches(&self, fragment: &str) -> bool {
        let fragment = fragment.to_lowercase();
        if self.name.to_lowercase().contains(&fragment) {
            return true;
        }
        self.keywords
            .split(',')
            .any(|kw| kw.trim().to_lowercase().contains(&fragment))
    }
}

/// Series metadata repository
pub struct SeriesRepository;

impl SeriesRepository {
    /// Replace the whole series table with a fresh listing.
    pub async fn replace_all(pool: &SqlitePool, series: &[SeriesInfo]) -> DbResult<()> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM series").execute(&mut *tx).await?;

        for info in series {
            sqlx::query(
                r#"
                INSERT INTO series (series_id, name, keywords, car_classes, last_year, last_quarter)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(info.series_id)
            .bind(&info.name)
            .bind(&info.keywords)
            .bind(&info.car_classes)
            .bind(info.last_year.map(i64::from))
            .bind(info.last_quarter.map(i64::from))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Refreshed {} series", series.len());
        Ok(())
    }

    /// List all series ordered by name.
    pub async fn list_all(pool: &SqlitePool) -> DbResult<Vec<SeriesInfo>> {
        let rows = sqlx::query_as::<_, SeriesRow>(
            r#"
            SELECT series_id, name, keywords, car_classes, last_year, last_quarter
            FROM series
            ORDER BY name COLLATE NOCASE ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Series whose name or keyword aliases contain the fragment, for
    /// autocomplete. Matching happens in memory; the table is tiny.
    pub async fn search(pool: &SqlitePool, fragment: &str) -> DbResult<Vec<SeriesInfo>> {
        let all = Self::list_all(pool).await?;
        Ok(all.into_iter().filter(|s| s.matches(fragment)).collect())
    }

    /// Get one series by id.
    pub async fn get_by_id(pool: &SqlitePool, series_id: i64) -> DbResult<Option<SeriesInfo>> {
        let row = sqlx::query_as::<_, SeriesRow>(
            r#"
            SELECT series_id, name, keywords, car_classes, last_year, last_quarter
            FROM series
            WHERE series_id = ?
            "#,
        )
        .bind(series_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }
}

#[derive(sqlx::FromRow)]
struct SeriesRow {
    series_id: i64,
    name: String,
    keywords: String,
    car_classes: String,
    last_year: Option<i64>,
    last_quarter: Option<i64>,
}

impl From<SeriesRow> for SeriesInfo {
    fn from(row: SeriesRow) -> Self {
        SeriesInfo {
            series_id: row.series_id,
            name: row.name,
            keywords: row.keywords,
            car_classes: row.car_classes,
            last_year: row.last_year.map(|y| y as u16),
            last_quarter: row.last_quarter.map(|q| q as u8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_helpers::create_test_pool;

    fn series(id: i64, name: &str, keywords: &str) -> SeriesInfo {
        SeriesInfo {
            series_id: id,
            name: name.to_string(),
            keywords: keywords.to_string(),
            car_classes: "GT3".to_string(),
            last_year: Some(2024),
            last_quarter: Some(2),
        }
    }

    #[tokio::test]
    async fn test_replace_all_overwrites() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        SeriesRepository::replace_all(pool, &[series(1, "Old Series", "")])
            .await
            .unwrap();
        SeriesRepository::replace_all(
            pool,
            &[
                series(2, "IMSA Sportscar", "imsa,sportscar"),
                series(3, "Formula A", "fa,grand prix"),
            ],
        )
        .await
        .unwrap();

        let all = SeriesRepository::list_all(pool).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|s| s.series_id != 1));
    }

    #[tokio::test]
    async fn test_search_matches_keywords() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        SeriesRepository::replace_all(
            pool,
            &[
                series(2, "IMSA Sportscar", "imsa,sportscar"),
                series(3, "Formula A", "fa,grand prix"),
            ],
        )
        .await
        .unwrap();

        let hits = SeriesRepository::search(pool, "grand").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].series_id, 3);

        let hits = SeriesRepository::search(pool, "IMSA").await.unwrap();
        assert_eq!(hits.len(), 1);

        let hits = SeriesRepository::search(pool, "zzz").await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let info = series(1, "Production Car Challenge", "pcc,production");
        assert!(info.matches("PRODUCTION"));
        assert!(info.matches("pcc"));
        assert!(!info.matches("oval"));
    }
}
