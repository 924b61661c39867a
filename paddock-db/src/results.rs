//! Cached subsession results.
//!
//! One subsession is stored as a header row plus one row per participating
//! driver. Rows are immutable once stored; the cache-fill job skips
//! subsessions that are already present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::members::{from_timestamp, to_timestamp};

/// Cached subsession header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subsession {
    pub subsession_id: i64,
    pub start_time: DateTime<Utc>,
    pub series_id: i64,
    pub season_year: u16,
    pub season_quarter: u8,
    pub race_week: u8,
    pub track_name: String,
    pub corners_per_lap: u32,
}

/// One driver's outcome within a subsession.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriverResult {
    pub cust_id: i64,
    pub finish_position: u32,
    pub incidents: u32,
    pub laps_complete: u32,
    pub champ_points: i32,
}

/// A driver row joined with its subsession header, the aggregator's input.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRace {
    pub subsession_id: i64,
    pub start_time: DateTime<Utc>,
    pub series_id: i64,
    pub season_year: u16,
    pub season_quarter: u8,
    pub race_week: u8,
    pub corners_per_lap: u32,
    pub finish_position: u32,
    pub incidents: u32,
    pub laps_complete: u32,
    pub champ_points: i32,
}

/// Subsession cache repository
pub struct ResultRepository;

impl ResultRepository {
    /// Whether a subsession is already cached.
    pub async fn has_subsession(pool: &SqlitePool, subsession_id: i64) -> DbResult<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT subsession_id FROM subsessions WHERE subsession_id = ?")
                .bind(subsession_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.is_some())
    }

    /// Insert a subsession with its driver rows.
    ///
    /// Returns `false` without writing anything when the subsession is
    /// already cached: results are immutable, duplicates are skipped.
    pub async fn insert_subsession(
        pool: &SqlitePool,
        header: &Subsession,
        drivers: &[DriverResult],
    ) -> DbResult<bool> {
        if Self::has_subsession(pool, header.subsession_id).await? {
            debug!("Subsession {} already cached, skipping", header.subsession_id);
            return Ok(false);
        }

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO subsessions
                (subsession_id, start_time, series_id, season_year, season_quarter,
                 race_week, track_name, corners_per_lap, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(header.subsession_id)
        .bind(to_timestamp(header.start_time))
        .bind(header.series_id)
        .bind(i64::from(header.season_year))
        .bind(i64::from(header.season_quarter))
        .bind(i64::from(header.race_week))
        .bind(&header.track_name)
        .bind(i64::from(header.corners_per_lap))
        .bind(to_timestamp(Utc::now()))
        .execute(&mut *tx)
        .await?;

        for driver in drivers {
            sqlx::query(
                r#"
                INSERT INTO subsession_results
                    (subsession_id, cust_id, finish_position, incidents, laps_complete, champ_points)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(header.subsession_id)
            .bind(driver.cust_id)
            .bind(i64::from(driver.finish_position))
            .bind(i64::from(driver.incidents))
            .bind(i64::from(driver.laps_complete))
            .bind(i64::from(driver.champ_points))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            "Cached subsession {} with {} drivers",
            header.subsession_id,
            drivers.len()
        );
        Ok(true)
    }

    /// A member's races in chronological order, optionally filtered to one
    /// season. An unknown customer id yields an empty list.
    pub async fn member_races(
        pool: &SqlitePool,
        cust_id: i64,
        season: Option<(u16, u8)>,
    ) -> DbResult<Vec<DriverRace>> {
        let rows = if let Some((year, quarter)) = season {
            sqlx::query_as::<_, DriverRaceRow>(
                r#"
                SELECT s.subsession_id, s.start_time, s.series_id, s.season_year,
                       s.season_quarter, s.race_week, s.corners_per_lap,
                       r.finish_position, r.incidents, r.laps_complete, r.champ_points
                FROM subsession_results r
                JOIN subsessions s ON s.subsession_id = r.subsession_id
                WHERE r.cust_id = ? AND s.season_year = ? AND s.season_quarter = ?
                ORDER BY s.start_time ASC
                "#,
            )
            .bind(cust_id)
            .bind(i64::from(year))
            .bind(i64::from(quarter))
            .fetch_all(pool)
            .await?
        } else {
            sqlx::query_as::<_, DriverRaceRow>(
                r#"
                SELECT s.subsession_id, s.start_time, s.series_id, s.season_year,
                       s.season_quarter, s.race_week, s.corners_per_lap,
                       r.finish_position, r.incidents, r.laps_complete, r.champ_points
                FROM subsession_results r
                JOIN subsessions s ON s.subsession_id = r.subsession_id
                WHERE r.cust_id = ?
                ORDER BY s.start_time ASC
                "#,
            )
            .bind(cust_id)
            .fetch_all(pool)
            .await?
        };

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Total cached subsessions.
    pub async fn count(pool: &SqlitePool) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subsessions")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

#[derive(sqlx::FromRow)]
struct DriverRaceRow {
    subsession_id: i64,
    start_time: i64,
    series_id: i64,
    season_year: i64,
    season_quarter: i64,
    race_week: i64,
    corners_per_lap: i64,
    finish_position: i64,
    incidents: i64,
    laps_complete: i64,
    champ_points: i64,
}

impl From<DriverRaceRow> for DriverRace {
    fn from(row: DriverRaceRow) -> Self {
        DriverRace {
            subsession_id: row.subsession_id,
            start_time: from_timestamp(row.start_time),
            series_id: row.series_id,
            season_year: row.season_year as u16,
            season_quarter: row.season_quarter as u8,
            race_week: row.race_week as u8,
            corners_per_lap: row.corners_per_lap as u32,
            finish_position: row.finish_position as u32,
            incidents: row.incidents as u32,
            laps_complete: row.laps_complete as u32,
            champ_points: row.champ_points as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_helpers::create_test_pool;
    use chrono::TimeZone;

    fn header(subsession_id: i64, week: u8) -> Subsession {
        Subsession {
            subsession_id,
            start_time: Utc
                .with_ymd_and_hms(2024, 4, 1 + u32::from(week), 20, 0, 0)
                .unwrap(),
            series_id: 139,
            season_year: 2024,
            season_quarter: 2,
            race_week: week,
            track_name: "Okayama".to_string(),
            corners_per_lap: 13,
        }
    }

    fn driver(cust_id: i64, incidents: u32, points: i32) -> DriverResult {
        DriverResult {
            cust_id,
            finish_position: 3,
            incidents,
            laps_complete: 22,
            champ_points: points,
        }
    }

    #[tokio::test]
    async fn test_insert_and_query_member_races() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let inserted =
            ResultRepository::insert_subsession(pool, &header(1, 1), &[driver(7, 4, 60)])
                .await
                .unwrap();
        assert!(inserted);
        ResultRepository::insert_subsession(pool, &header(2, 2), &[driver(7, 0, 80)])
            .await
            .unwrap();

        let races = ResultRepository::member_races(pool, 7, None).await.unwrap();
        assert_eq!(races.len(), 2);
        assert_eq!(races[0].race_week, 1);
        assert_eq!(races[1].champ_points, 80);
        assert_eq!(races[0].corners_per_lap, 13);
    }

    #[tokio::test]
    async fn test_duplicate_subsession_skipped() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        assert!(
            ResultRepository::insert_subsession(pool, &header(1, 1), &[driver(7, 4, 60)])
                .await
                .unwrap()
        );
        // Same subsession again, even with different rows: skipped.
        assert!(
            !ResultRepository::insert_subsession(pool, &header(1, 1), &[driver(8, 0, 90)])
                .await
                .unwrap()
        );

        assert_eq!(ResultRepository::count(pool).await.unwrap(), 1);
        let races = ResultRepository::member_races(pool, 8, None).await.unwrap();
        assert!(races.is_empty());
    }

    #[tokio::test]
    async fn test_season_filter() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let mut old = header(1, 1);
        old.season_year = 2023;
        old.season_quarter = 4;
        ResultRepository::insert_subsession(pool, &old, &[driver(7, 1, 40)])
            .await
            .unwrap();
        ResultRepository::insert_subsession(pool, &header(2, 1), &[driver(7, 2, 50)])
            .await
            .unwrap();

        let filtered = ResultRepository::member_races(pool, 7, Some((2024, 2)))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].subsession_id, 2);

        let all = ResultRepository::member_races(pool, 7, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_member_is_empty() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let races = ResultRepository::member_races(pool, 424242, None)
            .await
            .unwrap();
        assert!(races.is_empty());
    }
}
