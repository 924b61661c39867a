//! Championship and head-to-head report assembly.
//!
//! Bridges the cached result rows to the pure aggregator and formats the
//! outcome as table rows shared by the slash commands and the weekly
//! scheduled report.

use sqlx::SqlitePool;

use paddock_core::stats::{self, DriverTotals, RaceSample};
use paddock_core::Season;
use paddock_db::{DbResult, DriverRace, Member, MemberRepository, ResultRepository};

/// Map a cached driver row into the aggregator's input.
pub fn race_sample(race: &DriverRace) -> RaceSample {
    RaceSample {
        subsession_id: race.subsession_id,
        start_time: race.start_time,
        race_week: race.race_week,
        finish_position: race.finish_position,
        incidents: race.incidents,
        laps: race.laps_complete,
        corners_per_lap: race.corners_per_lap,
        champ_points: race.champ_points,
    }
}

/// A member's samples for an optional season window.
pub async fn member_samples(
    pool: &SqlitePool,
    iracing_id: i64,
    season: Option<Season>,
) -> DbResult<Vec<RaceSample>> {
    let races = ResultRepository::member_races(
        pool,
        iracing_id,
        season.map(|s| (s.year, s.quarter)),
    )
    .await?;
    Ok(races.iter().map(race_sample).collect())
}

/// One standings line.
#[derive(Debug, Clone, PartialEq)]
pub struct StandingsRow {
    pub display_name: String,
    pub weeks_raced: u32,
    pub total: i32,
    pub projected: f64,
}

/// The championship standings for one season.
#[derive(Debug, Clone, PartialEq)]
pub struct StandingsReport {
    pub season: Season,
    pub weeks_counted: u8,
    pub rows: Vec<StandingsRow>,
}

/// Build the standings for a season.
///
/// Members with zero weeks raced are left out entirely; when nobody raced
/// the report is `None` and callers skip posting anything.
pub async fn build_standings(
    pool: &SqlitePool,
    season: Season,
    weeks_counted: u8,
    season_complete: bool,
) -> DbResult<Option<StandingsReport>> {
    let members = MemberRepository::list_all(pool).await?;
    let mut rows = Vec::new();

    for member in &members {
        let samples = member_samples(pool, member.iracing_id, Some(season)).await?;
        let weekly = stats::weekly_best_points(&samples);
        if weekly.is_empty() {
            continue;
        }
        rows.push(StandingsRow {
            display_name: member.display_name.clone(),
            weeks_raced: weekly.len() as u32,
            total: stats::best_n_total(&weekly, usize::from(weeks_counted)),
            projected: stats::project_final(&weekly, usize::from(weeks_counted), season_complete),
        });
    }

    if rows.is_empty() {
        return Ok(None);
    }

    rows.sort_by(|a, b| b.total.cmp(&a.total));
    Ok(Some(StandingsReport {
        season,
        weeks_counted,
        rows,
    }))
}

/// Table cells for the standings report.
pub fn standings_table(report: &StandingsReport) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = vec![
        "#".to_string(),
        "Driver".to_string(),
        "Weeks".to_string(),
        format!("Best {}", report.weeks_counted),
        "Projected".to_string(),
    ];
    let rows = report
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            vec![
                (i + 1).to_string(),
                row.display_name.clone(),
                row.weeks_raced.to_string(),
                row.total.to_string(),
                format!("{:.0}", row.projected),
            ]
        })
        .collect();
    (headers, rows)
}

/// Head-to-head totals for a set of members over an optional season.
pub async fn member_totals(
    pool: &SqlitePool,
    members: &[Member],
    season: Option<Season>,
) -> DbResult<Vec<(Member, DriverTotals)>> {
    let mut out = Vec::with_capacity(members.len());
    for member in members {
        let samples = member_samples(pool, member.iracing_id, season).await?;
        out.push((member.clone(), stats::head_to_head(&samples)));
    }
    Ok(out)
}

/// Render a laps-per-incident figure, spelling out the incident-free case.
pub fn format_lpi(lpi: f64) -> String {
    if lpi.is_infinite() {
        "clean".to_string()
    } else {
        format!("{lpi:.1}")
    }
}

/// Table cells for the head-to-head comparison.
pub fn comparison_table(totals: &[(Member, DriverTotals)]) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = vec![
        "Driver".to_string(),
        "Races".to_string(),
        "Laps".to_string(),
        "Incidents".to_string(),
        "Laps/Inc".to_string(),
        "Avg Points".to_string(),
    ];
    let rows = totals
        .iter()
        .map(|(member, t)| {
            vec![
                member.display_name.clone(),
                t.races.to_string(),
                t.laps.to_string(),
                t.incidents.to_string(),
                format_lpi(t.laps_per_incident()),
                format!("{:.1}", t.avg_champ_points),
            ]
        })
        .collect();
    (headers, rows)
}

/// Monospace fallback when PNG rendering is unavailable.
pub fn table_text(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render_row = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .take(widths.len())
            .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut out = String::from("```\n");
    out.push_str(&render_row(headers));
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out.push_str("```");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use paddock_db::{DriverResult, Subsession, test_helpers::create_test_pool};

    async fn seed_member(pool: &SqlitePool, discord_id: &str, name: &str, iracing_id: i64) {
        MemberRepository::create(pool, discord_id, name, iracing_id, "UTC", None)
            .await
            .unwrap();
    }

    async fn seed_race(
        pool: &SqlitePool,
        subsession_id: i64,
        week: u8,
        drivers: &[(i64, u32, i32)],
    ) {
        let header = Subsession {
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
        };
        let rows: Vec<DriverResult> = drivers
            .iter()
            .map(|&(cust_id, incidents, points)| DriverResult {
                cust_id,
                finish_position: 1,
                incidents,
                laps_complete: 20,
                champ_points: points,
            })
            .collect();
        ResultRepository::insert_subsession(pool, &header, &rows)
            .await
            .unwrap();
    }

    fn season() -> Season {
        Season {
            year: 2024,
            quarter: 2,
        }
    }

    #[tokio::test]
    async fn standings_skip_members_without_races() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        seed_member(pool, "1", "Alice", 100).await;
        seed_member(pool, "2", "Bob", 200).await;
        seed_race(pool, 10, 1, &[(100, 2, 50)]).await;

        let report = build_standings(pool, season(), 8, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].display_name, "Alice");
    }

    #[tokio::test]
    async fn standings_none_when_nobody_raced() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        seed_member(pool, "1", "Alice", 100).await;

        let report = build_standings(pool, season(), 8, false).await.unwrap();
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn standings_sorted_by_total() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        seed_member(pool, "1", "Alice", 100).await;
        seed_member(pool, "2", "Bob", 200).await;
        seed_race(pool, 10, 1, &[(100, 2, 30), (200, 0, 80)]).await;
        seed_race(pool, 11, 2, &[(100, 1, 40)]).await;

        let report = build_standings(pool, season(), 8, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.rows[0].display_name, "Bob");
        assert_eq!(report.rows[0].total, 80);
        assert_eq!(report.rows[1].total, 70);
    }

    #[tokio::test]
    async fn comparison_marks_clean_drivers() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        seed_member(pool, "1", "Alice", 100).await;
        seed_race(pool, 10, 1, &[(100, 0, 50)]).await;

        let members = MemberRepository::list_all(pool).await.unwrap();
        let totals = member_totals(pool, &members, Some(season())).await.unwrap();
        let (_, rows) = comparison_table(&totals);
        assert_eq!(rows[0][4], "clean");
    }

    #[test]
    fn lpi_formatting() {
        assert_eq!(format_lpi(f64::INFINITY), "clean");
        assert_eq!(format_lpi(12.34), "12.3");
    }

    #[test]
    fn table_text_aligns_columns() {
        let headers = vec!["Driver".to_string(), "Pts".to_string()];
        let rows = vec![
            vec!["Alice".to_string(), "120".to_string()],
            vec!["Bo".to_string(), "9".to_string()],
        ];
        let text = table_text(&headers, &rows);
        assert!(text.starts_with("```\n"));
        assert!(text.contains("Driver  Pts"));
        assert!(text.contains("Alice   120"));
        assert!(text.contains("Bo      9"));
    }

    #[test]
    fn standings_table_shape() {
        let report = StandingsReport {
            season: season(),
            weeks_counted: 6,
            rows: vec![StandingsRow {
                display_name: "Alice".to_string(),
                weeks_raced: 3,
                total: 120,
                projected: 240.0,
            }],
        };
        let (headers, rows) = standings_table(&report);
        assert_eq!(headers[3], "Best 6");
        assert_eq!(rows[0], vec!["1", "Alice", "3", "120", "240"]);
    }
}
