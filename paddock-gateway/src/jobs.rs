//! Scheduled background jobs.
//!
//! One tick loop drives three jobs: the subsession cache-fill (simple
//! interval), the series metadata refresh (cron expression) and the weekly
//! standings report (cron expression). Cron jobs fire inside a one-minute
//! due window; a missed window reschedules to the next occurrence instead
//! of firing late.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use cron::Schedule;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use tokio::time::{Instant, interval_at};
use tracing::{error, info, warn};

use paddock_core::Season;
use paddock_db::{MemberRepository, ResultRepository, SeriesInfo, SeriesRepository};

use crate::discord::{chart_image, send};
use crate::reports;
use crate::state::AppState;

const TICK_SECONDS: u64 = 60;
const DUE_WINDOW_SECONDS: i64 = 60;

const JOB_SERIES_REFRESH: &str = "series_refresh";
const JOB_WEEKLY_REPORT: &str = "weekly_report";

fn utc_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_second(0)
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(now)
}

/// The cron crate wants a seconds field; config expressions start at the
/// minute field.
fn parse_schedule(expr: &str) -> Result<Schedule, String> {
    Schedule::from_str(&format!("0 {}", expr.trim())).map_err(|e| e.to_string())
}

fn next_due_at_or_after(schedule: &Schedule, now: DateTime<Utc>) -> Option<i64> {
    let prev = utc_minute(now) - chrono::Duration::minutes(1);
    schedule
        .after(&prev)
        .next()
        .map(|dt| utc_minute(dt).timestamp())
}

fn next_due_after(schedule: &Schedule, base_unix: i64) -> Option<i64> {
    let base = DateTime::from_timestamp(base_unix, 0)?;
    schedule
        .after(&base)
        .next()
        .map(|dt| utc_minute(dt).timestamp())
}

/// Check-and-advance for one cron job. Fires at most once per due time.
fn cron_due(
    due: &mut HashMap<&'static str, i64>,
    key: &'static str,
    expr: &str,
    now: DateTime<Utc>,
) -> bool {
    let schedule = match parse_schedule(expr) {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid cron expression '{}' for {}: {}", expr, key, e);
            return false;
        }
    };
    let Some(initial) = next_due_at_or_after(&schedule, now) else {
        return false;
    };

    let now_ts = now.timestamp();
    let due_at = *due.entry(key).or_insert(initial);
    if now_ts >= due_at && now_ts < due_at + DUE_WINDOW_SECONDS {
        if let Some(next) = next_due_after(&schedule, due_at) {
            due.insert(key, next);
        }
        true
    } else if now_ts >= due_at + DUE_WINDOW_SECONDS {
        // Slept through the window; skip to the next occurrence.
        due.insert(key, initial);
        false
    } else {
        false
    }
}

/// Spawn the job tick loop.
pub fn start_job_runner(state: Arc<AppState>, http: Arc<Http>) -> tokio::task::JoinHandle<()> {
    let handle = tokio::spawn(async move {
        let mut interval = interval_at(
            Instant::now() + Duration::from_secs(TICK_SECONDS),
            Duration::from_secs(TICK_SECONDS),
        );
        let mut due: HashMap<&'static str, i64> = HashMap::new();
        let mut last_cache_fill: Option<i64> = None;

        loop {
            interval.tick().await;
            run_tick(&state, &http, &mut due, &mut last_cache_fill).await;
        }
    });

    info!("Job runner started (tick={}s)", TICK_SECONDS);
    handle
}

async fn run_tick(
    state: &AppState,
    http: &Http,
    due: &mut HashMap<&'static str, i64>,
    last_cache_fill: &mut Option<i64>,
) {
    let now = Utc::now();

    let fill_every = state.config.settings.jobs.cache_fill_minutes as i64 * 60;
    let fill_due = last_cache_fill.is_none_or(|t| now.timestamp() - t >= fill_every);
    if state.iracing.is_some() && fill_due {
        *last_cache_fill = Some(now.timestamp());
        run_cache_fill(state).await;
    }

    if cron_due(
        due,
        JOB_SERIES_REFRESH,
        &state.config.settings.jobs.series_refresh_schedule,
        now,
    ) {
        run_series_refresh(state).await;
    }

    if cron_due(
        due,
        JOB_WEEKLY_REPORT,
        &state.config.settings.reports.schedule,
        now,
    ) {
        run_weekly_report(state, http).await;
    }
}

/// Pull unseen subsessions for every member into the cache.
async fn run_cache_fill(state: &AppState) {
    let Some(iracing) = &state.iracing else {
        return;
    };
    let members = match MemberRepository::list_all(state.pool()).await {
        Ok(members) => members,
        Err(e) => {
            warn!("Cache fill: failed to list members: {}", e);
            return;
        }
    };

    let mut stored = 0usize;
    for member in &members {
        let recent = match iracing.recent_races(member.iracing_id).await {
            Ok(recent) => recent,
            Err(e) => {
                warn!(
                    "Cache fill: recent races for {} failed: {}",
                    member.display_name, e
                );
                continue;
            }
        };

        for race in &recent.races {
            match ResultRepository::has_subsession(state.pool(), race.subsession_id).await {
                Ok(false) => {}
                Ok(true) => continue,
                Err(e) => {
                    warn!("Cache fill: cache check failed: {}", e);
                    continue;
                }
            }

            let result = match iracing.subsession_result(race.subsession_id).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        "Cache fill: subsession {} fetch failed: {}",
                        race.subsession_id, e
                    );
                    continue;
                }
            };
            let Some((header, drivers)) = result.into_cache_rows() else {
                continue;
            };
            match ResultRepository::insert_subsession(state.pool(), &header, &drivers).await {
                Ok(true) => stored += 1,
                Ok(false) => {}
                Err(e) => warn!("Cache fill: insert failed: {}", e),
            }
        }
    }

    if stored > 0 {
        info!("Cache fill stored {} new subsessions", stored);
    }
}

/// Replace the series table from the service listing, stamping each
/// series with its latest running season.
async fn run_series_refresh(state: &AppState) {
    let Some(iracing) = &state.iracing else {
        return;
    };
    let listing = match iracing.series_list().await {
        Ok(listing) => listing,
        Err(e) => {
            warn!("Series refresh failed: {}", e);
            return;
        }
    };

    let mut latest: HashMap<i64, (u16, u8)> = HashMap::new();
    match iracing.series_seasons().await {
        Ok(seasons) => {
            for season in seasons {
                let entry = latest
                    .entry(season.series_id)
                    .or_insert((season.season_year, season.season_quarter));
                if (season.season_year, season.season_quarter) > *entry {
                    *entry = (season.season_year, season.season_quarter);
                }
            }
        }
        Err(e) => warn!("Series refresh: season listing failed: {}", e),
    }

    let series: Vec<SeriesInfo> = listing
        .into_iter()
        .map(|s| SeriesInfo {
            series_id: s.series_id,
            name: s.series_name,
            keywords: s
                .search_filters
                .or(s.series_short_name)
                .unwrap_or_default(),
            car_classes: s.category.unwrap_or_default(),
            last_year: latest.get(&s.series_id).map(|&(year, _)| year),
            last_quarter: latest.get(&s.series_id).map(|&(_, quarter)| quarter),
        })
        .collect();

    if let Err(e) = SeriesRepository::replace_all(state.pool(), &series).await {
        warn!("Series refresh: store failed: {}", e);
    }
}

/// Post the weekly standings into the configured channel. Skipped whole
/// when nobody raced this season.
async fn run_weekly_report(state: &AppState, http: &Http) {
    let Some(channel_id) = state.config.settings.reports.channel_id else {
        info!("Weekly report: no channel configured, skipping");
        return;
    };

    let now = Utc::now();
    let season = Season::current(now);
    let weeks_counted = state.config.settings.reports.weeks_counted;
    let report = match reports::build_standings(state.pool(), season, weeks_counted, false).await {
        Ok(report) => report,
        Err(e) => {
            error!("Weekly report: standings failed: {}", e);
            return;
        }
    };
    let Some(report) = report else {
        info!("Weekly report: nobody raced in {}, skipping", season);
        return;
    };

    let (headers, rows) = reports::standings_table(&report);
    let caption = format!(
        "📊 Weekly standings — {} (best {} weeks count)",
        season, report.weeks_counted
    );
    let channel = ChannelId::new(channel_id);
    let result = match chart_image::render_table_png(&headers, &rows) {
        Some(png) => send::send_png(http, channel, "standings.png", png, &caption).await,
        None => {
            let text = format!("{caption}\n{}", reports::table_text(&headers, &rows));
            send::say(http, channel, &text).await
        }
    };
    if let Err(e) = result {
        error!("Weekly report: delivery failed: {}", e);
    } else {
        info!("Weekly report posted for {}", season);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_schedule_accepts_five_fields() {
        assert!(parse_schedule("0 18 * * Mon").is_ok());
        assert!(parse_schedule("30 4 * * *").is_ok());
        assert!(parse_schedule("not a cron").is_err());
    }

    #[test]
    fn next_due_lands_on_the_minute() {
        let schedule = parse_schedule("0 18 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 12, 30, 45).unwrap();
        let due = next_due_at_or_after(&schedule, now).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 15, 18, 0, 0).unwrap();
        assert_eq!(due, expected.timestamp());
    }

    #[test]
    fn next_due_includes_the_current_minute() {
        let schedule = parse_schedule("0 18 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 18, 0, 20).unwrap();
        let due = next_due_at_or_after(&schedule, now).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2024, 5, 15, 18, 0, 0).unwrap().timestamp());
    }

    #[test]
    fn cron_due_fires_once_inside_the_window() {
        let mut due = HashMap::new();
        let at_six = Utc.with_ymd_and_hms(2024, 5, 15, 18, 0, 10).unwrap();

        assert!(cron_due(&mut due, "test", "0 18 * * *", at_six));
        // Same window again: already advanced to tomorrow.
        assert!(!cron_due(&mut due, "test", "0 18 * * *", at_six));

        let tomorrow = Utc.with_ymd_and_hms(2024, 5, 16, 18, 0, 10).unwrap();
        assert!(cron_due(&mut due, "test", "0 18 * * *", tomorrow));
    }

    #[test]
    fn cron_due_skips_missed_windows() {
        let mut due = HashMap::new();
        let morning = Utc.with_ymd_and_hms(2024, 5, 15, 9, 0, 10).unwrap();
        // Initializes the due time (18:00 today), nothing fires.
        assert!(!cron_due(&mut due, "test", "0 18 * * *", morning));

        // The process slept through 18:00; at 20:00 the job must not fire
        // late, only reschedule.
        let late = Utc.with_ymd_and_hms(2024, 5, 15, 20, 0, 10).unwrap();
        assert!(!cron_due(&mut due, "test", "0 18 * * *", late));

        let tomorrow = Utc.with_ymd_and_hms(2024, 5, 16, 18, 0, 10).unwrap();
        assert!(cron_due(&mut due, "test", "0 18 * * *", tomorrow));
    }

    #[test]
    fn cron_due_rejects_bad_expressions() {
        let mut due = HashMap::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap();
        assert!(!cron_due(&mut due, "bad", "banana", now));
    }
}
