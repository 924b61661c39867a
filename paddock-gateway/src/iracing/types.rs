//! Response shapes for the iRacing /data API.
//!
//! Only the fields the bot reads are modeled; unknown fields are ignored.
//! Most endpoints answer with a [`LinkEnvelope`] pointing at a signed URL
//! that holds the real payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use paddock_db::{DriverResult, Subsession};

/// The indirection envelope most /data endpoints return.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkEnvelope {
    pub link: String,
}

/// Auth endpoint response. `authcode` is the number 0 on failure and a
/// session token string on success.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub authcode: serde_json::Value,
}

impl AuthResponse {
    pub fn succeeded(&self) -> bool {
        !matches!(&self.authcode, serde_json::Value::Number(n) if n.as_i64() == Some(0))
    }
}

/// One member from /data/member/get.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberProfile {
    pub cust_id: i64,
    pub display_name: String,
    #[serde(default)]
    pub member_since: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberGetResponse {
    #[serde(default)]
    pub members: Vec<MemberProfile>,
}

/// One entry from /data/stats/member_recent_races.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentRace {
    pub subsession_id: i64,
    pub series_id: i64,
    pub session_start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentRacesResponse {
    pub cust_id: i64,
    #[serde(default)]
    pub races: Vec<RecentRace>,
}

/// Track block of a subsession result.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackInfo {
    pub track_name: String,
    #[serde(default)]
    pub corners_per_lap: u32,
}

/// One driver row inside a simsession result block.
#[derive(Debug, Clone, Deserialize)]
pub struct SubsessionDriver {
    pub cust_id: i64,
    pub display_name: String,
    pub finish_position: u32,
    pub incidents: u32,
    pub laps_complete: u32,
    #[serde(default)]
    pub champ_points: i32,
}

/// One simsession block (practice, qualifying, race...).
#[derive(Debug, Clone, Deserialize)]
pub struct SimsessionResult {
    pub simsession_number: i32,
    #[serde(default)]
    pub results: Vec<SubsessionDriver>,
}

/// /data/results/get payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SubsessionResultResponse {
    pub subsession_id: i64,
    pub start_time: DateTime<Utc>,
    pub series_id: i64,
    pub season_year: u16,
    pub season_quarter: u8,
    pub race_week_num: u8,
    pub track: TrackInfo,
    #[serde(default)]
    pub session_results: Vec<SimsessionResult>,
}

/// The race simsession carries number 0; practice and qualifying are
/// negative.
const RACE_SIMSESSION: i32 = 0;

impl SubsessionResultResponse {
    /// Split into the cached header plus the race session's driver rows.
    ///
    /// Returns `None` when the payload has no race simsession, a
    /// practice-only subsession, which the cache has no use for.
    pub fn into_cache_rows(self) -> Option<(Subsession, Vec<DriverResult>)> {
        let race = self
            .session_results
            .into_iter()
            .find(|s| s.simsession_number == RACE_SIMSESSION)?;

        let header = Subsession {
            subsession_id: self.subsession_id,
            start_time: self.start_time,
            series_id: self.series_id,
            season_year: self.season_year,
            season_quarter: self.season_quarter,
            race_week: self.race_week_num,
            track_name: self.track.track_name,
            corners_per_lap: self.track.corners_per_lap,
        };
        let drivers = race
            .results
            .into_iter()
            .map(|d| DriverResult {
                cust_id: d.cust_id,
                finish_position: d.finish_position,
                incidents: d.incidents,
                laps_complete: d.laps_complete,
                champ_points: d.champ_points,
            })
            .collect();
        Some((header, drivers))
    }
}

/// One series from /data/series/get.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesData {
    pub series_id: i64,
    pub series_name: String,
    #[serde(default)]
    pub series_short_name: Option<String>,
    #[serde(default)]
    pub search_filters: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// One running season from /data/series/seasons.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesSeason {
    pub series_id: i64,
    pub season_year: u16,
    pub season_quarter: u8,
}

/// One near-term session from /data/season/race_guide.
#[derive(Debug, Clone, Deserialize)]
pub struct RaceGuideSession {
    pub series_id: i64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub entry_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceGuideResponse {
    #[serde(default)]
    pub sessions: Vec<RaceGuideSession>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authcode_zero_is_failure() {
        let failed: AuthResponse = serde_json::from_str(r#"{"authcode": 0}"#).unwrap();
        assert!(!failed.succeeded());

        let ok: AuthResponse = serde_json::from_str(r#"{"authcode": "abc123"}"#).unwrap();
        assert!(ok.succeeded());
    }

    #[test]
    fn subsession_payload_extracts_race_session() {
        let payload = r#"
        {
            "subsession_id": 555,
            "start_time": "2024-04-02T20:00:00Z",
            "series_id": 139,
            "season_year": 2024,
            "season_quarter": 2,
            "race_week_num": 3,
            "track": {"track_name": "Okayama", "corners_per_lap": 13},
            "session_results": [
                {"simsession_number": -1, "results": [
                    {"cust_id": 7, "display_name": "Alice", "finish_position": 1,
                     "incidents": 0, "laps_complete": 8, "champ_points": 0}
                ]},
                {"simsession_number": 0, "results": [
                    {"cust_id": 7, "display_name": "Alice", "finish_position": 2,
                     "incidents": 3, "laps_complete": 22, "champ_points": 61}
                ]}
            ]
        }
        "#;
        let parsed: SubsessionResultResponse = serde_json::from_str(payload).unwrap();
        let (header, drivers) = parsed.into_cache_rows().unwrap();

        assert_eq!(header.subsession_id, 555);
        assert_eq!(header.race_week, 3);
        assert_eq!(header.corners_per_lap, 13);
        assert_eq!(drivers.len(), 1);
        // The race session row, not the qualifying one.
        assert_eq!(drivers[0].incidents, 3);
        assert_eq!(drivers[0].champ_points, 61);
    }

    #[test]
    fn practice_only_subsession_yields_nothing() {
        let payload = r#"
        {
            "subsession_id": 556,
            "start_time": "2024-04-02T20:00:00Z",
            "series_id": 139,
            "season_year": 2024,
            "season_quarter": 2,
            "race_week_num": 3,
            "track": {"track_name": "Okayama", "corners_per_lap": 13},
            "session_results": [{"simsession_number": -2, "results": []}]
        }
        "#;
        let parsed: SubsessionResultResponse = serde_json::from_str(payload).unwrap();
        assert!(parsed.into_cache_rows().is_none());
    }
}
