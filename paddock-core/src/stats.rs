//! Pure reductions over cached race results.
//!
//! Everything here is arithmetic over [`RaceSample`] rows that the gateway
//! reads from the subsession cache; no chat or database types. The
//! zero-denominator cases are guarded explicitly: an incident-free driver
//! has infinite laps-per-incident, and that infinity is filtered out
//! before anything numeric (chart axis ranges, finite maxima) consumes it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// One driver's row from one cached subsession.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceSample {
    pub subsession_id: i64,
    pub start_time: DateTime<Utc>,
    pub race_week: u8,
    pub finish_position: u32,
    pub incidents: u32,
    pub laps: u32,
    pub corners_per_lap: u32,
    pub champ_points: i32,
}

impl RaceSample {
    /// Corners the driver actually took in this race.
    pub fn corners(&self) -> u64 {
        u64::from(self.laps) * u64::from(self.corners_per_lap)
    }
}

/// Aggregated totals for one driver over a result window.
///
/// An unknown member simply aggregates zero rows: `races == 0`, which the
/// command layer turns into a "not found" message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DriverTotals {
    pub races: u32,
    pub incidents: u32,
    pub laps: u32,
    pub weeks_raced: u32,
    /// Mean of the per-week best championship points over weeks raced.
    pub avg_champ_points: f64,
}

impl DriverTotals {
    /// `laps / incidents`; infinite for an incident-free driver.
    pub fn laps_per_incident(&self) -> f64 {
        if self.incidents == 0 {
            f64::INFINITY
        } else {
            f64::from(self.laps) / f64::from(self.incidents)
        }
    }
}

/// Reduce a driver's result rows to head-to-head totals.
pub fn head_to_head(samples: &[RaceSample]) -> DriverTotals {
    let weekly = weekly_best_points(samples);
    let avg_champ_points = if weekly.is_empty() {
        0.0
    } else {
        weekly.iter().map(|&p| f64::from(p)).sum::<f64>() / weekly.len() as f64
    };
    DriverTotals {
        races: samples.len() as u32,
        incidents: samples.iter().map(|s| s.incidents).sum(),
        laps: samples.iter().map(|s| s.laps).sum(),
        weeks_raced: weekly.len() as u32,
        avg_champ_points,
    }
}

/// Best championship points per race week, ordered by week.
///
/// Only a driver's best result of a week counts toward the championship.
pub fn weekly_best_points(samples: &[RaceSample]) -> Vec<i32> {
    let mut by_week: BTreeMap<u8, i32> = BTreeMap::new();
    for sample in samples {
        let best = by_week.entry(sample.race_week).or_insert(i32::MIN);
        *best = (*best).max(sample.champ_points);
    }
    by_week.into_values().collect()
}

/// Sum of the best `n` weekly point totals.
///
/// The worst weeks drop regardless of where they fall in the season.
pub fn best_n_total(weekly_points: &[i32], n: usize) -> i32 {
    let mut sorted = weekly_points.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.iter().take(n).sum()
}

/// Projected end-of-season total under best-`n`-of-`m` scoring.
///
/// While the season is running, assumes the driver keeps scoring at their
/// current best-`n` average for the remaining countable weeks. Once the
/// season is complete the projection is just the best-`n` total. A driver
/// with zero weeks raced projects to zero.
pub fn project_final(weekly_points: &[i32], n: usize, season_complete: bool) -> f64 {
    if weekly_points.is_empty() || n == 0 {
        return 0.0;
    }
    let total = f64::from(best_n_total(weekly_points, n));
    if season_complete {
        return total;
    }
    let counted = weekly_points.len().min(n);
    total / counted as f64 * n as f64
}

/// Aggregation errors that reach the user as a short chat message.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("not enough corners for a meaningful trend ({have} of {need})")]
    InsufficientData { have: u64, need: u64 },
}

/// One point on the rolling corners-per-incident curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpiSample {
    pub corners: u64,
    pub incidents: u64,
    pub ratio: f64,
}

/// Rolling corners-per-incident curve in race-chronological order.
///
/// Consumes its samples: one forward pass, no restart. Construction fails
/// below the configured corner minimum so callers refuse to render a trend
/// line out of a handful of laps instead of dividing by the partial count.
pub struct CpiCurve {
    samples: std::vec::IntoIter<RaceSample>,
    corners: u64,
    incidents: u64,
}

impl CpiCurve {
    /// Cumulative corners required before the trend means anything.
    pub const DEFAULT_MIN_CORNERS: u64 = 2000;

    pub fn new(mut samples: Vec<RaceSample>, min_corners: u64) -> Result<Self, StatsError> {
        let have: u64 = samples.iter().map(RaceSample::corners).sum();
        if have < min_corners {
            return Err(StatsError::InsufficientData {
                have,
                need: min_corners,
            });
        }
        samples.sort_by_key(|s| s.start_time);
        Ok(Self {
            samples: samples.into_iter(),
            corners: 0,
            incidents: 0,
        })
    }
}

impl Iterator for CpiCurve {
    type Item = CpiSample;

    fn next(&mut self) -> Option<CpiSample> {
        let race = self.samples.next()?;
        self.corners += race.corners();
        self.incidents += u64::from(race.incidents);
        let ratio = if self.incidents == 0 {
            f64::INFINITY
        } else {
            self.corners as f64 / self.incidents as f64
        };
        Some(CpiSample {
            corners: self.corners,
            incidents: self.incidents,
            ratio,
        })
    }
}

/// A driver's position on the compass plot: consistency (laps per
/// incident) against competitiveness (average championship points).
#[derive(Debug, Clone, PartialEq)]
pub struct CompassPoint {
    pub label: String,
    pub laps_per_incident: f64,
    pub avg_champ_points: f64,
}

/// Build the plotted set for the compass chart.
///
/// Incident-free drivers sit at infinite laps-per-incident and would
/// flatten the axis for everyone else, so they are left off the plot;
/// drivers with no races in the window are skipped too.
pub fn compass_points<'a, I>(drivers: I) -> Vec<CompassPoint>
where
    I: IntoIterator<Item = (&'a str, &'a DriverTotals)>,
{
    drivers
        .into_iter()
        .filter(|(_, totals)| totals.races > 0 && totals.incidents > 0)
        .map(|(label, totals)| CompassPoint {
            label: label.to_string(),
            laps_per_incident: totals.laps_per_incident(),
            avg_champ_points: totals.avg_champ_points,
        })
        .collect()
}
