//! Time-bucketed event stats and session health stats.
//!
//! Both paths are batch-shaped: one engine round-trip covers the whole
//! project set, and every input project gets an entry in the result even
//! when the engine returned nothing for it.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::errors::{SerializerError, StoreError};
use crate::stores::{ReleaseHealthEngine, TimeseriesEngine};
use crate::types::ProjectId;

/// Named stats windows: segment count x segment duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsPeriod {
    ThirtyDays,
    FourteenDays,
    SevenDays,
    TwentyFourHours,
    OneHour,
}

impl StatsPeriod {
    pub fn parse(period: &str) -> Result<Self, SerializerError> {
        match period {
            "30d" => Ok(StatsPeriod::ThirtyDays),
            "14d" => Ok(StatsPeriod::FourteenDays),
            "7d" => Ok(StatsPeriod::SevenDays),
            "24h" => Ok(StatsPeriod::TwentyFourHours),
            "1h" => Ok(StatsPeriod::OneHour),
            other => Err(SerializerError::UnknownStatsPeriod(other.to_string())),
        }
    }

    pub fn segments(&self) -> i64 {
        match self {
            StatsPeriod::ThirtyDays => 30,
            StatsPeriod::FourteenDays => 14,
            StatsPeriod::SevenDays => 7,
            StatsPeriod::TwentyFourHours => 24,
            StatsPeriod::OneHour => 60,
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            StatsPeriod::ThirtyDays | StatsPeriod::FourteenDays | StatsPeriod::SevenDays => {
                Duration::hours(24)
            }
            StatsPeriod::TwentyFourHours => Duration::hours(1),
            StatsPeriod::OneHour => Duration::minutes(1),
        }
    }
}

/// One project's time series: `(unix_timestamp, count)` pairs, ascending.
pub type StatsSeries = Vec<(i64, u64)>;

/// Fetches bucketed event counts for the batch and reshapes them into a
/// fixed-width, zero-filled series per project.
pub async fn get_stats(
    project_ids: &[ProjectId],
    query: &str,
    environment_id: Option<&str>,
    period: StatsPeriod,
    now: DateTime<Utc>,
    engine: &dyn TimeseriesEngine,
) -> Result<HashMap<ProjectId, StatsSeries>, StoreError> {
    let segments = period.segments();
    let interval = period.interval();
    let start = now - interval * (segments - 1) as i32;

    let query = match environment_id {
        Some(environment) => format!("{query} environment:{environment}"),
        None => query.to_string(),
    };

    let raw = engine
        .timeseries(project_ids, &query, start, now, interval.num_seconds())
        .await?;

    let mut results = HashMap::with_capacity(project_ids.len());
    for project_id in project_ids {
        let counts: HashMap<i64, u64> = raw
            .get(project_id)
            .map(|series| series.iter().copied().collect())
            .unwrap_or_default();

        let series: StatsSeries = (0..segments)
            .map(|segment| {
                let timestamp = (start + interval * segment as i32).timestamp();
                (timestamp, counts.get(&timestamp).copied().unwrap_or(0))
            })
            .collect();
        results.insert(*project_id, series);
    }
    Ok(results)
}

/// Session health summary for one project.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionStats {
    #[serde(rename = "currentCrashFreeRate")]
    pub current_crash_free_rate: Option<f64>,
    #[serde(rename = "previousCrashFreeRate")]
    pub previous_crash_free_rate: Option<f64>,
    #[serde(rename = "hasHealthData")]
    pub has_health_data: bool,
}

/// Fetches crash-free rates for the current window and the preceding window
/// of equal length.
///
/// Projects with no rate in either window are only *possibly* without health
/// data; those go through one batched existence check which can flip the
/// `has_health_data` flag back to true.
pub async fn get_session_stats(
    project_ids: &[ProjectId],
    period: StatsPeriod,
    now: DateTime<Utc>,
    engine: &dyn ReleaseHealthEngine,
) -> Result<HashMap<ProjectId, SessionStats>, StoreError> {
    let segments = period.segments();
    let interval = period.interval();
    let current_start = now - interval * segments as i32;
    let previous_start = now - interval * (2 * segments) as i32;

    let rates = engine
        .current_and_previous_crash_free_rates(
            project_ids,
            current_start,
            now,
            previous_start,
            current_start,
            interval.num_seconds(),
        )
        .await?;

    let mut results = HashMap::with_capacity(project_ids.len());
    let mut ambiguous: Vec<ProjectId> = Vec::new();
    for project_id in project_ids {
        let project_rates = rates.get(project_id).copied().unwrap_or_default();
        let has_health_data =
            project_rates.current.is_some() || project_rates.previous.is_some();
        if !has_health_data {
            ambiguous.push(*project_id);
        }
        results.insert(
            *project_id,
            SessionStats {
                current_crash_free_rate: project_rates.current,
                previous_crash_free_rate: project_rates.previous,
                has_health_data,
            },
        );
    }

    if !ambiguous.is_empty() {
        let with_data = engine.check_has_health_data(&ambiguous).await?;
        for project_id in with_data {
            if let Some(stats) = results.get_mut(&project_id) {
                stats.has_health_data = true;
            }
        }
    }

    Ok(results)
}
