use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::session::{ScheduleMatch, MAX_SCHEDULE_MATCHES};

/// Body of the schedule endpoint: `{ "result": [ ... ] }`, chronological.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    #[serde(default)]
    pub result: Vec<ScheduleEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub start: String,
    pub rule: String,
    #[serde(default)]
    pub maps: Vec<String>,
}

impl ScheduleEntry {
    /// Local start time in `timezone`. Offset-less timestamps are taken as
    /// already local.
    pub fn starts_at(&self, timezone: Tz) -> Option<NaiveDateTime> {
        let raw = self.start.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&timezone).naive_local());
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("schedule request failed: {0}")]
    Transport(String),
    #[error("schedule endpoint answered with status {0}")]
    Status(u16),
    #[error("schedule payload could not be decoded: {0}")]
    Decode(String),
    #[error("schedule request timed out")]
    Timeout,
}

#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<ScheduleEntry>, LookupError>;
}

/// Finds the entry starting exactly at `block_start` and the one right after
/// it. Entries with unreadable timestamps are skipped.
pub fn select_matches(
    entries: &[ScheduleEntry],
    block_start: NaiveDateTime,
    timezone: Tz,
) -> Vec<ScheduleMatch> {
    let Some(index) =
        entries.iter().position(|entry| entry.starts_at(timezone) == Some(block_start))
    else {
        return Vec::new();
    };

    entries[index..]
        .iter()
        .take(MAX_SCHEDULE_MATCHES)
        .filter_map(|entry| {
            let starts_at = entry.starts_at(timezone)?;
            Some(ScheduleMatch {
                label: starts_at.format("%m/%d %H:%M").to_string(),
                rule: entry.rule.clone(),
                maps: entry.maps.clone(),
            })
        })
        .collect()
}
