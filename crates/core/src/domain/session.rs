use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::DomainError;

/// Stable platform identifier of a chat participant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }

    /// Accepts both `<@id>` and the nickname form `<@!id>`.
    pub fn from_mention(raw: &str) -> Option<Self> {
        let inner = raw.trim().strip_prefix("<@")?.strip_suffix('>')?;
        let inner = inner.strip_prefix('!').unwrap_or(inner);
        if inner.is_empty() || !inner.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(inner.to_owned()))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the chat message that displays a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Open,
    Full,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Month/day plus wall-clock time, as shown in the recruitment post.
///
/// The year is intentionally absent: the post never displays one, and the
/// lookup path resolves it against the current date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledStart {
    pub month: u32,
    pub day: u32,
    pub time: NaiveTime,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid scheduled start `{0}` (expected `M/D HH:MM`)")]
pub struct ParseScheduledStartError(pub String);

impl ScheduledStart {
    pub fn new(month: u32, day: u32, time: NaiveTime) -> Self {
        Self { month, day, time }
    }

    pub fn from_datetime<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let time = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(NaiveTime::MIN);
        Self { month: now.month(), day: now.day(), time }
    }

    pub fn with_time(self, time: NaiveTime) -> Self {
        Self { time, ..self }
    }

    pub fn with_date(self, month: u32, day: u32) -> Self {
        Self { month, day, ..self }
    }
}

impl fmt::Display for ScheduledStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.month, self.day, self.time.format("%H:%M"))
    }
}

impl FromStr for ScheduledStart {
    type Err = ParseScheduledStartError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseScheduledStartError(value.to_owned());
        let (date, time) = value.trim().split_once(' ').ok_or_else(invalid)?;
        let (month, day) = date.split_once('/').ok_or_else(invalid)?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        let day = day.parse::<u32>().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(invalid());
        }
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| invalid())?;
        Ok(Self { month, day, time })
    }
}

/// One upcoming external event attached to a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleMatch {
    /// Display start, `MM/DD HH:MM`.
    pub label: String,
    pub rule: String,
    pub maps: Vec<String>,
}

pub const MAX_SCHEDULE_MATCHES: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub organizer: ParticipantId,
    pub capacity: u32,
    pub attendees: Vec<ParticipantId>,
    pub status: SessionStatus,
    pub scheduled_start: ScheduledStart,
    pub schedule_matches: Vec<ScheduleMatch>,
}

impl Session {
    /// A fresh session: the organizer occupies the first roster slot.
    pub fn open(organizer: ParticipantId, capacity: u32, scheduled_start: ScheduledStart) -> Self {
        Self {
            attendees: vec![organizer.clone()],
            organizer,
            capacity,
            status: SessionStatus::Open,
            scheduled_start,
            schedule_matches: Vec::new(),
        }
    }

    pub fn with_schedule_matches(mut self, mut matches: Vec<ScheduleMatch>) -> Self {
        matches.truncate(MAX_SCHEDULE_MATCHES);
        self.schedule_matches = matches;
        self
    }

    pub fn filled(&self) -> u32 {
        u32::try_from(self.attendees.len()).unwrap_or(u32::MAX)
    }

    pub fn is_organizer(&self, participant: &ParticipantId) -> bool {
        &self.organizer == participant
    }

    pub fn is_attending(&self, participant: &ParticipantId) -> bool {
        self.attendees.contains(participant)
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self.status, next),
            (SessionStatus::Open, SessionStatus::Full)
                | (SessionStatus::Open, SessionStatus::Cancelled)
                | (SessionStatus::Full, SessionStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: SessionStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidSessionTransition { from: self.status, to: next })
    }

    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if self.attendees.first() != Some(&self.organizer) {
            return Err(DomainError::InvariantViolation(
                "organizer must occupy the first roster slot".to_owned(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.attendees.len());
        if !self.attendees.iter().all(|attendee| seen.insert(attendee)) {
            return Err(DomainError::InvariantViolation(
                "roster contains a duplicate participant".to_owned(),
            ));
        }

        if self.filled() > self.capacity {
            return Err(DomainError::InvariantViolation(format!(
                "roster holds {} participants but capacity is {}",
                self.filled(),
                self.capacity
            )));
        }

        if self.schedule_matches.len() > MAX_SCHEDULE_MATCHES {
            return Err(DomainError::InvariantViolation(
                "at most two schedule matches can be attached".to_owned(),
            ));
        }

        Ok(())
    }
}
