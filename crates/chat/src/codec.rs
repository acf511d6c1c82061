//! Session State Codec: projects a [`Session`] onto a recruitment post body
//! and reads it back.

use std::sync::OnceLock;

use boshu_core::{DomainError, ParticipantId, ScheduleMatch, ScheduledStart, Session, SessionStatus};
use regex::Regex;
use thiserror::Error;

use crate::body::{SectionKind, StructuredBody};

pub const FULL_FOOTER: &str = "※参加者が集まりました";
pub const CANCELLED_FOOTER: &str = "※募集が停止されました";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("capacity status section is missing")]
    MissingCapacity,
    #[error("attendee list section is missing")]
    MissingAttendees,
    #[error("scheduled start section is missing")]
    MissingScheduledStart,
    #[error("capacity status `{0}` does not hold `<filled> / <capacity>`")]
    MalformedCapacity(String),
    #[error("scheduled start `{0}` is not `M/D HH:MM`")]
    MalformedScheduledStart(String),
    #[error("attendee entry `{0}` is not a participant mention")]
    MalformedAttendee(String),
    #[error("attendee list is empty")]
    EmptyRoster,
    #[error("capacity status shows {shown} participants but the roster lists {listed}")]
    FilledMismatch { shown: u32, listed: u32 },
    #[error(transparent)]
    Invariant(#[from] DomainError),
}

#[derive(Clone, Debug)]
pub struct SessionCodec {
    title: String,
}

impl SessionCodec {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }

    pub fn encode(&self, session: &Session) -> StructuredBody {
        let mut body = StructuredBody::new(self.title.clone());
        self.write_roster(&mut body, session);
        for schedule_match in &session.schedule_matches {
            body.upsert_section(
                SectionKind::LeagueMatch(schedule_match.label.clone()),
                match_value(schedule_match),
            );
        }
        body
    }

    /// Rewrites the roster-derived sections of an already posted body; other
    /// sections keep their position and value.
    pub fn update(&self, mut body: StructuredBody, session: &Session) -> StructuredBody {
        self.write_roster(&mut body, session);
        body
    }

    pub fn decode(&self, body: &StructuredBody) -> Result<Session, DecodeError> {
        let capacity_value =
            body.section(&SectionKind::CapacityStatus).ok_or(DecodeError::MissingCapacity)?;
        let roster_value =
            body.section(&SectionKind::AttendeeList).ok_or(DecodeError::MissingAttendees)?;
        let start_value = body
            .section(&SectionKind::ScheduledStart)
            .ok_or(DecodeError::MissingScheduledStart)?;

        let (shown, capacity) = parse_capacity_status(capacity_value)?;
        let attendees = parse_roster(roster_value)?;
        let scheduled_start = start_value
            .parse::<ScheduledStart>()
            .map_err(|_| DecodeError::MalformedScheduledStart(start_value.to_owned()))?;

        let listed = u32::try_from(attendees.len()).unwrap_or(u32::MAX);
        if shown != listed {
            return Err(DecodeError::FilledMismatch { shown, listed });
        }

        let schedule_matches = body
            .league_sections()
            .map(|(label, value)| {
                let mut lines = value.lines();
                let rule = lines.next().unwrap_or_default().to_owned();
                ScheduleMatch { label: label.to_owned(), rule, maps: lines.map(str::to_owned).collect() }
            })
            .collect();

        let session = Session {
            organizer: attendees[0].clone(),
            capacity,
            attendees,
            status: status_from_footer(body.footer.as_deref()),
            scheduled_start,
            schedule_matches,
        };
        session.check_invariants()?;
        Ok(session)
    }

    fn write_roster(&self, body: &mut StructuredBody, session: &Session) {
        body.upsert_section(
            SectionKind::CapacityStatus,
            format!("{} / {}", session.filled(), session.capacity),
        );
        body.upsert_section(SectionKind::ScheduledStart, session.scheduled_start.to_string());
        body.upsert_section(
            SectionKind::AttendeeList,
            session.attendees.iter().map(ParticipantId::mention).collect::<Vec<_>>().join("\n"),
        );
        body.footer = footer_for(session.status).map(str::to_owned);
    }
}

pub fn footer_for(status: SessionStatus) -> Option<&'static str> {
    match status {
        SessionStatus::Open => None,
        SessionStatus::Full => Some(FULL_FOOTER),
        SessionStatus::Cancelled => Some(CANCELLED_FOOTER),
    }
}

fn status_from_footer(footer: Option<&str>) -> SessionStatus {
    match footer.map(str::trim) {
        Some(FULL_FOOTER) => SessionStatus::Full,
        Some(CANCELLED_FOOTER) => SessionStatus::Cancelled,
        _ => SessionStatus::Open,
    }
}

fn match_value(schedule_match: &ScheduleMatch) -> String {
    std::iter::once(schedule_match.rule.as_str())
        .chain(schedule_match.maps.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First integer is the filled count, second the capacity.
fn parse_capacity_status(value: &str) -> Result<(u32, u32), DecodeError> {
    let malformed = || DecodeError::MalformedCapacity(value.to_owned());
    let mut numbers = integer_regex().find_iter(value).map(|found| found.as_str().parse::<u32>());
    let filled = numbers.next().ok_or_else(malformed)?.map_err(|_| malformed())?;
    let capacity = numbers.next().ok_or_else(malformed)?.map_err(|_| malformed())?;
    Ok((filled, capacity))
}

fn parse_roster(value: &str) -> Result<Vec<ParticipantId>, DecodeError> {
    let attendees = value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            ParticipantId::from_mention(line)
                .ok_or_else(|| DecodeError::MalformedAttendee(line.to_owned()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if attendees.is_empty() {
        return Err(DecodeError::EmptyRoster);
    }
    Ok(attendees)
}

fn integer_regex() -> &'static Regex {
    static INTEGER_RE: OnceLock<Regex> = OnceLock::new();
    INTEGER_RE.get_or_init(|| Regex::new(r"[0-9]+").expect("integer regex must compile"))
}
