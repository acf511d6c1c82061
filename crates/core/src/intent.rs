//! Free-text recruitment grammar.
//!
//! A post such as `@3 12/24 21時 リグマ` asks for three more players, starting
//! on December 24th at 21:00, with the league schedule attached.

use std::borrow::Cow;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use regex::Regex;

use crate::domain::session::ScheduledStart;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecruitmentIntent {
    /// Requested headcount, excluding the organizer (1..=9).
    pub requested: u32,
    pub scheduled_start: ScheduledStart,
    pub league: bool,
}

impl RecruitmentIntent {
    /// Target roster size; the organizer takes the first slot.
    pub fn session_capacity(&self) -> u32 {
        self.requested + 1
    }
}

/// Returns `None` when the text carries no capacity marker, i.e. the message
/// is not a recruitment post at all.
pub fn parse_recruitment<Tz: TimeZone>(
    text: &str,
    now: &DateTime<Tz>,
) -> Option<RecruitmentIntent> {
    let requested = parse_capacity(text)?;
    let stripped = strip_mentions(text);
    Some(RecruitmentIntent {
        requested,
        scheduled_start: parse_start(&stripped, now),
        league: parse_league_intent(&stripped),
    })
}

pub fn parse_capacity(text: &str) -> Option<u32> {
    let stripped = strip_mentions(text);
    capacity_regex()
        .captures(&stripped)
        .and_then(|captures| captures.get(1))
        .and_then(|digit| digit.as_str().parse::<u32>().ok())
}

/// Removes user (`<@id>`, `<@!id>`) and role (`<@&id>`) mention tokens so
/// their digits never read as a capacity marker or a time.
pub fn strip_mentions(text: &str) -> Cow<'_, str> {
    mention_regex().replace_all(text, "")
}

/// Time and date are searched independently; missing pieces default to
/// `now`. The date is only looked at once a time was found.
pub fn parse_start<Tz: TimeZone>(text: &str, now: &DateTime<Tz>) -> ScheduledStart {
    let fallback = ScheduledStart::from_datetime(now);
    let Some(time) = parse_time(text) else {
        return fallback;
    };

    let start = fallback.with_time(time);
    match parse_date(text) {
        Some((month, day)) => start.with_date(month, day),
        None => start,
    }
}

pub fn parse_league_intent(text: &str) -> bool {
    league_regex().is_match(text)
}

/// League blocks last two hours and start on odd hours, so an even hour is
/// moved back to the block it falls in. Minutes are dropped. The year is
/// taken from `today`, rolling forward when the month/day already passed.
pub fn normalize_for_lookup(start: &ScheduledStart, today: NaiveDate) -> Option<NaiveDateTime> {
    let mut date = NaiveDate::from_ymd_opt(today.year(), start.month, start.day)?;
    if date < today {
        date = NaiveDate::from_ymd_opt(today.year() + 1, start.month, start.day)?;
    }

    let hour = start.time.hour();
    let block = date.and_hms_opt(hour, 0, 0)?;
    if hour % 2 == 0 {
        return Some(block - Duration::hours(1));
    }
    Some(block)
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let captures = time_regex().captures(text)?;
    let hour = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let minute = match captures.get(2) {
        Some(minute) => minute.as_str().parse::<u32>().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn parse_date(text: &str) -> Option<(u32, u32)> {
    let captures = date_regex().captures(text)?;
    let month = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let day = captures.get(2)?.as_str().parse::<u32>().ok()?;
    Some((month, day))
}

fn mention_regex() -> &'static Regex {
    static MENTION_RE: OnceLock<Regex> = OnceLock::new();
    MENTION_RE
        .get_or_init(|| Regex::new(r"<@[!&]?[0-9A-Za-z]*>").expect("mention regex must compile"))
}

fn capacity_regex() -> &'static Regex {
    static CAPACITY_RE: OnceLock<Regex> = OnceLock::new();
    CAPACITY_RE.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9A-Za-z])[@＠]([1-9])(?:[^0-9]|$)")
            .expect("capacity regex must compile")
    })
}

fn time_regex() -> &'static Regex {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    TIME_RE.get_or_init(|| {
        Regex::new(r"(2[0-3]|[01]?[0-9])[:：時](?:([0-5][0-9])分?)?")
            .expect("time regex must compile")
    })
}

fn date_regex() -> &'static Regex {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    DATE_RE.get_or_init(|| {
        Regex::new(r"(1[0-2]|0?[1-9])[/／\-月](3[01]|[12][0-9]|0?[1-9])日?")
            .expect("date regex must compile")
    })
}

fn league_regex() -> &'static Regex {
    static LEAGUE_RE: OnceLock<Regex> = OnceLock::new();
    LEAGUE_RE.get_or_init(|| Regex::new(r"リグマ|リーグマッチ").expect("league regex must compile"))
}
