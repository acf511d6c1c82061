use boshu_chat::body::EmbedPayload;
use boshu_chat::codec::SessionCodec;
use boshu_chat::policy::ReactionPolicy;
use boshu_core::config::LeaveMode;
use boshu_core::intent::{normalize_for_lookup, parse_recruitment};
use boshu_core::{ParticipantId, Session};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use super::CommandResult;

#[derive(Clone, Debug)]
pub struct PreviewRequest {
    pub text: String,
    pub author: String,
    /// RFC 3339 receipt time; defaults to now.
    pub at: Option<String>,
    pub timezone: String,
    pub leave_mode: LeaveMode,
}

#[derive(Debug, Serialize)]
struct PreviewOutput {
    command: &'static str,
    status: &'static str,
    requested: u32,
    capacity: u32,
    scheduled_start: String,
    league: bool,
    lookup_block_start: Option<String>,
    affordances: Vec<String>,
    body: EmbedPayload,
}

/// Dry run of the recruitment pipeline: parse, open, encode. No network.
pub fn run(request: &PreviewRequest) -> CommandResult {
    let timezone = match request.timezone.trim().parse::<Tz>() {
        Ok(timezone) => timezone,
        Err(_) => {
            return CommandResult::failure(
                "preview",
                "invalid_timezone",
                format!("`{}` is not a known IANA timezone", request.timezone),
                2,
            );
        }
    };

    let received_at = match request.at.as_deref() {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(error) => {
                return CommandResult::failure(
                    "preview",
                    "invalid_timestamp",
                    format!("`{raw}` is not an RFC 3339 timestamp: {error}"),
                    2,
                );
            }
        },
        None => Utc::now(),
    };
    let now = received_at.with_timezone(&timezone);

    let Some(intent) = parse_recruitment(&request.text, &now) else {
        return CommandResult::failure(
            "preview",
            "not_recruitment",
            "text carries no capacity marker such as `@3`; nothing would be posted",
            1,
        );
    };

    let policy = ReactionPolicy::new("✋", "↩", "🚫", request.leave_mode);
    let codec = SessionCodec::new(policy.title());
    let session = Session::open(
        ParticipantId::new(request.author.trim()),
        intent.session_capacity(),
        intent.scheduled_start,
    );
    let lookup_block_start = if intent.league {
        normalize_for_lookup(&intent.scheduled_start, now.date_naive())
            .map(|block| block.format("%Y-%m-%dT%H:%M:%S").to_string())
    } else {
        None
    };

    let output = PreviewOutput {
        command: "preview",
        status: "ok",
        requested: intent.requested,
        capacity: session.capacity,
        scheduled_start: session.scheduled_start.to_string(),
        league: intent.league,
        lookup_block_start,
        affordances: policy.affordances(),
        body: EmbedPayload::from(&codec.encode(&session)),
    };

    match serde_json::to_string_pretty(&output) {
        Ok(rendered) => CommandResult { exit_code: 0, output: rendered },
        Err(error) => CommandResult::failure("preview", "serialization", error.to_string(), 1),
    }
}
