//! Roster state transitions for a recruitment session.
//!
//! Every operation mutates the session in place and reports either the
//! signals the caller must execute against the chat platform, or the reason
//! the request was ignored. Ignored requests never surface to users.

use crate::domain::session::{ParticipantId, Session, SessionStatus};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RosterAction {
    Join,
    Leave,
    Stop,
}

impl RosterAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Stop => "stop",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionSignal {
    /// Remove every reaction from the post so no further events arrive.
    ClearReactions,
    StatusChanged { from: SessionStatus, to: SessionStatus },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    Organizer,
    AlreadyAttending,
    NotAttending,
    NotOrganizer,
    SessionFull,
    SessionCancelled,
}

impl IgnoreReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Organizer => "organizer_self_action",
            Self::AlreadyAttending => "already_attending",
            Self::NotAttending => "not_attending",
            Self::NotOrganizer => "not_organizer",
            Self::SessionFull => "session_full",
            Self::SessionCancelled => "session_cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttendanceOutcome {
    /// The session changed and must be re-rendered.
    Applied { signals: Vec<SessionSignal> },
    Ignored(IgnoreReason),
}

impl AttendanceOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn clears_reactions(&self) -> bool {
        match self {
            Self::Applied { signals } => signals.contains(&SessionSignal::ClearReactions),
            Self::Ignored(_) => false,
        }
    }
}

pub fn apply(
    session: &mut Session,
    action: RosterAction,
    actor: &ParticipantId,
) -> Result<AttendanceOutcome, DomainError> {
    match action {
        RosterAction::Join => join(session, actor),
        RosterAction::Leave => leave(session, actor),
        RosterAction::Stop => stop(session, actor),
    }
}

pub fn join(
    session: &mut Session,
    participant: &ParticipantId,
) -> Result<AttendanceOutcome, DomainError> {
    if session.status.is_terminal() {
        return Ok(AttendanceOutcome::Ignored(IgnoreReason::SessionCancelled));
    }
    if session.is_organizer(participant) {
        return Ok(AttendanceOutcome::Ignored(IgnoreReason::Organizer));
    }
    if session.is_attending(participant) {
        return Ok(AttendanceOutcome::Ignored(IgnoreReason::AlreadyAttending));
    }
    // A full session stays full even after someone leaves, so it never
    // re-enters the capacity transition.
    if session.status == SessionStatus::Full || session.filled() >= session.capacity {
        return Ok(AttendanceOutcome::Ignored(IgnoreReason::SessionFull));
    }

    session.attendees.push(participant.clone());

    let mut signals = Vec::new();
    if session.filled() == session.capacity {
        let from = session.status;
        session.transition_to(SessionStatus::Full)?;
        signals.push(SessionSignal::StatusChanged { from, to: SessionStatus::Full });
        signals.push(SessionSignal::ClearReactions);
    }

    session.check_invariants()?;
    Ok(AttendanceOutcome::Applied { signals })
}

pub fn leave(
    session: &mut Session,
    participant: &ParticipantId,
) -> Result<AttendanceOutcome, DomainError> {
    if session.status.is_terminal() {
        return Ok(AttendanceOutcome::Ignored(IgnoreReason::SessionCancelled));
    }
    if session.is_organizer(participant) {
        return Ok(AttendanceOutcome::Ignored(IgnoreReason::Organizer));
    }
    let Some(position) = session.attendees.iter().position(|attendee| attendee == participant)
    else {
        return Ok(AttendanceOutcome::Ignored(IgnoreReason::NotAttending));
    };

    session.attendees.remove(position);
    session.check_invariants()?;
    Ok(AttendanceOutcome::Applied { signals: Vec::new() })
}

pub fn stop(
    session: &mut Session,
    requester: &ParticipantId,
) -> Result<AttendanceOutcome, DomainError> {
    if session.status.is_terminal() {
        return Ok(AttendanceOutcome::Ignored(IgnoreReason::SessionCancelled));
    }
    if !session.is_organizer(requester) {
        return Ok(AttendanceOutcome::Ignored(IgnoreReason::NotOrganizer));
    }

    let from = session.status;
    session.transition_to(SessionStatus::Cancelled)?;
    Ok(AttendanceOutcome::Applied {
        signals: vec![
            SessionSignal::StatusChanged { from, to: SessionStatus::Cancelled },
            SessionSignal::ClearReactions,
        ],
    })
}
