pub mod attendance;
pub mod config;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod schedule;

pub use attendance::{AttendanceOutcome, IgnoreReason, RosterAction, SessionSignal};
pub use domain::session::{
    MessageId, ParticipantId, ScheduleMatch, ScheduledStart, Session, SessionStatus,
};
pub use errors::DomainError;
pub use intent::RecruitmentIntent;
pub use schedule::{LookupError, ScheduleEntry, ScheduleSource};
