use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use boshu_core::{
    attendance::{self, AttendanceOutcome, RosterAction, SessionSignal},
    intent::{self, RecruitmentIntent},
    schedule::{self, ScheduleSource},
    DomainError, MessageId, ParticipantId, ScheduleMatch, Session,
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    codec::SessionCodec,
    gateway::{ChatClient, ClientError},
    policy::ReactionPolicy,
    store::{SessionRecord, SessionSlot, SessionStore},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub envelope_id: String,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    NewMessage(NewMessageEvent),
    ReactionChanged(ReactionChangedEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::NewMessage(_) => ChatEventType::NewMessage,
            Self::ReactionChanged(_) => ChatEventType::ReactionChanged,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::NewMessage(event) => Some(&event.message_id),
            Self::ReactionChanged(event) => Some(&event.message_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    NewMessage,
    ReactionChanged,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessageEvent {
    pub channel_id: String,
    pub message_id: MessageId,
    pub author_id: ParticipantId,
    pub author_is_bot: bool,
    pub text: String,
    pub mentioned_user_ids: Vec<ParticipantId>,
    pub received_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionChangedEvent {
    pub message_id: MessageId,
    pub message_author_id: ParticipantId,
    pub user_id: ParticipantId,
    pub user_is_bot: bool,
    pub emoji: String,
    pub added: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Posted(MessageId),
    Updated(MessageId),
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[async_trait]
impl<H> EventHandler for Arc<H>
where
    H: EventHandler + ?Sized,
{
    fn event_type(&self) -> ChatEventType {
        (**self).event_type()
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        (**self).handle(envelope, ctx).await
    }
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Everything the two handlers share: who the bot is, how posts look, and
/// where live sessions are kept.
#[derive(Clone)]
pub struct RosterContext {
    pub bot_user_id: ParticipantId,
    pub client: Arc<dyn ChatClient>,
    pub store: Arc<SessionStore>,
    pub codec: SessionCodec,
    pub policy: ReactionPolicy,
}

impl RosterContext {
    pub fn new(
        bot_user_id: ParticipantId,
        client: Arc<dyn ChatClient>,
        store: Arc<SessionStore>,
        policy: ReactionPolicy,
    ) -> Self {
        let codec = SessionCodec::new(policy.title());
        Self { bot_user_id, client, store, codec, policy }
    }
}

pub fn roster_dispatcher(
    context: RosterContext,
    schedule: Arc<dyn ScheduleSource>,
    lookup_timeout: Duration,
    timezone: Tz,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(RecruitmentHandler::new(
        context.clone(),
        schedule,
        lookup_timeout,
        timezone,
    ));
    dispatcher.register(ReactionHandler::new(context));
    dispatcher
}

/// Turns recruitment posts into sessions.
pub struct RecruitmentHandler {
    context: RosterContext,
    schedule: Arc<dyn ScheduleSource>,
    lookup_timeout: Duration,
    timezone: Tz,
}

impl RecruitmentHandler {
    pub fn new(
        context: RosterContext,
        schedule: Arc<dyn ScheduleSource>,
        lookup_timeout: Duration,
        timezone: Tz,
    ) -> Self {
        Self { context, schedule, lookup_timeout, timezone }
    }

    /// A failed or slow lookup only drops the league sections.
    async fn lookup_matches(
        &self,
        intent: &RecruitmentIntent,
        today: NaiveDate,
        ctx: &EventContext,
    ) -> Vec<ScheduleMatch> {
        let Some(block_start) = intent::normalize_for_lookup(&intent.scheduled_start, today)
        else {
            debug!(
                event_name = "schedule.lookup.skipped",
                correlation_id = %ctx.correlation_id,
                scheduled_start = %intent.scheduled_start,
                "scheduled start has no calendar date; skipping schedule lookup"
            );
            return Vec::new();
        };

        let entries = match tokio::time::timeout(self.lookup_timeout, self.schedule.fetch()).await
        {
            Ok(Ok(entries)) => entries,
            Ok(Err(error)) => {
                warn!(
                    event_name = "schedule.lookup.failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "schedule lookup failed; posting without league sections"
                );
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    event_name = "schedule.lookup.failed",
                    correlation_id = %ctx.correlation_id,
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "schedule lookup timed out; posting without league sections"
                );
                return Vec::new();
            }
        };

        let matches = schedule::select_matches(&entries, block_start, self.timezone);
        debug!(
            event_name = "schedule.lookup.completed",
            correlation_id = %ctx.correlation_id,
            block_start = %block_start,
            matches = matches.len(),
            "schedule lookup completed"
        );
        matches
    }
}

#[async_trait]
impl EventHandler for RecruitmentHandler {
    fn event_type(&self) -> ChatEventType {
        ChatEventType::NewMessage
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::NewMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if event.author_is_bot || event.author_id == self.context.bot_user_id {
            debug!(
                event_name = "recruitment.message.ignored",
                correlation_id = %ctx.correlation_id,
                reason = "bot_author",
                "ignoring bot-authored message"
            );
            return Ok(HandlerResult::Ignored);
        }

        let now = event.received_at.with_timezone(&self.timezone);
        let Some(intent) = intent::parse_recruitment(&event.text, &now) else {
            debug!(
                event_name = "recruitment.message.ignored",
                correlation_id = %ctx.correlation_id,
                reason = "no_capacity_marker",
                "message is not a recruitment post"
            );
            return Ok(HandlerResult::Ignored);
        };

        let mut session = Session::open(
            event.author_id.clone(),
            intent.session_capacity(),
            intent.scheduled_start,
        );
        if intent.league {
            let matches = self.lookup_matches(&intent, now.date_naive(), ctx).await;
            session = session.with_schedule_matches(matches);
        }
        session.check_invariants()?;

        let body = self.context.codec.encode(&session);
        let message_id = self
            .context
            .client
            .post_message(&event.channel_id, &body, &self.context.policy.affordances())
            .await?;

        info!(
            event_name = "recruitment.session.created",
            correlation_id = %ctx.correlation_id,
            message_id = %message_id,
            organizer = %session.organizer,
            capacity = session.capacity,
            scheduled_start = %session.scheduled_start,
            schedule_matches = session.schedule_matches.len(),
            "recruitment session created"
        );

        self.context.store.insert_if_absent(message_id.clone(), SessionRecord { session, body }).await;
        Ok(HandlerResult::Posted(message_id))
    }
}

/// Applies reaction events to the session behind the reacted message.
pub struct ReactionHandler {
    context: RosterContext,
}

impl ReactionHandler {
    pub fn new(context: RosterContext) -> Self {
        Self { context }
    }

    fn ignore(&self, ctx: &EventContext, event: &ReactionChangedEvent, reason: &str) -> HandlerResult {
        debug!(
            event_name = "roster.reaction.ignored",
            correlation_id = %ctx.correlation_id,
            message_id = %event.message_id,
            user_id = %event.user_id,
            emoji = %event.emoji,
            added = event.added,
            reason,
            "reaction ignored"
        );
        HandlerResult::Ignored
    }

    /// Rehydrates the session on a cache miss, then applies `action` under
    /// the session lock. The record is replaced only after the edit lands.
    async fn apply_to_slot(
        &self,
        slot: &SessionSlot,
        action: RosterAction,
        event: &ReactionChangedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let mut guard = slot.lock().await;

        if guard.is_none() {
            let Some(body) = self.context.client.fetch_message(&event.message_id).await? else {
                return Ok(self.ignore(ctx, event, "message_unavailable"));
            };
            match self.context.codec.decode(&body) {
                Ok(session) => {
                    debug!(
                        event_name = "roster.session.rehydrated",
                        correlation_id = %ctx.correlation_id,
                        message_id = %event.message_id,
                        "session rehydrated from message body"
                    );
                    *guard = Some(SessionRecord { session, body });
                }
                Err(error) => {
                    debug!(
                        event_name = "roster.reaction.ignored",
                        correlation_id = %ctx.correlation_id,
                        message_id = %event.message_id,
                        reason = "not_a_session",
                        error = %error,
                        "message body does not decode as a session"
                    );
                    return Ok(HandlerResult::Ignored);
                }
            }
        }

        let Some(record) = guard.as_mut() else {
            return Ok(HandlerResult::Ignored);
        };

        let mut next = record.session.clone();
        let signals = match attendance::apply(&mut next, action, &event.user_id)? {
            AttendanceOutcome::Ignored(reason) => {
                return Ok(self.ignore(ctx, event, reason.label()));
            }
            AttendanceOutcome::Applied { signals } => signals,
        };

        let body = self.context.codec.update(record.body.clone(), &next);
        self.context.client.edit_message(&event.message_id, &body).await?;

        let clears_reactions = signals.contains(&SessionSignal::ClearReactions);
        info!(
            event_name = "roster.session.updated",
            correlation_id = %ctx.correlation_id,
            message_id = %event.message_id,
            action = action.label(),
            user_id = %event.user_id,
            filled = next.filled(),
            capacity = next.capacity,
            status = ?next.status,
            "session updated"
        );
        *record = SessionRecord { session: next, body };

        if clears_reactions {
            if let Err(error) = self.context.client.clear_reactions(&event.message_id).await {
                warn!(
                    event_name = "roster.reactions.clear_failed",
                    correlation_id = %ctx.correlation_id,
                    message_id = %event.message_id,
                    error = %error,
                    "session is full but its reactions were not cleared"
                );
                return Err(error.into());
            }
        }

        Ok(HandlerResult::Updated(event.message_id.clone()))
    }
}

#[async_trait]
impl EventHandler for ReactionHandler {
    fn event_type(&self) -> ChatEventType {
        ChatEventType::ReactionChanged
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::ReactionChanged(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if event.user_is_bot || event.user_id == self.context.bot_user_id {
            return Ok(self.ignore(ctx, event, "bot_reaction"));
        }
        if event.message_author_id != self.context.bot_user_id {
            return Ok(self.ignore(ctx, event, "foreign_message"));
        }
        let Some(action) = self.context.policy.action_for(&event.emoji, event.added) else {
            return Ok(self.ignore(ctx, event, "unrecognized_emoji"));
        };

        let slot = self.context.store.slot(&event.message_id).await;
        let result = self.apply_to_slot(&slot, action, event, ctx).await;
        drop(slot);
        if self.context.store.release(&event.message_id).await {
            debug!(
                event_name = "roster.session.released",
                correlation_id = %ctx.correlation_id,
                message_id = %event.message_id,
                "session slot released"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use boshu_core::config::LeaveMode;
    use boshu_core::{
        LookupError, MessageId, ParticipantId, ScheduleEntry, ScheduleSource, SessionStatus,
    };
    use chrono::{TimeZone, Utc};
    use chrono_tz::Asia::Tokyo;
    use tokio::sync::Mutex;

    use super::{
        roster_dispatcher, ChatEnvelope, ChatEvent, EventContext, EventDispatcher,
        DispatchError, EventHandlerError, HandlerResult, NewMessageEvent, ReactionChangedEvent, ReactionHandler, RosterContext,
    };
    use crate::body::{SectionKind, StructuredBody};
    use crate::gateway::{ChatClient, ClientError};
    use crate::policy::ReactionPolicy;
    use crate::store::SessionStore;

    const BOT: &str = "900";

    #[derive(Default)]
    struct RecordingClient {
        state: Mutex<RecordingState>,
    }

    #[derive(Default)]
    struct RecordingState {
        posted: Vec<(String, StructuredBody, Vec<String>)>,
        edits: Vec<(MessageId, StructuredBody)>,
        clears: Vec<MessageId>,
        stored: Option<StructuredBody>,
        failing_edits: bool,
        failing_clears: bool,
    }

    impl RecordingClient {
        fn with_stored(body: StructuredBody) -> Self {
            Self {
                state: Mutex::new(RecordingState { stored: Some(body), ..RecordingState::default() }),
            }
        }
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn post_message(
            &self,
            channel_id: &str,
            body: &StructuredBody,
            affordances: &[String],
        ) -> Result<MessageId, ClientError> {
            let mut state = self.state.lock().await;
            state.posted.push((channel_id.to_owned(), body.clone(), affordances.to_vec()));
            Ok(MessageId::new(format!("m-{}", state.posted.len())))
        }

        async fn edit_message(
            &self,
            message_id: &MessageId,
            body: &StructuredBody,
        ) -> Result<(), ClientError> {
            tokio::task::yield_now().await;
            let mut state = self.state.lock().await;
            if state.failing_edits {
                return Err(ClientError::Request {
                    operation: "edit_message",
                    reason: "503 Service Unavailable".to_owned(),
                });
            }
            state.edits.push((message_id.clone(), body.clone()));
            Ok(())
        }

        async fn clear_reactions(&self, message_id: &MessageId) -> Result<(), ClientError> {
            let mut state = self.state.lock().await;
            if state.failing_clears {
                return Err(ClientError::Forbidden("clear_reactions"));
            }
            state.clears.push(message_id.clone());
            Ok(())
        }

        async fn fetch_message(
            &self,
            _message_id: &MessageId,
        ) -> Result<Option<StructuredBody>, ClientError> {
            Ok(self.state.lock().await.stored.clone())
        }
    }

    struct StaticSchedule(Result<Vec<ScheduleEntry>, LookupError>);

    #[async_trait]
    impl ScheduleSource for StaticSchedule {
        async fn fetch(&self) -> Result<Vec<ScheduleEntry>, LookupError> {
            self.0.clone()
        }
    }

    struct SlowSchedule;

    #[async_trait]
    impl ScheduleSource for SlowSchedule {
        async fn fetch(&self) -> Result<Vec<ScheduleEntry>, LookupError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    fn context(client: Arc<RecordingClient>) -> RosterContext {
        RosterContext::new(
            ParticipantId::new(BOT),
            client,
            Arc::new(SessionStore::new()),
            ReactionPolicy::default(),
        )
    }

    fn dispatcher(client: Arc<RecordingClient>, schedule: Arc<dyn ScheduleSource>) -> EventDispatcher {
        roster_dispatcher(context(client), schedule, Duration::from_millis(200), Tokyo)
    }

    fn new_message(author: &str, text: &str) -> ChatEnvelope {
        ChatEnvelope {
            envelope_id: format!("env-{author}"),
            event: ChatEvent::NewMessage(NewMessageEvent {
                channel_id: "C1".to_owned(),
                message_id: MessageId::new("src-1"),
                author_id: ParticipantId::new(author),
                author_is_bot: false,
                text: text.to_owned(),
                mentioned_user_ids: Vec::new(),
                // 2026-10-19 18:42 in Tokyo.
                received_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 42, 0).single().expect("utc"),
            }),
        }
    }

    fn reaction(message_id: &MessageId, user: &str, emoji: &str, added: bool) -> ChatEnvelope {
        ChatEnvelope {
            envelope_id: format!("env-{user}-{emoji}"),
            event: ChatEvent::ReactionChanged(ReactionChangedEvent {
                message_id: message_id.clone(),
                message_author_id: ParticipantId::new(BOT),
                user_id: ParticipantId::new(user),
                user_is_bot: false,
                emoji: emoji.to_owned(),
                added,
            }),
        }
    }

    fn league_entries() -> Vec<ScheduleEntry> {
        vec![
            ScheduleEntry {
                start: "2026-10-19T19:00:00".to_owned(),
                rule: "ガチヤグラ".to_owned(),
                maps: vec!["海女美術大学".to_owned()],
            },
            ScheduleEntry {
                start: "2026-10-19T21:00:00".to_owned(),
                rule: "ガチアサリ".to_owned(),
                maps: vec!["モズク農園".to_owned()],
            },
        ]
    }

    async fn post(dispatcher: &EventDispatcher, author: &str, text: &str) -> MessageId {
        match dispatcher.dispatch(&new_message(author, text), &EventContext::default()).await {
            Ok(HandlerResult::Posted(message_id)) => message_id,
            other => panic!("expected a posted session, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn recruitment_post_creates_session() {
        let client = Arc::new(RecordingClient::default());
        let dispatcher = dispatcher(client.clone(), Arc::new(StaticSchedule(Ok(Vec::new()))));

        post(&dispatcher, "A", "@3 20:00").await;

        let state = client.state.lock().await;
        let (channel, body, affordances) = &state.posted[0];
        assert_eq!(channel, "C1");
        assert_eq!(body.section(&SectionKind::CapacityStatus), Some("1 / 4"));
        assert_eq!(body.section(&SectionKind::ScheduledStart), Some("10/19 20:00"));
        assert_eq!(body.section(&SectionKind::AttendeeList), Some("<@A>"));
        assert_eq!(body.league_sections().count(), 0);
        assert_eq!(affordances, &vec!["✋".to_owned(), "🚫".to_owned()]);
    }

    #[tokio::test]
    async fn non_recruitment_and_bot_messages_are_ignored() {
        let client = Arc::new(RecordingClient::default());
        let dispatcher = dispatcher(client.clone(), Arc::new(StaticSchedule(Ok(Vec::new()))));

        let result = dispatcher
            .dispatch(&new_message("A", "今日やる人いる？"), &EventContext::default())
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);

        let result = dispatcher
            .dispatch(&new_message(BOT, "@3 20:00"), &EventContext::default())
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
        assert!(client.state.lock().await.posted.is_empty());
    }

    #[tokio::test]
    async fn league_post_attaches_normalized_block_and_next() {
        let client = Arc::new(RecordingClient::default());
        let dispatcher =
            dispatcher(client.clone(), Arc::new(StaticSchedule(Ok(league_entries()))));

        post(&dispatcher, "A", "@3 20:00 リグマ").await;

        let state = client.state.lock().await;
        let body = &state.posted[0].1;
        let labels: Vec<_> = body.league_sections().map(|(label, _)| label.to_owned()).collect();
        assert_eq!(labels, vec!["10/19 19:00", "10/19 21:00"]);
        assert_eq!(body.section(&SectionKind::ScheduledStart), Some("10/19 20:00"));
    }

    #[tokio::test]
    async fn failed_or_slow_lookup_still_posts() {
        for schedule in [
            Arc::new(StaticSchedule(Err(LookupError::Status(503)))) as Arc<dyn ScheduleSource>,
            Arc::new(SlowSchedule),
        ] {
            let client = Arc::new(RecordingClient::default());
            let dispatcher = dispatcher(client.clone(), schedule);

            post(&dispatcher, "A", "@2 21時 リグマ").await;

            let state = client.state.lock().await;
            assert_eq!(state.posted.len(), 1);
            assert_eq!(state.posted[0].1.league_sections().count(), 0);
        }
    }

    #[tokio::test]
    async fn join_leave_and_stop_drive_the_posted_body() {
        let client = Arc::new(RecordingClient::default());
        let dispatcher = dispatcher(client.clone(), Arc::new(StaticSchedule(Ok(Vec::new()))));
        let message_id = post(&dispatcher, "A", "@3 20:00").await;
        let ctx = EventContext::default();

        let joined = dispatcher.dispatch(&reaction(&message_id, "B", "✋", true), &ctx).await;
        assert_eq!(joined.expect("join"), HandlerResult::Updated(message_id.clone()));

        let duplicate = dispatcher.dispatch(&reaction(&message_id, "A", "✋", true), &ctx).await;
        assert_eq!(duplicate.expect("organizer join"), HandlerResult::Ignored);

        dispatcher.dispatch(&reaction(&message_id, "B", "✋", false), &ctx).await.expect("leave");
        let stopped_by_member =
            dispatcher.dispatch(&reaction(&message_id, "B", "🚫", true), &ctx).await;
        assert_eq!(stopped_by_member.expect("stop by member"), HandlerResult::Ignored);

        dispatcher.dispatch(&reaction(&message_id, "A", "🚫", true), &ctx).await.expect("stop");

        let state = client.state.lock().await;
        assert_eq!(state.edits.len(), 3);
        let (_, last) = state.edits.last().expect("edit");
        assert_eq!(last.section(&SectionKind::AttendeeList), Some("<@A>"));
        assert_eq!(last.section(&SectionKind::CapacityStatus), Some("1 / 4"));
        assert_eq!(last.footer.as_deref(), Some("※募集が停止されました"));
        assert_eq!(state.clears, vec![message_id]);
    }

    #[tokio::test]
    async fn foreign_and_bot_reactions_are_ignored() {
        let client = Arc::new(RecordingClient::default());
        let dispatcher = dispatcher(client.clone(), Arc::new(StaticSchedule(Ok(Vec::new()))));
        let message_id = post(&dispatcher, "A", "@3 20:00").await;
        let ctx = EventContext::default();

        let mut by_bot = reaction(&message_id, BOT, "✋", true);
        if let ChatEvent::ReactionChanged(event) = &mut by_bot.event {
            event.user_is_bot = true;
        }
        let mut on_foreign = reaction(&message_id, "B", "✋", true);
        if let ChatEvent::ReactionChanged(event) = &mut on_foreign.event {
            event.message_author_id = ParticipantId::new("someone-else");
        }

        for envelope in [by_bot, on_foreign, reaction(&message_id, "B", "👍", true)] {
            let result = dispatcher.dispatch(&envelope, &ctx).await.expect("dispatch");
            assert_eq!(result, HandlerResult::Ignored);
        }
        assert!(client.state.lock().await.edits.is_empty());
    }

    #[tokio::test]
    async fn concurrent_joins_fill_session_once() {
        let client = Arc::new(RecordingClient::default());
        let context = context(client.clone());
        let recruit = roster_dispatcher(
            context.clone(),
            Arc::new(StaticSchedule(Ok(Vec::new()))),
            Duration::from_millis(200),
            Tokyo,
        );
        let message_id = post(&recruit, "A", "@2 20:00").await;
        let store = context.store.clone();
        let handler = Arc::new(ReactionHandler::new(context));

        let mut dispatchers = Vec::new();
        for user in ["B", "C"] {
            let mut dispatcher = EventDispatcher::new();
            dispatcher.register(handler.clone());
            let envelope = reaction(&message_id, user, "✋", true);
            dispatchers.push(tokio::spawn(async move {
                dispatcher.dispatch(&envelope, &EventContext::default()).await
            }));
        }
        for task in dispatchers {
            task.await.expect("task").expect("dispatch");
        }

        let record = store.snapshot(&message_id).await.expect("session");
        let mut members = record.session.attendees.clone();
        assert_eq!(members[0], ParticipantId::new("A"));
        members.sort_by(|left, right| left.0.cmp(&right.0));
        assert_eq!(
            members,
            vec![ParticipantId::new("A"), ParticipantId::new("B"), ParticipantId::new("C")]
        );
        assert_eq!(record.session.status, SessionStatus::Full);

        let state = client.state.lock().await;
        assert_eq!(state.clears.len(), 1);
        assert_eq!(state.edits.len(), 2);
        assert_eq!(state.edits[1].1.footer.as_deref(), Some("※参加者が集まりました"));
    }

    #[tokio::test]
    async fn unknown_sessions_are_rehydrated_from_the_message() {
        let policy = ReactionPolicy::new("✋", "↩", "🚫", LeaveMode::Dedicated);
        let mut stored = StructuredBody::new(policy.title());
        stored.upsert_section(SectionKind::CapacityStatus, "2 / 3");
        stored.upsert_section(SectionKind::ScheduledStart, "10/19 21:00");
        stored.upsert_section(SectionKind::AttendeeList, "<@A>\n<@B>");

        let client = Arc::new(RecordingClient::with_stored(stored));
        let store = Arc::new(SessionStore::new());
        let context =
            RosterContext::new(ParticipantId::new(BOT), client.clone(), store.clone(), policy);
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ReactionHandler::new(context));

        let message_id = MessageId::new("restarted");
        let result = dispatcher
            .dispatch(&reaction(&message_id, "B", "↩", true), &EventContext::default())
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Updated(message_id.clone()));

        let record = store.snapshot(&message_id).await.expect("session");
        assert_eq!(record.session.attendees, vec![ParticipantId::new("A")]);
        assert_eq!(record.session.capacity, 3);
    }

    #[tokio::test]
    async fn undecodable_messages_are_left_alone() {
        let mut stored = StructuredBody::new("お知らせ");
        stored.upsert_section(SectionKind::Other("本文".to_owned()), "メンテナンス");
        let client = Arc::new(RecordingClient::with_stored(stored));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ReactionHandler::new(context(client.clone())));

        let result = dispatcher
            .dispatch(
                &reaction(&MessageId::new("notice"), "B", "✋", true),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
        assert!(client.state.lock().await.edits.is_empty());
    }

    #[tokio::test]
    async fn ignored_reactions_leave_no_slots_behind() {
        let mut notice = StructuredBody::new("お知らせ");
        notice.upsert_section(SectionKind::Other("本文".to_owned()), "メンテナンス");
        for stored in [Some(notice), None] {
            let client = Arc::new(RecordingClient {
                state: Mutex::new(RecordingState { stored, ..RecordingState::default() }),
            });
            let context = context(client);
            let store = context.store.clone();
            let mut dispatcher = EventDispatcher::new();
            dispatcher.register(ReactionHandler::new(context));

            for index in 0..50 {
                let message_id = MessageId::new(format!("notice-{index}"));
                let result = dispatcher
                    .dispatch(&reaction(&message_id, "B", "✋", true), &EventContext::default())
                    .await
                    .expect("dispatch");
                assert_eq!(result, HandlerResult::Ignored);
            }
            assert!(store.is_empty().await);
        }
    }

    #[tokio::test]
    async fn stopped_sessions_are_evicted_and_stay_stopped() {
        let client = Arc::new(RecordingClient::default());
        let context = context(client.clone());
        let store = context.store.clone();
        let dispatcher = roster_dispatcher(
            context,
            Arc::new(StaticSchedule(Ok(Vec::new()))),
            Duration::from_millis(200),
            Tokyo,
        );
        let message_id = post(&dispatcher, "A", "@3 20:00").await;
        let ctx = EventContext::default();

        dispatcher.dispatch(&reaction(&message_id, "A", "🚫", true), &ctx).await.expect("stop");
        assert!(store.is_empty().await);

        let stopped_body = client.state.lock().await.edits.last().expect("edit").1.clone();
        client.state.lock().await.stored = Some(stopped_body);
        let late = dispatcher.dispatch(&reaction(&message_id, "B", "✋", true), &ctx).await;
        assert_eq!(late.expect("late join"), HandlerResult::Ignored);
        assert!(store.is_empty().await);
        assert_eq!(client.state.lock().await.edits.len(), 1);
    }

    #[tokio::test]
    async fn failed_edit_surfaces_as_client_error_and_keeps_roster() {
        let client = Arc::new(RecordingClient::default());
        let context = context(client.clone());
        let store = context.store.clone();
        let dispatcher = roster_dispatcher(
            context,
            Arc::new(StaticSchedule(Ok(Vec::new()))),
            Duration::from_millis(200),
            Tokyo,
        );
        let message_id = post(&dispatcher, "A", "@3 20:00").await;
        client.state.lock().await.failing_edits = true;

        let result = dispatcher
            .dispatch(&reaction(&message_id, "B", "✋", true), &EventContext::default())
            .await;
        assert!(matches!(
            result,
            Err(DispatchError::Handler(EventHandlerError::Client(ClientError::Request {
                operation: "edit_message",
                ..
            })))
        ));

        let record = store.snapshot(&message_id).await.expect("session");
        assert_eq!(record.session.attendees, vec![ParticipantId::new("A")]);
        assert_eq!(record.body.section(&SectionKind::CapacityStatus), Some("1 / 4"));
        assert!(client.state.lock().await.edits.is_empty());
    }

    #[tokio::test]
    async fn failed_clear_is_reported_after_the_session_fills() {
        let client = Arc::new(RecordingClient::default());
        let context = context(client.clone());
        let store = context.store.clone();
        let dispatcher = roster_dispatcher(
            context,
            Arc::new(StaticSchedule(Ok(Vec::new()))),
            Duration::from_millis(200),
            Tokyo,
        );
        let message_id = post(&dispatcher, "A", "@1 20:00").await;
        client.state.lock().await.failing_clears = true;

        let result = dispatcher
            .dispatch(&reaction(&message_id, "B", "✋", true), &EventContext::default())
            .await;
        assert!(matches!(
            result,
            Err(DispatchError::Handler(EventHandlerError::Client(ClientError::Forbidden(
                "clear_reactions"
            ))))
        ));

        let record = store.snapshot(&message_id).await.expect("session");
        assert_eq!(record.session.status, SessionStatus::Full);
        let state = client.state.lock().await;
        assert_eq!(state.edits.len(), 1);
        assert!(state.clears.is_empty());
    }
}
