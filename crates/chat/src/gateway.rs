use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use boshu_core::config::GatewayConfig;
use boshu_core::MessageId;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::body::{EmbedPayload, StructuredBody};
use crate::events::{ChatEnvelope, EventContext, EventDispatcher, HandlerResult};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("chat request `{operation}` failed: {reason}")]
    Request { operation: &'static str, reason: String },
    #[error("chat message `{0}` no longer exists")]
    MessageNotFound(MessageId),
    #[error("chat client is not permitted to `{0}`")]
    Forbidden(&'static str),
}

/// Outbound primitives of the chat platform.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Posts `body` and seeds it with the `affordances` reactions.
    async fn post_message(
        &self,
        channel_id: &str,
        body: &StructuredBody,
        affordances: &[String],
    ) -> Result<MessageId, ClientError>;
    async fn edit_message(
        &self,
        message_id: &MessageId,
        body: &StructuredBody,
    ) -> Result<(), ClientError>;
    async fn clear_reactions(&self, message_id: &MessageId) -> Result<(), ClientError>;
    /// `Ok(None)` when the message has no structured body.
    async fn fetch_message(
        &self,
        message_id: &MessageId,
    ) -> Result<Option<StructuredBody>, ClientError>;
}

/// Logs every outbound call; used until a platform adapter is wired in.
#[derive(Default)]
pub struct NoopChatClient;

#[async_trait]
impl ChatClient for NoopChatClient {
    async fn post_message(
        &self,
        channel_id: &str,
        body: &StructuredBody,
        affordances: &[String],
    ) -> Result<MessageId, ClientError> {
        let payload = EmbedPayload::from(body);
        info!(
            event_name = "egress.chat.post_message",
            channel_id,
            title = %payload.title,
            fields = payload.fields.len(),
            affordances = ?affordances,
            "noop chat client: post message"
        );
        Ok(MessageId::new(format!("noop-{channel_id}")))
    }

    async fn edit_message(
        &self,
        message_id: &MessageId,
        body: &StructuredBody,
    ) -> Result<(), ClientError> {
        info!(
            event_name = "egress.chat.edit_message",
            message_id = %message_id,
            footer = body.footer.as_deref().unwrap_or("none"),
            "noop chat client: edit message"
        );
        Ok(())
    }

    async fn clear_reactions(&self, message_id: &MessageId) -> Result<(), ClientError> {
        info!(
            event_name = "egress.chat.clear_reactions",
            message_id = %message_id,
            "noop chat client: clear reactions"
        );
        Ok(())
    }

    async fn fetch_message(
        &self,
        _message_id: &MessageId,
    ) -> Result<Option<StructuredBody>, ClientError> {
        Ok(None)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl From<&GatewayConfig> for ReconnectPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Inbound event stream of the chat platform.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` once the stream closed cleanly.
    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "chat gateway retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Each envelope is dispatched on its own task; sessions serialize
    /// themselves through the store, so unrelated posts never wait on
    /// each other.
    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening chat gateway connection");
        self.transport.connect().await?;
        info!(attempt, "chat gateway connected");

        let mut in_flight = tokio::task::JoinSet::new();
        loop {
            let next = match self.transport.next_envelope().await {
                Ok(next) => next,
                Err(error) => {
                    drain(&mut in_flight).await;
                    return Err(error);
                }
            };
            let Some(envelope) = next else {
                info!(attempt, "chat gateway stream closed");
                drain(&mut in_flight).await;
                self.transport.disconnect().await?;
                return Ok(());
            };

            let message_id =
                envelope.event.message_id().map(ToString::to_string).unwrap_or_default();
            info!(
                event_name = "ingress.chat.event_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                message_id = %message_id,
                "received chat event"
            );

            let dispatcher = Arc::clone(&self.dispatcher);
            in_flight.spawn(async move {
                let context = EventContext { correlation_id: envelope.envelope_id.clone() };
                match dispatcher.dispatch(&envelope, &context).await {
                    Ok(result) => {
                        debug!(
                            event_name = "ingress.chat.event_handled",
                            correlation_id = %envelope.envelope_id,
                            message_id = %message_id,
                            outcome = outcome_label(&result),
                            "chat event handled"
                        );
                    }
                    Err(error) => {
                        warn!(
                            envelope_id = %envelope.envelope_id,
                            correlation_id = %envelope.envelope_id,
                            message_id = %message_id,
                            error = %error,
                            "event dispatch failed; continuing gateway loop"
                        );
                    }
                }
            });

            while in_flight.try_join_next().is_some() {}
        }
    }
}

async fn drain(in_flight: &mut tokio::task::JoinSet<()>) {
    while in_flight.join_next().await.is_some() {}
}

fn outcome_label(result: &HandlerResult) -> &'static str {
    match result {
        HandlerResult::Posted(_) => "posted",
        HandlerResult::Updated(_) => "updated",
        HandlerResult::Processed => "processed",
        HandlerResult::Ignored => "ignored",
    }
}
