use std::sync::Arc;
use std::time::Duration;

use boshu_chat::events::{roster_dispatcher, RosterContext};
use boshu_chat::gateway::{
    ChatClient, GatewayRunner, GatewayTransport, NoopChatClient, NoopGatewayTransport,
    ReconnectPolicy,
};
use boshu_chat::policy::ReactionPolicy;
use boshu_chat::store::SessionStore;
use boshu_core::config::{AppConfig, ConfigError};
use boshu_core::schedule::LookupError;
use boshu_core::ParticipantId;
use thiserror::Error;
use tracing::info;

use crate::schedule::HttpScheduleSource;

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<SessionStore>,
    pub gateway: GatewayRunner,
    noop_transport: bool,
}

impl Application {
    pub fn is_noop_transport(&self) -> bool {
        self.noop_transport
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("schedule client setup failed: {0}")]
    ScheduleClient(#[source] LookupError),
}

/// Platform adapters plug in here; `None` falls back to the logging no-ops.
#[derive(Default)]
pub struct Collaborators {
    pub client: Option<Arc<dyn ChatClient>>,
    pub transport: Option<Arc<dyn GatewayTransport>>,
}

pub fn bootstrap_with_config(
    config: AppConfig,
    collaborators: Collaborators,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let timezone = config.timezone()?;
    let schedule =
        HttpScheduleSource::from_config(&config.schedule).map_err(BootstrapError::ScheduleClient)?;

    let noop_transport = collaborators.transport.is_none();
    let client = collaborators.client.unwrap_or_else(|| Arc::new(NoopChatClient));
    let transport = collaborators.transport.unwrap_or_else(|| Arc::new(NoopGatewayTransport));

    let store = Arc::new(SessionStore::new());
    let context = RosterContext::new(
        ParticipantId::new(config.bot.user_id.trim()),
        client,
        store.clone(),
        ReactionPolicy::from_config(&config.reactions),
    );
    let dispatcher = roster_dispatcher(
        context,
        Arc::new(schedule),
        Duration::from_secs(config.schedule.timeout_secs),
        timezone,
    );
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        handlers = dispatcher.handler_count(),
        timezone = %timezone,
        leave_mode = ?config.reactions.leave_mode,
        "roster dispatcher initialized"
    );

    let gateway =
        GatewayRunner::new(transport, dispatcher, ReconnectPolicy::from(&config.gateway));

    Ok(Application { config, store, gateway, noop_transport })
}
