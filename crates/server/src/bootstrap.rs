use std::sync::Arc;

use procura_agent::graph::GraphLayout;
use procura_agent::instructions::{gateway_from_config, GatewayError};
use procura_agent::tools::standard_registry;
use procura_agent::{AgentGraphBuilder, Dispatcher, InstructionStore, ResponsesRuntime};
use procura_core::config::{AppConfig, ConfigError, LoadOptions};
use procura_core::{AgentRole, AuditEvent, AuditSink};
use thiserror::Error;
use tracing::{info, warn};

use crate::session::{Credentials, SessionStore};
use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("llm.api_key is required to start the agent runtime")]
    MissingApiKey,
}

/// Writes audit events to the structured log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = "audit.event",
            correlation_id = %event.correlation_id,
            audit_type = %event.event_type,
            category = ?event.category,
            outcome = ?event.outcome,
            agent = event.agent.map(|role| role.as_str()),
            tool = event.tool.as_deref(),
            metadata = ?event.metadata,
        );
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("procura/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(BootstrapError::HttpClient)?;
    let audit: Arc<dyn AuditSink> = Arc::new(LogAuditSink);

    let store = Arc::new(InstructionStore::default());
    let gateway: Arc<dyn procura_agent::ConfigGateway> =
        Arc::from(gateway_from_config(&config, client.clone())?);
    match store.hydrate(gateway.as_ref(), &AgentRole::ALL).await {
        Ok(loaded) => info!(
            event_name = "system.bootstrap.instructions_loaded",
            correlation_id = "bootstrap",
            gateway = gateway.name(),
            loaded = loaded.len(),
            "agent instructions loaded"
        ),
        Err(error) => warn!(
            event_name = "system.bootstrap.instructions_unavailable",
            correlation_id = "bootstrap",
            gateway = gateway.name(),
            error = %error,
            "continuing with compiled-in defaults"
        ),
    }

    let registry = Arc::new(standard_registry(&config, client.clone(), Arc::clone(&audit)));
    let graph = Arc::new(AgentGraphBuilder::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        GraphLayout::from_config(&config),
    ));
    let runtime = ResponsesRuntime::from_config(&config.llm, client, registry)
        .ok_or(BootstrapError::MissingApiKey)?;

    let readiness = graph.readiness();
    if !readiness.is_ready() {
        warn!(
            event_name = "system.bootstrap.graph_incomplete",
            correlation_id = "bootstrap",
            missing = %readiness.missing().join(", "),
            "chat requests will be rejected until instructions are configured"
        );
    }

    let state = AppState {
        dispatcher: Arc::new(Dispatcher::new(graph, Arc::new(runtime), audit)),
        gateway,
        sessions: Arc::new(SessionStore::default()),
        credentials: Arc::new(Credentials::from_config(&config.auth)),
    };

    Ok(Application { config, state })
}
