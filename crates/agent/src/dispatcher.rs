use std::sync::Arc;

use procura_core::{AgentRole, AuditEvent, AuditOutcome, AuditSink, DispatchError};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::graph::{AgentGraphBuilder, GraphError};
use crate::runtime::AgentRuntime;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchReply {
    pub response: String,
    pub agent: String,
    pub correlation_id: String,
}

/// Entry point for one chat message: validate, build the graph, run it.
pub struct Dispatcher {
    graph: Arc<AgentGraphBuilder>,
    runtime: Arc<dyn AgentRuntime>,
    audit: Arc<dyn AuditSink>,
}

impl Dispatcher {
    pub fn new(
        graph: Arc<AgentGraphBuilder>,
        runtime: Arc<dyn AgentRuntime>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { graph, runtime, audit }
    }

    pub fn graph(&self) -> &Arc<AgentGraphBuilder> {
        &self.graph
    }

    pub async fn handle(&self, message: &str) -> Result<DispatchReply, DispatchError> {
        self.handle_with_correlation(message, &Uuid::new_v4().to_string()).await
    }

    pub async fn handle_with_correlation(
        &self,
        message: &str,
        correlation_id: &str,
    ) -> Result<DispatchReply, DispatchError> {
        let message = message.trim();
        if message.is_empty() {
            warn!(event_name = "dispatch.rejected", correlation_id, "empty chat message");
            self.record(correlation_id, "rejected", AuditOutcome::Rejected, "empty message", None);
            return Err(DispatchError::InvalidInput("No message provided".to_string()));
        }

        info!(
            event_name = "dispatch.received",
            correlation_id,
            message_chars = message.chars().count(),
        );
        self.record(correlation_id, "received", AuditOutcome::Success, "accepted", None);

        let root = self.graph.build().await.map_err(|error| {
            let GraphError::ConfigurationMissing { missing } = error;
            warn!(
                event_name = "dispatch.not_configured",
                correlation_id,
                missing = %missing.join(", "),
            );
            self.record(
                correlation_id,
                "failed",
                AuditOutcome::Failed,
                "configuration_missing",
                None,
            );
            DispatchError::ConfigurationMissing { missing }
        })?;

        match self.runtime.run(&root, message).await {
            Ok(outcome) => {
                info!(
                    event_name = "dispatch.completed",
                    correlation_id,
                    agent = %outcome.last_agent,
                    turns = outcome.turns,
                );
                self.record(
                    correlation_id,
                    "completed",
                    AuditOutcome::Success,
                    "ok",
                    outcome.last_agent.parse::<AgentRole>().ok(),
                );
                Ok(DispatchReply {
                    response: outcome.final_output,
                    agent: outcome.last_agent,
                    correlation_id: correlation_id.to_string(),
                })
            }
            Err(error) => {
                warn!(
                    event_name = "dispatch.upstream_failed",
                    correlation_id,
                    error = %error,
                );
                self.record(
                    correlation_id,
                    "failed",
                    AuditOutcome::Failed,
                    "upstream_failure",
                    None,
                );
                Err(DispatchError::UpstreamFailure(format!("Error processing message: {error}")))
            }
        }
    }

    fn record(
        &self,
        correlation_id: &str,
        stage: &str,
        outcome: AuditOutcome,
        detail: &str,
        agent: Option<AgentRole>,
    ) {
        self.audit.emit(
            AuditEvent::dispatch(correlation_id, stage, outcome)
                .with_agent(agent)
                .with_metadata("detail", detail),
        );
    }
}
