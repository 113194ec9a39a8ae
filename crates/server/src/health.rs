use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use procura_agent::graph::RoleReadiness;
use serde::Serialize;

use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tools: usize,
    pub roles: Vec<RoleReadiness>,
    pub missing: Vec<String>,
    pub checked_at: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Ready when the agent graph could be built from the current configuration.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let graph = state.dispatcher.graph();
    let readiness = graph.readiness();
    let ready = readiness.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        tools: graph.registry().len(),
        missing: readiness.missing(),
        roles: readiness.roles,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use procura_agent::instructions::StaticGateway;
    use procura_agent::InstructionStore;

    use crate::health::health;
    use crate::state::testing::{configured_state, state_with, EchoRuntime};

    #[tokio::test]
    async fn health_returns_ready_when_graph_is_buildable() {
        let state = configured_state(Arc::new(EchoRuntime::default()));

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert!(payload.missing.is_empty());
        assert_eq!(payload.roles.len(), 4);
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_with_missing_roles() {
        let state = state_with(
            InstructionStore::default(),
            Arc::new(EchoRuntime::default()),
            StaticGateway::default(),
        );

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(
            payload.missing,
            vec!["GeneralistProcurementAgent".to_string(), "InternalKnowledgeSearch".to_string(), "PurchaseHistorySearchAgent".to_string()]
        );
    }
}
