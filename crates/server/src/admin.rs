//! Instruction management API.
//!
//! - `GET  /api/v1/instructions`        - per-role source, version and readiness
//! - `POST /api/v1/instructions`        - replace one agent's instructions
//! - `POST /api/v1/instructions/reload` - re-pull every role from the gateway

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use procura_core::{AgentRole, InstructionSource};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::session::require_session;
use crate::state::{api_error, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct UpdateInstructionsRequest {
    pub agent_name: String,
    pub instructions: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateInstructionsResponse {
    pub success: bool,
    pub agent_name: String,
    pub version: u64,
}

#[derive(Debug, Serialize)]
pub struct RoleInstructionView {
    pub agent_name: String,
    pub configured: bool,
    pub source: Option<InstructionSource>,
    pub version: Option<u64>,
    pub ready: bool,
    pub missing: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InstructionListResponse {
    pub roles: Vec<RoleInstructionView>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub gateway: &'static str,
    pub loaded: Vec<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/instructions", get(list_instructions).post(update_instructions))
        .route("/api/v1/instructions/reload", post(reload_instructions))
}

async fn update_instructions(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateInstructionsRequest>, JsonRejection>,
) -> Result<Json<UpdateInstructionsResponse>, ApiError> {
    require_session(&state, &headers)?;
    let Json(request) = payload.map_err(|_| {
        api_error(StatusCode::BAD_REQUEST, "agent_name and instructions are required")
    })?;

    let role: AgentRole = request
        .agent_name
        .parse()
        .map_err(|error: procura_core::UnknownRole| api_error(StatusCode::BAD_REQUEST, error.to_string()))?;

    let graph = state.dispatcher.graph();
    let instruction = graph
        .store()
        .set(role.as_str(), request.instructions)
        .map_err(|error| api_error(StatusCode::BAD_REQUEST, error.to_string()))?;
    graph.invalidate(role).await;

    info!(
        event_name = "admin.instructions_updated",
        agent = role.as_str(),
        version = instruction.version,
    );
    Ok(Json(UpdateInstructionsResponse {
        success: true,
        agent_name: role.as_str().to_string(),
        version: instruction.version,
    }))
}

async fn list_instructions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<InstructionListResponse>, ApiError> {
    require_session(&state, &headers)?;

    let graph = state.dispatcher.graph();
    let readiness = graph.readiness();
    let roles = graph
        .store()
        .snapshot(&AgentRole::ALL)
        .into_iter()
        .zip(AgentRole::ALL)
        .map(|(status, role)| {
            let configured = readiness.roles.iter().find(|entry| entry.role == role);
            RoleInstructionView {
                agent_name: status.agent_name,
                configured: configured.is_some(),
                source: status.source,
                version: status.version,
                ready: configured.map_or(status.present, |entry| entry.ready),
                missing: configured.map(|entry| entry.missing.clone()).unwrap_or_default(),
            }
        })
        .collect();

    Ok(Json(InstructionListResponse { roles }))
}

async fn reload_instructions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReloadResponse>, ApiError> {
    require_session(&state, &headers)?;

    let graph = state.dispatcher.graph();
    let loaded = graph.store().hydrate(state.gateway.as_ref(), &AgentRole::ALL).await.map_err(|error| {
        warn!(event_name = "admin.reload_failed", gateway = state.gateway.name(), error = %error);
        api_error(StatusCode::BAD_GATEWAY, error.to_string())
    })?;
    graph.invalidate_all().await;

    Ok(Json(ReloadResponse {
        success: true,
        gateway: state.gateway.name(),
        loaded: loaded.iter().map(|role| role.as_str().to_string()).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use procura_agent::instructions::StaticGateway;
    use procura_agent::InstructionStore;
    use procura_core::AgentRole;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::state::router;
    use crate::state::testing::{
        body_json, configured_state, json_request, logged_in, state_with, EchoRuntime,
    };

    #[tokio::test]
    async fn push_updates_store_and_next_build() {
        let state = configured_state(Arc::new(EchoRuntime::default()));
        let cookie = logged_in(&state);
        let app = router(state.clone());

        let before = state.dispatcher.graph().build().await.expect("graph builds");
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/instructions",
                Some(&cookie),
                r#"{"agent_name":"SearchAgent","instructions":"X"}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body["version"].as_u64().is_some_and(|version| version > 0));

        let after = state.dispatcher.graph().build().await.expect("graph builds");
        assert_ne!(before.handoffs[0].instruction.text, "X");
        assert_eq!(after.handoffs[0].instruction.text, "X");
    }

    #[tokio::test]
    async fn unknown_agent_and_blank_text_are_rejected() {
        let state = configured_state(Arc::new(EchoRuntime::default()));
        let cookie = logged_in(&state);
        let app = router(state);

        for body in [
            r#"{"agent_name":"AccountAgent","instructions":"X"}"#,
            r#"{"agent_name":"SearchAgent","instructions":"  "}"#,
            r#"{"agent_name":"SearchAgent"}"#,
        ] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/v1/instructions", Some(&cookie), body))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
            assert!(body_json(response).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn list_reports_readiness_per_role() {
        let state = state_with(
            InstructionStore::default(),
            Arc::new(EchoRuntime::default()),
            StaticGateway::default(),
        );
        let cookie = logged_in(&state);

        let response = router(state)
            .oneshot(json_request("GET", "/api/v1/instructions", Some(&cookie), ""))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let roles = body["roles"].as_array().cloned().unwrap_or_default();
        assert_eq!(roles.len(), AgentRole::ALL.len());
        let search = roles.iter().find(|role| role["agent_name"] == "SearchAgent").cloned();
        assert_eq!(search.as_ref().map(|role| role["source"].clone()), Some(json!("default")));
        let knowledge =
            roles.iter().find(|role| role["agent_name"] == "InternalKnowledgeSearch").cloned();
        assert_eq!(knowledge.map(|role| role["ready"].clone()), Some(json!(false)));
    }

    #[tokio::test]
    async fn reload_hydrates_from_gateway() {
        let gateway = StaticGateway::default()
            .with(AgentRole::TRIAGE, "route")
            .with(AgentRole::InternalKnowledgeSearch, "docs")
            .with(AgentRole::PurchaseHistorySearchAgent, "history");
        let state = state_with(InstructionStore::default(), Arc::new(EchoRuntime::default()), gateway);
        let cookie = logged_in(&state);
        assert!(!state.dispatcher.graph().readiness().is_ready());

        let response = router(state.clone())
            .oneshot(json_request("POST", "/api/v1/instructions/reload", Some(&cookie), ""))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["loaded"].as_array().map(Vec::len), Some(3));
        assert!(state.dispatcher.graph().readiness().is_ready());
    }

    #[tokio::test]
    async fn admin_routes_require_session() {
        let app = router(configured_state(Arc::new(EchoRuntime::default())));
        let response = app
            .oneshot(json_request("GET", "/api/v1/instructions", None, ""))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
