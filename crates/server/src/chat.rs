use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use procura_core::InterfaceError;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::session::require_session;
use crate::state::{AppState, ErrorBody};

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    if let Err(rejection) = require_session(&state, &headers) {
        return rejection.into_response();
    }

    let correlation_id = Uuid::new_v4().to_string();
    // A missing or unreadable body is treated like an empty message.
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let response = match state.dispatcher.handle_with_correlation(&request.message, &correlation_id).await
    {
        Ok(reply) => (StatusCode::OK, Json(ChatResponse { response: reply.response })).into_response(),
        Err(error) => {
            let interface = error.into_interface(correlation_id.clone());
            warn!(
                event_name = "chat.failed",
                correlation_id = %correlation_id,
                status = interface.status_code(),
                detail = %interface.detail(),
            );
            interface_response(&interface)
        }
    };
    with_correlation(response, &correlation_id)
}

fn interface_response(error: &InterfaceError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorBody {
        error: error.user_message().to_string(),
        correlation_id: Some(error.correlation_id().to_string()),
    };
    (status, Json(body)).into_response()
}

fn with_correlation(mut response: Response, correlation_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}
