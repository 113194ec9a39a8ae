use std::sync::Arc;

use axum::{http::StatusCode, Json, Router};
use procura_agent::{ConfigGateway, Dispatcher};
use serde::Serialize;

use crate::session::{Credentials, SessionStore};
use crate::{admin, chat, health, session};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub gateway: Arc<dyn ConfigGateway>,
    pub sessions: Arc<SessionStore>,
    pub credentials: Arc<Credentials>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: message.into(), correlation_id: None }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(session::routes())
        .merge(chat::routes())
        .merge(admin::routes())
        .merge(health::routes())
        .with_state(state)
}
