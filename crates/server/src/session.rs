use std::collections::HashSet;
use std::sync::Mutex;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use procura_core::config::AuthConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{api_error, ApiError, AppState};

pub const SESSION_COOKIE: &str = "procura_session";

pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self { username: config.username.clone(), password: config.password.clone() }
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        let password_matches: bool =
            self.password.expose_secret().as_bytes().ct_eq(password.as_bytes()).into();
        password_matches && self.username == username
    }
}

/// Opaque session ids issued at login. Held in memory only.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashSet<String>>,
}

impl SessionStore {
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        match self.sessions.lock() {
            Ok(mut sessions) => sessions.insert(id.clone()),
            Err(poisoned) => poisoned.into_inner().insert(id.clone()),
        };
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        match self.sessions.lock() {
            Ok(sessions) => sessions.contains(id),
            Err(poisoned) => poisoned.into_inner().contains(id),
        }
    }

    pub fn revoke(&self, id: &str) {
        match self.sessions.lock() {
            Ok(mut sessions) => sessions.remove(id),
            Err(poisoned) => poisoned.into_inner().remove(id),
        };
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/login", post(login)).route("/logout", post(logout))
}

pub fn session_id(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers).get(SESSION_COOKIE).map(|cookie| cookie.value().to_string())
}

/// Rejects requests without a live session cookie.
pub fn require_session(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    match session_id(headers) {
        Some(id) if state.sessions.contains(&id) => Ok(id),
        _ => Err(api_error(StatusCode::UNAUTHORIZED, "Not authenticated")),
    }
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) =
        payload.map_err(|_| api_error(StatusCode::BAD_REQUEST, "username and password are required"))?;

    if !state.credentials.matches(&request.username, &request.password) {
        warn!(event_name = "session.login_rejected", username = %request.username);
        return Err(api_error(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    let id = state.sessions.create();
    info!(event_name = "session.login", username = %request.username);
    let jar = jar.add(session_cookie(id));
    Ok((jar, Json(SessionResponse { success: true })).into_response())
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.revoke(cookie.value());
        info!(event_name = "session.logout");
    }
    let jar = jar.remove(session_cookie(String::new()));
    (jar, Json(SessionResponse { success: true })).into_response()
}

fn session_cookie(id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id)).http_only(true).same_site(SameSite::Lax).path("/").build()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
    use tower::ServiceExt;

    use super::{session_id, Credentials, SESSION_COOKIE};
    use crate::state::router;
    use crate::state::testing::{app_config, configured_state, json_request, EchoRuntime};

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; procura_session=abc123"));
        assert_eq!(session_id(&headers).as_deref(), Some("abc123"));
        assert_eq!(session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn credentials_require_both_fields() {
        let credentials = Credentials::from_config(&app_config().auth);
        assert!(credentials.matches("admin", "hunter2"));
        assert!(!credentials.matches("admin", "hunter3"));
        assert!(!credentials.matches("root", "hunter2"));
        assert!(!credentials.matches("admin", "hunter22"));
        assert!(!credentials.matches("admin", ""));
    }

    #[tokio::test]
    async fn login_sets_cookie_and_logout_revokes_it() {
        let state = configured_state(Arc::new(EchoRuntime::default()));
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                r#"{"username":"admin","password":"hunter2"}"#,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .expect("cookie set");
        assert!(cookie.starts_with(SESSION_COOKIE));
        assert!(cookie.contains("HttpOnly"));
        let pair = cookie.split(';').next().unwrap_or_default().to_string();
        let id = pair.split_once('=').map(|(_, id)| id.to_string()).unwrap_or_default();
        assert!(state.sessions.contains(&id));

        let response =
            app.oneshot(json_request("POST", "/logout", Some(&pair), "")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.sessions.contains(&id));
        let cleared = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(cleared.starts_with(&format!("{SESSION_COOKIE}=;")), "cookie: {cleared}");
        assert!(cleared.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let app = router(configured_state(Arc::new(EchoRuntime::default())));
        let response = app
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                r#"{"username":"admin","password":"nope"}"#,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
