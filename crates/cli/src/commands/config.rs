use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use procura_core::config::AppConfig;
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use super::{load_config, CommandResult, EXIT_CONFIG_INVALID};

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> CommandResult {
    let config = match load_config() {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::text(EXIT_CONFIG_INVALID, format!("config validation failed: {error}"))
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::text(0, lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let workers =
        config.agents.workers.iter().map(|role| role.as_str()).collect::<Vec<_>>().join(",");

    vec![
        field("server.bind_address", &["PROCURA_SERVER_BIND_ADDRESS"], config.server.bind_address.clone()),
        field("server.port", &["PROCURA_SERVER_PORT"], config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            &["PROCURA_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "llm.api_key",
            &["PROCURA_LLM_API_KEY", "OPENAI_API_KEY"],
            redact_optional(config.llm.api_key.as_ref()),
        ),
        field("llm.base_url", &["PROCURA_LLM_BASE_URL"], config.llm.base_url.clone()),
        field("llm.model", &["PROCURA_LLM_MODEL"], config.llm.model.clone()),
        field("llm.max_turns", &["PROCURA_LLM_MAX_TURNS"], config.llm.max_turns.to_string()),
        field("agents.workers", &["PROCURA_AGENTS_WORKERS"], workers),
        field(
            "agents.vector_store_id",
            &["PROCURA_AGENTS_VECTOR_STORE_ID", "VECTOR_STORE_ID"],
            config.agents.vector_store_id.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field(
            "agents.allow_side_effects",
            &["PROCURA_AGENTS_ALLOW_SIDE_EFFECTS"],
            config.agents.allow_side_effects.to_string(),
        ),
        field(
            "instructions.gateway",
            &["PROCURA_INSTRUCTIONS_GATEWAY"],
            format!("{:?}", config.instructions.gateway),
        ),
        field(
            "instructions.path",
            &["PROCURA_INSTRUCTIONS_PATH"],
            config
                .instructions
                .path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        field("instructions.base_url", &["PROCURA_INSTRUCTIONS_BASE_URL"], unset(&config.instructions.base_url)),
        field(
            "instructions.token",
            &["PROCURA_INSTRUCTIONS_TOKEN"],
            redact_optional(config.instructions.token.as_ref()),
        ),
        field("erp.base_url", &["PROCURA_ERP_BASE_URL"], unset(&config.erp.base_url)),
        field("erp.token_url", &["PROCURA_ERP_TOKEN_URL"], unset(&config.erp.token_url)),
        field("erp.client_id", &["PROCURA_ERP_CLIENT_ID"], unset(&config.erp.client_id)),
        field(
            "erp.client_secret",
            &["PROCURA_ERP_CLIENT_SECRET"],
            redact_optional(config.erp.client_secret.as_ref()),
        ),
        field(
            "notifications.email_relay_url",
            &["PROCURA_NOTIFICATIONS_EMAIL_RELAY_URL"],
            unset(&config.notifications.email_relay_url),
        ),
        field(
            "notifications.approval_url",
            &["PROCURA_NOTIFICATIONS_APPROVAL_URL"],
            unset(&config.notifications.approval_url),
        ),
        field("auth.username", &["PROCURA_AUTH_USERNAME"], config.auth.username.clone()),
        field("auth.password", &["PROCURA_AUTH_PASSWORD"], redact(&config.auth.password)),
        field(
            "logging.level",
            &["PROCURA_LOGGING_LEVEL", "PROCURA_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["PROCURA_LOGGING_FORMAT", "PROCURA_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> Field {
    Field { key, env_keys, value }
}

fn unset(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "<unset>".to_string())
}

fn redact(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    secret.map(redact).unwrap_or_else(|| "<unset>".to_string())
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("procura.toml"), PathBuf::from("config/procura.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
