use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::AgentRole;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub agents: AgentsConfig,
    pub instructions: InstructionsConfig,
    pub erp: ErpConfig,
    pub notifications: NotificationsConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub max_turns: u32,
}

#[derive(Clone, Debug)]
pub struct AgentsConfig {
    pub workers: Vec<AgentRole>,
    pub vector_store_id: Option<String>,
    pub allow_side_effects: bool,
}

#[derive(Clone, Debug)]
pub struct InstructionsConfig {
    pub gateway: GatewayKind,
    pub path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub token: Option<SecretString>,
}

#[derive(Clone, Debug, Default)]
pub struct ErpConfig {
    pub base_url: Option<String>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub scope: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NotificationsConfig {
    pub email_relay_url: Option<String>,
    pub approval_url: Option<String>,
    pub token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub username: String,
    pub password: SecretString,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    Static,
    File,
    DocumentStore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub auth_password: Option<String>,
    pub workers: Option<Vec<AgentRole>>,
    pub vector_store_id: Option<String>,
    pub allow_side_effects: Option<bool>,
    pub instructions_gateway: Option<GatewayKind>,
    pub instructions_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                graceful_shutdown_secs: 15,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4.1".to_string(),
                max_turns: 10,
            },
            agents: AgentsConfig {
                workers: AgentRole::default_workers(),
                vector_store_id: None,
                allow_side_effects: true,
            },
            instructions: InstructionsConfig {
                gateway: GatewayKind::Static,
                path: None,
                base_url: None,
                token: None,
            },
            erp: ErpConfig::default(),
            notifications: NotificationsConfig::default(),
            auth: AuthConfig { username: "admin".to_string(), password: String::new().into() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for GatewayKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "static" => Ok(Self::Static),
            "file" => Ok(Self::File),
            "document_store" => Ok(Self::DocumentStore),
            other => Err(ConfigError::Validation(format!(
                "unsupported instruction gateway `{other}` (expected static|file|document_store)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("procura.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_turns) = llm.max_turns {
                self.llm.max_turns = max_turns;
            }
        }

        if let Some(agents) = patch.agents {
            if let Some(workers) = agents.workers {
                self.agents.workers = parse_roles("agents.workers", &workers.join(","))?;
            }
            if let Some(vector_store_id) = agents.vector_store_id {
                self.agents.vector_store_id = Some(vector_store_id);
            }
            if let Some(allow_side_effects) = agents.allow_side_effects {
                self.agents.allow_side_effects = allow_side_effects;
            }
        }

        if let Some(instructions) = patch.instructions {
            if let Some(gateway) = instructions.gateway {
                self.instructions.gateway = gateway;
            }
            if let Some(path) = instructions.path {
                self.instructions.path = Some(path);
            }
            if let Some(base_url) = instructions.base_url {
                self.instructions.base_url = Some(base_url);
            }
            if let Some(token) = instructions.token {
                self.instructions.token = Some(secret_value(token));
            }
        }

        if let Some(erp) = patch.erp {
            if let Some(base_url) = erp.base_url {
                self.erp.base_url = Some(base_url);
            }
            if let Some(token_url) = erp.token_url {
                self.erp.token_url = Some(token_url);
            }
            if let Some(client_id) = erp.client_id {
                self.erp.client_id = Some(client_id);
            }
            if let Some(client_secret) = erp.client_secret {
                self.erp.client_secret = Some(secret_value(client_secret));
            }
            if let Some(scope) = erp.scope {
                self.erp.scope = Some(scope);
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(email_relay_url) = notifications.email_relay_url {
                self.notifications.email_relay_url = Some(email_relay_url);
            }
            if let Some(approval_url) = notifications.approval_url {
                self.notifications.approval_url = Some(approval_url);
            }
            if let Some(token) = notifications.token {
                self.notifications.token = Some(secret_value(token));
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(username) = auth.username {
                self.auth.username = username;
            }
            if let Some(password) = auth.password {
                self.auth.password = secret_value(password);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROCURA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PROCURA_SERVER_PORT") {
            self.server.port = parse_u16("PROCURA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PROCURA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PROCURA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let api_key = read_env("PROCURA_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PROCURA_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("PROCURA_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PROCURA_LLM_MAX_TURNS") {
            self.llm.max_turns = parse_u32("PROCURA_LLM_MAX_TURNS", &value)?;
        }

        if let Some(value) = read_env("PROCURA_AGENTS_WORKERS") {
            self.agents.workers = parse_roles("PROCURA_AGENTS_WORKERS", &value)?;
        }
        let vector_store_id =
            read_env("PROCURA_AGENTS_VECTOR_STORE_ID").or_else(|| read_env("VECTOR_STORE_ID"));
        if let Some(value) = vector_store_id {
            self.agents.vector_store_id = Some(value);
        }
        if let Some(value) = read_env("PROCURA_AGENTS_ALLOW_SIDE_EFFECTS") {
            self.agents.allow_side_effects =
                parse_bool("PROCURA_AGENTS_ALLOW_SIDE_EFFECTS", &value)?;
        }

        if let Some(value) = read_env("PROCURA_INSTRUCTIONS_GATEWAY") {
            self.instructions.gateway = value.parse()?;
        }
        if let Some(value) = read_env("PROCURA_INSTRUCTIONS_PATH") {
            self.instructions.path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("PROCURA_INSTRUCTIONS_BASE_URL") {
            self.instructions.base_url = Some(value);
        }
        if let Some(value) = read_env("PROCURA_INSTRUCTIONS_TOKEN") {
            self.instructions.token = Some(secret_value(value));
        }

        if let Some(value) = read_env("PROCURA_ERP_BASE_URL") {
            self.erp.base_url = Some(value);
        }
        if let Some(value) = read_env("PROCURA_ERP_TOKEN_URL") {
            self.erp.token_url = Some(value);
        }
        if let Some(value) = read_env("PROCURA_ERP_CLIENT_ID") {
            self.erp.client_id = Some(value);
        }
        if let Some(value) = read_env("PROCURA_ERP_CLIENT_SECRET") {
            self.erp.client_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("PROCURA_ERP_SCOPE") {
            self.erp.scope = Some(value);
        }

        if let Some(value) = read_env("PROCURA_NOTIFICATIONS_EMAIL_RELAY_URL") {
            self.notifications.email_relay_url = Some(value);
        }
        if let Some(value) = read_env("PROCURA_NOTIFICATIONS_APPROVAL_URL") {
            self.notifications.approval_url = Some(value);
        }
        if let Some(value) = read_env("PROCURA_NOTIFICATIONS_TOKEN") {
            self.notifications.token = Some(secret_value(value));
        }

        if let Some(value) = read_env("PROCURA_AUTH_USERNAME") {
            self.auth.username = value;
        }
        if let Some(value) = read_env("PROCURA_AUTH_PASSWORD") {
            self.auth.password = secret_value(value);
        }

        let log_level =
            read_env("PROCURA_LOGGING_LEVEL").or_else(|| read_env("PROCURA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PROCURA_LOGGING_FORMAT").or_else(|| read_env("PROCURA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(password) = overrides.auth_password {
            self.auth.password = secret_value(password);
        }
        if let Some(workers) = overrides.workers {
            self.agents.workers = workers;
        }
        if let Some(vector_store_id) = overrides.vector_store_id {
            self.agents.vector_store_id = Some(vector_store_id);
        }
        if let Some(allow_side_effects) = overrides.allow_side_effects {
            self.agents.allow_side_effects = allow_side_effects;
        }
        if let Some(gateway) = overrides.instructions_gateway {
            self.instructions.gateway = gateway;
        }
        if let Some(path) = overrides.instructions_path {
            self.instructions.path = Some(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_llm(&self.llm)?;
        validate_agents(&self.agents)?;
        validate_instructions(&self.instructions)?;
        validate_erp(&self.erp)?;
        validate_notifications(&self.notifications)?;
        validate_auth(&self.auth)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("procura.toml"), PathBuf::from("config/procura.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_optional_url(key: &str, value: Option<&String>) -> Result<(), ConfigError> {
    match value {
        Some(url) if !is_http_url(url.trim()) => {
            Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
        }
        _ => Ok(()),
    }
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    let missing =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "llm.api_key is required. Set PROCURA_LLM_API_KEY (or OPENAI_API_KEY) to the hosted runtime key".to_string(),
        ));
    }

    if !is_http_url(llm.base_url.trim()) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.max_turns == 0 || llm.max_turns > 50 {
        return Err(ConfigError::Validation("llm.max_turns must be in range 1..=50".to_string()));
    }

    Ok(())
}

fn validate_agents(agents: &AgentsConfig) -> Result<(), ConfigError> {
    if agents.workers.is_empty() {
        return Err(ConfigError::Validation(
            "agents.workers must name at least one specialist role".to_string(),
        ));
    }

    if agents.workers.iter().any(AgentRole::is_triage) {
        return Err(ConfigError::Validation(format!(
            "agents.workers must not include the triage role `{}`",
            AgentRole::TRIAGE
        )));
    }

    let mut seen = Vec::with_capacity(agents.workers.len());
    for role in &agents.workers {
        if seen.contains(role) {
            return Err(ConfigError::Validation(format!(
                "agents.workers lists `{role}` more than once"
            )));
        }
        seen.push(*role);
    }

    Ok(())
}

fn validate_instructions(instructions: &InstructionsConfig) -> Result<(), ConfigError> {
    match instructions.gateway {
        GatewayKind::Static => Ok(()),
        GatewayKind::File => {
            if instructions.path.is_none() {
                return Err(ConfigError::Validation(
                    "instructions.path is required for the file gateway".to_string(),
                ));
            }
            Ok(())
        }
        GatewayKind::DocumentStore => match instructions.base_url.as_deref() {
            Some(url) if is_http_url(url.trim()) => Ok(()),
            Some(_) => Err(ConfigError::Validation(
                "instructions.base_url must start with http:// or https://".to_string(),
            )),
            None => Err(ConfigError::Validation(
                "instructions.base_url is required for the document_store gateway".to_string(),
            )),
        },
    }
}

fn validate_erp(erp: &ErpConfig) -> Result<(), ConfigError> {
    validate_optional_url("erp.base_url", erp.base_url.as_ref())?;
    validate_optional_url("erp.token_url", erp.token_url.as_ref())?;

    if erp.token_url.is_some() {
        if erp.client_id.is_none() {
            return Err(ConfigError::Validation(
                "erp.token_url is set but erp.client_id is missing".to_string(),
            ));
        }
        if erp.client_secret.is_none() {
            return Err(ConfigError::Validation(
                "erp.token_url is set but erp.client_secret is missing".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_notifications(notifications: &NotificationsConfig) -> Result<(), ConfigError> {
    validate_optional_url("notifications.email_relay_url", notifications.email_relay_url.as_ref())?;
    validate_optional_url("notifications.approval_url", notifications.approval_url.as_ref())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    if auth.username.trim().is_empty() {
        return Err(ConfigError::Validation("auth.username must not be empty".to_string()));
    }

    if auth.password.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "auth.password is required. Set PROCURA_AUTH_PASSWORD for the workbench login"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_roles(key: &str, value: &str) -> Result<Vec<AgentRole>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<AgentRole>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: name.to_string(),
            })
        })
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    llm: Option<LlmPatch>,
    agents: Option<AgentsPatch>,
    instructions: Option<InstructionsPatch>,
    erp: Option<ErpPatch>,
    notifications: Option<NotificationsPatch>,
    auth: Option<AuthPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_turns: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentsPatch {
    workers: Option<Vec<String>>,
    vector_store_id: Option<String>,
    allow_side_effects: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct InstructionsPatch {
    gateway: Option<GatewayKind>,
    path: Option<PathBuf>,
    base_url: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErpPatch {
    base_url: Option<String>,
    token_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    email_relay_url: Option<String>,
    approval_url: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
