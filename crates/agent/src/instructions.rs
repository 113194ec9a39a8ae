//! Process-wide instruction store and the gateways that feed it.
//!
//! The store maps agent names to their current instruction text. Lookups fall
//! back to compiled-in defaults; roles with neither an override nor a default
//! are reported as absent and must not be built.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use procura_core::config::{AppConfig, GatewayKind};
use procura_core::{AgentRole, Instruction, InstructionSource};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

const SEARCH_AGENT_DEFAULT: &str = "You immediately provide an input to the web search tool to find \
up-to-date information on the user's query.";

const APPROVAL_SPECIALIST_DEFAULT: &str = "You handle purchase order approvals. Use \
request_po_approval to open an approval request with the PO number, amount and reason, then use \
send_email to notify the stakeholders. Always report the correlation id returned by each tool.";

const PO_POSTING_DEFAULT: &str = "You post purchase orders to the ERP system. When the user asks \
to create or post a purchase order, call po_posting_api with toimittaja (supplier), tuote \
(product) and hinta (price). Confirm the posting and include the correlation id in your answer.";

pub fn compiled_defaults() -> HashMap<AgentRole, &'static str> {
    HashMap::from([
        (AgentRole::SearchAgent, SEARCH_AGENT_DEFAULT),
        (AgentRole::ApprovalSpecialistAgent, APPROVAL_SPECIALIST_DEFAULT),
        (AgentRole::PoPostingAgent, PO_POSTING_DEFAULT),
    ])
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InstructionError {
    #[error("instruction text for `{0}` must not be empty")]
    EmptyText(String),
    #[error("agent name must not be empty")]
    EmptyName,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstructionStatus {
    pub agent_name: String,
    pub source: Option<InstructionSource>,
    pub version: Option<u64>,
    pub present: bool,
}

pub struct InstructionStore {
    entries: RwLock<HashMap<String, Instruction>>,
    defaults: HashMap<String, String>,
    next_version: AtomicU64,
}

impl Default for InstructionStore {
    fn default() -> Self {
        Self::with_defaults(compiled_defaults())
    }
}

impl InstructionStore {
    pub fn with_defaults<T: Into<String>>(defaults: HashMap<AgentRole, T>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            defaults: defaults
                .into_iter()
                .map(|(role, text)| (role.as_str().to_string(), text.into()))
                .collect(),
            next_version: AtomicU64::new(1),
        }
    }

    /// A store without compiled-in defaults; every role must be pushed explicitly.
    pub fn without_defaults() -> Self {
        Self::with_defaults(HashMap::<AgentRole, String>::new())
    }

    /// Current instruction for `name`: the last override, else the compiled-in default.
    pub fn get(&self, name: &str) -> Option<Instruction> {
        if let Some(found) = self.read_entries().get(name) {
            debug!(event_name = "instructions.lookup", agent = name, source = "override");
            return Some(found.clone());
        }

        let fallback = self.defaults.get(name).map(|text| Instruction {
            agent_name: name.to_string(),
            text: text.clone(),
            source: InstructionSource::Default,
            version: 0,
        });
        debug!(
            event_name = "instructions.lookup",
            agent = name,
            source = if fallback.is_some() { "default" } else { "absent" }
        );
        fallback
    }

    pub fn resolve(&self, role: AgentRole) -> Option<Instruction> {
        self.get(role.as_str())
    }

    /// Overwrites the entry for `name`; visible to every subsequent `get`.
    pub fn set(&self, name: &str, text: impl Into<String>) -> Result<Instruction, InstructionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InstructionError::EmptyName);
        }

        let text = text.into();
        if text.trim().is_empty() {
            return Err(InstructionError::EmptyText(name.to_string()));
        }

        let instruction = Instruction {
            agent_name: name.to_string(),
            text,
            source: InstructionSource::Override,
            version: self.next_version.fetch_add(1, Ordering::SeqCst),
        };

        match self.entries.write() {
            Ok(mut entries) => entries.insert(name.to_string(), instruction.clone()),
            Err(poisoned) => poisoned.into_inner().insert(name.to_string(), instruction.clone()),
        };

        info!(
            event_name = "instructions.updated",
            agent = name,
            version = instruction.version,
            "cached instructions for agent"
        );
        Ok(instruction)
    }

    pub fn snapshot(&self, roles: &[AgentRole]) -> Vec<InstructionStatus> {
        roles
            .iter()
            .map(|role| {
                let found = self.resolve(*role);
                InstructionStatus {
                    agent_name: role.as_str().to_string(),
                    source: found.as_ref().map(|instruction| instruction.source),
                    version: found.as_ref().map(|instruction| instruction.version),
                    present: found.is_some(),
                }
            })
            .collect()
    }

    /// Pulls every role from `gateway` and stores what it returns as overrides.
    /// Roles the gateway does not know keep their current value.
    pub async fn hydrate(
        &self,
        gateway: &dyn ConfigGateway,
        roles: &[AgentRole],
    ) -> Result<Vec<AgentRole>, GatewayError> {
        let mut loaded = Vec::new();
        for role in roles {
            match gateway.get_agent_instructions(role.as_str()).await? {
                Some(text) if !text.trim().is_empty() => {
                    if self.set(role.as_str(), text).is_ok() {
                        loaded.push(*role);
                    }
                }
                _ => {
                    debug!(
                        event_name = "instructions.hydrate_skipped",
                        agent = role.as_str(),
                        gateway = gateway.name(),
                        "gateway has no instructions for agent"
                    );
                }
            }
        }

        info!(
            event_name = "instructions.hydrated",
            gateway = gateway.name(),
            loaded = loaded.len(),
            requested = roles.len(),
            "instruction store hydrated from gateway"
        );
        Ok(loaded)
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Instruction>> {
        match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("could not read instruction file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse instruction file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("instruction gateway request failed: {0}")]
    Transport(String),
    #[error("instruction gateway returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("instruction gateway configuration is incomplete: {0}")]
    Misconfigured(String),
}

/// Source of agent instruction text outside the process.
#[async_trait]
pub trait ConfigGateway: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get_agent_instructions(&self, name: &str) -> Result<Option<String>, GatewayError>;
}

#[derive(Clone, Debug, Default)]
pub struct StaticGateway {
    instructions: HashMap<String, String>,
}

impl StaticGateway {
    pub fn new(instructions: HashMap<String, String>) -> Self {
        Self { instructions }
    }

    pub fn with(mut self, role: AgentRole, text: impl Into<String>) -> Self {
        self.instructions.insert(role.as_str().to_string(), text.into());
        self
    }
}

#[async_trait]
impl ConfigGateway for StaticGateway {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_agent_instructions(&self, name: &str) -> Result<Option<String>, GatewayError> {
        Ok(self.instructions.get(name).cloned())
    }
}

/// Reads `[instructions]` from a TOML file on every lookup so edits are picked up on reload.
#[derive(Clone, Debug)]
pub struct FileGateway {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct InstructionFile {
    #[serde(default)]
    instructions: HashMap<String, String>,
}

impl FileGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<InstructionFile, GatewayError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| GatewayError::ReadFile { path: self.path.clone(), source })?;
        toml::from_str(&raw)
            .map_err(|source| GatewayError::ParseFile { path: self.path.clone(), source })
    }
}

#[async_trait]
impl ConfigGateway for FileGateway {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get_agent_instructions(&self, name: &str) -> Result<Option<String>, GatewayError> {
        Ok(self.read().await?.instructions.remove(name))
    }
}

/// Remote document store holding the latest production instruction per agent.
pub struct DocumentStoreGateway {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct InstructionDocument {
    instructions: Option<String>,
}

impl DocumentStoreGateway {
    pub fn new(client: Client, base_url: impl Into<String>, token: Option<SecretString>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, token }
    }

    fn document_url(&self, name: &str) -> String {
        format!("{}/agent_instructions/{}/production", self.base_url, name)
    }
}

#[async_trait]
impl ConfigGateway for DocumentStoreGateway {
    fn name(&self) -> &'static str {
        "document_store"
    }

    async fn get_agent_instructions(&self, name: &str) -> Result<Option<String>, GatewayError> {
        let mut request = self.client.get(self.document_url(name));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| GatewayError::Transport(error.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(
                event_name = "instructions.gateway_error",
                agent = name,
                status = status.as_u16(),
                "document store rejected instruction lookup"
            );
            return Err(GatewayError::Upstream { status: status.as_u16(), message });
        }

        let document: InstructionDocument =
            response.json().await.map_err(|error| GatewayError::Transport(error.to_string()))?;
        Ok(document.instructions.filter(|text| !text.trim().is_empty()))
    }
}

/// Builds the gateway selected by `instructions.gateway`.
pub fn gateway_from_config(
    config: &AppConfig,
    client: Client,
) -> Result<Box<dyn ConfigGateway>, GatewayError> {
    match config.instructions.gateway {
        GatewayKind::Static => Ok(Box::new(StaticGateway::default())),
        GatewayKind::File => {
            let path = config.instructions.path.clone().ok_or_else(|| {
                GatewayError::Misconfigured("instructions.path is not set".to_string())
            })?;
            Ok(Box::new(FileGateway::new(path)))
        }
        GatewayKind::DocumentStore => {
            let base_url = config.instructions.base_url.clone().ok_or_else(|| {
                GatewayError::Misconfigured("instructions.base_url is not set".to_string())
            })?;
            Ok(Box::new(DocumentStoreGateway::new(
                client,
                base_url,
                config.instructions.token.clone(),
            )))
        }
    }
}
