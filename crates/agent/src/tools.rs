//! Tool contract, structured outcomes and the registry that executes them.
//!
//! Every invocation returns a [`ToolOutcome`]. Tool failures, guard denials and
//! panics are folded into `success: false` outcomes so the model can read them;
//! nothing escapes to the dispatcher.

pub mod account;
pub mod erp;
pub mod filter;
pub mod knowledge;
pub mod notify;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use procura_core::config::AppConfig;
use procura_core::{AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::guardrails::{GuardDecision, ToolGuard};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
    pub side_effect: bool,
}

/// JSON schema of the [`ToolOutcome`] envelope every registered tool returns.
pub fn outcome_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "success": {"type": "boolean"},
            "data": {},
            "count": {"type": "integer", "minimum": 0},
            "message": {"type": "string"},
            "error": {"type": "string"},
            "correlation_id": {"type": "string"}
        },
        "required": ["success", "data", "count", "message"]
    })
}

/// What a tool hands back on success, before the registry wraps it.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolPayload {
    pub data: Value,
    pub count: usize,
    pub message: String,
}

impl ToolPayload {
    pub fn list(items: Vec<Value>, message: impl Into<String>) -> Self {
        Self { count: items.len(), data: Value::Array(items), message: message.into() }
    }

    pub fn single(data: Value, message: impl Into<String>) -> Self {
        Self { data, count: 1, message: message.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub data: Value,
    pub count: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ToolOutcome {
    fn succeeded(payload: ToolPayload, correlation_id: Option<String>) -> Self {
        Self {
            success: true,
            data: payload.data,
            count: payload.count,
            message: payload.message,
            error: None,
            correlation_id,
        }
    }

    pub fn failure(
        error: impl Into<String>,
        message: impl Into<String>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            success: false,
            data: Value::Array(Vec::new()),
            count: 0,
            message: message.into(),
            error: Some(error.into()),
            correlation_id,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} is not configured")]
    NotConfigured(String),
    #[error("upstream rejected credentials: {0}")]
    Unauthorized(String),
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("could not decode upstream response: {0}")]
    Decode(String),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotConfigured(_) => "not_configured",
            Self::Unauthorized(_) => "unauthorized",
            Self::Upstream { .. } => "upstream_error",
            Self::Transport(_) => "transport_error",
            Self::Decode(_) => "decode_error",
        }
    }
}

/// Per-invocation data the registry hands to a tool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolContext {
    /// Present for side-effecting tools; sent upstream so retries can be traced.
    pub correlation_id: Option<String>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    async fn execute(&self, input: Value, context: ToolContext) -> Result<ToolPayload, ToolError>;
}

pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    guard: ToolGuard,
    audit: Arc<dyn AuditSink>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(ToolGuard::default(), Arc::new(NoopAuditSink))
    }
}

impl ToolRegistry {
    pub fn new(guard: ToolGuard, audit: Arc<dyn AuditSink>) -> Self {
        Self { tools: BTreeMap::new(), guard, audit }
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        let name = tool.descriptor().name;
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.get(name).map(|tool| tool.descriptor())
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs `name` with `input`. Always yields an outcome, never an error.
    pub async fn invoke(&self, name: &str, input: Value) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            warn!(event_name = "tool.unknown", tool = name, "model requested an unregistered tool");
            return ToolOutcome::failure("unknown_tool", format!("No tool named `{name}`."), None);
        };

        let descriptor = tool.descriptor();
        let correlation_id = descriptor.side_effect.then(|| Uuid::new_v4().to_string());

        if let GuardDecision::Deny { reason_code, user_message } = self.guard.evaluate(&descriptor)
        {
            warn!(
                event_name = "tool.denied",
                tool = name,
                reason_code,
                correlation_id = correlation_id.as_deref().unwrap_or_default(),
                "tool invocation denied by guard"
            );
            self.record(&descriptor, correlation_id.as_deref(), AuditOutcome::Rejected, reason_code);
            return ToolOutcome::failure(reason_code, user_message, correlation_id);
        }

        let context = ToolContext { correlation_id: correlation_id.clone() };
        let task = tokio::spawn({
            let tool = Arc::clone(tool);
            async move { tool.execute(input, context).await }
        });

        let outcome = match task.await {
            Ok(Ok(payload)) => ToolOutcome::succeeded(payload, correlation_id),
            Ok(Err(error)) => {
                warn!(
                    event_name = "tool.failed",
                    tool = name,
                    error_code = error.code(),
                    correlation_id = correlation_id.as_deref().unwrap_or_default(),
                    error = %error,
                    "tool returned an error"
                );
                ToolOutcome::failure(error.code(), error.to_string(), correlation_id)
            }
            Err(join_error) => {
                warn!(
                    event_name = "tool.panicked",
                    tool = name,
                    correlation_id = correlation_id.as_deref().unwrap_or_default(),
                    error = %join_error,
                    "tool task aborted"
                );
                ToolOutcome::failure(
                    "tool_panicked",
                    format!("`{name}` failed unexpectedly."),
                    correlation_id,
                )
            }
        };

        info!(
            event_name = "tool.invoked",
            tool = name,
            success = outcome.success,
            count = outcome.count,
            side_effect = descriptor.side_effect,
            correlation_id = outcome.correlation_id.as_deref().unwrap_or_default(),
        );
        let audit_outcome =
            if outcome.success { AuditOutcome::Success } else { AuditOutcome::Failed };
        let detail = outcome.error.clone().unwrap_or_else(|| "ok".to_string());
        self.record(&descriptor, outcome.correlation_id.as_deref(), audit_outcome, &detail);
        outcome
    }

    fn record(
        &self,
        descriptor: &ToolDescriptor,
        correlation_id: Option<&str>,
        outcome: AuditOutcome,
        detail: &str,
    ) {
        if !descriptor.side_effect {
            return;
        }
        let Some(correlation_id) = correlation_id else {
            return;
        };
        self.audit.emit(
            AuditEvent::side_effect(correlation_id, descriptor.name.clone(), outcome)
                .with_metadata("detail", detail),
        );
    }
}

/// Registry with every built-in tool wired from configuration.
/// The internal document search is registered only when a vector store is configured.
pub fn standard_registry(
    config: &AppConfig,
    client: Client,
    audit: Arc<dyn AuditSink>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new(ToolGuard::new(config.agents.allow_side_effects), audit);

    registry.register(account::AccountInfoTool);

    let erp = Arc::new(erp::ErpClient::from_config(&config.erp, client.clone()));
    registry.register(erp::PurchaseOrdersTool::new(Arc::clone(&erp)));
    registry.register(erp::PurchaseDocumentsTool::new(Arc::clone(&erp)));
    registry.register(erp::PurchaseDocumentLinesTool::new(Arc::clone(&erp)));
    registry.register(erp::PoPostingTool::new(erp));

    let notifier = Arc::new(notify::Notifier::from_config(&config.notifications, client.clone()));
    registry.register(notify::ApprovalRequestTool::new(Arc::clone(&notifier)));
    registry.register(notify::SendEmailTool::new(notifier));

    if let (Some(vector_store_id), Some(api_key)) =
        (config.agents.vector_store_id.clone(), config.llm.api_key.clone())
    {
        registry.register(knowledge::InternalDocumentSearchTool::new(
            client,
            config.llm.base_url.clone(),
            api_key,
            vector_store_id,
        ));
    }

    registry
}

pub(crate) fn required_str(input: &Value, key: &str) -> Result<String, ToolError> {
    match input.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        _ => Err(ToolError::InvalidInput(format!("`{key}` is required"))),
    }
}

pub(crate) fn optional_str(input: &Value, key: &str) -> Option<String> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

pub(crate) fn required_amount(input: &Value, key: &str) -> Result<f64, ToolError> {
    let amount = match input.get(key) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ToolError::InvalidInput(format!("`{key}` must be a number")))?;

    if !amount.is_finite() || amount <= 0.0 {
        return Err(ToolError::InvalidInput(format!("`{key}` must be greater than zero")));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use procura_core::{AuditOutcome, InMemoryAuditSink};
    use serde_json::{json, Value};

    use procura_core::config::AppConfig;
    use procura_core::NoopAuditSink;

    use super::{
        outcome_schema, required_amount, standard_registry, Tool, ToolContext, ToolDescriptor,
        ToolError, ToolPayload, ToolRegistry,
    };
    use crate::guardrails::ToolGuard;

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "explode".to_string(),
                description: "always panics".to_string(),
                input_schema: json!({"type": "object"}),
                output_schema: json!({"type": "object"}),
                side_effect: false,
            }
        }

        async fn execute(&self, _input: Value, _context: ToolContext) -> Result<ToolPayload, ToolError> {
            panic!("tool blew up");
        }
    }

    struct EchoPostTool;

    #[async_trait]
    impl Tool for EchoPostTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "echo_post".to_string(),
                description: "pretends to post".to_string(),
                input_schema: json!({"type": "object"}),
                output_schema: json!({"type": "object"}),
                side_effect: true,
            }
        }

        async fn execute(&self, input: Value, context: ToolContext) -> Result<ToolPayload, ToolError> {
            Ok(ToolPayload::single(
                json!({"input": input, "sent_correlation_id": context.correlation_id}),
                "posted",
            ))
        }
    }

    #[tokio::test]
    async fn panicking_tool_yields_failure_outcome() {
        let mut registry = ToolRegistry::default();
        registry.register(PanickingTool);

        let outcome = registry.invoke("explode", json!({})).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("tool_panicked"));
        assert_eq!(outcome.count, 0);
    }

    #[tokio::test]
    async fn unknown_tool_yields_failure_outcome() {
        let registry = ToolRegistry::default();
        let outcome = registry.invoke("missing", json!({})).await;
        assert_eq!(outcome.error.as_deref(), Some("unknown_tool"));
    }

    #[tokio::test]
    async fn side_effect_calls_get_distinct_correlation_ids() {
        let audit = InMemoryAuditSink::default();
        let mut registry = ToolRegistry::new(ToolGuard::default(), Arc::new(audit.clone()));
        registry.register(EchoPostTool);

        let input = json!({"toimittaja": "Acme", "tuote": "chairs", "hinta": 10});
        let first = registry.invoke("echo_post", input.clone()).await;
        let second = registry.invoke("echo_post", input).await;

        let ids: HashSet<_> =
            [first.correlation_id.clone(), second.correlation_id.clone()].into_iter().collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(Option::is_some));
        assert_eq!(first.data["sent_correlation_id"], json!(first.correlation_id));

        let events = audit.side_effects("echo_post");
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.outcome == AuditOutcome::Success));
    }

    #[tokio::test]
    async fn guard_denies_side_effects_when_disabled() {
        let audit = InMemoryAuditSink::default();
        let mut registry = ToolRegistry::new(ToolGuard::new(false), Arc::new(audit.clone()));
        registry.register(EchoPostTool);

        let outcome = registry.invoke("echo_post", json!({})).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("side_effects_disabled"));
        assert!(outcome.correlation_id.is_some());
        assert_eq!(audit.events()[0].outcome, AuditOutcome::Rejected);
    }

    #[test]
    fn standard_tools_describe_the_outcome_envelope() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".to_string().into());
        config.agents.vector_store_id = Some("vs_test".to_string());

        let registry =
            standard_registry(&config, reqwest::Client::new(), Arc::new(NoopAuditSink));

        assert_eq!(registry.len(), 8);
        for descriptor in registry.descriptors() {
            assert_eq!(descriptor.output_schema, outcome_schema(), "{}", descriptor.name);
            assert_eq!(descriptor.input_schema["type"], "object", "{}", descriptor.name);
        }
        let side_effects: Vec<String> = registry
            .descriptors()
            .into_iter()
            .filter(|descriptor| descriptor.side_effect)
            .map(|descriptor| descriptor.name)
            .collect();
        assert_eq!(side_effects, ["po_posting_api", "request_po_approval", "send_email"]);
    }

    #[test]
    fn amounts_accept_numbers_and_decimal_strings() {
        assert_eq!(required_amount(&json!({"hinta": 12.5}), "hinta"), Ok(12.5));
        assert_eq!(required_amount(&json!({"hinta": "12,5"}), "hinta"), Ok(12.5));
        assert!(required_amount(&json!({"hinta": -1}), "hinta").is_err());
        assert!(required_amount(&json!({}), "hinta").is_err());
    }
}
