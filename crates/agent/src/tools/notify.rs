use std::sync::Arc;

use async_trait::async_trait;
use procura_core::config::NotificationsConfig;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::info;

use super::{
    outcome_schema, required_amount, required_str, Tool, ToolContext, ToolDescriptor, ToolError,
    ToolPayload,
};

/// Outbound webhooks for approval requests and email relay.
pub struct Notifier {
    client: Client,
    email_relay_url: Option<String>,
    approval_url: Option<String>,
    token: Option<SecretString>,
}

impl Notifier {
    pub fn from_config(config: &NotificationsConfig, client: Client) -> Self {
        Self {
            client,
            email_relay_url: config.email_relay_url.clone(),
            approval_url: config.approval_url.clone(),
            token: config.token.clone(),
        }
    }

    async fn post(
        &self,
        url: Option<&str>,
        setting: &str,
        body: &Value,
        correlation_id: Option<&str>,
    ) -> Result<Value, ToolError> {
        let url = url.ok_or_else(|| ToolError::NotConfigured(setting.to_string()))?;
        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(correlation_id) = correlation_id {
            request = request.header("x-correlation-id", correlation_id);
        }

        let response =
            request.send().await.map_err(|error| ToolError::Transport(error.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ToolError::Unauthorized(response.text().await.unwrap_or_default()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream { status: status.as_u16(), message });
        }

        // Relays commonly answer 202 with an empty body.
        let text = response.text().await.map_err(|error| ToolError::Transport(error.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|error| ToolError::Decode(error.to_string()))
    }
}

pub struct ApprovalRequestTool {
    notifier: Arc<Notifier>,
}

impl ApprovalRequestTool {
    pub fn new(notifier: Arc<Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Tool for ApprovalRequestTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "request_po_approval".to_string(),
            description: "Open an approval request for a purchase order.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "po_number": {"type": "string"},
                    "amount": {"type": "number"},
                    "reason": {"type": "string"}
                },
                "required": ["po_number", "amount", "reason"],
                "additionalProperties": false
            }),
            output_schema: outcome_schema(),
            side_effect: true,
        }
    }

    async fn execute(&self, input: Value, context: ToolContext) -> Result<ToolPayload, ToolError> {
        let po_number = required_str(&input, "po_number")?;
        let amount = required_amount(&input, "amount")?;
        let reason = required_str(&input, "reason")?;
        let correlation_id = context.correlation_id.as_deref();

        let response = self
            .notifier
            .post(
                self.notifier.approval_url.as_deref(),
                "notifications.approval_url",
                &json!({
                    "po_number": po_number,
                    "amount": amount,
                    "reason": reason,
                    "correlation_id": correlation_id,
                }),
                correlation_id,
            )
            .await?;

        let approval_id = response
            .get("approval_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| context.correlation_id.clone())
            .unwrap_or_default();
        info!(
            event_name = "approval.requested",
            po_number = %po_number,
            approval_id = %approval_id,
            correlation_id = correlation_id.unwrap_or_default(),
        );

        Ok(ToolPayload::single(
            json!({
                "approval_id": approval_id,
                "po_number": po_number,
                "amount": amount,
                "status": "pending",
            }),
            format!("Approval requested for purchase order {po_number}."),
        ))
    }
}

pub struct SendEmailTool {
    notifier: Arc<Notifier>,
}

impl SendEmailTool {
    pub fn new(notifier: Arc<Notifier>) -> Self {
        Self { notifier }
    }
}

fn looks_like_address(candidate: &str) -> bool {
    match candidate.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !candidate.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "send_email".to_string(),
            description: "Send an email notification through the configured relay.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "recipient": {"type": "string", "description": "Email address"},
                    "subject": {"type": "string"},
                    "message": {"type": "string"}
                },
                "required": ["recipient", "subject", "message"],
                "additionalProperties": false
            }),
            output_schema: outcome_schema(),
            side_effect: true,
        }
    }

    async fn execute(&self, input: Value, context: ToolContext) -> Result<ToolPayload, ToolError> {
        let recipient = required_str(&input, "recipient")?;
        if !looks_like_address(&recipient) {
            return Err(ToolError::InvalidInput(format!("`{recipient}` is not an email address")));
        }
        let subject = required_str(&input, "subject")?;
        let message = required_str(&input, "message")?;
        let correlation_id = context.correlation_id.as_deref();

        self.notifier
            .post(
                self.notifier.email_relay_url.as_deref(),
                "notifications.email_relay_url",
                &json!({
                    "to": recipient,
                    "subject": subject,
                    "body": message,
                    "correlation_id": correlation_id,
                }),
                correlation_id,
            )
            .await?;

        Ok(ToolPayload::single(
            json!({"recipient": recipient, "subject": subject}),
            format!("Email sent to {recipient}."),
        ))
    }
}
