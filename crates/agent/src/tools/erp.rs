use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use procura_core::config::ErpConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::filter::ErpFilter;
use super::{
    optional_str, outcome_schema, required_amount, required_str, Tool, ToolContext, ToolDescriptor, ToolError,
    ToolPayload,
};

const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct CachedToken {
    value: SecretString,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Collection {
    #[serde(default)]
    value: Vec<Value>,
}

/// ERP REST client. When a token endpoint is configured every request carries a
/// client-credentials bearer token, cached until shortly before it expires.
pub struct ErpClient {
    client: Client,
    base_url: Option<String>,
    token_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    scope: Option<String>,
    token: Mutex<Option<CachedToken>>,
}

impl ErpClient {
    pub fn from_config(config: &ErpConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.as_ref().map(|url| url.trim_end_matches('/').to_string()),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
            token: Mutex::new(None),
        }
    }

    pub async fn list(
        &self,
        entity: &str,
        filter: &ErpFilter,
    ) -> Result<Vec<Value>, ToolError> {
        let mut request = self.client.get(self.entity_url(entity)?);
        if !filter.is_empty() {
            request = request.query(&[("$filter", filter.to_string())]);
        }

        let response = self.send(request).await?;
        let collection: Collection =
            response.json().await.map_err(|error| ToolError::Decode(error.to_string()))?;
        debug!(event_name = "erp.listed", entity, count = collection.value.len());
        Ok(collection.value)
    }

    pub async fn create(
        &self,
        entity: &str,
        body: &Value,
        correlation_id: Option<&str>,
    ) -> Result<Value, ToolError> {
        let mut request = self.client.post(self.entity_url(entity)?).json(body);
        if let Some(correlation_id) = correlation_id {
            request = request.header("x-correlation-id", correlation_id);
        }

        let response = self.send(request).await?;
        let created = response.json().await.map_err(|error| ToolError::Decode(error.to_string()))?;
        info!(
            event_name = "erp.created",
            entity,
            correlation_id = correlation_id.unwrap_or_default(),
            "erp record created"
        );
        Ok(created)
    }

    fn entity_url(&self, entity: &str) -> Result<String, ToolError> {
        let base_url =
            self.base_url.as_deref().ok_or_else(|| ToolError::NotConfigured("erp.base_url".to_string()))?;
        Ok(format!("{base_url}/{entity}"))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ToolError> {
        let request = match self.bearer_token().await? {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response =
            request.send().await.map_err(|error| ToolError::Transport(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            *self.token.lock().await = None;
            return Err(ToolError::Unauthorized(message));
        }
        Err(ToolError::Upstream { status: status.as_u16(), message })
    }

    async fn bearer_token(&self) -> Result<Option<SecretString>, ToolError> {
        let Some(token_url) = self.token_url.as_deref() else {
            return Ok(None);
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(Some(token.value.clone()));
            }
        }

        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| ToolError::NotConfigured("erp.client_id".to_string()))?;
        let client_secret = self
            .client_secret
            .as_ref()
            .ok_or_else(|| ToolError::NotConfigured("erp.client_secret".to_string()))?;

        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.expose_secret().to_string()),
        ];
        if let Some(scope) = &self.scope {
            form.push(("scope", scope.clone()));
        }

        let response = self
            .client
            .post(token_url)
            .form(&form)
            .send()
            .await
            .map_err(|error| ToolError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ToolError::Unauthorized(format!("token endpoint returned {status}: {message}")));
        }

        let token: TokenResponse =
            response.json().await.map_err(|error| ToolError::Decode(error.to_string()))?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        let value = SecretString::from(token.access_token);
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        debug!(event_name = "erp.token_refreshed", expires_in_secs = lifetime.as_secs());
        Ok(Some(value))
    }
}

fn filter_schema(subject: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "filter_params": {
                "type": "string",
                "description": format!(
                    "Filter for {subject}: `field op value` clauses joined with `and`; ops eq, ne, gt, ge, lt, le; quote text with single quotes. Empty returns everything."
                )
            }
        },
        "additionalProperties": false
    })
}

async fn list_with_filter(
    erp: &ErpClient,
    entity: &str,
    input: &Value,
    subject: &str,
) -> Result<ToolPayload, ToolError> {
    let raw = optional_str(input, "filter_params").unwrap_or_default();
    let filter = ErpFilter::parse(&raw)?;
    let items = erp.list(entity, &filter).await?;
    let message = format!("Found {} {subject}.", items.len());
    Ok(ToolPayload::list(items, message))
}

pub struct PurchaseOrdersTool {
    erp: Arc<ErpClient>,
}

impl PurchaseOrdersTool {
    pub fn new(erp: Arc<ErpClient>) -> Self {
        Self { erp }
    }
}

#[async_trait]
impl Tool for PurchaseOrdersTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_purchase_orders".to_string(),
            description: "List purchase orders from the ERP system.".to_string(),
            input_schema: filter_schema("purchase orders"),
            output_schema: outcome_schema(),
            side_effect: false,
        }
    }

    async fn execute(&self, input: Value, _context: ToolContext) -> Result<ToolPayload, ToolError> {
        list_with_filter(&self.erp, "purchaseOrders", &input, "purchase orders").await
    }
}

pub struct PurchaseDocumentsTool {
    erp: Arc<ErpClient>,
}

impl PurchaseDocumentsTool {
    pub fn new(erp: Arc<ErpClient>) -> Self {
        Self { erp }
    }
}

#[async_trait]
impl Tool for PurchaseDocumentsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_purchase_documents".to_string(),
            description: "List purchase documents (orders, invoices, credit memos) from the ERP system."
                .to_string(),
            input_schema: filter_schema("purchase documents"),
            output_schema: outcome_schema(),
            side_effect: false,
        }
    }

    async fn execute(&self, input: Value, _context: ToolContext) -> Result<ToolPayload, ToolError> {
        list_with_filter(&self.erp, "purchaseDocuments", &input, "purchase documents").await
    }
}

pub struct PurchaseDocumentLinesTool {
    erp: Arc<ErpClient>,
}

impl PurchaseDocumentLinesTool {
    pub fn new(erp: Arc<ErpClient>) -> Self {
        Self { erp }
    }
}

#[async_trait]
impl Tool for PurchaseDocumentLinesTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_purchase_document_lines".to_string(),
            description: "List the lines of one purchase document.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "document_no": {"type": "string", "description": "Purchase document number"}
                },
                "required": ["document_no"],
                "additionalProperties": false
            }),
            output_schema: outcome_schema(),
            side_effect: false,
        }
    }

    async fn execute(&self, input: Value, _context: ToolContext) -> Result<ToolPayload, ToolError> {
        let document_no = required_str(&input, "document_no")?;
        let lines =
            self.erp.list("purchaseDocumentLines", &ErpFilter::equals("documentNo", &document_no)).await?;
        let message = format!("Found {} lines for document {document_no}.", lines.len());
        Ok(ToolPayload::list(lines, message))
    }
}

/// Posts a purchase order. `toimittaja` is the supplier, `tuote` the product, `hinta` the price.
pub struct PoPostingTool {
    erp: Arc<ErpClient>,
}

impl PoPostingTool {
    pub fn new(erp: Arc<ErpClient>) -> Self {
        Self { erp }
    }
}

#[async_trait]
impl Tool for PoPostingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "po_posting_api".to_string(),
            description: "Create a purchase order in the ERP system.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "toimittaja": {"type": "string", "description": "Supplier name"},
                    "tuote": {"type": "string", "description": "Product or service"},
                    "hinta": {"type": "number", "description": "Price"}
                },
                "required": ["toimittaja", "tuote", "hinta"],
                "additionalProperties": false
            }),
            output_schema: outcome_schema(),
            side_effect: true,
        }
    }

    async fn execute(&self, input: Value, context: ToolContext) -> Result<ToolPayload, ToolError> {
        let supplier = required_str(&input, "toimittaja")?;
        let product = required_str(&input, "tuote")?;
        let price = required_amount(&input, "hinta")?;

        let body = json!({
            "vendorName": supplier,
            "description": product,
            "unitCost": price,
            "externalDocumentNumber": context.correlation_id,
        });
        let created =
            self.erp.create("purchaseOrders", &body, context.correlation_id.as_deref()).await?;
        let number = created
            .get("number")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "pending".to_string());
        Ok(ToolPayload::single(
            created,
            format!("Purchase order {number} posted for {supplier} ({product}, {price:.2})."),
        ))
    }
}
