use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{outcome_schema, required_str, Tool, ToolContext, ToolDescriptor, ToolError, ToolPayload};

const MAX_RESULTS: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    content: Vec<SearchContent>,
}

#[derive(Debug, Deserialize)]
struct SearchContent {
    #[serde(default)]
    text: Option<String>,
}

impl SearchHit {
    fn into_value(self) -> Value {
        let text = self
            .content
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("\n");
        json!({
            "file_id": self.file_id,
            "filename": self.filename,
            "score": self.score,
            "text": text,
        })
    }
}

/// Semantic search over the configured vector store of internal documents.
pub struct InternalDocumentSearchTool {
    client: Client,
    base_url: String,
    api_key: SecretString,
    vector_store_id: String,
}

impl InternalDocumentSearchTool {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: SecretString,
        vector_store_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            vector_store_id: vector_store_id.into(),
        }
    }

    fn search_url(&self) -> String {
        format!("{}/vector_stores/{}/search", self.base_url, self.vector_store_id)
    }
}

#[async_trait]
impl Tool for InternalDocumentSearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "search_internal_documents".to_string(),
            description: "Search internal procurement documents, policies and contracts.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "What to look for"}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
            output_schema: outcome_schema(),
            side_effect: false,
        }
    }

    async fn execute(&self, input: Value, _context: ToolContext) -> Result<ToolPayload, ToolError> {
        let query = required_str(&input, "query")?;

        let response = self
            .client
            .post(self.search_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({"query": query, "max_num_results": MAX_RESULTS}))
            .send()
            .await
            .map_err(|error| ToolError::Transport(error.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ToolError::Unauthorized(response.text().await.unwrap_or_default()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream { status: status.as_u16(), message });
        }

        let page: SearchPage =
            response.json().await.map_err(|error| ToolError::Decode(error.to_string()))?;
        let hits: Vec<Value> = page.data.into_iter().map(SearchHit::into_value).collect();
        let message = format!("Found {} matching passages for \"{query}\".", hits.len());
        Ok(ToolPayload::list(hits, message))
    }
}
