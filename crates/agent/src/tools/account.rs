use async_trait::async_trait;
use serde_json::{json, Value};

use super::{outcome_schema, required_str, Tool, ToolContext, ToolDescriptor, ToolError, ToolPayload};

/// Demo buyer profile. Returns the same figures for every user id.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccountInfoTool;

#[async_trait]
impl Tool for AccountInfoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_account_info".to_string(),
            description: "Return professional buyer account information for a user.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string", "description": "Buyer account identifier"}
                },
                "required": ["user_id"],
                "additionalProperties": false
            }),
            output_schema: outcome_schema(),
            side_effect: false,
        }
    }

    async fn execute(&self, input: Value, _context: ToolContext) -> Result<ToolPayload, ToolError> {
        let user_id = required_str(&input, "user_id")?;
        Ok(ToolPayload::single(
            json!({
                "user_id": user_id,
                "name": "Professional Buyer Client",
                "account_status": "Active",
                "subscription_tier": "Enterprise",
                "total_savings": "$450,000",
                "contracts_managed": 127,
                "last_negotiation": "2 days ago"
            }),
            format!("Account information for user {user_id}."),
        ))
    }
}
