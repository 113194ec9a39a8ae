use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::graph::TriageNode;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub final_output: String,
    /// Name of the agent that produced `final_output`.
    pub last_agent: String,
    pub turns: u32,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("model provider rejected credentials: {0}")]
    Auth(String),
    #[error("model provider rate limited the request: {0}")]
    RateLimited(String),
    #[error("model provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model provider request failed: {0}")]
    Transport(String),
    #[error("model provider response could not be read: {0}")]
    InvalidResponse(String),
    #[error("agent run exceeded {0} turns")]
    MaxTurnsExceeded(u32),
}

/// Executes an agent graph against one user input.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(&self, root: &TriageNode, input: &str) -> Result<RunOutcome, RuntimeError>;
}
