//! Agent orchestration for the procurement assistant.
//!
//! A chat message flows through four pieces:
//! 1. **Instructions** (`instructions`) - per-agent prompt text with compiled-in
//!    defaults and pluggable gateways.
//! 2. **Graph** (`graph`) - a triage agent plus its specialist workers, built
//!    from the current instructions and cached between requests.
//! 3. **Runtime** (`runtime`, `llm`) - drives the model, handoffs and tool calls.
//! 4. **Dispatch** (`dispatcher`) - validates input and maps failures onto the
//!    error taxonomy the HTTP layer understands.
//!
//! Tools (`tools`) are invoked only through the registry, which applies the
//! side-effect policy from `guardrails` and never lets a tool fault escape.

pub mod dispatcher;
pub mod graph;
pub mod guardrails;
pub mod instructions;
pub mod llm;
pub mod runtime;
pub mod tools;

pub use dispatcher::{DispatchReply, Dispatcher};
pub use graph::{AgentGraphBuilder, GraphError, GraphLayout, GraphReadiness, TriageNode, WorkerNode};
pub use instructions::{ConfigGateway, GatewayError, InstructionStore};
pub use llm::ResponsesRuntime;
pub use runtime::{AgentRuntime, RunOutcome, RuntimeError};
pub use tools::{ToolOutcome, ToolRegistry};
