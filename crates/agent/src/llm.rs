//! Runtime backed by an OpenAI-compatible `/responses` endpoint.
//!
//! The active agent starts as the triage node. Each turn sends the active
//! agent's instructions and tools; function calls are executed through the
//! tool registry and fed back, a `transfer_to_*` call switches the active agent
//! and replays the user input, and a plain message ends the run. Calls to tools
//! the active agent is not bound to are answered with a `tool_not_allowed`
//! outcome and never reach the registry.

use std::sync::Arc;

use async_trait::async_trait;
use procura_core::config::LlmConfig;
use procura_core::AgentRole;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::graph::{ToolBinding, TriageNode, WorkerNode};
use crate::runtime::{AgentRuntime, RunOutcome, RuntimeError};
use crate::tools::{ToolOutcome, ToolRegistry};

#[derive(Clone, Copy)]
enum ActiveAgent<'a> {
    Triage(&'a TriageNode),
    Worker(&'a WorkerNode),
}

impl ActiveAgent<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Triage(_) => AgentRole::TRIAGE.as_str(),
            Self::Worker(node) => node.role.as_str(),
        }
    }

    /// Whether `function_name` is bound to this node. Triage only holds handoffs.
    fn allows(&self, function_name: &str) -> bool {
        match self {
            Self::Triage(triage) => triage.handoff(function_name).is_some(),
            Self::Worker(node) => node.tools.iter().any(|binding| {
                matches!(binding, ToolBinding::Function(descriptor) if descriptor.name == function_name)
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct FunctionCall {
    call_id: String,
    name: String,
    arguments: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct ModelTurn {
    response_id: Option<String>,
    text: String,
    calls: Vec<FunctionCall>,
}

pub struct ResponsesRuntime {
    client: Client,
    base_url: String,
    api_key: SecretString,
    max_turns: u32,
    registry: Arc<ToolRegistry>,
}

impl ResponsesRuntime {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: SecretString,
        max_turns: u32,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            max_turns,
            registry,
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &LlmConfig, client: Client, registry: Arc<ToolRegistry>) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self::new(client, config.base_url.clone(), api_key, config.max_turns, registry))
    }

    async fn create_response(&self, body: &Value) -> Result<ModelTurn, RuntimeError> {
        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| RuntimeError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RuntimeError::Auth(message),
                StatusCode::TOO_MANY_REQUESTS => RuntimeError::RateLimited(message),
                _ => RuntimeError::Api { status: status.as_u16(), message },
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| RuntimeError::InvalidResponse(error.to_string()))?;
        parse_turn(&payload)
    }
}

#[async_trait]
impl AgentRuntime for ResponsesRuntime {
    async fn run(&self, root: &TriageNode, input: &str) -> Result<RunOutcome, RuntimeError> {
        let mut active = ActiveAgent::Triage(root);
        let mut pending = vec![user_message(input)];
        let mut previous_response_id: Option<String> = None;

        for turn in 1..=self.max_turns {
            let body = request_body(active, &pending, previous_response_id.as_deref());
            let reply = self.create_response(&body).await?;
            debug!(
                event_name = "runtime.turn",
                agent = active.name(),
                turn,
                function_calls = reply.calls.len()
            );

            if reply.calls.is_empty() {
                info!(event_name = "runtime.completed", agent = active.name(), turns = turn);
                return Ok(RunOutcome {
                    final_output: reply.text,
                    last_agent: active.name().to_string(),
                    turns: turn,
                });
            }

            let transfer = match active {
                ActiveAgent::Triage(triage) => reply
                    .calls
                    .iter()
                    .find_map(|call| triage.handoff(&call.name).map(|worker| worker.as_ref())),
                ActiveAgent::Worker(_) => None,
            };
            if let Some(worker) = transfer {
                info!(
                    event_name = "runtime.handoff",
                    from = active.name(),
                    to = worker.role.as_str(),
                    turn
                );
                active = ActiveAgent::Worker(worker);
                pending = vec![user_message(input)];
                previous_response_id = None;
                continue;
            }

            pending = Vec::with_capacity(reply.calls.len());
            for call in &reply.calls {
                let outcome = if active.allows(&call.name) {
                    let arguments =
                        serde_json::from_str::<Value>(&call.arguments).unwrap_or_else(|_| {
                            warn!(
                                event_name = "runtime.bad_arguments",
                                tool = %call.name,
                                "model sent arguments that are not JSON"
                            );
                            json!({})
                        });
                    self.registry.invoke(&call.name, arguments).await
                } else {
                    warn!(
                        event_name = "runtime.tool_not_allowed",
                        agent = active.name(),
                        tool = %call.name
                    );
                    ToolOutcome::failure(
                        "tool_not_allowed",
                        format!("{} is not available to {}", call.name, active.name()),
                        None,
                    )
                };
                let output = serde_json::to_string(&outcome)
                    .map_err(|error| RuntimeError::InvalidResponse(error.to_string()))?;
                pending.push(json!({
                    "type": "function_call_output",
                    "call_id": call.call_id,
                    "output": output,
                }));
            }
            previous_response_id = reply.response_id;
        }

        warn!(event_name = "runtime.max_turns", max_turns = self.max_turns);
        Err(RuntimeError::MaxTurnsExceeded(self.max_turns))
    }
}

fn user_message(input: &str) -> Value {
    json!({"role": "user", "content": input})
}

fn request_body(active: ActiveAgent<'_>, input: &[Value], previous_response_id: Option<&str>) -> Value {
    let (model, instructions, tools) = match active {
        ActiveAgent::Triage(triage) => {
            let tools: Vec<Value> = triage
                .handoffs
                .iter()
                .map(|worker| {
                    json!({
                        "type": "function",
                        "name": worker.handoff_name(),
                        "description": format!(
                            "Handoff to the {} agent to handle the request.",
                            worker.role.as_str()
                        ),
                        "parameters": {"type": "object", "properties": {}, "additionalProperties": false},
                    })
                })
                .collect();
            (triage.model.as_str(), triage.system_prompt(), tools)
        }
        ActiveAgent::Worker(worker) => {
            let tools = worker.tools.iter().map(tool_definition).collect();
            (worker.model.as_str(), worker.instruction.text.clone(), tools)
        }
    };

    let mut body = json!({
        "model": model,
        "instructions": instructions,
        "input": input,
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(tools);
    }
    if let Some(previous) = previous_response_id {
        body["previous_response_id"] = Value::String(previous.to_string());
    }
    body
}

fn tool_definition(binding: &ToolBinding) -> Value {
    match binding {
        ToolBinding::WebSearch => json!({"type": "web_search_preview"}),
        ToolBinding::Function(descriptor) => json!({
            "type": "function",
            "name": descriptor.name,
            "description": descriptor.description,
            "parameters": descriptor.input_schema,
        }),
    }
}

fn parse_turn(payload: &Value) -> Result<ModelTurn, RuntimeError> {
    let items = payload
        .get("output")
        .and_then(Value::as_array)
        .ok_or_else(|| RuntimeError::InvalidResponse("response has no output array".to_string()))?;

    let mut turn = ModelTurn {
        response_id: payload.get("id").and_then(Value::as_str).map(str::to_string),
        ..ModelTurn::default()
    };

    for item in items {
        match item.get("type").and_then(Value::as_str) {
            Some("function_call") => {
                let field = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);
                let (Some(call_id), Some(name)) = (field("call_id"), field("name")) else {
                    return Err(RuntimeError::InvalidResponse(
                        "function call without call_id or name".to_string(),
                    ));
                };
                turn.calls.push(FunctionCall {
                    call_id,
                    name,
                    arguments: field("arguments").unwrap_or_else(|| "{}".to_string()),
                });
            }
            Some("message") => {
                let parts = item.get("content").and_then(Value::as_array).into_iter().flatten();
                for part in parts {
                    if part.get("type").and_then(Value::as_str) == Some("output_text") {
                        if let Some(text) = part.get("text").and_then(Value::as_str) {
                            turn.text.push_str(text);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(turn)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use procura_core::{AgentRole, Instruction, InstructionSource};
    use reqwest::Client;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::{parse_turn, request_body, user_message, ActiveAgent, FunctionCall, ResponsesRuntime};
    use crate::graph::{ToolBinding, TriageNode, WorkerNode};
    use crate::runtime::{AgentRuntime, RuntimeError};
    use crate::tools::{
        Tool, ToolContext, ToolDescriptor, ToolError, ToolOutcome, ToolPayload, ToolRegistry,
    };

    fn instruction(role: AgentRole, text: &str) -> Instruction {
        Instruction {
            agent_name: role.as_str().to_string(),
            text: text.to_string(),
            source: InstructionSource::Override,
            version: 1,
        }
    }

    fn graph() -> TriageNode {
        let history = WorkerNode {
            role: AgentRole::PurchaseHistorySearchAgent,
            instruction: instruction(AgentRole::PurchaseHistorySearchAgent, "history"),
            tools: vec![ToolBinding::Function(ToolDescriptor {
                name: "get_account_info".to_string(),
                description: "account".to_string(),
                input_schema: json!({"type": "object"}),
                output_schema: json!({"type": "object"}),
                side_effect: false,
            })],
            model: "gpt-4.1".to_string(),
        };
        let search = WorkerNode {
            role: AgentRole::SearchAgent,
            instruction: instruction(AgentRole::SearchAgent, "search"),
            tools: vec![ToolBinding::WebSearch],
            model: "gpt-4.1".to_string(),
        };
        TriageNode {
            instruction: instruction(AgentRole::TRIAGE, "route"),
            handoffs: vec![Arc::new(search), Arc::new(history)],
            model: "gpt-4.1".to_string(),
        }
    }

    #[test]
    fn triage_request_exposes_handoffs_as_functions() {
        let triage = graph();
        let body = request_body(ActiveAgent::Triage(&triage), &[user_message("hi")], None);

        let names: Vec<_> =
            body["tools"].as_array().into_iter().flatten().map(|tool| tool["name"].clone()).collect();
        assert_eq!(
            names,
            vec![json!("transfer_to_search_agent"), json!("transfer_to_purchase_history_search_agent")]
        );
        assert!(body["instructions"].as_str().is_some_and(|text| text.ends_with("route")));
        assert!(body.get("previous_response_id").is_none());
    }

    #[test]
    fn worker_request_carries_hosted_and_function_tools() {
        let triage = graph();
        let search = request_body(ActiveAgent::Worker(&triage.handoffs[0]), &[], Some("resp_1"));
        let history = request_body(ActiveAgent::Worker(&triage.handoffs[1]), &[], None);

        assert_eq!(search["tools"][0]["type"], "web_search_preview");
        assert_eq!(search["previous_response_id"], "resp_1");
        assert_eq!(history["tools"][0]["name"], "get_account_info");
        assert_eq!(history["instructions"], "history");
    }

    #[test]
    fn parses_function_calls_and_text() {
        let turn = parse_turn(&json!({
            "id": "resp_9",
            "output": [
                {"type": "function_call", "call_id": "c1", "name": "get_account_info", "arguments": "{\"user_id\":\"42\"}"},
                {"type": "message", "content": [{"type": "output_text", "text": "Checking."}]}
            ]
        }))
        .expect("turn parses");

        assert_eq!(turn.response_id.as_deref(), Some("resp_9"));
        assert_eq!(turn.text, "Checking.");
        assert_eq!(
            turn.calls,
            vec![FunctionCall {
                call_id: "c1".to_string(),
                name: "get_account_info".to_string(),
                arguments: "{\"user_id\":\"42\"}".to_string(),
            }]
        );
    }

    #[test]
    fn response_without_output_is_invalid() {
        assert!(matches!(parse_turn(&json!({"id": "x"})), Err(RuntimeError::InvalidResponse(_))));
    }

    /// Records every input it is called with.
    struct RecordingTool {
        name: &'static str,
        side_effect: bool,
        inputs: Arc<Mutex<Vec<Value>>>,
    }

    impl RecordingTool {
        fn new(name: &'static str, side_effect: bool) -> (Self, Arc<Mutex<Vec<Value>>>) {
            let inputs = Arc::new(Mutex::new(Vec::new()));
            (Self { name, side_effect, inputs: inputs.clone() }, inputs)
        }
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: self.name.to_string(),
                description: "records calls".to_string(),
                input_schema: json!({"type": "object"}),
                output_schema: json!({"type": "object"}),
                side_effect: self.side_effect,
            }
        }

        async fn execute(&self, input: Value, _context: ToolContext) -> Result<ToolPayload, ToolError> {
            self.inputs.lock().expect("inputs lock").push(input);
            Ok(ToolPayload::single(json!({"balance": 1200}), "ok"))
        }
    }

    /// Answers `/responses` with the scripted replies in order, repeating the last one.
    struct Scripted {
        replies: Vec<ResponseTemplate>,
        next: AtomicUsize,
    }

    impl Respond for Scripted {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let index = self.next.fetch_add(1, Ordering::SeqCst);
            self.replies
                .get(index)
                .or_else(|| self.replies.last())
                .cloned()
                .unwrap_or_else(|| ResponseTemplate::new(500))
        }
    }

    async fn model_server(replies: Vec<ResponseTemplate>) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(Scripted { replies, next: AtomicUsize::new(0) })
            .mount(&server)
            .await;
        server
    }

    async fn sent_bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).expect("request body is JSON"))
            .collect()
    }

    fn reply(id: &str, output: Vec<Value>) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"id": id, "output": output}))
    }

    fn function_call(call_id: &str, name: &str, arguments: &str) -> Value {
        json!({"type": "function_call", "call_id": call_id, "name": name, "arguments": arguments})
    }

    fn message(text: &str) -> Value {
        json!({"type": "message", "content": [{"type": "output_text", "text": text}]})
    }

    fn runtime(server: &MockServer, registry: ToolRegistry, max_turns: u32) -> ResponsesRuntime {
        ResponsesRuntime::new(
            Client::new(),
            server.uri(),
            SecretString::from("sk-test".to_string()),
            max_turns,
            Arc::new(registry),
        )
    }

    fn fed_back_outcome(body: &Value) -> ToolOutcome {
        assert_eq!(body["input"][0]["type"], "function_call_output");
        let output = body["input"][0]["output"].as_str().expect("output is a string");
        serde_json::from_str(output).expect("output is a tool outcome")
    }

    #[tokio::test]
    async fn triage_cannot_execute_registered_tools() {
        let server = model_server(vec![
            reply("resp_1", vec![function_call("c1", "po_posting_api", "{}")]),
            reply("resp_2", vec![message("done")]),
        ])
        .await;
        let (posting, posted) = RecordingTool::new("po_posting_api", true);
        let mut registry = ToolRegistry::default();
        registry.register(posting);

        let outcome = runtime(&server, registry, 5).run(&graph(), "post it").await.expect("run completes");

        assert_eq!(outcome.last_agent, "GeneralistProcurementAgent");
        assert_eq!(outcome.final_output, "done");
        assert!(posted.lock().expect("inputs lock").is_empty());

        let bodies = sent_bodies(&server).await;
        assert_eq!(bodies[1]["input"][0]["call_id"], "c1");
        assert_eq!(bodies[1]["previous_response_id"], "resp_1");
        let denied = fed_back_outcome(&bodies[1]);
        assert!(!denied.success);
        assert_eq!(denied.error.as_deref(), Some("tool_not_allowed"));
    }

    #[tokio::test]
    async fn worker_only_executes_its_own_tools() {
        let server = model_server(vec![
            reply("resp_1", vec![function_call("h1", "transfer_to_purchase_history_search_agent", "{}")]),
            reply(
                "resp_2",
                vec![
                    function_call("c1", "po_posting_api", "{\"hinta\": 10}"),
                    function_call("c2", "get_account_info", "{\"user_id\": \"42\"}"),
                ],
            ),
            reply("resp_3", vec![message("done")]),
        ])
        .await;
        let (posting, posted) = RecordingTool::new("po_posting_api", true);
        let (account, accounts) = RecordingTool::new("get_account_info", false);
        let mut registry = ToolRegistry::default();
        registry.register(posting);
        registry.register(account);

        let outcome = runtime(&server, registry, 5).run(&graph(), "post it").await.expect("run completes");

        assert_eq!(outcome.last_agent, "PurchaseHistorySearchAgent");
        assert!(posted.lock().expect("inputs lock").is_empty());
        assert_eq!(*accounts.lock().expect("inputs lock"), vec![json!({"user_id": "42"})]);

        let bodies = sent_bodies(&server).await;
        let outputs = bodies[2]["input"].as_array().cloned().unwrap_or_default();
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0]["output"].as_str().is_some_and(|text| text.contains("tool_not_allowed")));
        assert_eq!(outputs[1]["call_id"], "c2");
    }

    #[tokio::test]
    async fn handoff_replays_input_and_feeds_tool_output_back() {
        let server = model_server(vec![
            reply("resp_1", vec![function_call("h1", "transfer_to_purchase_history_search_agent", "{}")]),
            reply("resp_2", vec![function_call("c2", "get_account_info", "{\"user_id\":\"42\"}")]),
            reply("resp_3", vec![message("Your balance is 1200.")]),
        ])
        .await;
        let (account, _) = RecordingTool::new("get_account_info", false);
        let mut registry = ToolRegistry::default();
        registry.register(account);

        let outcome = runtime(&server, registry, 5)
            .run(&graph(), "What's my balance for user 42?")
            .await
            .expect("run completes");

        assert_eq!(outcome.final_output, "Your balance is 1200.");
        assert_eq!(outcome.last_agent, "PurchaseHistorySearchAgent");
        assert_eq!(outcome.turns, 3);

        let bodies = sent_bodies(&server).await;
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[1]["instructions"], "history");
        assert_eq!(bodies[1]["input"], json!([user_message("What's my balance for user 42?")]));
        assert!(bodies[1].get("previous_response_id").is_none());

        assert_eq!(bodies[2]["previous_response_id"], "resp_2");
        assert_eq!(bodies[2]["input"][0]["call_id"], "c2");
        let fed_back = fed_back_outcome(&bodies[2]);
        assert!(fed_back.success);
        assert_eq!(fed_back.data, json!({"balance": 1200}));
    }

    #[tokio::test]
    async fn arguments_that_are_not_json_become_an_empty_object() {
        let server = model_server(vec![
            reply("resp_1", vec![function_call("h1", "transfer_to_purchase_history_search_agent", "{}")]),
            reply("resp_2", vec![function_call("c2", "get_account_info", "user 42 please")]),
            reply("resp_3", vec![message("done")]),
        ])
        .await;
        let (account, accounts) = RecordingTool::new("get_account_info", false);
        let mut registry = ToolRegistry::default();
        registry.register(account);

        runtime(&server, registry, 5).run(&graph(), "balance?").await.expect("run completes");

        assert_eq!(*accounts.lock().expect("inputs lock"), vec![json!({})]);
    }

    #[tokio::test]
    async fn run_stops_after_max_turns() {
        let server = model_server(vec![
            reply("resp_1", vec![function_call("h1", "transfer_to_purchase_history_search_agent", "{}")]),
            reply("resp_n", vec![function_call("c", "get_account_info", "{}")]),
        ])
        .await;
        let (account, _) = RecordingTool::new("get_account_info", false);
        let mut registry = ToolRegistry::default();
        registry.register(account);

        let result = runtime(&server, registry, 3).run(&graph(), "loop").await;

        assert!(matches!(result, Err(RuntimeError::MaxTurnsExceeded(3))));
        assert_eq!(sent_bodies(&server).await.len(), 3);
    }

    #[tokio::test]
    async fn provider_statuses_map_to_runtime_errors() {
        for status in [401_u16, 403, 429, 500] {
            let server =
                model_server(vec![ResponseTemplate::new(status).set_body_string("nope")]).await;

            let result =
                runtime(&server, ToolRegistry::default(), 5).run(&graph(), "hi").await;

            match (status, result) {
                (401 | 403, Err(RuntimeError::Auth(message))) => assert_eq!(message, "nope"),
                (429, Err(RuntimeError::RateLimited(_))) => {}
                (500, Err(RuntimeError::Api { status, message })) => {
                    assert_eq!(status, 500);
                    assert_eq!(message, "nope");
                }
                (status, other) => panic!("unexpected result for {status}: {other:?}"),
            }
        }
    }
}
