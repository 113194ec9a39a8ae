//! Construction of the triage/worker agent graph.
//!
//! Nodes are cached per role and keyed by the instruction version they were
//! built from, so a pushed instruction is picked up by the next build. Builds
//! are serialised: concurrent callers wait for the one in flight and share its
//! result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use procura_core::config::AppConfig;
use procura_core::{AgentRole, Instruction, InstructionSource};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::instructions::InstructionStore;
use crate::tools::{ToolDescriptor, ToolRegistry};

pub const HANDOFF_PREAMBLE: &str = "# System context\n\
You are one agent in a team of procurement specialists. Work is moved between agents with \
handoff functions named `transfer_to_<agent>`. Call a handoff function whenever another agent \
is better suited to the request; the transfer is silent, so do not mention it to the user.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RoleTool {
    Function(&'static str),
    WebSearch,
}

fn role_tools(role: AgentRole) -> &'static [RoleTool] {
    match role {
        AgentRole::GeneralistProcurementAgent => &[],
        AgentRole::SearchAgent => &[RoleTool::WebSearch],
        AgentRole::InternalKnowledgeSearch => &[RoleTool::Function("search_internal_documents")],
        AgentRole::PurchaseHistorySearchAgent => &[
            RoleTool::Function("get_account_info"),
            RoleTool::Function("get_purchase_orders"),
            RoleTool::Function("get_purchase_documents"),
            RoleTool::Function("get_purchase_document_lines"),
        ],
        AgentRole::ApprovalSpecialistAgent => {
            &[RoleTool::Function("request_po_approval"), RoleTool::Function("send_email")]
        }
        AgentRole::PoPostingAgent => &[RoleTool::Function("po_posting_api")],
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolBinding {
    Function(ToolDescriptor),
    /// Hosted web search executed by the model provider.
    WebSearch,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkerNode {
    pub role: AgentRole,
    pub instruction: Instruction,
    pub tools: Vec<ToolBinding>,
    pub model: String,
}

impl WorkerNode {
    /// Name of the function the triage agent calls to hand off to this worker.
    pub fn handoff_name(&self) -> String {
        handoff_tool_name(self.role)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TriageNode {
    pub instruction: Instruction,
    pub handoffs: Vec<Arc<WorkerNode>>,
    pub model: String,
}

impl TriageNode {
    pub fn system_prompt(&self) -> String {
        format!("{HANDOFF_PREAMBLE}\n\n{}", self.instruction.text)
    }

    pub fn handoff(&self, function_name: &str) -> Option<&Arc<WorkerNode>> {
        self.handoffs.iter().find(|worker| worker.handoff_name() == function_name)
    }
}

/// `SearchAgent` becomes `transfer_to_search_agent`, `POPostingAgent` becomes
/// `transfer_to_po_posting_agent`.
pub fn handoff_tool_name(role: AgentRole) -> String {
    let chars: Vec<char> = role.as_str().chars().collect();
    let mut snake = String::from("transfer_to_");
    for (index, c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && index > 0 {
            let previous_lower = chars[index - 1].is_ascii_lowercase();
            let next_lower = chars.get(index + 1).is_some_and(|next| next.is_ascii_lowercase());
            if previous_lower || (chars[index - 1].is_ascii_uppercase() && next_lower) {
                snake.push('_');
            }
        }
        snake.push(c.to_ascii_lowercase());
    }
    snake
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("configuration missing for: {}", missing.join(", "))]
    ConfigurationMissing { missing: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoleReadiness {
    pub role: AgentRole,
    pub ready: bool,
    pub source: Option<InstructionSource>,
    pub version: Option<u64>,
    pub missing: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GraphReadiness {
    pub roles: Vec<RoleReadiness>,
}

impl GraphReadiness {
    pub fn is_ready(&self) -> bool {
        self.roles.iter().all(|role| role.ready)
    }

    pub fn missing(&self) -> Vec<String> {
        self.roles.iter().flat_map(|role| role.missing.iter().cloned()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphLayout {
    pub workers: Vec<AgentRole>,
    pub model: String,
}

impl GraphLayout {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { workers: config.agents.workers.clone(), model: config.llm.model.clone() }
    }

    fn roles(&self) -> impl Iterator<Item = AgentRole> + '_ {
        std::iter::once(AgentRole::TRIAGE).chain(self.workers.iter().copied())
    }
}

type GraphKey = Vec<(AgentRole, u64)>;

#[derive(Default)]
struct NodeCache {
    workers: HashMap<AgentRole, Arc<WorkerNode>>,
    triage: Option<(GraphKey, Arc<TriageNode>)>,
}

pub struct AgentGraphBuilder {
    store: Arc<InstructionStore>,
    registry: Arc<ToolRegistry>,
    layout: GraphLayout,
    cache: Mutex<NodeCache>,
    constructions: AtomicU64,
}

impl AgentGraphBuilder {
    pub fn new(store: Arc<InstructionStore>, registry: Arc<ToolRegistry>, layout: GraphLayout) -> Self {
        Self {
            store,
            registry,
            layout,
            cache: Mutex::new(NodeCache::default()),
            constructions: AtomicU64::new(0),
        }
    }

    pub fn layout(&self) -> &GraphLayout {
        &self.layout
    }

    pub fn store(&self) -> &Arc<InstructionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Number of nodes constructed so far; cache hits do not count.
    pub fn build_count(&self) -> u64 {
        self.constructions.load(Ordering::SeqCst)
    }

    /// Reports which configured roles could be built right now, without building.
    pub fn readiness(&self) -> GraphReadiness {
        let roles = self
            .layout
            .roles()
            .map(|role| {
                let instruction = self.store.resolve(role);
                let mut missing = Vec::new();
                if instruction.is_none() {
                    missing.push(role.as_str().to_string());
                }
                missing.extend(self.missing_tools(role));
                RoleReadiness {
                    role,
                    ready: missing.is_empty(),
                    source: instruction.as_ref().map(|found| found.source),
                    version: instruction.as_ref().map(|found| found.version),
                    missing,
                }
            })
            .collect();
        GraphReadiness { roles }
    }

    /// Builds the triage node and its workers, reusing cached nodes whose
    /// instruction is unchanged. Fails without partial results when any
    /// configured role is missing an instruction or a required tool.
    pub async fn build(&self) -> Result<Arc<TriageNode>, GraphError> {
        let mut cache = self.cache.lock().await;

        let readiness = self.readiness();
        if !readiness.is_ready() {
            let missing = readiness.missing();
            warn!(
                event_name = "graph.configuration_missing",
                missing = %missing.join(", "),
                "agent graph cannot be built"
            );
            return Err(GraphError::ConfigurationMissing { missing });
        }

        let mut resolved = Vec::new();
        for role in self.layout.roles() {
            let Some(instruction) = self.store.resolve(role) else {
                return Err(GraphError::ConfigurationMissing { missing: vec![role.to_string()] });
            };
            resolved.push((role, instruction));
        }
        let key: GraphKey =
            resolved.iter().map(|(role, instruction)| (*role, instruction.version)).collect();

        if let Some((cached_key, triage)) = &cache.triage {
            if *cached_key == key {
                debug!(event_name = "graph.cache_hit", "reusing cached agent graph");
                return Ok(Arc::clone(triage));
            }
        }

        let mut resolved = resolved.into_iter();
        let Some((_, triage_instruction)) = resolved.next() else {
            return Err(GraphError::ConfigurationMissing {
                missing: vec![AgentRole::TRIAGE.to_string()],
            });
        };

        let mut handoffs = Vec::with_capacity(self.layout.workers.len());
        for (role, instruction) in resolved {
            let reusable = cache
                .workers
                .get(&role)
                .filter(|node| node.instruction.version == instruction.version)
                .cloned();
            let node = match reusable {
                Some(node) => node,
                None => {
                    let node = Arc::new(self.construct_worker(role, instruction));
                    cache.workers.insert(role, Arc::clone(&node));
                    node
                }
            };
            handoffs.push(node);
        }

        let triage = Arc::new(TriageNode {
            instruction: triage_instruction,
            handoffs,
            model: self.layout.model.clone(),
        });
        self.constructions.fetch_add(1, Ordering::SeqCst);
        cache.triage = Some((key, Arc::clone(&triage)));

        info!(
            event_name = "graph.built",
            workers = triage.handoffs.len(),
            build_count = self.build_count(),
            "agent graph constructed"
        );
        Ok(triage)
    }

    /// Drops the cached node for `role` and the triage node that references it.
    pub async fn invalidate(&self, role: AgentRole) {
        let mut cache = self.cache.lock().await;
        cache.workers.remove(&role);
        cache.triage = None;
        debug!(event_name = "graph.invalidated", agent = role.as_str());
    }

    pub async fn invalidate_all(&self) {
        let mut cache = self.cache.lock().await;
        *cache = NodeCache::default();
        debug!(event_name = "graph.invalidated", agent = "*");
    }

    fn construct_worker(&self, role: AgentRole, instruction: Instruction) -> WorkerNode {
        let tools = role_tools(role)
            .iter()
            .filter_map(|tool| match tool {
                RoleTool::WebSearch => Some(ToolBinding::WebSearch),
                RoleTool::Function(name) => self.registry.descriptor(name).map(ToolBinding::Function),
            })
            .collect();
        self.constructions.fetch_add(1, Ordering::SeqCst);
        debug!(
            event_name = "graph.worker_constructed",
            agent = role.as_str(),
            version = instruction.version
        );
        WorkerNode { role, instruction, tools, model: self.layout.model.clone() }
    }

    fn missing_tools(&self, role: AgentRole) -> Vec<String> {
        role_tools(role)
            .iter()
            .filter_map(|tool| match tool {
                RoleTool::Function(name) if !self.registry.contains(name) => {
                    Some(format!("{role}.{name}"))
                }
                _ => None,
            })
            .collect()
    }
}
