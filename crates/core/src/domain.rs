use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named agent roles known to the assistant. The triage role is the entry point;
/// every other role is a specialist the triage agent can hand off to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentRole {
    GeneralistProcurementAgent,
    SearchAgent,
    InternalKnowledgeSearch,
    PurchaseHistorySearchAgent,
    ApprovalSpecialistAgent,
    #[serde(rename = "POPostingAgent")]
    PoPostingAgent,
}

impl AgentRole {
    pub const ALL: [AgentRole; 6] = [
        Self::GeneralistProcurementAgent,
        Self::SearchAgent,
        Self::InternalKnowledgeSearch,
        Self::PurchaseHistorySearchAgent,
        Self::ApprovalSpecialistAgent,
        Self::PoPostingAgent,
    ];

    pub const TRIAGE: AgentRole = Self::GeneralistProcurementAgent;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralistProcurementAgent => "GeneralistProcurementAgent",
            Self::SearchAgent => "SearchAgent",
            Self::InternalKnowledgeSearch => "InternalKnowledgeSearch",
            Self::PurchaseHistorySearchAgent => "PurchaseHistorySearchAgent",
            Self::ApprovalSpecialistAgent => "ApprovalSpecialistAgent",
            Self::PoPostingAgent => "POPostingAgent",
        }
    }

    pub fn is_triage(&self) -> bool {
        *self == Self::TRIAGE
    }

    /// Worker roles wired by default, in handoff order.
    pub fn default_workers() -> Vec<AgentRole> {
        vec![Self::SearchAgent, Self::InternalKnowledgeSearch, Self::PurchaseHistorySearchAgent]
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown agent role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for AgentRole {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownRole(trimmed.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionSource {
    Default,
    Override,
}

/// Instruction text bound to one agent, stamped with the version it was stored under.
/// Compiled-in defaults carry version 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub agent_name: String,
    pub text: String,
    pub source: InstructionSource,
    pub version: u64,
}

impl Instruction {
    pub fn default_for(role: AgentRole, text: impl Into<String>) -> Self {
        Self {
            agent_name: role.as_str().to_string(),
            text: text.into(),
            source: InstructionSource::Default,
            version: 0,
        }
    }

    pub fn is_override(&self) -> bool {
        self.source == InstructionSource::Override
    }
}
