//! Audit trail for chat dispatches and side-effecting tool calls.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::AgentRole;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Dispatch,
    SideEffect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    /// Request id for dispatch events; per-call id for side effects.
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub outcome: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    fn new(
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            outcome,
            agent: None,
            tool: None,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    /// `dispatch.*` lifecycle event for one chat message.
    pub fn dispatch(
        correlation_id: impl Into<String>,
        stage: &str,
        outcome: AuditOutcome,
    ) -> Self {
        Self::new(correlation_id, format!("dispatch.{stage}"), AuditCategory::Dispatch, outcome)
    }

    /// One attempted call of a side-effecting tool.
    pub fn side_effect(
        correlation_id: impl Into<String>,
        tool: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        let mut event =
            Self::new(correlation_id, "tool.side_effect", AuditCategory::SideEffect, outcome);
        event.tool = Some(tool.into());
        event
    }

    pub fn with_agent(mut self, agent: Option<AgentRole>) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: AuditEvent) {}
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|event| event.event_type == event_type).collect()
    }

    /// Side-effect events for `tool`, oldest first.
    pub fn side_effects(&self, tool: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|event| {
                event.category == AuditCategory::SideEffect && event.tool.as_deref() == Some(tool)
            })
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
