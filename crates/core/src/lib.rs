pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use domain::{AgentRole, Instruction, InstructionSource, UnknownRole};
pub use errors::{DispatchError, InterfaceError};
