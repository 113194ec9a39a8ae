use std::sync::Arc;

use procura_agent::graph::GraphLayout;
use procura_agent::instructions::gateway_from_config;
use procura_agent::tools::standard_registry;
use procura_agent::{AgentGraphBuilder, InstructionStore};
use procura_core::config::AppConfig;
use procura_core::{AgentRole, NoopAuditSink};
use serde::Serialize;

use super::{block_on, load_config, CommandResult, EXIT_CHECK_FAILED, EXIT_CONFIG_INVALID};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = match report.checks.first() {
        Some(check) if check.status == CheckStatus::Fail => EXIT_CONFIG_INVALID,
        _ if report.overall_status == CheckStatus::Fail => EXIT_CHECK_FAILED,
        _ => 0,
    };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::text(exit_code, output);
    }

    CommandResult::text(exit_code, render_human(&report))
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match load_config() {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            let store = Arc::new(InstructionStore::default());
            checks.push(check_instruction_gateway(&config, &store));
            checks.extend(check_agent_graph(&config, store));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            for name in ["instruction_gateway", "tool_registry", "agent_graph"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_instruction_gateway(config: &AppConfig, store: &InstructionStore) -> DoctorCheck {
    let gateway = match gateway_from_config(config, reqwest::Client::new()) {
        Ok(gateway) => gateway,
        Err(error) => {
            return DoctorCheck {
                name: "instruction_gateway",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    match block_on(store.hydrate(gateway.as_ref(), &AgentRole::ALL)) {
        Ok(Ok(loaded)) => DoctorCheck {
            name: "instruction_gateway",
            status: CheckStatus::Pass,
            details: format!("{} gateway returned {} instruction(s)", gateway.name(), loaded.len()),
        },
        Ok(Err(error)) => DoctorCheck {
            name: "instruction_gateway",
            status: CheckStatus::Fail,
            details: format!("{} gateway: {error}", gateway.name()),
        },
        Err(error) => {
            DoctorCheck { name: "instruction_gateway", status: CheckStatus::Fail, details: error }
        }
    }
}

fn check_agent_graph(config: &AppConfig, store: Arc<InstructionStore>) -> Vec<DoctorCheck> {
    let registry = Arc::new(standard_registry(
        config,
        reqwest::Client::new(),
        Arc::new(NoopAuditSink),
    ));
    let tools = DoctorCheck {
        name: "tool_registry",
        status: if registry.is_empty() { CheckStatus::Fail } else { CheckStatus::Pass },
        details: format!("{} tool(s) registered", registry.len()),
    };

    let graph = AgentGraphBuilder::new(store, registry, GraphLayout::from_config(config));
    let readiness = graph.readiness();
    let agent_graph = if readiness.is_ready() {
        DoctorCheck {
            name: "agent_graph",
            status: CheckStatus::Pass,
            details: format!("{} role(s) ready", readiness.roles.len()),
        }
    } else {
        DoctorCheck {
            name: "agent_graph",
            status: CheckStatus::Fail,
            details: format!("configuration missing for: {}", readiness.missing().join(", ")),
        }
    };

    vec![tools, agent_graph]
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
