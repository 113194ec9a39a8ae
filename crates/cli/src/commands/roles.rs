use std::collections::HashSet;

use procura_agent::instructions::gateway_from_config;
use procura_agent::InstructionStore;
use procura_core::{AgentRole, InstructionSource};
use serde_json::json;

use super::{block_on, load_config, CommandResult, EXIT_CHECK_FAILED, EXIT_CONFIG_INVALID};

/// Lists every agent role with where its instruction would come from at startup.
pub fn run(json_output: bool) -> CommandResult {
    let config = match load_config() {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("roles", "config_validation", error, EXIT_CONFIG_INVALID)
        }
    };

    let store = InstructionStore::default();
    let gateway = match gateway_from_config(&config, reqwest::Client::new()) {
        Ok(gateway) => gateway,
        Err(error) => {
            return CommandResult::failure("roles", "instruction_gateway", error.to_string(), EXIT_CHECK_FAILED)
        }
    };
    let hydrated = match block_on(store.hydrate(gateway.as_ref(), &AgentRole::ALL)) {
        Ok(Ok(loaded)) => loaded,
        Ok(Err(error)) => {
            return CommandResult::failure("roles", "instruction_gateway", error.to_string(), EXIT_CHECK_FAILED)
        }
        Err(error) => return CommandResult::failure("roles", "runtime", error, EXIT_CHECK_FAILED),
    };

    let wired: HashSet<AgentRole> =
        std::iter::once(AgentRole::TRIAGE).chain(config.agents.workers.iter().copied()).collect();
    let snapshot = store.snapshot(&AgentRole::ALL);

    if json_output {
        let roles = snapshot
            .iter()
            .zip(AgentRole::ALL)
            .map(|(status, role)| {
                json!({
                    "agent_name": status.agent_name,
                    "wired": wired.contains(&role),
                    "present": status.present,
                    "source": status.source,
                    "version": status.version,
                })
            })
            .collect::<Vec<_>>();
        return CommandResult::success(
            "roles",
            format!("{} gateway returned {} instruction(s)", gateway.name(), hydrated.len()),
            Some(json!({ "gateway": gateway.name(), "roles": roles })),
        );
    }

    let mut lines = vec![format!("instruction gateway: {}", gateway.name())];
    for (status, role) in snapshot.iter().zip(AgentRole::ALL) {
        let source = match status.source {
            Some(InstructionSource::Override) => "gateway",
            Some(InstructionSource::Default) => "default",
            None => "missing",
        };
        let marker = if wired.contains(&role) { "*" } else { " " };
        lines.push(format!("{marker} {} ({source})", status.agent_name));
    }
    lines.push("* = wired into the agent graph".to_string());

    CommandResult::text(0, lines.join("\n"))
}
