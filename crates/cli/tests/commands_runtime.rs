use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use procura_cli::commands::{config, doctor, roles};
use serde_json::Value;
use tempfile::TempDir;

const BASE_ENV: &[(&str, &str)] =
    &[("PROCURA_LLM_API_KEY", "sk-cli-secret"), ("PROCURA_AUTH_PASSWORD", "hunter2")];

#[test]
fn config_fails_validation_without_credentials() {
    with_env(&[("PROCURA_LLM_API_KEY", "")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");
        assert!(result.output.contains("config validation failed"));
        assert!(result.output.contains("llm.api_key"));
    });
}

#[test]
fn config_attributes_sources_and_redacts_secrets() {
    with_env(&[("PROCURA_LLM_MODEL", "gpt-test")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);
        assert!(result
            .output
            .contains("- llm.api_key = <redacted> (source: env (PROCURA_LLM_API_KEY))"));
        assert!(result.output.contains("- llm.model = gpt-test (source: env (PROCURA_LLM_MODEL))"));
        assert!(result.output.contains("- auth.password = <redacted>"));
        assert!(!result.output.contains("sk-cli-secret"));
        assert!(!result.output.contains("hunter2"));
    });
}

#[test]
fn doctor_skips_downstream_checks_when_config_is_invalid() {
    with_env(&[("PROCURA_AUTH_PASSWORD", " ")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        assert_eq!(checks.len(), 4);
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "fail");
        assert!(checks[1..].iter().all(|check| check["status"] == "skipped"));
    });
}

#[test]
fn doctor_passes_with_file_gateway_and_vector_store() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_instructions(&dir);
    let path = path.to_string_lossy().to_string();

    with_env(
        &[
            ("PROCURA_INSTRUCTIONS_GATEWAY", "file"),
            ("PROCURA_INSTRUCTIONS_PATH", path.as_str()),
            ("PROCURA_AGENTS_VECTOR_STORE_ID", "vs_test"),
        ],
        || {
            let result = doctor::run(true);
            let payload = parse_payload(&result.output);
            assert_eq!(result.exit_code, 0, "report: {payload}");
            assert_eq!(payload["overall_status"], "pass");
            let names: Vec<&str> = payload["checks"]
                .as_array()
                .map(|checks| checks.iter().filter_map(|check| check["name"].as_str()).collect())
                .unwrap_or_default();
            assert_eq!(names, ["config_validation", "instruction_gateway", "tool_registry", "agent_graph"]);
        },
    );
}

#[test]
fn doctor_reports_missing_roles_in_human_output() {
    with_env(&[], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 3, "output: {}", result.output);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] agent_graph: configuration missing for: GeneralistProcurementAgent"));
        assert!(result.output.contains("InternalKnowledgeSearch.search_internal_documents"));
    });
}

#[test]
fn roles_lists_instruction_sources_after_hydration() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_instructions(&dir);
    let path = path.to_string_lossy().to_string();

    with_env(
        &[("PROCURA_INSTRUCTIONS_GATEWAY", "file"), ("PROCURA_INSTRUCTIONS_PATH", path.as_str())],
        || {
            let result = roles::run(true);
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "roles");
            assert_eq!(payload["status"], "ok");
            assert_eq!(payload["data"]["gateway"], "file");

            let roles = payload["data"]["roles"].as_array().cloned().unwrap_or_default();
            assert_eq!(roles.len(), 6);
            let by_name = |name: &str| {
                roles.iter().find(|role| role["agent_name"] == name).cloned().unwrap_or_default()
            };
            assert_eq!(by_name("GeneralistProcurementAgent")["source"], "override");
            assert_eq!(by_name("GeneralistProcurementAgent")["wired"], true);
            assert_eq!(by_name("SearchAgent")["source"], "default");
            assert_eq!(by_name("POPostingAgent")["wired"], false);
        },
    );
}

#[test]
fn roles_reports_gateway_failure() {
    with_env(
        &[
            ("PROCURA_INSTRUCTIONS_GATEWAY", "file"),
            ("PROCURA_INSTRUCTIONS_PATH", "/nonexistent/procura/instructions.toml"),
        ],
        || {
            let result = roles::run(false);
            assert_eq!(result.exit_code, 3);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "instruction_gateway");
        },
    );
}

fn write_instructions(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("instructions.toml");
    fs::write(
        &path,
        r#"
[instructions]
GeneralistProcurementAgent = "route"
InternalKnowledgeSearch = "docs"
PurchaseHistorySearchAgent = "history"
"#,
    )
    .expect("write instructions");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

/// Runs `test_fn` with the base credentials plus `vars` set; `vars` wins on conflicts.
fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PROCURA_SERVER_BIND_ADDRESS",
        "PROCURA_SERVER_PORT",
        "PROCURA_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PROCURA_LLM_API_KEY",
        "OPENAI_API_KEY",
        "PROCURA_LLM_BASE_URL",
        "PROCURA_LLM_MODEL",
        "PROCURA_LLM_MAX_TURNS",
        "PROCURA_AGENTS_WORKERS",
        "PROCURA_AGENTS_VECTOR_STORE_ID",
        "VECTOR_STORE_ID",
        "PROCURA_AGENTS_ALLOW_SIDE_EFFECTS",
        "PROCURA_INSTRUCTIONS_GATEWAY",
        "PROCURA_INSTRUCTIONS_PATH",
        "PROCURA_INSTRUCTIONS_BASE_URL",
        "PROCURA_INSTRUCTIONS_TOKEN",
        "PROCURA_ERP_BASE_URL",
        "PROCURA_ERP_TOKEN_URL",
        "PROCURA_ERP_CLIENT_ID",
        "PROCURA_ERP_CLIENT_SECRET",
        "PROCURA_ERP_SCOPE",
        "PROCURA_NOTIFICATIONS_EMAIL_RELAY_URL",
        "PROCURA_NOTIFICATIONS_APPROVAL_URL",
        "PROCURA_NOTIFICATIONS_TOKEN",
        "PROCURA_AUTH_USERNAME",
        "PROCURA_AUTH_PASSWORD",
        "PROCURA_LOGGING_LEVEL",
        "PROCURA_LOGGING_FORMAT",
        "PROCURA_LOG_LEVEL",
        "PROCURA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in BASE_ENV {
        env::set_var(key, value);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
