use std::env;
use std::sync::{Mutex, OnceLock};

use docroute_cli::commands::{config, demo, doctor, seed};
use serde_json::Value;

#[test]
fn config_reports_env_and_default_sources() {
    with_env(&[("DOCROUTE_SERVER_PORT", "9100"), ("DOCROUTE_LOG_LEVEL", "debug")], || {
        let output = config::run();

        assert!(output.starts_with("effective config"));
        assert!(output.contains("- server.port = 9100 (source: env (DOCROUTE_SERVER_PORT))"));
        assert!(output.contains("- logging.level = debug (source: env (DOCROUTE_LOG_LEVEL))"));
        assert!(output.contains("- server.bind_address = 127.0.0.1 (source: default)"));
        assert!(output.contains("- workflow.artifact_timeout_secs = 30 (source: default)"));
    });
}

#[test]
fn config_reports_validation_failures() {
    with_env(&[("DOCROUTE_SERVER_PORT", "not-a-port")], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"));
        assert!(output.contains("DOCROUTE_SERVER_PORT"));
    });
}

#[test]
fn doctor_passes_with_a_writable_blob_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blob_root = dir.path().join("blobs");
    let blob_root = blob_root.to_str().expect("utf-8 path");

    with_env(&[("DOCROUTE_STORAGE_BLOB_ROOT", blob_root)], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "expected all doctor checks to pass");

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "pass");
        assert_eq!(report["checks"][0]["name"], "config_validation");
        assert_eq!(report["checks"][1]["name"], "blob_storage");
        assert_eq!(report["checks"][1]["status"], "pass");
    });
}

#[test]
fn doctor_fails_when_blob_root_is_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let occupied = dir.path().join("blobs");
    std::fs::write(&occupied, b"not a directory").expect("write file");
    let occupied = occupied.to_str().expect("utf-8 path");

    with_env(&[("DOCROUTE_STORAGE_BLOB_ROOT", occupied)], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(report["checks"][1]["status"], "fail");
    });
}

#[test]
fn doctor_skips_storage_when_config_is_invalid() {
    with_env(&[("DOCROUTE_WORKFLOW_SEED_DEMO_DATA", "sometimes")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(last_line(&result.output).starts_with("- [skip] blob_storage:"));
    });
}

#[test]
fn seed_reports_the_demo_graph() {
    with_env(&[], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed to succeed");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["error_class"], Value::Null);
        assert_eq!(payload["data"]["seed"]["users"], serde_json::json!(["admin", "user"]));
        assert!(payload["data"]["seed"]["application_id"].is_string());
        assert_eq!(payload["data"]["blob_keys"], serde_json::json!(["documents/sample.txt"]));
    });
}

#[test]
fn demo_approves_the_seeded_application() {
    with_env(&[], || {
        let result = demo::run();
        assert_eq!(result.exit_code, 0, "expected demo to succeed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "demo");
        assert_eq!(payload["status"], "ok");

        let application = &payload["data"]["application"];
        assert_eq!(application["status"], "approved");
        assert!(application["document_id"].is_string());
        assert_eq!(payload["data"]["progress"]["steps"][0]["status"], "approved");

        let events = payload["data"]["audit_events"].as_array().expect("audit events");
        assert!(events.iter().any(|event| event == "workflow.submitted"));
        assert!(events.iter().any(|event| event == "workflow.completed"));
    });
}

#[test]
fn demo_returns_config_failure_for_invalid_timeout() {
    with_env(&[("DOCROUTE_WORKFLOW_ARTIFACT_TIMEOUT_SECS", "0")], || {
        let result = demo::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "demo");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DOCROUTE_STORAGE_BLOB_ROOT",
        "DOCROUTE_STORAGE_MAX_UPLOAD_BYTES",
        "DOCROUTE_SERVER_BIND_ADDRESS",
        "DOCROUTE_SERVER_PORT",
        "DOCROUTE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "DOCROUTE_WORKFLOW_ARTIFACT_TIMEOUT_SECS",
        "DOCROUTE_WORKFLOW_SEED_DEMO_DATA",
        "DOCROUTE_LOGGING_LEVEL",
        "DOCROUTE_LOGGING_FORMAT",
        "DOCROUTE_LOG_LEVEL",
        "DOCROUTE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
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
