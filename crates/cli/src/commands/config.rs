use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use docroute_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields: [(&str, &[&str], String); 9] = [
        (
            "storage.blob_root",
            &["DOCROUTE_STORAGE_BLOB_ROOT"],
            config.storage.blob_root.display().to_string(),
        ),
        (
            "storage.max_upload_bytes",
            &["DOCROUTE_STORAGE_MAX_UPLOAD_BYTES"],
            config.storage.max_upload_bytes.to_string(),
        ),
        ("server.bind_address", &["DOCROUTE_SERVER_BIND_ADDRESS"], config.server.bind_address.clone()),
        ("server.port", &["DOCROUTE_SERVER_PORT"], config.server.port.to_string()),
        (
            "server.graceful_shutdown_secs",
            &["DOCROUTE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        (
            "workflow.artifact_timeout_secs",
            &["DOCROUTE_WORKFLOW_ARTIFACT_TIMEOUT_SECS"],
            config.workflow.artifact_timeout_secs.to_string(),
        ),
        (
            "workflow.seed_demo_data",
            &["DOCROUTE_WORKFLOW_SEED_DEMO_DATA"],
            config.workflow.seed_demo_data.to_string(),
        ),
        (
            "logging.level",
            &["DOCROUTE_LOGGING_LEVEL", "DOCROUTE_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        (
            "logging.format",
            &["DOCROUTE_LOGGING_FORMAT", "DOCROUTE_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, env_keys, value) in fields {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("docroute.toml"), PathBuf::from("config/docroute.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

/// First matching env key wins, then the config file, then the built-in default.
fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
