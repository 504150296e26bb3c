use std::sync::Arc;

use docroute_core::audit::{AuditContext, InMemoryAuditSink};
use docroute_core::config::{AppConfig, LoadOptions};
use docroute_core::domain::principal::UserId;
use docroute_core::workflow::WorkflowSettings;
use docroute_db::{DemoSeedDataset, InMemoryBlobStore, Store};
use serde_json::json;

use super::{current_thread_runtime, CommandResult};

const CORRELATION_ID: &str = "cli-demo";

/// Walks the seeded draft through submit and a single approval, filing its artifact.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "demo",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "demo",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let store = Store::in_memory(Arc::new(InMemoryBlobStore::default()));
        let audit = Arc::new(InMemoryAuditSink::default());
        let engine =
            store.workflow_engine(audit.clone(), WorkflowSettings::from(&config.workflow));

        let seeded = DemoSeedDataset::load(&store)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let applicant = AuditContext::new(CORRELATION_ID, "user");
        engine
            .submit(&seeded.application_id, &applicant)
            .await
            .map_err(|error| ("workflow", error.to_string(), 6u8))?;

        let approver = AuditContext::new(CORRELATION_ID, "admin");
        let approved = engine
            .approve(
                &seeded.application_id,
                &UserId::new("admin"),
                Some("approved from the demo command".to_string()),
                &approver,
            )
            .await
            .map_err(|error| ("workflow", error.to_string(), 6u8))?;

        let progress = engine
            .progress(&seeded.application_id)
            .await
            .map_err(|error| ("workflow", error.to_string(), 6u8))?;
        let audit_events: Vec<String> =
            audit.events().into_iter().map(|event| event.event_type).collect();

        Ok::<_, (&'static str, String, u8)>(json!({
            "application": approved,
            "progress": progress,
            "audit_events": audit_events,
        }))
    });

    match result {
        Ok(data) => CommandResult::success_with_data(
            "demo",
            "demo application submitted and approved",
            Some(data),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("demo", error_class, message, exit_code)
        }
    }
}
