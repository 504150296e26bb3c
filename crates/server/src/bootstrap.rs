use std::sync::Arc;

use docroute_core::audit::InMemoryAuditSink;
use docroute_core::config::{AppConfig, ConfigError};
use docroute_core::workflow::{ApprovalWorkflowEngine, WorkflowSettings};
use docroute_db::{BlobError, DemoSeedDataset, FilesystemBlobStore, SeedError, SeedResult, Store};
use thiserror::Error;
use tracing::info;

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub store: Store,
    pub engine: ApprovalWorkflowEngine,
    pub audit: InMemoryAuditSink,
    pub seeded: Option<SeedResult>,
}

impl Application {
    pub fn state(&self) -> AppState {
        AppState::new(
            self.store.clone(),
            self.engine.clone(),
            self.config.storage.max_upload_bytes,
        )
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("blob storage is not usable: {0}")]
    Storage(#[source] BlobError),
    #[error("demo data could not be seeded: {0}")]
    Seed(#[source] SeedError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        blob_root = %config.storage.blob_root.display(),
        "starting application bootstrap"
    );

    let blobs = FilesystemBlobStore::new(config.storage.blob_root.clone());
    blobs.ensure_writable().await.map_err(BootstrapError::Storage)?;
    info!(
        event_name = "system.bootstrap.storage_ready",
        correlation_id = "bootstrap",
        "blob storage is writable"
    );

    let store = Store::in_memory(Arc::new(blobs));
    let audit = InMemoryAuditSink::default();
    let engine =
        store.workflow_engine(Arc::new(audit.clone()), WorkflowSettings::from(&config.workflow));

    let seeded = if config.workflow.seed_demo_data {
        let seeded = DemoSeedDataset::load(&store).await.map_err(BootstrapError::Seed)?;
        info!(
            event_name = "system.bootstrap.seeded",
            correlation_id = "bootstrap",
            application_id = %seeded.application_id,
            "demo dataset loaded"
        );
        Some(seeded)
    } else {
        None
    };

    Ok(Application { config, store, engine, audit, seeded })
}
