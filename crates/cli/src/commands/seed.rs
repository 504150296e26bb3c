use std::sync::Arc;

use docroute_db::{DemoSeedDataset, InMemoryBlobStore, Store};

use super::{current_thread_runtime, CommandResult};

pub fn run() -> CommandResult {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let blobs = Arc::new(InMemoryBlobStore::default());
        let store = Store::in_memory(blobs.clone());
        let seeded = DemoSeedDataset::load(&store).await?;
        Ok::<_, docroute_db::SeedError>((seeded, blobs.keys().await))
    });

    match result {
        Ok((seeded, blob_keys)) => {
            let data = serde_json::json!({ "seed": seeded, "blob_keys": blob_keys });
            CommandResult::success_with_data(
                "seed",
                "demo dataset loaded into an in-memory store",
                Some(data),
            )
        }
        Err(error) => CommandResult::failure("seed", "seed_execution", error.to_string(), 5),
    }
}
