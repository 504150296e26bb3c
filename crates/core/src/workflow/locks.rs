use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::application::ApplicationId;

/// Keyed registry of per-application async mutexes.
///
/// Entries are held weakly so a lock disappears once no caller holds or awaits it.
#[derive(Clone, Default)]
pub struct ApplicationLocks {
    registry: Arc<Mutex<HashMap<ApplicationId, Weak<AsyncMutex<()>>>>>,
}

impl ApplicationLocks {
    pub async fn acquire(&self, application_id: &ApplicationId) -> OwnedMutexGuard<()> {
        self.lock_for(application_id).lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        let registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.values().filter(|lock| lock.strong_count() > 0).count()
    }

    fn lock_for(&self, application_id: &ApplicationId) -> Arc<AsyncMutex<()>> {
        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.retain(|_, lock| lock.strong_count() > 0);

        if let Some(existing) = registry.get(application_id).and_then(Weak::upgrade) {
            return existing;
        }

        let lock = Arc::new(AsyncMutex::new(()));
        registry.insert(application_id.clone(), Arc::downgrade(&lock));
        lock
    }
}
