use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::model::settings::CompanySettings;
use crate::store::StoreResult;

/// Company settings keyed by organization id.
/// Entries expire after the TTL; HR-side edits show up once they do.
#[derive(Clone)]
pub struct SettingsCache {
    cache: Cache<u64, Arc<CompanySettings>>,
}

impl SettingsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached settings, or the result of `load` which is then cached.
    pub async fn get_or_load<F, Fut>(
        &self,
        organization_id: u64,
        load: F,
    ) -> StoreResult<Arc<CompanySettings>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<CompanySettings>>,
    {
        if let Some(hit) = self.cache.get(&organization_id).await {
            return Ok(hit);
        }
        // concurrent misses may both load; last insert wins
        let loaded = Arc::new(load().await?);
        self.cache.insert(organization_id, loaded.clone()).await;
        Ok(loaded)
    }
}
