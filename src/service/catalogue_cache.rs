use crate::repo::catalogue_repo::CatalogueRepo;
use crate::repo::json_file::StoreError;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct CachedCatalogue {
    pub fetched_at: Instant,
    pub value: Value,
}

impl CachedCatalogue {
    pub fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) >= ttl
    }
}

#[derive(Clone)]
pub struct CatalogueCache {
    pub repo: CatalogueRepo,
    inner: Arc<RwLock<Option<CachedCatalogue>>>,
    ttl: Duration,
}

impl CatalogueCache {
    pub fn new(repo: CatalogueRepo, ttl: Duration) -> Self {
        Self {
            repo,
            inner: Arc::new(RwLock::new(None)),
            ttl,
        }
    }

    pub async fn get(&self) -> Result<Value, StoreError> {
        {
            let read = self.inner.read().await;
            if let Some(cached) = &*read {
                if !cached.is_stale(Instant::now(), self.ttl) {
                    return Ok(cached.value.clone());
                }
            }
        }

        let value = self.repo.load().await?;
        let mut write = self.inner.write().await;
        *write = Some(CachedCatalogue {
            fetched_at: Instant::now(),
            value: value.clone(),
        });
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }
}
