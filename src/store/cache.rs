use super::kv::KvStore;
use crate::error::StoreError;
use crate::generate::page::PageAnalysis;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const KEY_PREFIX: &str = "analysis:";
const TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct CachedAnalysis {
    analysis: PageAnalysis,
    cached_at: DateTime<Utc>,
}

/// Page-analysis cache keyed by URL, valid for 24 hours.
///
/// Consulted before any completion call so revisiting a page does not pay
/// for a second analysis. Stale entries are evicted on read.
pub struct AnalysisCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl AnalysisCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            ttl: Duration::hours(TTL_HOURS),
        }
    }

    #[cfg(test)]
    fn with_ttl(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn get(&self, page_url: &str) -> Result<Option<PageAnalysis>, StoreError> {
        let key = cache_key(page_url);
        let Some(value) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let cached: CachedAnalysis = serde_json::from_value(value)
            .map_err(|e| StoreError::Decode(key.clone(), e.to_string()))?;

        if Utc::now() - cached.cached_at > self.ttl {
            self.store.remove(&key).await?;
            return Ok(None);
        }
        Ok(Some(cached.analysis))
    }

    pub async fn put(&self, page_url: &str, analysis: &PageAnalysis) -> Result<(), StoreError> {
        let entry = CachedAnalysis {
            analysis: analysis.clone(),
            cached_at: Utc::now(),
        };
        let value = serde_json::to_value(&entry)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store.set(&cache_key(page_url), value).await
    }
}

/// Normalizes the URL so fragment-only differences share a cache entry.
fn cache_key(page_url: &str) -> String {
    let normalized = url::Url::parse(page_url).map_or_else(
        |_| page_url.trim().to_string(),
        |mut parsed| {
            parsed.set_fragment(None);
            parsed.to_string()
        },
    );
    format!("{KEY_PREFIX}{normalized}")
}
