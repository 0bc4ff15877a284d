use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheStore, DiskCache, MemoryCache};
use crate::config::{CacheBackend, ScanConfig};
use crate::error::Result;
use crate::search::google_books::GoogleBooksProvider;
use crate::search::{
    BookMetadata, MetadataProvider, SearchParams, generate_cache_key, preprocess_search_params,
};

/// Cached metadata lookups. Every failure degrades to `None`: callers read
/// `None` as "no metadata found".
#[derive(Clone)]
pub struct MetadataSearchClient {
    provider: Arc<dyn MetadataProvider>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl MetadataSearchClient {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            ttl,
        }
    }

    /// Google Books provider plus the configured cache backend.
    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        let provider = Arc::new(GoogleBooksProvider::new(config)?);
        let cache: Arc<dyn CacheStore> = match config.cache.backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new()),
            CacheBackend::Disk => Arc::new(DiskCache::new(config.cache_dir())?),
        };
        Ok(Self::new(provider, cache, config.cache_ttl()))
    }

    pub async fn search(&self, params: &SearchParams) -> Option<BookMetadata> {
        let params = preprocess_search_params(params);
        let key = generate_cache_key(&params)?;

        match self.cache.get(&key).await {
            Ok(Some(value)) => match serde_json::from_value::<BookMetadata>(value) {
                Ok(metadata) => {
                    debug!(key = %key, "metadata cache hit");
                    return Some(metadata);
                }
                Err(e) => warn!(key = %key, error = %e, "unreadable cache entry, refetching"),
            },
            Ok(None) => debug!(key = %key, "metadata cache miss"),
            Err(e) => warn!(key = %key, error = %e, "cache read failed, treating as miss"),
        }

        let metadata = match self.provider.lookup(&params).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                debug!(key = %key, provider = self.provider.name(), "no metadata found");
                return None;
            }
            Err(e) => {
                warn!(key = %key, provider = self.provider.name(), error = %e, "metadata lookup failed");
                return None;
            }
        };

        match serde_json::to_value(&metadata) {
            Ok(value) => {
                if let Err(e) = self.cache.put(&key, value, self.ttl).await {
                    warn!(key = %key, error = %e, "cache write failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "metadata not serialisable for cache"),
        }

        Some(metadata)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::error::OcrError;

    #[derive(Default)]
    struct FakeProvider {
        calls: AtomicUsize,
        seen: Mutex<Vec<SearchParams>>,
        result: Option<BookMetadata>,
        fail: bool,
    }

    #[async_trait]
    impl MetadataProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn lookup(&self, params: &SearchParams) -> Result<Option<BookMetadata>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(params.clone());
            if self.fail {
                return Err(OcrError::ApiError("fake".to_string(), "boom".to_string()));
            }
            Ok(self.result.clone())
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl CacheStore for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Value>> {
            Err(OcrError::Cache("down".to_string()))
        }

        async fn put(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<()> {
            Err(OcrError::Cache("down".to_string()))
        }
    }

    fn clean_code() -> BookMetadata {
        BookMetadata {
            title: "Clean Code".to_string(),
            authors: vec!["Robert C. Martin".to_string()],
            isbn_13: Some("9780132350884".to_string()),
            source: "fake".to_string(),
            ..Default::default()
        }
    }

    fn client(provider: Arc<FakeProvider>, cache: Arc<dyn CacheStore>) -> MetadataSearchClient {
        MetadataSearchClient::new(provider, cache, Duration::from_secs(60))
    }

    fn title_author(title: &str, author: &str) -> SearchParams {
        SearchParams {
            isbn: None,
            title: Some(title.to_string()),
            author: Some(author.to_string()),
        }
    }

    #[tokio::test]
    async fn second_identical_query_is_served_from_cache() {
        let provider = Arc::new(FakeProvider {
            result: Some(clean_code()),
            ..Default::default()
        });
        let cache = Arc::new(MemoryCache::new());
        let client = client(provider.clone(), cache.clone());

        let params = title_author("Clean Code", "Robert Martin");
        assert_eq!(client.search(&params).await, Some(clean_code()));
        assert_eq!(client.search(&params).await, Some(clean_code()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let cached = cache.get("title:clean code|author:robert martin").await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn noisy_query_hits_clean_cache_entry() {
        let provider = Arc::new(FakeProvider {
            result: Some(clean_code()),
            ..Default::default()
        });
        let client = client(provider.clone(), Arc::new(MemoryCache::new()));

        client.search(&title_author("Clean Code", "Robert Martin")).await;
        let hit = client.search(&title_author("C1ean C0de", "R0bert Mart|n")).await;
        assert_eq!(hit, Some(clean_code()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn outbound_query_keeps_case() {
        let provider = Arc::new(FakeProvider::default());
        let client = client(provider.clone(), Arc::new(MemoryCache::new()));

        client.search(&title_author(" C1ean C0de ", "R0bert Mart|n")).await;
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0], title_author("Clean Code", "Robert Martin"));
    }

    #[tokio::test]
    async fn provider_failure_is_none_and_not_cached() {
        let provider = Arc::new(FakeProvider {
            fail: true,
            ..Default::default()
        });
        let cache = Arc::new(MemoryCache::new());
        let client = client(provider.clone(), cache.clone());

        assert_eq!(client.search(&title_author("Clean Code", "Robert Martin")).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn empty_result_is_not_cached() {
        let provider = Arc::new(FakeProvider::default());
        let cache = Arc::new(MemoryCache::new());
        let client = client(provider.clone(), cache.clone());

        let params = title_author("Unknown", "Nobody Here");
        assert_eq!(client.search(&params).await, None);
        assert_eq!(client.search(&params).await, None);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn broken_cache_falls_through_to_provider() {
        let provider = Arc::new(FakeProvider {
            result: Some(clean_code()),
            ..Default::default()
        });
        let client = client(provider.clone(), Arc::new(BrokenCache));

        let params = title_author("Clean Code", "Robert Martin");
        assert_eq!(client.search(&params).await, Some(clean_code()));
        assert_eq!(client.search(&params).await, Some(clean_code()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreadable_cache_entry_is_refetched() {
        let provider = Arc::new(FakeProvider {
            result: Some(clean_code()),
            ..Default::default()
        });
        let cache = Arc::new(MemoryCache::new());
        cache
            .put("isbn:9780132350884", json!("garbage"), Duration::from_secs(60))
            .await
            .unwrap();
        let client = client(provider.clone(), cache);

        let params = SearchParams {
            isbn: Some("978-0-13-235088-4".to_string()),
            ..Default::default()
        };
        assert_eq!(client.search(&params).await, Some(clean_code()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nothing_searchable_skips_provider() {
        let provider = Arc::new(FakeProvider::default());
        let client = client(provider.clone(), Arc::new(MemoryCache::new()));

        assert_eq!(client.search(&SearchParams::default()).await, None);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
