//! Landing query cache with moka
//!
//! Caches read-side query results over the local store. Results are only
//! valid until the next applied reconciliation pass, which drops every entry
//! through the [`CacheInvalidator`] port. Loader errors are never cached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use landfall_core::{CacheInvalidator, LandingRepository};
use landfall_domain::{CacheConfig, LandfallError, MeteoriteLanding, Result};
use moka::future::Cache;
use tracing::{debug, info};

const ALL_LANDINGS_KEY: &str = "landings:all";

type Landings = Arc<Vec<MeteoriteLanding>>;

/// Query results keyed by query name
#[derive(Clone)]
pub struct LandingQueryCache {
    results: Cache<String, Landings>,
}

impl LandingQueryCache {
    /// Create a cache from the `cache` config section.
    pub fn new(config: &CacheConfig) -> Self {
        info!(
            ttl_seconds = config.ttl_secs,
            max_capacity = config.max_capacity,
            "landing query cache configured"
        );
        Self::with_limits(config.max_capacity, Duration::from_secs(config.ttl_secs))
    }

    /// Create a cache with explicit capacity and time-to-live.
    pub fn with_limits(max_capacity: u64, ttl: Duration) -> Self {
        let results = Cache::builder().max_capacity(max_capacity).time_to_live(ttl).build();
        Self { results }
    }

    /// Every stored landing, loaded from `repository` on a miss.
    pub async fn all_landings(&self, repository: &dyn LandingRepository) -> Result<Landings> {
        self.load(ALL_LANDINGS_KEY.to_string(), async {
            repository.read_all().await.map(Arc::new)
        })
        .await
    }

    /// Whether `key` currently has a cached result.
    pub async fn contains(&self, key: &str) -> bool {
        self.results.get(key).await.is_some()
    }

    async fn load<F>(&self, key: String, loader: F) -> Result<Landings>
    where
        F: std::future::Future<Output = Result<Landings>>,
    {
        if let Some(hit) = self.results.get(&key).await {
            debug!(key = %key, "query cache hit");
            return Ok(hit);
        }

        debug!(key = %key, "query cache miss, loading");
        self.results
            .try_get_with(key, loader)
            .await
            .map_err(|err: Arc<LandfallError>| (*err).clone())
    }
}

#[async_trait]
impl CacheInvalidator for LandingQueryCache {
    async fn invalidate_all(&self) {
        self.results.invalidate_all();
        self.results.run_pending_tasks().await;
        debug!("query cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use landfall_domain::ExternalLanding;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct CountingRepository {
        records: Mutex<Vec<MeteoriteLanding>>,
        reads: AtomicUsize,
        fail: Mutex<bool>,
    }

    impl CountingRepository {
        fn with(records: Vec<MeteoriteLanding>) -> Self {
            Self { records: Mutex::new(records), ..Self::default() }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LandingRepository for CountingRepository {
        async fn read_all(&self) -> Result<Vec<MeteoriteLanding>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock() {
                return Err(LandfallError::Database("locked".into()));
            }
            Ok(self.records.lock().clone())
        }
        async fn bulk_insert(&self, _: &[MeteoriteLanding]) -> Result<()> {
            Ok(())
        }
        async fn bulk_update(&self, _: &[MeteoriteLanding]) -> Result<()> {
            Ok(())
        }
        async fn bulk_delete(&self, _: &[MeteoriteLanding]) -> Result<()> {
            Ok(())
        }
        async fn commit(&self) -> Result<()> {
            Ok(())
        }
        async fn discard_pending(&self) -> Result<()> {
            Ok(())
        }
    }

    fn landing(id: &str, year: &str) -> MeteoriteLanding {
        let source = ExternalLanding {
            id: Some(id.into()),
            name: Some(format!("Landing {id}")),
            year: Some(year.into()),
            ..ExternalLanding::default()
        };
        MeteoriteLanding::from_external(id, &source, Utc::now())
    }

    fn cache() -> LandingQueryCache {
        LandingQueryCache::with_limits(100, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn repeated_reads_hit_cache() {
        let repo = CountingRepository::with(vec![landing("1", "1880"), landing("2", "1951")]);
        let cache = cache();

        assert_eq!(cache.all_landings(&repo).await.unwrap().len(), 2);
        let again = cache.all_landings(&repo).await.unwrap();
        assert_eq!(again[1].year, Some(1951));

        assert_eq!(repo.reads(), 1);
        assert!(cache.contains(ALL_LANDINGS_KEY).await);
    }

    #[tokio::test]
    async fn invalidate_all_forces_reload() {
        let repo = CountingRepository::with(vec![landing("1", "1880")]);
        let cache = cache();
        cache.all_landings(&repo).await.unwrap();

        repo.records.lock().push(landing("2", "1880"));
        cache.invalidate_all().await;

        assert!(!cache.contains(ALL_LANDINGS_KEY).await);
        assert_eq!(cache.all_landings(&repo).await.unwrap().len(), 2);
        assert_eq!(repo.reads(), 2);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let repo = CountingRepository::with(vec![landing("1", "1880")]);
        *repo.fail.lock() = true;
        let cache = cache();

        let err = cache.all_landings(&repo).await.unwrap_err();
        assert!(matches!(err, LandfallError::Database(_)));

        *repo.fail.lock() = false;
        assert_eq!(cache.all_landings(&repo).await.unwrap().len(), 1);
        assert_eq!(repo.reads(), 2);
    }
}
