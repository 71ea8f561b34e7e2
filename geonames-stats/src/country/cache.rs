//! Cache des polygones de pays, chargé paresseusement au premier usage

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CountrySet, CountrySource};
use crate::error::CacheError;

/// Délai par défaut d'un chargement
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// État du cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLifecycle {
    Unloaded,
    Loading,
    Loaded,
    /// Dernier chargement en échec, le prochain `load` réessaie
    Failed,
}

/// Dernier échec, rendu aux appelants qui attendaient ce chargement
#[derive(Default)]
struct Attempts {
    last_failure: Option<String>,
}

/// Cache des pays : une seule récupération réussie pour toute la durée de vie
///
/// Un seul chargement à la fois. Les appels arrivés pendant un chargement
/// attendent son issue : succès partagé, ou échec rendu sans nouvelle
/// récupération. Un appel arrivé après un échec retente.
pub struct CountryPolygonCache {
    source: Arc<dyn CountrySource>,
    timeout: Duration,
    loaded: OnceLock<Arc<CountrySet>>,
    attempts: tokio::sync::Mutex<Attempts>,
    /// Chargements terminés, lu sans verrou à l'arrivée d'un appel
    finished: AtomicU64,
    lifecycle: Mutex<CacheLifecycle>,
    fetches: AtomicUsize,
}

impl CountryPolygonCache {
    pub fn new(source: Arc<dyn CountrySource>) -> Self {
        Self {
            source,
            timeout: DEFAULT_LOAD_TIMEOUT,
            loaded: OnceLock::new(),
            attempts: tokio::sync::Mutex::new(Attempts::default()),
            finished: AtomicU64::new(0),
            lifecycle: Mutex::new(CacheLifecycle::Unloaded),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retourne les pays, en les chargeant si besoin
    pub async fn load(&self) -> Result<Arc<CountrySet>, CacheError> {
        if let Some(countries) = self.get() {
            return Ok(countries);
        }

        let seen = self.finished.load(Ordering::Acquire);
        let mut attempts = self.attempts.lock().await;

        if let Some(countries) = self.get() {
            return Ok(countries);
        }
        let finished = self.finished.load(Ordering::Acquire);
        if finished > seen {
            let message = attempts.last_failure.clone().unwrap_or_default();
            debug!(attempt = finished, "Joined a failed country load");
            return Err(CacheError::AttemptFailed {
                attempt: finished,
                message,
            });
        }

        let result = self.fetch().await;
        attempts.last_failure = match &result {
            Ok(countries) => {
                // Sous le verrou et après `get() == None` : jamais déjà rempli
                let _ = self.loaded.set(Arc::clone(countries));
                None
            }
            Err(e) => Some(e.to_string()),
        };
        self.finished.fetch_add(1, Ordering::Release);
        result
    }

    /// Pays déjà chargés, sans déclencher de chargement
    pub fn get(&self) -> Option<Arc<CountrySet>> {
        self.loaded.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    pub fn lifecycle(&self) -> CacheLifecycle {
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Nombre de récupérations lancées auprès de la source
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn source(&self) -> &Arc<dyn CountrySource> {
        &self.source
    }

    async fn fetch(&self) -> Result<Arc<CountrySet>, CacheError> {
        self.set_lifecycle(CacheLifecycle::Loading);
        self.fetches.fetch_add(1, Ordering::SeqCst);
        info!(source = %self.source.describe(), "Loading country polygons");

        let result = match tokio::time::timeout(self.timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        };

        match result {
            Ok(features) => {
                let countries = Arc::new(CountrySet::new(features));
                self.set_lifecycle(CacheLifecycle::Loaded);
                info!(countries = countries.len(), "Country polygons loaded");
                Ok(countries)
            }
            Err(e) => {
                self.set_lifecycle(CacheLifecycle::Failed);
                warn!(source = %self.source.describe(), error = %e, "Country polygons load failed");
                Err(e)
            }
        }
    }

    fn set_lifecycle(&self, state: CacheLifecycle) {
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country::CountryFeature;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use geo::{polygon, MultiPolygon};
    use std::sync::atomic::AtomicBool;

    /// Source de test : compte les appels, peut échouer ou traîner
    struct StubSource {
        calls: AtomicUsize,
        fail_next: AtomicBool,
        delay: Duration,
    }

    impl StubSource {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_next: AtomicBool::new(false),
                delay,
            }
        }
    }

    impl CountrySource for StubSource {
        fn describe(&self) -> String {
            "stub".into()
        }

        fn fetch(&self) -> BoxFuture<'_, Result<Vec<CountryFeature>, CacheError>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                if self.fail_next.swap(false, Ordering::SeqCst) {
                    return Err(CacheError::InvalidPayload("stub failure".into()));
                }
                let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
                Ok(vec![CountryFeature::new("A", "a", MultiPolygon::new(vec![square]), 4326)])
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_loads_fetch_once() {
        let source = Arc::new(StubSource::new(Duration::from_millis(50)));
        let cache = Arc::new(CountryPolygonCache::new(source.clone()));
        assert_eq!(cache.lifecycle(), CacheLifecycle::Unloaded);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.load().await.map(|c| c.len()) }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(cache.lifecycle(), CacheLifecycle::Loaded);

        // Un chargement ultérieur ne refait pas d'appel
        cache.load().await.unwrap();
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let source = Arc::new(StubSource::new(Duration::ZERO));
        source.fail_next.store(true, Ordering::SeqCst);
        let cache = CountryPolygonCache::new(source.clone());

        assert!(cache.load().await.is_err());
        assert_eq!(cache.lifecycle(), CacheLifecycle::Failed);
        assert!(cache.get().is_none());

        let countries = cache.load().await.unwrap();
        assert_eq!(countries.len(), 1);
        assert_eq!(cache.fetch_count(), 2);
        assert_eq!(cache.lifecycle(), CacheLifecycle::Loaded);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_failure() {
        let source = Arc::new(StubSource::new(Duration::from_millis(50)));
        source.fail_next.store(true, Ordering::SeqCst);
        let cache = Arc::new(CountryPolygonCache::new(source.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.load().await.map(|c| c.len()) }));
        }

        let mut original = 0;
        let mut joined = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Err(CacheError::InvalidPayload(_)) => original += 1,
                Err(CacheError::AttemptFailed { attempt: 1, message }) => {
                    assert!(message.contains("stub failure"), "{}", message);
                    joined += 1;
                }
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!((original, joined), (1, 7));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // Un appel après l'échec relance une récupération
        assert_eq!(cache.load().await.unwrap().len(), 1);
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_timeout() {
        let source = Arc::new(StubSource::new(Duration::from_secs(5)));
        let cache = CountryPolygonCache::new(source).with_timeout(Duration::from_millis(20));

        let err = cache.load().await.unwrap_err();
        assert!(matches!(err, CacheError::Timeout(_)));
        assert_eq!(cache.lifecycle(), CacheLifecycle::Failed);
    }
}
