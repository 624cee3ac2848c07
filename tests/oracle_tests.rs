use delivery_optimizer::error::RoutingError;
use delivery_optimizer::models::GeoPoint;
use delivery_optimizer::oracle::{DISTANCE_CACHE_FILE, TIME_CACHE_FILE};
use delivery_optimizer::utils::distance::{crow_flies_time, NOMINAL_SPEED_KMH};
use delivery_optimizer::utils::memo_cache::MemoCache;
use delivery_optimizer::utils::routing::{RouteSummary, RoutingProvider};
use delivery_optimizer::TravelCostOracle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Answers 25 minutes / 12 km, optionally rate limiting the first `limited` calls
struct CountingProvider {
    calls: Arc<AtomicUsize>,
    limited: usize,
}

impl CountingProvider {
    fn new(calls: Arc<AtomicUsize>) -> Self {
        Self { calls, limited: 0 }
    }
}

impl RoutingProvider for CountingProvider {
    fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteSummary, RoutingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.limited {
            return Err(RoutingError::RateLimited);
        }
        Ok(RouteSummary {
            duration: 1_500.0,
            distance: 12_000.0,
        })
    }
}

fn depot() -> GeoPoint {
    GeoPoint::new(48.7117294, 2.165678)
}

fn customer() -> GeoPoint {
    GeoPoint::new(48.7601, 2.2104)
}

#[test]
fn test_repeated_lookup_hits_the_provider_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let oracle = TravelCostOracle::with_provider(depot(), Box::new(CountingProvider::new(calls.clone())));

    let first = oracle.time(depot(), customer());
    let second = oracle.time(depot(), customer());
    assert_eq!(first, 25.0);
    assert_eq!(first, second);
    assert_eq!(oracle.distance(depot(), customer()), 12.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_misses_share_one_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let oracle = TravelCostOracle::with_provider(depot(), Box::new(CountingProvider::new(calls.clone())));

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| assert_eq!(oracle.time(depot(), customer()), 25.0));
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_rate_limit_starts_a_cooldown() {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = CountingProvider {
        calls: calls.clone(),
        limited: 1,
    };
    let oracle = TravelCostOracle::with_provider(depot(), Box::new(provider))
        .with_cooldown(Duration::from_millis(200));
    let estimate = crow_flies_time(&depot(), &customer(), NOMINAL_SPEED_KMH);

    // 429: estimate returned, cooldown armed
    assert!((oracle.time(depot(), customer()) - estimate).abs() < 1e-9);
    assert!(oracle.in_cooldown());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Inside the window the provider is left alone and nothing is cached
    let other = GeoPoint::new(48.65, 2.05);
    oracle.time(depot(), other);
    assert!((oracle.time(depot(), customer()) - estimate).abs() < 1e-9);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(oracle.cached_entries(), (0, 0));

    thread::sleep(Duration::from_millis(300));
    assert_eq!(oracle.time(depot(), customer()), 25.0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!oracle.in_cooldown());
}

#[test]
fn test_cached_answers_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let times_path = dir.path().join(TIME_CACHE_FILE);
    let distances_path = dir.path().join(DISTANCE_CACHE_FILE);
    let calls = Arc::new(AtomicUsize::new(0));

    {
        let oracle = TravelCostOracle::new(
            depot(),
            Some(Box::new(CountingProvider::new(calls.clone()))),
            MemoCache::load(&times_path),
            MemoCache::load(&distances_path),
        );
        assert_eq!(oracle.time(depot(), customer()), 25.0);
    }
    assert!(times_path.exists());
    assert!(distances_path.exists());

    // No provider this time: only the cache can answer 25 / 12
    let oracle = TravelCostOracle::new(
        depot(),
        None,
        MemoCache::load(&times_path),
        MemoCache::load(&distances_path),
    );
    assert_eq!(oracle.time(depot(), customer()), 25.0);
    assert_eq!(oracle.distance(depot(), customer()), 12.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_geometric_oracle_never_caches() {
    let oracle = TravelCostOracle::geometric(depot());
    assert_eq!(oracle.time(depot(), depot()), 0.0);
    assert!((oracle.time(depot(), customer()) - oracle.time(customer(), depot())).abs() < 1e-9);
    assert_eq!(oracle.cached_entries(), (0, 0));
}
