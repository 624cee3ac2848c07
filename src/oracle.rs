// Travel cost oracle: memoized routing answers with a geometric fallback

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::OptimizerConfig;
use crate::error::RoutingError;
use crate::models::{GeoPoint, Kilometers, Minutes};
use crate::utils::distance::{crow_flies_distance, crow_flies_time, NOMINAL_SPEED_KMH};
use crate::utils::memo_cache::MemoCache;
use crate::utils::routing::{OpenRouteService, RouteSummary, RoutingProvider};

pub const TIME_CACHE_FILE: &str = "memoization_cache_time.txt";
pub const DISTANCE_CACHE_FILE: &str = "memoization_cache_distance.txt";

/// How long the provider is left alone after answering 429
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    Time,
    Distance,
}

struct OracleState {
    times: MemoCache,
    distances: MemoCache,
    cooldown_until: Option<Instant>,
    /// Set after a failed request, cleared by the next success
    failing: bool,
}

impl OracleState {
    fn cache(&self, quantity: Quantity) -> &MemoCache {
        match quantity {
            Quantity::Time => &self.times,
            Quantity::Distance => &self.distances,
        }
    }
}

/// Resolves travel time (minutes) and distance (km) between two points
///
/// Answers come from the memo caches, then from the routing provider, and
/// finally from a straight-line estimate. Estimates are never cached, so a
/// pair that fell back once is asked to the provider again on the next miss.
///
/// A single lock guards both caches and the cooldown deadline and is held
/// across the provider call: concurrent misses on one pair cost one request.
pub struct TravelCostOracle {
    depot: GeoPoint,
    provider: Option<Box<dyn RoutingProvider>>,
    speed_kmh: f64,
    cooldown: Duration,
    state: Mutex<OracleState>,
}

impl TravelCostOracle {
    /// Oracle with the given provider and caches
    pub fn new(
        depot: GeoPoint,
        provider: Option<Box<dyn RoutingProvider>>,
        times: MemoCache,
        distances: MemoCache,
    ) -> Self {
        Self {
            depot,
            provider,
            speed_kmh: NOMINAL_SPEED_KMH,
            cooldown: DEFAULT_COOLDOWN,
            state: Mutex::new(OracleState {
                times,
                distances,
                cooldown_until: None,
                failing: false,
            }),
        }
    }

    /// Oracle that only ever answers with straight-line estimates
    pub fn geometric(depot: GeoPoint) -> Self {
        Self::new(depot, None, MemoCache::in_memory(), MemoCache::in_memory())
    }

    /// Oracle backed by a provider and in-memory caches
    pub fn with_provider(depot: GeoPoint, provider: Box<dyn RoutingProvider>) -> Self {
        Self::new(
            depot,
            Some(provider),
            MemoCache::in_memory(),
            MemoCache::in_memory(),
        )
    }

    /// Builds the oracle described by the configuration
    ///
    /// Without an API key the oracle runs offline on geometric estimates.
    pub fn from_config(config: &OptimizerConfig) -> Result<Self, RoutingError> {
        let provider: Option<Box<dyn RoutingProvider>> = match config.api_key() {
            Some(key) => Some(Box::new(OpenRouteService::new(
                config.routing_endpoint.clone(),
                key,
                config.request_timeout(),
            )?)),
            None => {
                info!("no routing API key configured, using geometric estimates only");
                None
            }
        };

        let times = MemoCache::load(config.cache_dir.join(TIME_CACHE_FILE));
        let distances = MemoCache::load(config.cache_dir.join(DISTANCE_CACHE_FILE));
        info!(
            times = times.len(),
            distances = distances.len(),
            "travel cost caches loaded"
        );

        Ok(Self::new(config.depot, provider, times, distances)
            .with_speed(config.nominal_speed_kmh)
            .with_cooldown(config.cooldown()))
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = speed_kmh;
        self
    }

    /// Location every route starts from
    pub fn depot(&self) -> GeoPoint {
        self.depot
    }

    /// Travel time in minutes from `from` to `to`
    pub fn time(&self, from: GeoPoint, to: GeoPoint) -> Minutes {
        self.resolve(Quantity::Time, from, to)
    }

    /// Driving distance in kilometres from `from` to `to`
    pub fn distance(&self, from: GeoPoint, to: GeoPoint) -> Kilometers {
        self.resolve(Quantity::Distance, from, to)
    }

    /// Whether the provider is currently being skipped after a 429
    pub fn in_cooldown(&self) -> bool {
        let state = self.state.lock();
        state
            .cooldown_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Number of cached (time, distance) entries
    pub fn cached_entries(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.times.len(), state.distances.len())
    }

    /// Fetches the uncached legs in parallel and stores the answers
    ///
    /// The provider is called without holding the oracle lock. Duplicate
    /// legs are requested once, and a 429 stops the remaining requests and
    /// arms the cooldown. Returns the number of legs cached.
    pub fn prefetch(&self, legs: &[(GeoPoint, GeoPoint)]) -> usize {
        let Some(provider) = self.provider.as_deref() else {
            return 0;
        };

        let missing: Vec<(String, GeoPoint, GeoPoint)> = {
            let state = self.state.lock();
            if state.cooldown_until.is_some_and(|until| Instant::now() < until) {
                return 0;
            }
            let mut seen = HashSet::new();
            legs.iter()
                .map(|(from, to)| (cache_key(from, to), *from, *to))
                .filter(|(key, _, _)| !state.times.contains_key(key) && seen.insert(key.clone()))
                .collect()
        };

        let rate_limited = AtomicBool::new(false);
        let answers: Vec<(String, Result<RouteSummary, RoutingError>)> = missing
            .into_par_iter()
            .filter_map(|(key, from, to)| {
                if rate_limited.load(Ordering::Relaxed) {
                    return None;
                }
                let answer = provider.route(from, to);
                if matches!(answer, Err(RoutingError::RateLimited)) {
                    rate_limited.store(true, Ordering::Relaxed);
                }
                Some((key, answer))
            })
            .collect();

        let mut state = self.state.lock();
        let mut times = Vec::new();
        let mut distances = Vec::new();
        for (key, answer) in answers {
            match answer {
                Ok(summary) => {
                    let (minutes, kilometers) = self.note_success(&mut state, &summary);
                    times.push((key.clone(), minutes));
                    distances.push((key, kilometers));
                }
                Err(RoutingError::RateLimited) => self.start_cooldown(&mut state),
                Err(e) => self.note_failure(&mut state, &e, &key),
            }
        }

        let cached = times.len();
        state.times.extend(times);
        state.distances.extend(distances);
        debug!(requested = legs.len(), cached, "travel costs prefetched");
        cached
    }

    fn resolve(&self, quantity: Quantity, from: GeoPoint, to: GeoPoint) -> f64 {
        let key = cache_key(&from, &to);
        let mut state = self.state.lock();

        if let Some(value) = state.cache(quantity).get(&key) {
            return value;
        }

        let Some(provider) = self.provider.as_deref() else {
            return self.estimate(quantity, &from, &to);
        };

        if let Some(until) = state.cooldown_until {
            if Instant::now() < until {
                return self.estimate(quantity, &from, &to);
            }
            info!("routing cooldown over, querying provider again");
            state.cooldown_until = None;
        }

        match provider.route(from, to) {
            Ok(summary) => {
                let (minutes, kilometers) = self.note_success(&mut state, &summary);
                debug!(key = %key, minutes, kilometers, "routing answer cached");

                state.times.insert(key.clone(), minutes);
                state.distances.insert(key, kilometers);

                match quantity {
                    Quantity::Time => minutes,
                    Quantity::Distance => kilometers,
                }
            }
            Err(RoutingError::RateLimited) => {
                self.start_cooldown(&mut state);
                self.estimate(quantity, &from, &to)
            }
            Err(e) => {
                self.note_failure(&mut state, &e, &key);
                self.estimate(quantity, &from, &to)
            }
        }
    }

    /// Rounded (minutes, kilometers) of a provider answer
    fn note_success(&self, state: &mut OracleState, summary: &RouteSummary) -> (Minutes, Kilometers) {
        if state.failing {
            info!("routing provider answering again");
            state.failing = false;
        }
        (
            (summary.duration / 60.0).round(),
            (summary.distance / 1000.0).round(),
        )
    }

    fn start_cooldown(&self, state: &mut OracleState) {
        if state.cooldown_until.is_none() {
            warn!(
                cooldown_secs = self.cooldown.as_secs(),
                "routing provider rate limited, falling back to estimates"
            );
        }
        state.cooldown_until = Some(Instant::now() + self.cooldown);
    }

    /// Warns on the first failure of an outage only
    fn note_failure(&self, state: &mut OracleState, error: &RoutingError, key: &str) {
        if state.failing {
            debug!(error = %error, key, "routing request failed, using estimate");
        } else {
            warn!(error = %error, key, "routing request failed, using estimates until it recovers");
            state.failing = true;
        }
    }

    fn estimate(&self, quantity: Quantity, from: &GeoPoint, to: &GeoPoint) -> f64 {
        match quantity {
            Quantity::Time => crow_flies_time(from, to, self.speed_kmh),
            Quantity::Distance => crow_flies_distance(from, to),
        }
    }
}

/// Cache key of an ordered pair of points
pub fn cache_key(from: &GeoPoint, to: &GeoPoint) -> String {
    format!("{}|{}", from.canonical(), to.canonical())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::routing::RouteSummary;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedProvider {
        calls: Arc<AtomicUsize>,
    }

    impl RoutingProvider for FixedProvider {
        fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteSummary, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RouteSummary {
                duration: 1_250.0,
                distance: 8_600.0,
            })
        }
    }

    struct FailingProvider;

    impl RoutingProvider for FailingProvider {
        fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteSummary, RoutingError> {
            Err(RoutingError::Status(500))
        }
    }

    fn depot() -> GeoPoint {
        GeoPoint::new(48.7117, 2.1657)
    }

    #[test]
    fn test_cache_key_is_ordered() {
        let a = GeoPoint::new(1.0, 2.0);
        let b = GeoPoint::new(3.0, 4.0);
        assert_eq!(cache_key(&a, &b), "1.000000,2.000000|3.000000,4.000000");
        assert_ne!(cache_key(&a, &b), cache_key(&b, &a));
    }

    #[test]
    fn test_provider_answer_is_rounded_and_fills_both_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let oracle = TravelCostOracle::with_provider(
            depot(),
            Box::new(FixedProvider {
                calls: calls.clone(),
            }),
        );
        let to = GeoPoint::new(48.75, 2.2);

        // 1250 s -> 21 min, 8600 m -> 9 km
        assert_eq!(oracle.time(depot(), to), 21.0);
        assert_eq!(oracle.distance(depot(), to), 9.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(oracle.cached_entries(), (1, 1));
    }

    #[test]
    fn test_failure_falls_back_without_caching() {
        let oracle = TravelCostOracle::with_provider(depot(), Box::new(FailingProvider));
        let to = GeoPoint::new(48.75, 2.2);

        let expected = crow_flies_time(&depot(), &to, NOMINAL_SPEED_KMH);
        assert!((oracle.time(depot(), to) - expected).abs() < 1e-9);
        assert_eq!(oracle.cached_entries(), (0, 0));
        assert!(!oracle.in_cooldown());
    }

    struct EmptySummaryProvider;

    impl RoutingProvider for EmptySummaryProvider {
        fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteSummary, RoutingError> {
            crate::utils::routing::parse_summary(r#"{"routes":[{"summary":{}}]}"#)
        }
    }

    #[test]
    fn test_empty_summary_is_not_a_free_leg() {
        let oracle = TravelCostOracle::with_provider(depot(), Box::new(EmptySummaryProvider));
        let to = GeoPoint::new(49.2, 2.5);

        let expected = crow_flies_time(&depot(), &to, NOMINAL_SPEED_KMH);
        let time = oracle.time(depot(), to);
        assert!(time > 60.0);
        assert!((time - expected).abs() < 1e-9);
        assert_eq!(oracle.cached_entries(), (0, 0));
    }

    #[test]
    fn test_failure_flag_resets_after_success() {
        let oracle = TravelCostOracle::with_provider(depot(), Box::new(FailingProvider));
        let to = GeoPoint::new(48.75, 2.2);

        oracle.time(depot(), to);
        oracle.distance(depot(), to);
        assert!(oracle.state.lock().failing);

        let summary = RouteSummary {
            duration: 600.0,
            distance: 4_000.0,
        };
        let mut state = oracle.state.lock();
        assert_eq!(oracle.note_success(&mut state, &summary), (10.0, 4.0));
        assert!(!state.failing);
    }

    #[test]
    fn test_prefetch_requests_each_missing_leg_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let oracle = TravelCostOracle::with_provider(
            depot(),
            Box::new(FixedProvider {
                calls: calls.clone(),
            }),
        );
        let a = GeoPoint::new(48.75, 2.2);
        let b = GeoPoint::new(48.65, 2.05);

        oracle.time(depot(), a);
        let legs = [(depot(), a), (depot(), b), (depot(), b), (a, b), (b, a)];
        assert_eq!(oracle.prefetch(&legs), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(oracle.cached_entries(), (4, 4));

        // Everything is cached now
        assert_eq!(oracle.time(a, b), 21.0);
        assert_eq!(oracle.distance(b, a), 9.0);
        assert_eq!(oracle.prefetch(&legs), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_prefetch_is_a_no_op_offline() {
        let oracle = TravelCostOracle::geometric(depot());
        assert_eq!(oracle.prefetch(&[(depot(), GeoPoint::new(48.75, 2.2))]), 0);
        assert_eq!(oracle.cached_entries(), (0, 0));
    }

    #[test]
    fn test_geometric_oracle() {
        let oracle = TravelCostOracle::geometric(depot());
        let to = GeoPoint::new(48.75, 2.2);

        assert!((oracle.distance(depot(), to) - depot().haversine_km(&to)).abs() < 1e-9);
        assert_eq!(oracle.cached_entries(), (0, 0));
    }

    #[test]
    fn test_custom_speed_changes_estimate() {
        let oracle = TravelCostOracle::geometric(depot()).with_speed(25.0);
        let to = GeoPoint::new(48.75, 2.2);

        let km = depot().haversine_km(&to);
        assert!((oracle.time(depot(), to) - km / 25.0 * 60.0).abs() < 1e-9);
    }
}
