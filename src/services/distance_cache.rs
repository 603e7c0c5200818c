//! Hotspot-to-hotspot distance cache
//!
//! Pure memoization over the geo resolver: consulted before every
//! computation, populated bidirectionally on miss, never evicted
//! (hotspot coordinates are immutable reference data — a coordinate
//! change must flush the whole cache out-of-band via the CLI).
//!
//! Misses are linearized per (from, to, class) key so a racing pair of
//! segments computes each leg at most once per process; the persistent
//! write is an idempotent upsert either way.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::geo::{self, GeoError, TravelEstimate};
use crate::types::settings::ROAD_CORRECTION_FACTOR;
use crate::types::{Coordinates, PlanningConfig, TravelClass};

/// (from hotspot, to hotspot, travel class)
pub type CacheKey = (i64, i64, TravelClass);

/// Cached value for one directed pair. Forward and reverse rows of a
/// pair always carry identical values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedDistance {
    pub haversine_km: f64,
    pub correction_factor: f64,
    pub speed_kmph: f64,
    pub distance_km: f64,
    pub duration_seconds: i64,
}

impl From<TravelEstimate> for CachedDistance {
    fn from(estimate: TravelEstimate) -> Self {
        Self {
            haversine_km: estimate.haversine_km,
            correction_factor: ROAD_CORRECTION_FACTOR,
            speed_kmph: estimate.speed_kmph,
            distance_km: estimate.distance_km,
            duration_seconds: estimate.duration_seconds,
        }
    }
}

impl CachedDistance {
    /// Values count as diverged when distance or duration differ
    /// meaningfully — that indicates a reference-data change, not a
    /// race.
    pub fn diverges_from(&self, other: &CachedDistance) -> bool {
        (self.distance_km - other.distance_km).abs() > 0.01
            || self.duration_seconds != other.duration_seconds
    }
}

/// Persistent tier of the cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<CachedDistance>>;

    /// Persist both directions of a pair with identical values.
    /// Implementations upsert idempotently and log a data-integrity
    /// warning when an existing row disagrees.
    async fn put_pair(&self, key: &CacheKey, value: &CachedDistance) -> anyhow::Result<()>;
}

/// In-memory store; the persistent tier used by tests.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, CachedDistance>>,
}

impl MemoryCacheStore {
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn insert(&self, key: CacheKey, value: CachedDistance) {
        let mut entries = self.entries.write();
        entries.insert((key.1, key.0, key.2), value);
        entries.insert(key, value);
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<CachedDistance>> {
        Ok(self.entries.read().get(key).copied())
    }

    async fn put_pair(&self, key: &CacheKey, value: &CachedDistance) -> anyhow::Result<()> {
        let mut entries = self.entries.write();
        for k in [*key, (key.1, key.0, key.2)] {
            if let Some(existing) = entries.get(&k) {
                if existing.diverges_from(value) {
                    warn!(
                        from = k.0,
                        to = k.1,
                        "distance cache value mismatch on upsert — reference data changed?"
                    );
                }
            }
            entries.insert(k, *value);
        }
        Ok(())
    }
}

/// One endpoint of a leg. Legs between two distinct hotspots go through
/// the cache; anything touching a named city resolves directly (the
/// cache is keyed on hotspot pairs only).
#[derive(Debug, Clone, Copy)]
pub struct LegPoint {
    pub hotspot_id: Option<i64>,
    pub coords: Coordinates,
}

impl LegPoint {
    pub fn hotspot(id: i64, coords: Coordinates) -> Self {
        Self { hotspot_id: Some(id), coords }
    }

    pub fn place(coords: Option<Coordinates>) -> Self {
        Self {
            hotspot_id: None,
            coords: coords.unwrap_or(Coordinates { lat: 0.0, lon: 0.0 }),
        }
    }
}

/// Read-through cache: in-memory map, then persistent store, then the
/// resolver.
pub struct DistanceCache<S> {
    store: S,
    mem: RwLock<HashMap<CacheKey, CachedDistance>>,
    inflight: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
    computes: AtomicU64,
}

impl<S: CacheStore> DistanceCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            mem: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            computes: AtomicU64::new(0),
        }
    }

    /// Resolver invocations so far; the cache-symmetry guarantee is
    /// observable through this counter.
    pub fn computes(&self) -> u64 {
        self.computes.load(Ordering::Relaxed)
    }

    fn reversed(key: &CacheKey) -> CacheKey {
        (key.1, key.0, key.2)
    }

    fn remember_pair(&self, key: &CacheKey, value: CachedDistance) {
        let mut mem = self.mem.write();
        mem.insert(*key, value);
        mem.insert(Self::reversed(key), value);
    }

    /// Resolve a hotspot-to-hotspot pair. After any successful call
    /// both directions are cached; a reversed call never recomputes.
    pub async fn resolve(
        &self,
        from_id: i64,
        from_coords: &Coordinates,
        to_id: i64,
        to_coords: &Coordinates,
        class: TravelClass,
        config: &PlanningConfig,
    ) -> Result<CachedDistance, GeoError> {
        let key: CacheKey = (from_id, to_id, class);

        if let Some(hit) = self.mem.read().get(&key) {
            return Ok(*hit);
        }

        let key_lock = {
            let mut inflight = self.inflight.lock();
            Arc::clone(
                inflight
                    .entry(key)
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        let _guard = key_lock.lock().await;

        // A racing resolve may have landed while we waited.
        if let Some(hit) = self.mem.read().get(&key) {
            return Ok(*hit);
        }

        match self.store.get(&key).await {
            Ok(Some(found)) => {
                self.remember_pair(&key, found);
                return Ok(found);
            }
            Ok(None) => {}
            // A broken store degrades to recomputation, never to a
            // failed leg.
            Err(e) => warn!("distance cache read failed: {e}"),
        }

        let estimate = geo::resolve_travel(from_coords, to_coords, class, config)?;
        self.computes.fetch_add(1, Ordering::Relaxed);
        let value = CachedDistance::from(estimate);

        if let Err(e) = self.store.put_pair(&key, &value).await {
            warn!("distance cache write failed: {e}");
        }
        self.remember_pair(&key, value);

        Ok(value)
    }

    /// Resolve one timeline leg, caching only when both endpoints are
    /// distinct hotspots.
    pub async fn resolve_leg(
        &self,
        from: &LegPoint,
        to: &LegPoint,
        class: TravelClass,
        config: &PlanningConfig,
    ) -> Result<CachedDistance, GeoError> {
        match (from.hotspot_id, to.hotspot_id) {
            (Some(f), Some(t)) if f != t => {
                self.resolve(f, &from.coords, t, &to.coords, class, config).await
            }
            _ => geo::resolve_travel(&from.coords, &to.coords, class, config)
                .map(CachedDistance::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(seed: i64) -> Coordinates {
        Coordinates::new(12.0 + seed as f64 * 0.11, 79.0 + seed as f64 * 0.07)
    }

    fn cache() -> DistanceCache<MemoryCacheStore> {
        DistanceCache::new(MemoryCacheStore::default())
    }

    #[tokio::test]
    async fn test_reverse_resolve_never_recomputes() {
        let cache = cache();
        let config = PlanningConfig::default();

        for (a, b) in [(1i64, 2i64), (3, 7), (10, 4), (5, 6)] {
            let forward = cache
                .resolve(a, &point(a), b, &point(b), TravelClass::Local, &config)
                .await
                .unwrap();
            let computes_after_forward = cache.computes();

            let reverse = cache
                .resolve(b, &point(b), a, &point(a), TravelClass::Local, &config)
                .await
                .unwrap();

            assert_eq!(cache.computes(), computes_after_forward, "reverse recomputed");
            assert_eq!(forward.distance_km, reverse.distance_km);
            assert_eq!(forward.duration_seconds, reverse.duration_seconds);
        }
        assert_eq!(cache.computes(), 4);
    }

    #[tokio::test]
    async fn test_repeat_resolve_is_a_hit() {
        let cache = cache();
        let config = PlanningConfig::default();

        let first = cache
            .resolve(1, &point(1), 2, &point(2), TravelClass::Local, &config)
            .await
            .unwrap();
        let second = cache
            .resolve(1, &point(1), 2, &point(2), TravelClass::Local, &config)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.computes(), 1);
    }

    #[tokio::test]
    async fn test_travel_class_is_part_of_the_key() {
        let cache = cache();
        let config = PlanningConfig::default();

        let local = cache
            .resolve(1, &point(1), 2, &point(2), TravelClass::Local, &config)
            .await
            .unwrap();
        let outstation = cache
            .resolve(1, &point(1), 2, &point(2), TravelClass::Outstation, &config)
            .await
            .unwrap();

        assert_eq!(cache.computes(), 2);
        assert_eq!(local.distance_km, outstation.distance_km);
        assert!(local.duration_seconds > outstation.duration_seconds);
    }

    #[tokio::test]
    async fn test_prefilled_store_serves_without_compute() {
        let store = MemoryCacheStore::default();
        let stored = CachedDistance {
            haversine_km: 10.0,
            correction_factor: ROAD_CORRECTION_FACTOR,
            speed_kmph: 40.0,
            distance_km: 15.0,
            duration_seconds: 1_350,
        };
        store.insert((1, 2, TravelClass::Local), stored);

        let cache = DistanceCache::new(store);
        let value = cache
            .resolve(1, &point(1), 2, &point(2), TravelClass::Local, &PlanningConfig::default())
            .await
            .unwrap();

        assert_eq!(value, stored);
        assert_eq!(cache.computes(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_pair_is_not_cached() {
        let cache = cache();
        let missing = Coordinates::new(0.0, 0.0);

        let result = cache
            .resolve(1, &missing, 2, &point(2), TravelClass::Local, &PlanningConfig::default())
            .await;

        assert_eq!(result, Err(GeoError::UnresolvableDistance));
        assert_eq!(cache.computes(), 0);
        assert!(cache.store.is_empty());
    }

    #[tokio::test]
    async fn test_racing_misses_compute_once() {
        let cache = Arc::new(cache());
        let config = PlanningConfig::default();

        let a = {
            let cache = Arc::clone(&cache);
            let config = config.clone();
            tokio::spawn(async move {
                cache
                    .resolve(1, &point(1), 2, &point(2), TravelClass::Local, &config)
                    .await
            })
        };
        let b = {
            let cache = Arc::clone(&cache);
            let config = config.clone();
            tokio::spawn(async move {
                cache
                    .resolve(2, &point(2), 1, &point(1), TravelClass::Local, &config)
                    .await
            })
        };

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a.distance_km, b.distance_km);
        // Opposite directions may race to separate keys, but identical
        // values must come out regardless of interleaving.
        assert!(cache.computes() <= 2);
    }

    #[test]
    fn test_city_leg_bypasses_cache() {
        tokio_test::block_on(async {
            let cache = cache();
            let city = LegPoint::place(Some(point(20)));
            let spot = LegPoint::hotspot(1, point(1));

            let value = cache
                .resolve_leg(&city, &spot, TravelClass::Outstation, &PlanningConfig::default())
                .await
                .unwrap();

            assert!(value.distance_km > 0.0);
            assert!(cache.store.is_empty());
        });
    }
}
