//! Persistent tier of the hotspot distance cache
//!
//! Both directions of a pair are written in one transaction with
//! identical values, so either ordering resolves from cache afterwards.
//! Writes are idempotent upserts; a value mismatch against an existing
//! row means the reference data changed and is logged, never swallowed.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use crate::services::distance_cache::{CacheKey, CacheStore, CachedDistance};

#[derive(Debug, sqlx::FromRow)]
struct CacheRow {
    haversine_km: f64,
    correction_factor: f64,
    speed_kmph: f64,
    distance_km: f64,
    duration_seconds: i64,
}

impl From<CacheRow> for CachedDistance {
    fn from(row: CacheRow) -> Self {
        CachedDistance {
            haversine_km: row.haversine_km,
            correction_factor: row.correction_factor,
            speed_kmph: row.speed_kmph,
            distance_km: row.distance_km,
            duration_seconds: row.duration_seconds,
        }
    }
}

/// PostgreSQL-backed `CacheStore`.
#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedDistance>> {
        let row: Option<CacheRow> = sqlx::query_as(
            r#"
            SELECT haversine_km, correction_factor, speed_kmph, distance_km, duration_seconds
            FROM distance_cache
            WHERE from_hotspot_id = $1 AND to_hotspot_id = $2 AND travel_class = $3
            "#,
        )
        .bind(key.0)
        .bind(key.1)
        .bind(key.2.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CachedDistance::from))
    }

    async fn put_pair(&self, key: &CacheKey, value: &CachedDistance) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (from, to) in [(key.0, key.1), (key.1, key.0)] {
            let existing: Option<CacheRow> = sqlx::query_as(
                r#"
                SELECT haversine_km, correction_factor, speed_kmph, distance_km, duration_seconds
                FROM distance_cache
                WHERE from_hotspot_id = $1 AND to_hotspot_id = $2 AND travel_class = $3
                "#,
            )
            .bind(from)
            .bind(to)
            .bind(key.2.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(existing) = existing.map(CachedDistance::from) {
                if existing.diverges_from(value) {
                    warn!(
                        from,
                        to,
                        class = key.2.as_str(),
                        stored_km = existing.distance_km,
                        computed_km = value.distance_km,
                        "distance cache value mismatch on upsert — reference data changed?"
                    );
                }
            }

            sqlx::query(
                r#"
                INSERT INTO distance_cache
                    (from_hotspot_id, to_hotspot_id, travel_class,
                     haversine_km, correction_factor, speed_kmph,
                     distance_km, duration_seconds)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (from_hotspot_id, to_hotspot_id, travel_class)
                DO UPDATE SET
                    haversine_km = EXCLUDED.haversine_km,
                    correction_factor = EXCLUDED.correction_factor,
                    speed_kmph = EXCLUDED.speed_kmph,
                    distance_km = EXCLUDED.distance_km,
                    duration_seconds = EXCLUDED.duration_seconds,
                    updated_at = now()
                "#,
            )
            .bind(from)
            .bind(to)
            .bind(key.2.as_str())
            .bind(value.haversine_km)
            .bind(value.correction_factor)
            .bind(value.speed_kmph)
            .bind(value.distance_km)
            .bind(value.duration_seconds)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Out-of-band cache invalidation: a hotspot coordinate change makes
/// every stored pair stale, so the whole table goes.
pub async fn flush(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM distance_cache").execute(pool).await?;
    Ok(result.rows_affected())
}
