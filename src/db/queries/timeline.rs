//! Timeline entry queries
//!
//! Entries are soft-deleted, never removed. Preview/commit pairs for a
//! segment serialize on a per-(plan, segment) advisory lock, and commit
//! re-validates the snapshot fingerprint taken at preview time.

use anyhow::Result;
use chrono::NaiveTime;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use crate::services::preview::PreviewResult;
use crate::types::{ConflictReason, EntryKind, TimelineEntry};

#[derive(Debug, Error)]
pub enum CommitError {
    /// The segment's entries changed between preview and commit; the
    /// caller must re-preview.
    #[error("timeline changed since preview; re-preview required")]
    StaleTimeline,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    segment_id: i64,
    ordinal: i32,
    kind: String,
    start_time: NaiveTime,
    end_time: NaiveTime,
    hotspot_id: Option<i64>,
    distance_km: Option<f64>,
    travel_seconds: Option<i64>,
    manually_added: bool,
    allow_break_hours: bool,
    conflict: bool,
    conflict_reason: Option<String>,
}

impl From<EntryRow> for TimelineEntry {
    fn from(row: EntryRow) -> Self {
        TimelineEntry {
            id: row.id,
            segment_id: row.segment_id,
            ordinal: row.ordinal,
            kind: EntryKind::parse(&row.kind).unwrap_or(EntryKind::Travel),
            start_time: row.start_time,
            end_time: row.end_time,
            hotspot_id: row.hotspot_id,
            distance_km: row.distance_km,
            travel_seconds: row.travel_seconds,
            manually_added: row.manually_added,
            allow_break_hours: row.allow_break_hours,
            conflict: row.conflict,
            conflict_reason: row.conflict_reason.as_deref().and_then(ConflictReason::parse),
        }
    }
}

/// Active entries of a segment in timeline order.
pub async fn fetch_active_entries(pool: &PgPool, segment_id: i64) -> Result<Vec<TimelineEntry>> {
    let rows: Vec<EntryRow> = sqlx::query_as(
        r#"
        SELECT id, segment_id, ordinal, kind, start_time, end_time, hotspot_id,
               distance_km, travel_seconds, manually_added, allow_break_hours,
               conflict, conflict_reason
        FROM timeline_entries
        WHERE segment_id = $1 AND NOT deleted
        ORDER BY ordinal
        "#,
    )
    .bind(segment_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TimelineEntry::from).collect())
}

/// Fingerprint of a segment's active entries: row count plus the newest
/// write. Cheap to compute and strictly monotone over commits.
pub async fn snapshot_fingerprint(pool: &PgPool, segment_id: i64) -> Result<String> {
    let (count, newest): (i64, Option<chrono::DateTime<chrono::Utc>>) = sqlx::query_as(
        r#"
        SELECT COUNT(*), MAX(updated_at)
        FROM timeline_entries
        WHERE segment_id = $1 AND NOT deleted
        "#,
    )
    .bind(segment_id)
    .fetch_one(pool)
    .await?;

    Ok(format!(
        "{count}:{}",
        newest.map(|t| t.timestamp_micros()).unwrap_or_default()
    ))
}

async fn fingerprint_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    segment_id: i64,
) -> Result<String, sqlx::Error> {
    let (count, newest): (i64, Option<chrono::DateTime<chrono::Utc>>) = sqlx::query_as(
        r#"
        SELECT COUNT(*), MAX(updated_at)
        FROM timeline_entries
        WHERE segment_id = $1 AND NOT deleted
        "#,
    )
    .bind(segment_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(format!(
        "{count}:{}",
        newest.map(|t| t.timestamp_micros()).unwrap_or_default()
    ))
}

/// Advisory lock key for one (plan, segment) pair.
fn advisory_key(plan_id: i64, segment_id: i64) -> i64 {
    plan_id.wrapping_shl(32) ^ segment_id
}

async fn lock_segment(
    tx: &mut Transaction<'_, Postgres>,
    plan_id: i64,
    segment_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(advisory_key(plan_id, segment_id))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn insert_entry(
    tx: &mut Transaction<'_, Postgres>,
    entry: &TimelineEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO timeline_entries
            (segment_id, ordinal, kind, start_time, end_time, hotspot_id,
             distance_km, travel_seconds, manually_added, allow_break_hours,
             conflict, conflict_reason)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(entry.segment_id)
    .bind(entry.ordinal)
    .bind(entry.kind.as_str())
    .bind(entry.start_time)
    .bind(entry.end_time)
    .bind(entry.hotspot_id)
    .bind(entry.distance_km)
    .bind(entry.travel_seconds)
    .bind(entry.manually_added)
    .bind(entry.allow_break_hours)
    .bind(entry.conflict)
    .bind(entry.conflict_reason.map(|r| r.as_str()))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Renumber a segment's active entries contiguously by start time.
async fn renumber(tx: &mut Transaction<'_, Postgres>, segment_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        WITH ranked AS (
            SELECT id, ROW_NUMBER() OVER (ORDER BY start_time, id) AS rn
            FROM timeline_entries
            WHERE segment_id = $1 AND NOT deleted
        )
        UPDATE timeline_entries t
        SET ordinal = r.rn
        FROM ranked r
        WHERE t.id = r.id
        "#,
    )
    .bind(segment_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Replace a segment's timeline with a freshly assembled one. The old
/// rows are soft-deleted in the same transaction.
pub async fn replace_segment_timeline(
    pool: &PgPool,
    plan_id: i64,
    segment_id: i64,
    entries: &[TimelineEntry],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    lock_segment(&mut tx, plan_id, segment_id).await?;

    sqlx::query(
        "UPDATE timeline_entries SET deleted = TRUE, updated_at = now()
         WHERE segment_id = $1 AND NOT deleted",
    )
    .bind(segment_id)
    .execute(&mut *tx)
    .await?;

    for entry in entries {
        insert_entry(&mut tx, entry).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Apply a previously previewed manual insertion.
///
/// Validates the preview's snapshot fingerprint under the segment's
/// advisory lock, applies the inserted/shifted/dropped/conflict sets,
/// soft-deletes any older manual duplicates for the same hotspot
/// (newest record wins), and renumbers.
pub async fn commit_insert(
    pool: &PgPool,
    plan_id: i64,
    segment_id: i64,
    preview: &PreviewResult,
) -> Result<(), CommitError> {
    let mut tx = pool.begin().await?;
    lock_segment(&mut tx, plan_id, segment_id).await?;

    let current = fingerprint_in_tx(&mut tx, segment_id).await?;
    if current != preview.snapshot {
        return Err(CommitError::StaleTimeline);
    }

    for shifted in &preview.shifted {
        sqlx::query(
            "UPDATE timeline_entries
             SET start_time = $1, end_time = $2, updated_at = now()
             WHERE id = $3",
        )
        .bind(shifted.new_start)
        .bind(shifted.new_end)
        .bind(shifted.entry.id)
        .execute(&mut *tx)
        .await?;
    }

    for dropped in &preview.dropped {
        sqlx::query(
            "UPDATE timeline_entries SET deleted = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(dropped.id)
        .execute(&mut *tx)
        .await?;
    }

    for conflicted in &preview.conflicts {
        sqlx::query(
            "UPDATE timeline_entries
             SET conflict = TRUE, conflict_reason = $1, updated_at = now()
             WHERE id = $2",
        )
        .bind(ConflictReason::OverlapsManualVisit.as_str())
        .bind(conflicted.id)
        .execute(&mut *tx)
        .await?;
    }

    for entry in &preview.inserted {
        insert_entry(&mut tx, entry).await?;
    }

    // Committing the same (segment, hotspot) insertion again keeps only
    // the newest record active.
    if let Some(created) = &preview.created {
        if let Some(hotspot_id) = created.hotspot_id {
            sqlx::query(
                r#"
                UPDATE timeline_entries SET deleted = TRUE, updated_at = now()
                WHERE segment_id = $1 AND hotspot_id = $2
                  AND manually_added AND NOT deleted
                  AND id NOT IN (
                      SELECT MAX(id) FROM timeline_entries
                      WHERE segment_id = $1 AND hotspot_id = $2
                        AND manually_added AND NOT deleted AND kind = 'visit'
                  )
                  AND kind = 'visit'
                "#,
            )
            .bind(segment_id)
            .bind(hotspot_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    renumber(&mut tx, segment_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Apply a previously previewed removal: soft-delete the visit and its
/// approach rows, shift the tail, renumber.
pub async fn commit_remove(
    pool: &PgPool,
    plan_id: i64,
    segment_id: i64,
    preview: &PreviewResult,
) -> Result<(), CommitError> {
    let mut tx = pool.begin().await?;
    lock_segment(&mut tx, plan_id, segment_id).await?;

    let current = fingerprint_in_tx(&mut tx, segment_id).await?;
    if current != preview.snapshot {
        return Err(CommitError::StaleTimeline);
    }

    let removed_ids = preview
        .removed
        .iter()
        .chain(preview.dropped.iter())
        .map(|e| e.id)
        .collect::<Vec<i64>>();
    for id in removed_ids {
        sqlx::query(
            "UPDATE timeline_entries SET deleted = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }

    for shifted in &preview.shifted {
        sqlx::query(
            "UPDATE timeline_entries
             SET start_time = $1, end_time = $2, updated_at = now()
             WHERE id = $3",
        )
        .bind(shifted.new_start)
        .bind(shifted.new_end)
        .bind(shifted.entry.id)
        .execute(&mut *tx)
        .await?;
    }

    for conflicted in &preview.conflicts {
        sqlx::query(
            "UPDATE timeline_entries
             SET conflict = TRUE, conflict_reason = $1, updated_at = now()
             WHERE id = $2",
        )
        .bind(ConflictReason::WindowMiss.as_str())
        .bind(conflicted.id)
        .execute(&mut *tx)
        .await?;
    }

    renumber(&mut tx, segment_id).await?;
    tx.commit().await?;
    Ok(())
}
