//! Plan and route segment queries

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use sqlx::{PgPool, Postgres, Transaction};

use crate::types::{Coordinates, RouteSegment, TravelMode};

#[derive(Debug, sqlx::FromRow)]
struct SegmentRow {
    id: i64,
    plan_id: i64,
    seq: i32,
    date: NaiveDate,
    source_name: String,
    dest_name: String,
    source_lat: Option<f64>,
    source_lon: Option<f64>,
    dest_lat: Option<f64>,
    dest_lon: Option<f64>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    direct: bool,
    travel_mode: String,
}

fn coords(lat: Option<f64>, lon: Option<f64>) -> Option<Coordinates> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    }
}

impl From<SegmentRow> for RouteSegment {
    fn from(row: SegmentRow) -> Self {
        RouteSegment {
            id: row.id,
            plan_id: row.plan_id,
            seq: row.seq,
            date: row.date,
            source_name: row.source_name,
            dest_name: row.dest_name,
            source_coords: coords(row.source_lat, row.source_lon),
            dest_coords: coords(row.dest_lat, row.dest_lon),
            start_time: row.start_time,
            end_time: row.end_time,
            direct: row.direct,
            travel_mode: TravelMode::parse(&row.travel_mode).unwrap_or(TravelMode::Road),
        }
    }
}

/// Persist the planning input so the manual-edit surface can operate on
/// it later. Segments are replaced wholesale — they are immutable
/// outside explicit re-planning.
pub async fn upsert_plan_segments(
    tx: &mut Transaction<'_, Postgres>,
    plan_id: i64,
    segments: &[RouteSegment],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO plans (id) VALUES ($1)
        ON CONFLICT (id) DO UPDATE SET updated_at = now()
        "#,
    )
    .bind(plan_id)
    .execute(&mut **tx)
    .await?;

    for segment in segments {
        sqlx::query(
            r#"
            INSERT INTO route_segments
                (id, plan_id, seq, date, source_name, dest_name,
                 source_lat, source_lon, dest_lat, dest_lon,
                 start_time, end_time, direct, travel_mode, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now())
            ON CONFLICT (id) DO UPDATE SET
                seq = EXCLUDED.seq,
                date = EXCLUDED.date,
                source_name = EXCLUDED.source_name,
                dest_name = EXCLUDED.dest_name,
                source_lat = EXCLUDED.source_lat,
                source_lon = EXCLUDED.source_lon,
                dest_lat = EXCLUDED.dest_lat,
                dest_lon = EXCLUDED.dest_lon,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                direct = EXCLUDED.direct,
                travel_mode = EXCLUDED.travel_mode,
                updated_at = now()
            "#,
        )
        .bind(segment.id)
        .bind(segment.plan_id)
        .bind(segment.seq)
        .bind(segment.date)
        .bind(&segment.source_name)
        .bind(&segment.dest_name)
        .bind(segment.source_coords.map(|c| c.lat))
        .bind(segment.source_coords.map(|c| c.lon))
        .bind(segment.dest_coords.map(|c| c.lat))
        .bind(segment.dest_coords.map(|c| c.lon))
        .bind(segment.start_time)
        .bind(segment.end_time)
        .bind(segment.direct)
        .bind(segment.travel_mode.as_str())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Fetch one segment.
pub async fn get_segment(pool: &PgPool, segment_id: i64) -> Result<Option<RouteSegment>> {
    let row: Option<SegmentRow> = sqlx::query_as(
        r#"
        SELECT id, plan_id, seq, date, source_name, dest_name,
               source_lat, source_lon, dest_lat, dest_lon,
               start_time, end_time, direct, travel_mode
        FROM route_segments
        WHERE id = $1
        "#,
    )
    .bind(segment_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(RouteSegment::from))
}
