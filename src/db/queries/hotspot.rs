//! Hotspot reference data queries (read-only to the engine)

use anyhow::Result;
use chrono::NaiveTime;
use sqlx::PgPool;

use crate::types::{Coordinates, Hotspot, HotspotCatalog, OperatingWindow};

#[derive(Debug, sqlx::FromRow)]
struct HotspotRow {
    id: i64,
    name: String,
    lat: f64,
    lon: f64,
    visit_minutes: i32,
    priority: i32,
    aliases: Vec<String>,
    always_open: bool,
}

impl From<HotspotRow> for Hotspot {
    fn from(row: HotspotRow) -> Self {
        Hotspot {
            id: row.id,
            name: row.name,
            coords: Coordinates::new(row.lat, row.lon),
            visit_minutes: row.visit_minutes,
            priority: row.priority,
            aliases: row.aliases,
            always_open: row.always_open,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WindowRow {
    hotspot_id: i64,
    weekday: i16,
    start_time: NaiveTime,
    end_time: NaiveTime,
    closed: bool,
    open_all_day: bool,
}

impl From<WindowRow> for OperatingWindow {
    fn from(row: WindowRow) -> Self {
        OperatingWindow {
            hotspot_id: row.hotspot_id,
            weekday: row.weekday,
            start: row.start_time,
            end: row.end_time,
            closed: row.closed,
            open_all_day: row.open_all_day,
        }
    }
}

/// Load every active hotspot and its operating windows. Fetched once
/// per rebuild, then consulted in memory only.
pub async fn load_catalog(pool: &PgPool) -> Result<HotspotCatalog> {
    let hotspots: Vec<HotspotRow> = sqlx::query_as(
        r#"
        SELECT id, name, lat, lon, visit_minutes, priority, aliases, always_open
        FROM hotspots
        WHERE active
        "#,
    )
    .fetch_all(pool)
    .await?;

    let windows: Vec<WindowRow> = sqlx::query_as(
        r#"
        SELECT w.hotspot_id, w.weekday, w.start_time, w.end_time, w.closed, w.open_all_day
        FROM hotspot_windows w
        JOIN hotspots h ON h.id = w.hotspot_id
        WHERE h.active
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(HotspotCatalog::new(
        hotspots.into_iter().map(Hotspot::from).collect(),
        windows.into_iter().map(OperatingWindow::from).collect(),
    ))
}
