//! Preview/conflict simulation for manual timeline edits
//!
//! Runs the assembler's admission rules against a copy of a segment's
//! persisted entries plus one proposed change, without committing.
//! Pure over its snapshot: the same inputs always produce the same
//! result, and stored state is never touched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::clock;
use super::distance_cache::{CacheStore, DistanceCache, LegPoint};
use super::eligibility::{self, CandidateClass};
use super::opening_hours::{self, Admission};
use crate::types::{
    ConflictReason, EntryKind, Hotspot, HotspotCatalog, PlanningConfig, RouteSegment,
    TimelineEntry, TravelClass, TravelMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreviewError {
    #[error("timeline entry {entry_id} not found in segment {segment_id}")]
    EntryNotFound { entry_id: i64, segment_id: i64 },
}

/// An existing entry with the times it would move to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftedEntry {
    pub entry: TimelineEntry,
    pub new_start: chrono::NaiveTime,
    pub new_end: chrono::NaiveTime,
}

/// Outcome of simulating one insertion or removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    /// The visit that would be created; `None` when rejected.
    pub created: Option<TimelineEntry>,
    /// Every new row the change would add (travel, optional wait,
    /// visit), in timeline order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inserted: Vec<TimelineEntry>,
    /// The entry a removal would soft-delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<TimelineEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<ConflictReason>,
    /// Existing entries whose window now overlaps or violates its
    /// hotspot's hours; never auto-resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<TimelineEntry>,
    /// Existing entries that would move to accommodate the change.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shifted: Vec<ShiftedEntry>,
    /// Entries that would leave the timeline: insertions report tail
    /// entries pushed past the segment end; removals report the
    /// approach rows (travel, wait) that go with the removed visit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<TimelineEntry>,
    /// Fingerprint of the snapshot this preview was computed against;
    /// commit re-validates it.
    pub snapshot: String,
}

impl PreviewResult {
    fn rejected(reason: ConflictReason, snapshot: String) -> Self {
        Self {
            created: None,
            inserted: Vec::new(),
            removed: None,
            rejection: Some(reason),
            conflicts: Vec::new(),
            shifted: Vec::new(),
            dropped: Vec::new(),
            snapshot,
        }
    }
}

/// Index just past the last visit — where a manual insertion lands.
fn insertion_index(entries: &[TimelineEntry]) -> usize {
    entries
        .iter()
        .rposition(|e| e.kind == EntryKind::Visit)
        .map(|i| i + 1)
        .unwrap_or_else(|| {
            entries
                .iter()
                .rposition(|e| e.kind == EntryKind::Refresh)
                .map(|i| i + 1)
                .unwrap_or(0)
        })
}

/// State at the insertion point: the clock and the position the new
/// travel leg starts from.
fn resume_state(
    segment: &RouteSegment,
    catalog: &HotspotCatalog,
    entries: &[TimelineEntry],
    at: usize,
) -> (chrono::NaiveTime, LegPoint) {
    let clock = if at == 0 {
        segment.start_time
    } else {
        entries[at - 1].end_time
    };

    let position = entries[..at]
        .iter()
        .rev()
        .find(|e| e.kind == EntryKind::Visit)
        .and_then(|e| e.hotspot_id)
        .and_then(|id| catalog.hotspot(id))
        .map(|h| LegPoint::hotspot(h.id, h.coords))
        .unwrap_or_else(|| LegPoint::place(segment.source_coords));

    (clock, position)
}

/// Simulate inserting `hotspot` into the segment's timeline.
pub async fn preview_insert<S: CacheStore>(
    segment: &RouteSegment,
    entries: &[TimelineEntry],
    hotspot: &Hotspot,
    catalog: &HotspotCatalog,
    cache: &DistanceCache<S>,
    config: &PlanningConfig,
    snapshot: String,
) -> PreviewResult {
    // Manual insertions must still belong to one of the segment's
    // endpoints.
    if eligibility::categorize(hotspot, &segment.source_name, &segment.dest_name)
        == CandidateClass::Via
    {
        return PreviewResult::rejected(ConflictReason::LocationMismatch, snapshot);
    }

    // Route-scoped dedup applies to manual additions too.
    if entries
        .iter()
        .any(|e| e.kind == EntryKind::Visit && e.hotspot_id == Some(hotspot.id))
    {
        return PreviewResult::rejected(ConflictReason::AlreadyScheduled, snapshot);
    }

    let at = insertion_index(entries);
    let (insert_clock, position) = resume_state(segment, catalog, entries, at);

    let target = LegPoint::hotspot(hotspot.id, hotspot.coords);
    let leg = match cache
        .resolve_leg(&position, &target, TravelClass::Local, config)
        .await
    {
        Ok(leg) => leg,
        Err(_) => return PreviewResult::rejected(ConflictReason::Unreachable, snapshot),
    };

    let mut travel_seconds = leg.duration_seconds;
    if travel_seconds > 0 {
        travel_seconds += config.buffer_seconds(TravelMode::Road);
    }

    let Some(arrival) = clock::add_seconds(insert_clock, travel_seconds) else {
        return PreviewResult::rejected(ConflictReason::CrossesMidnight, snapshot);
    };
    let visit_seconds = hotspot.visit_minutes as i64 * 60;
    let Some(tentative_end) = clock::add_seconds(arrival, visit_seconds) else {
        return PreviewResult::rejected(ConflictReason::CrossesMidnight, snapshot);
    };

    let weekday = segment.weekday();
    let windows = catalog.windows_for(hotspot.id, weekday);

    let (visit_start, visit_end) =
        match opening_hours::check_visit(&windows, hotspot.always_open, arrival, tentative_end) {
            Admission::Admit => (arrival, tentative_end),
            Admission::OpensLater { opens_at } => {
                if opens_at >= segment.end_time {
                    return PreviewResult::rejected(ConflictReason::WindowMiss, snapshot);
                }
                let Some(shifted_end) = clock::add_seconds(opens_at, visit_seconds) else {
                    return PreviewResult::rejected(ConflictReason::CrossesMidnight, snapshot);
                };
                match opening_hours::check_visit(&windows, hotspot.always_open, opens_at, shifted_end)
                {
                    Admission::Admit => (opens_at, shifted_end),
                    _ => return PreviewResult::rejected(ConflictReason::WindowMiss, snapshot),
                }
            }
            Admission::Closed => {
                let reason = if windows.iter().any(|w| !w.closed) {
                    ConflictReason::WindowMiss
                } else {
                    ConflictReason::ClosedAllDay
                };
                return PreviewResult::rejected(reason, snapshot);
            }
        };

    if visit_end > segment.end_time {
        return PreviewResult::rejected(ConflictReason::SegmentOverrun, snapshot);
    }

    // Build the would-be rows.
    let base = TimelineEntry {
        id: 0,
        segment_id: segment.id,
        ordinal: 0,
        kind: EntryKind::Travel,
        start_time: insert_clock,
        end_time: arrival,
        hotspot_id: Some(hotspot.id),
        distance_km: Some(leg.distance_km),
        travel_seconds: Some(travel_seconds),
        manually_added: true,
        allow_break_hours: false,
        conflict: false,
        conflict_reason: None,
    };

    let mut inserted = vec![base.clone()];
    if visit_start > arrival {
        inserted.push(TimelineEntry {
            kind: EntryKind::Refresh,
            start_time: arrival,
            end_time: visit_start,
            hotspot_id: None,
            distance_km: None,
            travel_seconds: None,
            allow_break_hours: true,
            ..base.clone()
        });
    }
    let visit = TimelineEntry {
        kind: EntryKind::Visit,
        start_time: visit_start,
        end_time: visit_end,
        distance_km: None,
        travel_seconds: None,
        ..base
    };
    inserted.push(visit.clone());

    // Entries after the insertion point shift later by the inserted
    // span; anything pushed past the segment end is reported dropped.
    let delta = clock::diff_seconds(visit_end, insert_clock);
    let mut shifted = Vec::new();
    let mut dropped = Vec::new();
    for entry in &entries[at..] {
        match (
            clock::add_seconds(entry.start_time, delta),
            clock::add_seconds(entry.end_time, delta),
        ) {
            (Some(new_start), Some(new_end)) if new_end <= segment.end_time => {
                shifted.push(ShiftedEntry { entry: entry.clone(), new_start, new_end });
            }
            _ => dropped.push(entry.clone()),
        }
    }

    // Entries outside the shifted tail that overlap the proposed window
    // are conflicts to surface, never to auto-resolve.
    let conflicts: Vec<TimelineEntry> = entries[..at]
        .iter()
        .filter(|e| e.overlap_minutes(visit_start, visit_end) > 0)
        .cloned()
        .collect();

    PreviewResult {
        created: Some(visit),
        inserted,
        removed: None,
        rejection: None,
        conflicts,
        shifted,
        dropped,
        snapshot,
    }
}

/// Simulate removing one visit entry: its travel leg (and any wait row)
/// goes with it, later entries pull earlier, and the final leg is
/// re-resolved from the new last position.
pub async fn preview_remove<S: CacheStore>(
    segment: &RouteSegment,
    entries: &[TimelineEntry],
    entry_id: i64,
    catalog: &HotspotCatalog,
    cache: &DistanceCache<S>,
    config: &PlanningConfig,
    snapshot: String,
) -> Result<PreviewResult, PreviewError> {
    let visit_idx = entries
        .iter()
        .position(|e| e.id == entry_id && e.kind == EntryKind::Visit)
        .ok_or(PreviewError::EntryNotFound { entry_id, segment_id: segment.id })?;
    let visit = &entries[visit_idx];

    // The visit's approach rows: contiguous run of travel/wait entries
    // immediately before it that belong to the same stop.
    let mut first_idx = visit_idx;
    while first_idx > 0 {
        let prev = &entries[first_idx - 1];
        let belongs = match prev.kind {
            EntryKind::Travel => prev.hotspot_id == visit.hotspot_id,
            EntryKind::Refresh => prev.allow_break_hours,
            _ => false,
        };
        if belongs {
            first_idx -= 1;
        } else {
            break;
        }
    }

    let (mut cursor, mut position) = resume_state(segment, catalog, entries, first_idx);

    let mut shifted = Vec::new();
    // The approach rows leave the timeline with the visit.
    let mut dropped: Vec<TimelineEntry> = entries[first_idx..visit_idx].to_vec();
    let mut conflicts = Vec::new();

    for entry in &entries[visit_idx + 1..] {
        // The first moved travel-like row starts from a new position,
        // so its duration is re-resolved rather than just shifted.
        let duration = match entry.kind {
            EntryKind::Travel | EntryKind::HotelTransfer | EntryKind::Return => {
                let (target, class) = match entry.hotspot_id.and_then(|id| catalog.hotspot(id)) {
                    Some(h) => (LegPoint::hotspot(h.id, h.coords), TravelClass::Local),
                    None => (LegPoint::place(segment.dest_coords), TravelClass::Outstation),
                };
                let buffer_mode = if class == TravelClass::Local {
                    TravelMode::Road
                } else {
                    segment.travel_mode
                };
                match cache.resolve_leg(&position, &target, class, config).await {
                    Ok(leg) => {
                        let mut seconds = leg.duration_seconds;
                        if seconds > 0 {
                            seconds += config.buffer_seconds(buffer_mode);
                        }
                        position = target;
                        seconds
                    }
                    Err(_) => 0,
                }
            }
            _ => clock::diff_seconds(entry.end_time, entry.start_time),
        };

        let new_start = cursor;
        let Some(new_end) = clock::add_seconds(new_start, duration) else {
            dropped.push(entry.clone());
            continue;
        };

        // An earlier arrival can fall outside a visit's windows.
        if entry.kind == EntryKind::Visit {
            if let Some(h) = entry.hotspot_id.and_then(|id| catalog.hotspot(id)) {
                let windows = catalog.windows_for(h.id, segment.weekday());
                if !opening_hours::admits_at(&windows, h.always_open, new_start) {
                    conflicts.push(entry.clone());
                }
            }
        }

        shifted.push(ShiftedEntry { entry: entry.clone(), new_start, new_end });
        cursor = new_end;
    }

    Ok(PreviewResult {
        created: None,
        inserted: Vec::new(),
        removed: Some(visit.clone()),
        rejection: None,
        conflicts,
        shifted,
        dropped,
        snapshot,
    })
}
