//! Greedy timeline assembly for one route segment
//!
//! A sequential state machine over {clock, position, remaining
//! candidates, emitted entries}: refreshment first, then ranked
//! candidates admitted against their operating windows and the segment
//! deadline, then the leg back to the declared destination. A rejected
//! candidate never fails the segment; an infeasible segment never fails
//! its siblings.

use thiserror::Error;
use tracing::debug;

use super::clock;
use super::distance_cache::{CacheStore, DistanceCache, LegPoint};
use super::eligibility::CandidateSets;
use super::opening_hours::{self, Admission};
use super::ordering;
use crate::types::{
    EntryKind, HotspotCatalog, PlanningConfig, RouteSegment, TimelineEntry, TravelClass,
    TravelMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AssembleError {
    /// Not even the mandatory refreshment break plus the return leg fit
    /// inside the segment window.
    #[error("segment {segment_id}: refresh and return do not fit inside the segment window")]
    SegmentInfeasible { segment_id: i64 },
}

struct Assembly<'a, S: CacheStore> {
    segment: &'a RouteSegment,
    catalog: &'a HotspotCatalog,
    cache: &'a DistanceCache<S>,
    config: &'a PlanningConfig,
    weekday: i16,
    clock: chrono::NaiveTime,
    position: LegPoint,
    visited: std::collections::HashSet<i64>,
    entries: Vec<TimelineEntry>,
}

impl<'a, S: CacheStore> Assembly<'a, S> {
    fn next_ordinal(&self) -> i32 {
        self.entries.len() as i32 + 1
    }

    fn push(&mut self, mut entry: TimelineEntry) {
        entry.ordinal = self.next_ordinal();
        self.entries.push(entry);
    }

    fn blank_entry(&self, kind: EntryKind) -> TimelineEntry {
        TimelineEntry {
            id: 0,
            segment_id: self.segment.id,
            ordinal: 0,
            kind,
            start_time: self.clock,
            end_time: self.clock,
            hotspot_id: None,
            distance_km: None,
            travel_seconds: None,
            manually_added: false,
            allow_break_hours: false,
            conflict: false,
            conflict_reason: None,
        }
    }

    /// Try one candidate. Admission either emits its entries and
    /// advances the state, or rejects and leaves the state untouched.
    async fn try_candidate(&mut self, hotspot_id: i64) {
        if self.visited.contains(&hotspot_id) {
            return;
        }
        let Some(hotspot) = self.catalog.hotspot(hotspot_id) else {
            return;
        };

        let target = LegPoint::hotspot(hotspot.id, hotspot.coords);
        let leg = match self
            .cache
            .resolve_leg(&self.position, &target, TravelClass::Local, self.config)
            .await
        {
            Ok(leg) => leg,
            Err(_) => {
                debug!(hotspot = hotspot.id, "rejecting candidate: unreachable");
                return;
            }
        };

        let mut travel_seconds = leg.duration_seconds;
        if travel_seconds > 0 {
            travel_seconds += self.config.buffer_seconds(TravelMode::Road);
        }

        let Some(arrival) = clock::add_seconds(self.clock, travel_seconds) else {
            debug!(hotspot = hotspot.id, "rejecting candidate: travel crosses midnight");
            return;
        };

        let visit_seconds = hotspot.visit_minutes as i64 * 60;
        let Some(visit_end) = clock::add_seconds(arrival, visit_seconds) else {
            debug!(hotspot = hotspot.id, "rejecting candidate: visit crosses midnight");
            return;
        };

        let windows = self.catalog.windows_for(hotspot.id, self.weekday);
        let admission =
            opening_hours::check_visit(&windows, hotspot.always_open, arrival, visit_end);

        match admission {
            Admission::Admit => {
                if visit_end > self.segment.end_time {
                    debug!(hotspot = hotspot.id, "rejecting candidate: segment overrun");
                    return;
                }
                self.emit_visit(hotspot.id, &leg, travel_seconds, arrival, None, visit_end);
                self.position = target;
            }
            Admission::OpensLater { opens_at } => {
                // Wait-and-retry, once: only worth it when the window
                // opens before the segment ends.
                if opens_at >= self.segment.end_time {
                    debug!(hotspot = hotspot.id, "rejecting candidate: opens after segment end");
                    return;
                }
                let Some(shifted_end) = clock::add_seconds(opens_at, visit_seconds) else {
                    return;
                };
                let retry =
                    opening_hours::check_visit(&windows, hotspot.always_open, opens_at, shifted_end);
                if retry != Admission::Admit || shifted_end > self.segment.end_time {
                    debug!(hotspot = hotspot.id, "rejecting candidate: retry after wait failed");
                    return;
                }
                self.emit_visit(
                    hotspot.id,
                    &leg,
                    travel_seconds,
                    arrival,
                    Some(opens_at),
                    shifted_end,
                );
                self.position = target;
            }
            Admission::Closed => {
                debug!(hotspot = hotspot.id, "rejecting candidate: window miss");
            }
        }
    }

    /// Emit Travel [+ Wait] + Visit rows and advance the clock.
    fn emit_visit(
        &mut self,
        hotspot_id: i64,
        leg: &super::distance_cache::CachedDistance,
        travel_seconds: i64,
        arrival: chrono::NaiveTime,
        wait_until: Option<chrono::NaiveTime>,
        visit_end: chrono::NaiveTime,
    ) {
        let mut travel = self.blank_entry(EntryKind::Travel);
        travel.end_time = arrival;
        travel.hotspot_id = Some(hotspot_id);
        travel.distance_km = Some(leg.distance_km);
        travel.travel_seconds = Some(travel_seconds);
        self.push(travel);
        self.clock = arrival;

        if let Some(opens_at) = wait_until {
            let mut wait = self.blank_entry(EntryKind::Refresh);
            wait.end_time = opens_at;
            wait.allow_break_hours = true;
            self.push(wait);
            self.clock = opens_at;
        }

        let mut visit = self.blank_entry(EntryKind::Visit);
        visit.end_time = visit_end;
        visit.hotspot_id = Some(hotspot_id);
        self.push(visit);
        self.clock = visit_end;
        self.visited.insert(hotspot_id);
    }

    /// Drain one candidate pool, re-ranking the remainder from the
    /// current position before every pop.
    async fn consume_pool(&mut self, pool: &[i64]) {
        let mut remaining: Vec<i64> = pool.to_vec();
        while !remaining.is_empty() && self.clock < self.segment.end_time {
            let origin = self.position.coords;
            let ranked = ordering::rank_candidates(
                &remaining,
                self.catalog,
                self.weekday,
                origin.is_valid().then_some(&origin),
            );
            let Some(&next) = ranked.first() else {
                break;
            };
            remaining.retain(|&id| id != next);
            self.try_candidate(next).await;
        }
    }

    /// Leg to the declared destination; zero-length when unresolvable.
    async fn destination_leg(&mut self, kind: EntryKind) {
        let dest = LegPoint::place(self.segment.dest_coords);
        let resolved = self
            .cache
            .resolve_leg(&self.position, &dest, TravelClass::Outstation, self.config)
            .await
            .ok();

        let mut entry = self.blank_entry(kind);
        if let Some(leg) = resolved {
            let mut seconds = leg.duration_seconds;
            if seconds > 0 {
                seconds += self.config.buffer_seconds(self.segment.travel_mode);
            }
            // Clamped at end of day rather than wrapping.
            entry.end_time = clock::add_seconds(self.clock, seconds)
                .unwrap_or_else(|| chrono::NaiveTime::from_hms_opt(23, 59, 59).expect("valid time"));
            entry.distance_km = Some(leg.distance_km);
            entry.travel_seconds = Some(seconds);
        } else {
            entry.distance_km = Some(0.0);
            entry.travel_seconds = Some(0);
        }
        self.clock = entry.end_time;
        self.position = dest;
        self.push(entry);
    }
}

/// Assemble the timeline for one segment.
///
/// `is_final_segment` selects the final-leg kind: the trip's last
/// segment returns to the departure point, every earlier segment
/// transfers to the destination city's hotel.
pub async fn assemble_segment<S: CacheStore>(
    segment: &RouteSegment,
    sets: &CandidateSets,
    catalog: &HotspotCatalog,
    cache: &DistanceCache<S>,
    config: &PlanningConfig,
    is_final_segment: bool,
) -> Result<Vec<TimelineEntry>, AssembleError> {
    let infeasible = AssembleError::SegmentInfeasible { segment_id: segment.id };

    let Some(refresh_end) = clock::add_seconds(segment.start_time, config.refresh_seconds()) else {
        return Err(infeasible);
    };

    // The mandatory refresh plus the baseline return leg must fit, or
    // the segment is infeasible regardless of candidates.
    let source = LegPoint::place(segment.source_coords);
    let dest = LegPoint::place(segment.dest_coords);
    let baseline_return = cache
        .resolve_leg(&source, &dest, TravelClass::Outstation, config)
        .await
        .ok();
    let mut baseline_seconds = baseline_return.map_or(0, |leg| leg.duration_seconds);
    if baseline_seconds > 0 {
        baseline_seconds += config.buffer_seconds(segment.travel_mode);
    }
    match clock::add_seconds(refresh_end, baseline_seconds) {
        Some(earliest_done) if earliest_done <= segment.end_time => {}
        _ => return Err(infeasible),
    }

    let mut assembly = Assembly {
        segment,
        catalog,
        cache,
        config,
        weekday: segment.weekday(),
        clock: segment.start_time,
        position: source,
        visited: std::collections::HashSet::new(),
        entries: Vec::new(),
    };

    let mut refresh = assembly.blank_entry(EntryKind::Refresh);
    refresh.end_time = refresh_end;
    assembly.push(refresh);
    assembly.clock = refresh_end;

    // Non-direct legs tour the source city first; direct legs only pick
    // up hotspots on the way and at the destination end.
    if segment.direct {
        assembly.consume_pool(&sets.via).await;
        assembly.consume_pool(&sets.destination).await;
    } else {
        assembly.consume_pool(&sets.source).await;
        assembly.consume_pool(&sets.destination).await;
        assembly.consume_pool(&sets.via).await;
    }

    // Direct segments carry an explicit travel row for the inter-city
    // hop before the day closes out.
    if segment.direct {
        let dest_leg = LegPoint::place(segment.dest_coords);
        if let Ok(leg) = cache
            .resolve_leg(&assembly.position, &dest_leg, TravelClass::Outstation, config)
            .await
        {
            let mut seconds = leg.duration_seconds;
            if seconds > 0 {
                seconds += config.buffer_seconds(segment.travel_mode);
            }
            if let Some(end) = clock::add_seconds(assembly.clock, seconds) {
                let mut travel = assembly.blank_entry(EntryKind::Travel);
                travel.end_time = end;
                travel.distance_km = Some(leg.distance_km);
                travel.travel_seconds = Some(seconds);
                assembly.push(travel);
                assembly.clock = end;
                assembly.position = dest_leg;
            }
        }
    }

    let final_kind = if is_final_segment {
        EntryKind::Return
    } else {
        EntryKind::HotelTransfer
    };
    assembly.destination_leg(final_kind).await;

    Ok(assembly.entries)
}
