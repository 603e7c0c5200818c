//! Timeline entry types

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Kind of a scheduled timeline item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Refreshment break; also used for admission waits (flagged
    /// `allow_break_hours`).
    Refresh,
    Travel,
    Visit,
    /// End-of-day transfer into the destination city's hotel
    /// (non-final segments).
    HotelTransfer,
    /// Final leg back to the trip's departure point (last segment).
    Return,
}

impl EntryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EntryKind::Refresh => "refresh",
            EntryKind::Travel => "travel",
            EntryKind::Visit => "visit",
            EntryKind::HotelTransfer => "hotel_transfer",
            EntryKind::Return => "return",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "refresh" => Some(EntryKind::Refresh),
            "travel" => Some(EntryKind::Travel),
            "visit" => Some(EntryKind::Visit),
            "hotel_transfer" => Some(EntryKind::HotelTransfer),
            "return" => Some(EntryKind::Return),
            _ => None,
        }
    }
}

/// Why a candidate or proposed change was turned down, or why an
/// existing entry is flagged conflicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Hotspot has no usable operating window at the arrival time.
    WindowMiss,
    /// Hotspot is closed for the whole weekday.
    ClosedAllDay,
    /// Admitting the visit would overrun the segment end time.
    SegmentOverrun,
    /// Travel or visit would wrap past midnight.
    CrossesMidnight,
    /// Distance to the hotspot could not be resolved.
    Unreachable,
    /// Hotspot already appears in this segment's timeline.
    AlreadyScheduled,
    /// Hotspot's aliases match neither endpoint of the segment.
    LocationMismatch,
    /// Existing entry overlaps a manually inserted visit.
    OverlapsManualVisit,
}

impl ConflictReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConflictReason::WindowMiss => "window_miss",
            ConflictReason::ClosedAllDay => "closed_all_day",
            ConflictReason::SegmentOverrun => "segment_overrun",
            ConflictReason::CrossesMidnight => "crosses_midnight",
            ConflictReason::Unreachable => "unreachable",
            ConflictReason::AlreadyScheduled => "already_scheduled",
            ConflictReason::LocationMismatch => "location_mismatch",
            ConflictReason::OverlapsManualVisit => "overlaps_manual_visit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "window_miss" => Some(ConflictReason::WindowMiss),
            "closed_all_day" => Some(ConflictReason::ClosedAllDay),
            "segment_overrun" => Some(ConflictReason::SegmentOverrun),
            "crosses_midnight" => Some(ConflictReason::CrossesMidnight),
            "unreachable" => Some(ConflictReason::Unreachable),
            "already_scheduled" => Some(ConflictReason::AlreadyScheduled),
            "location_mismatch" => Some(ConflictReason::LocationMismatch),
            "overlaps_manual_visit" => Some(ConflictReason::OverlapsManualVisit),
            _ => None,
        }
    }
}

/// One scheduled item within a segment's day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    /// Database id; 0 until persisted.
    #[serde(default)]
    pub id: i64,
    pub segment_id: i64,
    /// 1-based position within the segment, contiguous.
    pub ordinal: i32,
    pub kind: EntryKind,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub hotspot_id: Option<i64>,
    /// Road distance of the leg, km, two decimals.
    pub distance_km: Option<f64>,
    /// Travel duration of the leg including buffer, whole seconds.
    pub travel_seconds: Option<i64>,
    pub manually_added: bool,
    /// Wait entry emitted ahead of a visit that opens later.
    pub allow_break_hours: bool,
    pub conflict: bool,
    pub conflict_reason: Option<ConflictReason>,
}

impl TimelineEntry {
    /// Minutes of overlap between this entry and a [start, end) window.
    pub fn overlap_minutes(&self, start: NaiveTime, end: NaiveTime) -> i64 {
        let a0 = self.start_time.min(self.end_time);
        let a1 = self.end_time.max(self.start_time);
        let lo = a0.max(start);
        let hi = a1.min(end);
        (hi - lo).num_minutes().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(start: NaiveTime, end: NaiveTime) -> TimelineEntry {
        TimelineEntry {
            id: 0,
            segment_id: 1,
            ordinal: 1,
            kind: EntryKind::Visit,
            start_time: start,
            end_time: end,
            hotspot_id: Some(7),
            distance_km: None,
            travel_seconds: None,
            manually_added: false,
            allow_break_hours: false,
            conflict: false,
            conflict_reason: None,
        }
    }

    #[test]
    fn test_entry_kind_round_trip() {
        for kind in [
            EntryKind::Refresh,
            EntryKind::Travel,
            EntryKind::Visit,
            EntryKind::HotelTransfer,
            EntryKind::Return,
        ] {
            assert_eq!(EntryKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_overlap_partial() {
        let e = entry(hm(9, 0), hm(10, 0));
        assert_eq!(e.overlap_minutes(hm(9, 30), hm(10, 30)), 30);
    }

    #[test]
    fn test_overlap_adjacent_is_zero() {
        let e = entry(hm(9, 0), hm(10, 0));
        assert_eq!(e.overlap_minutes(hm(10, 0), hm(11, 0)), 0);
    }

    #[test]
    fn test_overlap_disjoint_is_zero() {
        let e = entry(hm(9, 0), hm(10, 0));
        assert_eq!(e.overlap_minutes(hm(12, 0), hm(13, 0)), 0);
    }
}
