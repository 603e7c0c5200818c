//! Route segment types

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{Coordinates, TravelMode};
use crate::defaults;

/// One travel day's leg between two named locations.
///
/// Immutable once the trip is confirmed; the engine never mutates a
/// segment, only its timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSegment {
    pub id: i64,
    pub plan_id: i64,
    /// Position of this segment within the trip (0-based).
    pub seq: i32,
    pub date: NaiveDate,
    pub source_name: String,
    pub dest_name: String,
    /// City coordinates, when the plan-management layer has them.
    pub source_coords: Option<Coordinates>,
    pub dest_coords: Option<Coordinates>,
    /// Fallbacks match the legacy planner's day bounds.
    #[serde(default = "defaults::default_segment_start")]
    pub start_time: NaiveTime,
    #[serde(default = "defaults::default_segment_end")]
    pub end_time: NaiveTime,
    /// No intermediate sightseeing expected around the source city.
    pub direct: bool,
    /// How the party travels between cities on this leg.
    pub travel_mode: TravelMode,
}

impl RouteSegment {
    /// Weekday of this segment's date, Monday-based (0–6) to match the
    /// operating-window rows.
    pub fn weekday(&self) -> i16 {
        self.date.weekday().num_days_from_monday() as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_is_monday_based() {
        // 2026-08-04 is a Tuesday.
        let segment = RouteSegment {
            id: 1,
            plan_id: 1,
            seq: 0,
            date: NaiveDate::from_ymd_opt(2026, 8, 4).unwrap(),
            source_name: "Chennai".to_string(),
            dest_name: "Chennai".to_string(),
            source_coords: None,
            dest_coords: None,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            direct: false,
            travel_mode: TravelMode::Road,
        };
        assert_eq!(segment.weekday(), 1);
    }

    #[test]
    fn test_day_bounds_default_when_omitted() {
        let json = r#"{
            "id": 1, "planId": 1, "seq": 0, "date": "2026-08-04",
            "sourceName": "Chennai", "destName": "Pondicherry",
            "sourceCoords": null, "destCoords": null,
            "direct": false, "travelMode": "road"
        }"#;
        let segment: RouteSegment = serde_json::from_str(json).unwrap();
        assert_eq!(segment.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(segment.end_time, NaiveTime::from_hms_opt(20, 0, 0).unwrap());
    }
}
