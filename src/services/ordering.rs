//! Candidate ordering
//!
//! Ranks a candidate pool into the visiting order the assembler tries:
//! explicit priority first (0 = no priority, ranked last), then
//! closing-time urgency, then proximity, then id. These rules are
//! contractual: a hotspot closing sooner must be attempted before one
//! that stays open longer even at equal priority.

use std::cmp::Ordering;

use crate::services::{geo, opening_hours};
use crate::types::settings::ROAD_CORRECTION_FACTOR;
use crate::types::{Coordinates, HotspotCatalog};

/// Rank candidates for the visiting order. `from` is the current
/// position; candidates without usable coordinates rank as distance 0,
/// matching the legacy scorer.
pub fn rank_candidates(
    ids: &[i64],
    catalog: &HotspotCatalog,
    weekday: i16,
    from: Option<&Coordinates>,
) -> Vec<i64> {
    let mut keyed: Vec<(i32, i64, f64, i64)> = ids
        .iter()
        .filter_map(|&id| catalog.hotspot(id))
        .map(|hotspot| {
            let windows = catalog.windows_for(hotspot.id, weekday);
            let closes = opening_hours::earliest_close_seconds(&windows, hotspot.always_open);
            let distance = match from {
                Some(origin) if origin.is_valid() && hotspot.coords.is_valid() => {
                    geo::haversine_km(origin, &hotspot.coords) * ROAD_CORRECTION_FACTOR
                }
                _ => 0.0,
            };
            (hotspot.priority_rank(), closes, distance, hotspot.id)
        })
        .collect();

    keyed.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(a.1.cmp(&b.1))
            .then(a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
            .then(a.3.cmp(&b.3))
    });

    keyed.into_iter().map(|(_, _, _, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hotspot, OperatingWindow};
    use chrono::NaiveTime;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn hotspot(id: i64, priority: i32, coords: Coordinates) -> Hotspot {
        Hotspot {
            id,
            name: format!("Hotspot {id}"),
            coords,
            visit_minutes: 60,
            priority,
            aliases: vec!["Chennai".to_string()],
            always_open: false,
        }
    }

    fn window(hotspot_id: i64, end: NaiveTime) -> OperatingWindow {
        OperatingWindow {
            hotspot_id,
            weekday: 1,
            start: hm(8, 0),
            end,
            closed: false,
            open_all_day: false,
        }
    }

    fn near() -> Coordinates {
        Coordinates::new(13.00, 80.00)
    }

    #[test]
    fn test_priority_zero_ranks_last() {
        let catalog = HotspotCatalog::new(
            vec![
                hotspot(1, 0, near()),
                hotspot(2, 5, near()),
                hotspot(3, 1, near()),
            ],
            vec![window(1, hm(18, 0)), window(2, hm(18, 0)), window(3, hm(18, 0))],
        );
        let order = rank_candidates(&[1, 2, 3], &catalog, 1, None);
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_earliest_closing_breaks_priority_tie() {
        let catalog = HotspotCatalog::new(
            vec![hotspot(1, 2, near()), hotspot(2, 2, near())],
            vec![window(1, hm(19, 0)), window(2, hm(16, 30))],
        );
        // Hotspot 2 closes sooner, so it must be attempted first.
        let order = rank_candidates(&[1, 2], &catalog, 1, None);
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn test_distance_breaks_closing_tie() {
        let origin = Coordinates::new(13.0827, 80.2707);
        let close_by = Coordinates::new(13.05, 80.25);
        let far_away = Coordinates::new(9.92, 78.12);

        let catalog = HotspotCatalog::new(
            vec![hotspot(1, 1, far_away), hotspot(2, 1, close_by)],
            vec![window(1, hm(18, 0)), window(2, hm(18, 0))],
        );
        let order = rank_candidates(&[1, 2], &catalog, 1, Some(&origin));
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn test_id_is_final_tie_break() {
        let catalog = HotspotCatalog::new(
            vec![hotspot(7, 0, near()), hotspot(3, 0, near())],
            vec![window(7, hm(18, 0)), window(3, hm(18, 0))],
        );
        let order = rank_candidates(&[7, 3], &catalog, 1, None);
        assert_eq!(order, vec![3, 7]);
    }

    #[test]
    fn test_ranking_is_deterministic_over_input_order() {
        let catalog = HotspotCatalog::new(
            vec![
                hotspot(1, 0, near()),
                hotspot(2, 3, near()),
                hotspot(3, 3, near()),
                hotspot(4, 1, near()),
            ],
            vec![
                window(1, hm(18, 0)),
                window(2, hm(12, 0)),
                window(3, hm(18, 0)),
                window(4, hm(18, 0)),
            ],
        );
        let forward = rank_candidates(&[1, 2, 3, 4], &catalog, 1, None);
        let reversed = rank_candidates(&[4, 3, 2, 1], &catalog, 1, None);
        assert_eq!(forward, reversed);
        assert_eq!(forward, vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_unknown_ids_dropped() {
        let catalog = HotspotCatalog::new(vec![hotspot(1, 0, near())], vec![window(1, hm(18, 0))]);
        assert_eq!(rank_candidates(&[1, 99], &catalog, 1, None), vec![1]);
    }
}
