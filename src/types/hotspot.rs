//! Hotspot reference data types

use std::collections::HashMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::Coordinates;

/// Priority sentinel: 0 means "no explicit priority" and ranks after
/// every numbered hotspot. The legacy system encoded this as 9999.
pub const NO_PRIORITY_RANK: i32 = 9999;

/// A point of interest eligible for a sightseeing visit.
///
/// Read-only reference data to the engine; coordinates are immutable
/// (the distance cache relies on this, see `services::distance_cache`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub id: i64,
    pub name: String,
    pub coords: Coordinates,
    /// Time a visit occupies, in minutes.
    pub visit_minutes: i32,
    /// Explicit priority; 0 = none (ranked last).
    pub priority: i32,
    /// Named places this hotspot is reachable from / associated with.
    pub aliases: Vec<String>,
    /// Higher-level "always open" marker: admits on weekdays with no
    /// operating-window rows at all.
    pub always_open: bool,
}

impl Hotspot {
    /// Effective rank for ordering: 0 maps to the legacy sentinel.
    pub fn priority_rank(&self) -> i32 {
        if self.priority == 0 {
            NO_PRIORITY_RANK
        } else {
            self.priority
        }
    }
}

/// One weekday-scoped open/close range for a hotspot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingWindow {
    pub hotspot_id: i64,
    /// 0 = Monday … 6 = Sunday.
    pub weekday: i16,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub closed: bool,
    pub open_all_day: bool,
}

impl OperatingWindow {
    /// Reference data contains inverted ranges (e.g. 21:00–18:00); they
    /// carry no usable information and are skipped everywhere.
    pub fn is_well_formed(&self) -> bool {
        self.open_all_day || self.end > self.start
    }
}

/// In-memory catalog of hotspots and their windows, loaded once per
/// rebuild.
#[derive(Debug, Clone, Default)]
pub struct HotspotCatalog {
    hotspots: HashMap<i64, Hotspot>,
    windows: HashMap<i64, Vec<OperatingWindow>>,
}

impl HotspotCatalog {
    pub fn new(hotspots: Vec<Hotspot>, mut windows: Vec<OperatingWindow>) -> Self {
        let hotspots: HashMap<i64, Hotspot> = hotspots.into_iter().map(|h| (h.id, h)).collect();

        // Stable per-day evaluation order for the admission checker.
        windows.sort_by(|a, b| {
            (a.hotspot_id, a.weekday, a.start).cmp(&(b.hotspot_id, b.weekday, b.start))
        });

        let mut by_hotspot: HashMap<i64, Vec<OperatingWindow>> = HashMap::new();
        for w in windows {
            by_hotspot.entry(w.hotspot_id).or_default().push(w);
        }

        Self { hotspots, windows: by_hotspot }
    }

    pub fn hotspot(&self, id: i64) -> Option<&Hotspot> {
        self.hotspots.get(&id)
    }

    pub fn hotspots(&self) -> impl Iterator<Item = &Hotspot> {
        self.hotspots.values()
    }

    /// All well-formed windows of a hotspot for a weekday.
    pub fn windows_for(&self, hotspot_id: i64, weekday: i16) -> Vec<&OperatingWindow> {
        self.windows
            .get(&hotspot_id)
            .map(|ws| {
                ws.iter()
                    .filter(|w| w.weekday == weekday && w.is_well_formed())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn hotspot(id: i64, priority: i32) -> Hotspot {
        Hotspot {
            id,
            name: format!("Hotspot {id}"),
            coords: Coordinates::new(13.0, 80.0),
            visit_minutes: 60,
            priority,
            aliases: vec!["Chennai".to_string()],
            always_open: false,
        }
    }

    #[test]
    fn test_priority_zero_ranks_last() {
        assert_eq!(hotspot(1, 0).priority_rank(), NO_PRIORITY_RANK);
        assert_eq!(hotspot(1, 3).priority_rank(), 3);
    }

    #[test]
    fn test_inverted_window_not_well_formed() {
        let w = OperatingWindow {
            hotspot_id: 1,
            weekday: 0,
            start: hm(21, 0),
            end: hm(18, 0),
            closed: false,
            open_all_day: false,
        };
        assert!(!w.is_well_formed());
    }

    #[test]
    fn test_catalog_filters_by_weekday_and_shape() {
        let windows = vec![
            OperatingWindow {
                hotspot_id: 1,
                weekday: 1,
                start: hm(9, 0),
                end: hm(17, 0),
                closed: false,
                open_all_day: false,
            },
            OperatingWindow {
                hotspot_id: 1,
                weekday: 2,
                start: hm(9, 0),
                end: hm(17, 0),
                closed: false,
                open_all_day: false,
            },
            // inverted — must be skipped
            OperatingWindow {
                hotspot_id: 1,
                weekday: 1,
                start: hm(21, 0),
                end: hm(18, 0),
                closed: false,
                open_all_day: false,
            },
        ];
        let catalog = HotspotCatalog::new(vec![hotspot(1, 0)], windows);

        assert_eq!(catalog.windows_for(1, 1).len(), 1);
        assert_eq!(catalog.windows_for(1, 2).len(), 1);
        assert!(catalog.windows_for(1, 5).is_empty());
        assert!(catalog.windows_for(99, 1).is_empty());
    }
}
