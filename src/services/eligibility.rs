//! Hotspot eligibility for a route segment
//!
//! Categorizes every active hotspot against a segment's endpoints via
//! normalized place-name comparison, then keeps only hotspots with at
//! least one usable operating window on the segment's weekday.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::types::{Hotspot, HotspotCatalog, RouteSegment};

/// Generic qualifier tokens dropped from place names before comparison,
/// so "Chennai International Airport" and "Chennai" compare equal. The
/// list mirrors the legacy normalizer.
static GENERIC_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "international",
        "domestic",
        "airport",
        "railway",
        "rail",
        "station",
        "stn",
        "junction",
        "jn",
        "central",
        "egmore",
        "terminus",
        "bus",
        "stand",
    ]
    .into_iter()
    .collect()
});

/// Normalize a place name for alias comparison: case-fold, replace
/// punctuation with spaces, drop generic qualifier tokens, collapse
/// whitespace.
pub fn normalize_place_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|token| !GENERIC_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Which end of the segment a hotspot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateClass {
    Source,
    Destination,
    Via,
}

fn alias_matches(hotspot: &Hotspot, target: &str) -> bool {
    let normalized = normalize_place_name(target);
    if normalized.is_empty() {
        return false;
    }
    hotspot
        .aliases
        .iter()
        .any(|alias| normalize_place_name(alias) == normalized)
}

/// Categorize one hotspot against the segment endpoints. A hotspot
/// matching both ends is destination-only so it is never counted twice.
pub fn categorize(hotspot: &Hotspot, source_name: &str, dest_name: &str) -> CandidateClass {
    if alias_matches(hotspot, dest_name) {
        CandidateClass::Destination
    } else if alias_matches(hotspot, source_name) {
        CandidateClass::Source
    } else {
        CandidateClass::Via
    }
}

/// Whether a hotspot can be visited at all on the given weekday.
pub fn open_on_weekday(catalog: &HotspotCatalog, hotspot: &Hotspot, weekday: i16) -> bool {
    if hotspot.always_open {
        return true;
    }
    catalog
        .windows_for(hotspot.id, weekday)
        .iter()
        .any(|w| !w.closed)
}

/// Per-segment candidate pools, unranked. Ids are sorted for a
/// deterministic starting order before ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSets {
    pub source: Vec<i64>,
    pub destination: Vec<i64>,
    pub via: Vec<i64>,
}

impl CandidateSets {
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.destination.is_empty() && self.via.is_empty()
    }
}

/// Compute the segment's eligible candidate pools.
pub fn eligible_candidates(segment: &RouteSegment, catalog: &HotspotCatalog) -> CandidateSets {
    let weekday = segment.weekday();
    let mut sets = CandidateSets::default();

    for hotspot in catalog.hotspots() {
        if !open_on_weekday(catalog, hotspot, weekday) {
            continue;
        }
        match categorize(hotspot, &segment.source_name, &segment.dest_name) {
            CandidateClass::Source => sets.source.push(hotspot.id),
            CandidateClass::Destination => sets.destination.push(hotspot.id),
            CandidateClass::Via => sets.via.push(hotspot.id),
        }
    }

    sets.source.sort_unstable();
    sets.destination.sort_unstable();
    sets.via.sort_unstable();
    sets
}
