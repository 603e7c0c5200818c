//! Geographic calculations
//!
//! Pure distance/duration resolution: haversine, a fixed road-distance
//! correction, and the speed table from the threaded configuration. No
//! side effects; callers decide what an unresolvable pair means.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::settings::ROAD_CORRECTION_FACTOR;
use crate::types::{Coordinates, PlanningConfig, TravelClass};

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeoError {
    /// Missing or invalid coordinates on either end; the pair must be
    /// treated as unreachable, not as a fatal error.
    #[error("unresolvable distance: missing or invalid coordinates")]
    UnresolvableDistance,
}

/// Resolved distance and duration for one leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelEstimate {
    /// Great-circle distance, km.
    pub haversine_km: f64,
    /// Road-corrected distance, km, two decimals.
    pub distance_km: f64,
    /// Speed assumption used, km/h.
    pub speed_kmph: f64,
    /// Travel duration, whole seconds.
    pub duration_seconds: i64,
}

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Resolve distance and duration between two coordinates for a travel
/// class.
pub fn resolve_travel(
    from: &Coordinates,
    to: &Coordinates,
    class: TravelClass,
    config: &PlanningConfig,
) -> Result<TravelEstimate, GeoError> {
    if !from.is_valid() || !to.is_valid() {
        return Err(GeoError::UnresolvableDistance);
    }

    let speed_kmph = config.speed_kmph(class);
    if !speed_kmph.is_finite() || speed_kmph <= 0.0 {
        return Err(GeoError::UnresolvableDistance);
    }

    let haversine = haversine_km(from, to);
    let corrected = haversine * ROAD_CORRECTION_FACTOR;
    let duration_seconds = (corrected / speed_kmph * 3600.0).round() as i64;

    Ok(TravelEstimate {
        haversine_km: haversine,
        distance_km: round2(corrected),
        speed_kmph,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chennai() -> Coordinates {
        Coordinates::new(13.0827, 80.2707)
    }

    fn mahabalipuram() -> Coordinates {
        Coordinates::new(12.6208, 80.1945)
    }

    #[test]
    fn test_haversine_chennai_mahabalipuram() {
        let distance = haversine_km(&chennai(), &mahabalipuram());

        // Chennai to Mahabalipuram is roughly 52 km as the crow flies.
        assert!((distance - 52.0).abs() < 3.0, "got {distance}");
    }

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinates::new(13.0, 80.0);
        assert!(haversine_km(&point, &point).abs() < 0.001);
    }

    #[test]
    fn test_correction_factor_applied() {
        let estimate =
            resolve_travel(&chennai(), &mahabalipuram(), TravelClass::Outstation, &PlanningConfig::default())
                .unwrap();
        let ratio = estimate.distance_km / estimate.haversine_km;
        assert!((ratio - ROAD_CORRECTION_FACTOR).abs() < 0.01);
    }

    #[test]
    fn test_duration_uses_class_speed() {
        // One degree of latitude on a meridian ≈ 111.2 km straight line.
        let from = Coordinates::new(10.0, 76.0);
        let to = Coordinates::new(11.0, 76.0);

        let config = PlanningConfig::default();
        let local = resolve_travel(&from, &to, TravelClass::Local, &config).unwrap();
        let outstation = resolve_travel(&from, &to, TravelClass::Outstation, &config).unwrap();

        assert_eq!(local.distance_km, outstation.distance_km);
        // 40 km/h vs 60 km/h — local takes 1.5x as long.
        let ratio = local.duration_seconds as f64 / outstation.duration_seconds as f64;
        assert!((ratio - 1.5).abs() < 0.01);

        // Whole seconds, no fractional carry.
        let expected = (local.distance_km / 40.0 * 3600.0).round() as i64;
        assert!((local.duration_seconds - expected).abs() <= 1);
    }

    #[test]
    fn test_distance_reported_at_two_decimals() {
        let estimate =
            resolve_travel(&chennai(), &mahabalipuram(), TravelClass::Local, &PlanningConfig::default())
                .unwrap();
        let scaled = estimate.distance_km * 100.0;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_coordinates_are_unresolvable() {
        let missing = Coordinates::new(0.0, 0.0);
        let result =
            resolve_travel(&missing, &chennai(), TravelClass::Local, &PlanningConfig::default());
        assert_eq!(result, Err(GeoError::UnresolvableDistance));

        let result =
            resolve_travel(&chennai(), &missing, TravelClass::Local, &PlanningConfig::default());
        assert_eq!(result, Err(GeoError::UnresolvableDistance));
    }

    #[test]
    fn test_zero_speed_is_unresolvable() {
        let config = PlanningConfig {
            walking_speed_kmph: 0.0,
            ..PlanningConfig::default()
        };
        let result =
            resolve_travel(&chennai(), &mahabalipuram(), TravelClass::Walking, &config);
        assert_eq!(result, Err(GeoError::UnresolvableDistance));
    }
}
