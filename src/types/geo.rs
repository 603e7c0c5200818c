//! Geographic primitives and travel categories

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair.
///
/// The reference data uses `0.0/0.0` for "no coordinates recorded", so a
/// zero pair is treated as missing rather than as a point in the Gulf of
/// Guinea.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when the pair can be fed to the distance resolver.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0
            && !(self.lat == 0.0 && self.lon == 0.0)
    }
}

/// Travel class: selects the speed assumption for a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelClass {
    Local,
    Outstation,
    Walking,
}

impl TravelClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            TravelClass::Local => "local",
            TravelClass::Outstation => "outstation",
            TravelClass::Walking => "walking",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(TravelClass::Local),
            "outstation" => Some(TravelClass::Outstation),
            "walking" => Some(TravelClass::Walking),
            _ => None,
        }
    }
}

/// Travel mode of a route segment's inter-city legs: selects the buffer
/// assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Road,
    Rail,
    Flight,
}

impl TravelMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            TravelMode::Road => "road",
            TravelMode::Rail => "rail",
            TravelMode::Flight => "flight",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "road" => Some(TravelMode::Road),
            "rail" => Some(TravelMode::Rail),
            "flight" => Some(TravelMode::Flight),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates() {
        assert!(Coordinates::new(13.0827, 80.2707).is_valid());
        assert!(Coordinates::new(-33.86, 151.2).is_valid());
    }

    #[test]
    fn test_zero_pair_is_missing() {
        assert!(!Coordinates::new(0.0, 0.0).is_valid());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(!Coordinates::new(91.0, 10.0).is_valid());
        assert!(!Coordinates::new(10.0, 181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 10.0).is_valid());
    }

    #[test]
    fn test_travel_class_round_trip() {
        for class in [TravelClass::Local, TravelClass::Outstation, TravelClass::Walking] {
            assert_eq!(TravelClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(TravelClass::parse("bicycle"), None);
    }
}
