//! Planning configuration
//!
//! Threaded explicitly into the resolver and assembler at call time —
//! never read from ambient state — so tests and callers supply
//! deterministic values.

use serde::{Deserialize, Serialize};

use super::{TravelClass, TravelMode};

/// Road distance over straight-line distance. Contractual legacy
/// constant; changing it is a product decision.
pub const ROAD_CORRECTION_FACTOR: f64 = 1.5;

/// Global scheduling knobs supplied with each planning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanningConfig {
    /// Speed assumptions per travel class, km/h.
    pub local_speed_kmph: f64,
    pub outstation_speed_kmph: f64,
    pub walking_speed_kmph: f64,
    /// Arrival buffers per travel mode, minutes.
    pub road_buffer_minutes: i32,
    pub rail_buffer_minutes: i32,
    pub flight_buffer_minutes: i32,
    /// Mandatory refreshment break at the start of every segment,
    /// minutes.
    pub refresh_minutes: i32,
    /// Ceiling for a full-trip rebuild before it aborts as retryable.
    pub rebuild_timeout_seconds: u64,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            local_speed_kmph: 40.0,
            outstation_speed_kmph: 60.0,
            walking_speed_kmph: 5.0,
            road_buffer_minutes: 15,
            rail_buffer_minutes: 30,
            flight_buffer_minutes: 90,
            refresh_minutes: 60,
            rebuild_timeout_seconds: 30,
        }
    }
}

impl PlanningConfig {
    pub fn speed_kmph(&self, class: TravelClass) -> f64 {
        match class {
            TravelClass::Local => self.local_speed_kmph,
            TravelClass::Outstation => self.outstation_speed_kmph,
            TravelClass::Walking => self.walking_speed_kmph,
        }
    }

    pub fn buffer_seconds(&self, mode: TravelMode) -> i64 {
        let minutes = match mode {
            TravelMode::Road => self.road_buffer_minutes,
            TravelMode::Rail => self.rail_buffer_minutes,
            TravelMode::Flight => self.flight_buffer_minutes,
        };
        minutes as i64 * 60
    }

    pub fn refresh_seconds(&self) -> i64 {
        self.refresh_minutes as i64 * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_speeds() {
        let config = PlanningConfig::default();
        assert_eq!(config.speed_kmph(TravelClass::Local), 40.0);
        assert_eq!(config.speed_kmph(TravelClass::Outstation), 60.0);
    }

    #[test]
    fn test_buffer_lookup_by_mode() {
        let config = PlanningConfig {
            road_buffer_minutes: 10,
            rail_buffer_minutes: 20,
            flight_buffer_minutes: 45,
            ..PlanningConfig::default()
        };
        assert_eq!(config.buffer_seconds(TravelMode::Road), 600);
        assert_eq!(config.buffer_seconds(TravelMode::Rail), 1200);
        assert_eq!(config.buffer_seconds(TravelMode::Flight), 2700);
    }

    #[test]
    fn test_config_deserializes_with_partial_fields() {
        let config: PlanningConfig =
            serde_json::from_str(r#"{"refreshMinutes": 30}"#).unwrap();
        assert_eq!(config.refresh_minutes, 30);
        assert_eq!(config.local_speed_kmph, 40.0);
    }
}
