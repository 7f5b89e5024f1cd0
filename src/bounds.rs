//! Safety bounds for traversal and estimation
//!
//! The catalog is hand-curated and can contain cycles or gaps, so every
//! traversal and estimate runs under numeric limits derived here. The check
//! functions are pure: same bounds and inputs always yield the same status.
//! They are consulted, not enforced — callers decide how to react.

use std::collections::HashMap;
use std::fmt;

use crate::models::BuildingKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsStatus {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for BoundsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundsStatus::Ok => write!(f, "OK"),
            BoundsStatus::Warning => write!(f, "WARNING"),
            BoundsStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of a count check, with enough context to report on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountCheck {
    pub status: BoundsStatus,
    pub limit: u64,
    pub calculated: u64,
}

/// Named numeric thresholds used by every bounded traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyBounds {
    /// Maximum dependency depth per trace.
    pub max_depth: usize,
    /// Shared iteration budget per trace call.
    pub max_iterations: u64,
    /// Per-building limit = observed count x this multiplier.
    pub per_building_multiplier: f64,
    /// Flat limit for buildings never observed in a play-through.
    pub default_per_building_limit: u64,
    /// Ceiling on the total building count of an estimate.
    pub total_building_limit: u64,
    /// Highest production rate considered realistic, units per minute.
    pub max_rate_per_minute: f64,
    /// Fraction of a limit at which checks start returning WARNING.
    pub warning_threshold: f64,
    /// Per-building counts observed in a reference play-through, keyed by
    /// lowercased building name. Empty when no save data is available.
    pub observed: HashMap<String, u64>,
}

impl Default for SafetyBounds {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_iterations: 1000,
            per_building_multiplier: 3.0,
            default_per_building_limit: 50,
            total_building_limit: 2000,
            max_rate_per_minute: 1000.0,
            warning_threshold: 0.8,
            observed: HashMap::new(),
        }
    }
}

impl SafetyBounds {
    /// Derive bounds from empirical per-building counts when available,
    /// falling back to the conservative defaults for everything else.
    pub fn derive(observed: Option<HashMap<String, u64>>, defaults: SafetyBounds) -> Self {
        Self {
            observed: observed.unwrap_or_default(),
            ..defaults
        }
    }

    /// Safety limit for one building type: observed count times the
    /// multiplier when the building was seen in the reference play-through,
    /// the flat default otherwise.
    pub fn building_limit(&self, building: &BuildingKey) -> u64 {
        match self.observed.get(&building.name.to_lowercase()) {
            Some(&count) if count > 0 => (count as f64 * self.per_building_multiplier) as u64,
            _ => self.default_per_building_limit,
        }
    }

    /// Check a calculated count for one building type against its limit.
    pub fn check_count(&self, building: &BuildingKey, calculated: u64) -> CountCheck {
        let limit = self.building_limit(building);
        CountCheck {
            status: self.threshold_status(calculated as f64, limit as f64),
            limit,
            calculated,
        }
    }

    /// Check the total building count of an estimate against the global
    /// ceiling.
    pub fn check_total(&self, calculated: u64) -> CountCheck {
        CountCheck {
            status: self.threshold_status(calculated as f64, self.total_building_limit as f64),
            limit: self.total_building_limit,
            calculated,
        }
    }

    /// Check a production rate (units per minute) against the realistic
    /// maximum.
    pub fn check_rate(&self, rate_per_minute: f64) -> BoundsStatus {
        self.threshold_status(rate_per_minute, self.max_rate_per_minute)
    }

    // ERROR above the limit, WARNING inside [threshold * limit, limit].
    fn threshold_status(&self, calculated: f64, limit: f64) -> BoundsStatus {
        if calculated > limit {
            BoundsStatus::Error
        } else if calculated >= self.warning_threshold * limit {
            BoundsStatus::Warning
        } else {
            BoundsStatus::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds_with(observed: &[(&str, u64)]) -> SafetyBounds {
        let map = observed
            .iter()
            .map(|(name, count)| (name.to_lowercase(), *count))
            .collect();
        SafetyBounds::derive(Some(map), SafetyBounds::default())
    }

    #[test]
    fn observed_count_scales_by_multiplier() {
        let bounds = bounds_with(&[("Well", 40)]);
        assert_eq!(bounds.building_limit(&BuildingKey::new("Well", "Master")), 120);
    }

    #[test]
    fn unseen_building_gets_flat_default() {
        let bounds = bounds_with(&[("Well", 40)]);
        let key = BuildingKey::new("Bakery", "Master");
        assert_eq!(bounds.building_limit(&key), 50);
    }

    #[test]
    fn count_check_thresholds() {
        let bounds = bounds_with(&[("Well", 40)]); // limit 120, warning at 96
        let well = BuildingKey::new("Well", "Master");

        assert_eq!(bounds.check_count(&well, 10).status, BoundsStatus::Ok);
        assert_eq!(bounds.check_count(&well, 95).status, BoundsStatus::Ok);
        assert_eq!(bounds.check_count(&well, 96).status, BoundsStatus::Warning);
        assert_eq!(bounds.check_count(&well, 120).status, BoundsStatus::Warning);
        assert_eq!(bounds.check_count(&well, 121).status, BoundsStatus::Error);
    }

    #[test]
    fn checks_are_pure() {
        let bounds = bounds_with(&[("Well", 40)]);
        let well = BuildingKey::new("Well", "Master");
        assert_eq!(bounds.check_count(&well, 96), bounds.check_count(&well, 96));
    }

    #[test]
    fn total_check_uses_global_ceiling() {
        let bounds = SafetyBounds::default(); // ceiling 2000, warning at 1600
        assert_eq!(bounds.check_total(1000).status, BoundsStatus::Ok);
        assert_eq!(bounds.check_total(1800).status, BoundsStatus::Warning);
        assert_eq!(bounds.check_total(2001).status, BoundsStatus::Error);
    }

    #[test]
    fn rate_check_against_realistic_maximum() {
        let bounds = SafetyBounds::default(); // 1000/min, warning at 800
        assert_eq!(bounds.check_rate(100.0), BoundsStatus::Ok);
        assert_eq!(bounds.check_rate(900.0), BoundsStatus::Warning);
        assert_eq!(bounds.check_rate(1500.0), BoundsStatus::Error);
    }
}
