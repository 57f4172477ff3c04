//! Soil properties used for shrink/swell correction.

use crate::error::GradingError;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Bulk behaviour of a soil class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilProperties {
    pub name: String,
    /// Compaction allowance multiplied into fill volume (>= 1.0).
    pub shrink_factor: f64,
    /// Bulking multiplied into cut volume once excavated (>= 1.0).
    pub swell_factor: f64,
    /// In-place density in kg/m^3.
    pub density: f64,
    /// Angle of repose in degrees.
    pub angle_of_repose: f64,
}

impl SoilProperties {
    /// Properties that leave volumes unchanged.
    pub fn neutral() -> Self {
        Self {
            name: "neutral".to_string(),
            shrink_factor: 1.0,
            swell_factor: 1.0,
            density: 1_800.0,
            angle_of_repose: 34.0,
        }
    }
}

/// Lookup of soil properties by soil-type key.
pub trait SoilPropertiesSource: Send + Sync {
    fn properties(&self, soil_type: &str) -> Option<SoilProperties>;

    fn require(&self, soil_type: &str) -> Result<SoilProperties> {
        self.properties(soil_type)
            .ok_or_else(|| GradingError::UnknownSoil(soil_type.to_string()))
    }
}

/// Built-in table of common soil classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardSoils;

impl StandardSoils {
    pub const KEYS: [&'static str; 6] = ["clay", "silt", "loam", "sand", "gravel", "rock"];
}

impl SoilPropertiesSource for StandardSoils {
    fn properties(&self, soil_type: &str) -> Option<SoilProperties> {
        let (shrink_factor, swell_factor, density, angle_of_repose) =
            match soil_type.trim().to_lowercase().as_str() {
                "clay" => (1.15, 1.30, 1_750.0, 25.0),
                "silt" => (1.12, 1.25, 1_650.0, 28.0),
                "loam" => (1.10, 1.20, 1_600.0, 32.0),
                "sand" => (1.08, 1.12, 1_700.0, 34.0),
                "gravel" => (1.05, 1.15, 1_900.0, 38.0),
                "rock" => (1.00, 1.50, 2_600.0, 45.0),
                _ => return None,
            };
        Some(SoilProperties {
            name: soil_type.trim().to_lowercase(),
            shrink_factor,
            swell_factor,
            density,
            angle_of_repose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_soils_cover_every_key() {
        for key in StandardSoils::KEYS {
            let soil = StandardSoils.require(key).unwrap();
            assert!(soil.shrink_factor >= 1.0);
            assert!(soil.swell_factor >= 1.0);
        }
    }

    #[test]
    fn lookup_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(StandardSoils.require(" Clay ").unwrap().name, "clay");
        assert!(matches!(
            StandardSoils.require("peat"),
            Err(GradingError::UnknownSoil(key)) if key == "peat"
        ));
    }
}
