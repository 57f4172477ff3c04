//! Road design rules for the network builder.

use serde::{Deserialize, Serialize};

/// Functional class of a road segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadClass {
    /// Trunk leaving the entrance.
    Primary,
    /// Branch serving two or more assets.
    Secondary,
    /// Spur to a single asset.
    Access,
}

impl RoadClass {
    pub const ALL: [RoadClass; 3] = [RoadClass::Primary, RoadClass::Secondary, RoadClass::Access];

    pub fn as_str(self) -> &'static str {
        match self {
            RoadClass::Primary => "primary",
            RoadClass::Secondary => "secondary",
            RoadClass::Access => "access",
        }
    }
}

/// Configuration for road geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadDesignRules {
    /// Paved width per class in ground units
    pub classes: Vec<RoadClassRule>,
    /// Width used for a class missing from `classes`
    pub fallback_width: f64,
    /// Shoulder added on each side when estimating earthwork
    pub shoulder_width: f64,
}

impl Default for RoadDesignRules {
    fn default() -> Self {
        Self {
            classes: vec![
                RoadClassRule { class: RoadClass::Primary, width: 7.3 },
                RoadClassRule { class: RoadClass::Secondary, width: 6.0 },
                RoadClassRule { class: RoadClass::Access, width: 4.0 },
            ],
            fallback_width: 4.0,
            shoulder_width: 0.0,
        }
    }
}

impl RoadDesignRules {
    pub fn width_for(&self, class: RoadClass) -> f64 {
        self.classes
            .iter()
            .find(|rule| rule.class == class)
            .map(|rule| rule.width)
            .unwrap_or(self.fallback_width)
    }

    /// Width of the strip regraded for a segment of this class.
    pub fn footprint_width(&self, class: RoadClass) -> f64 {
        self.width_for(class) + 2.0 * self.shoulder_width.max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadClassRule {
    pub class: RoadClass,
    pub width: f64,
}
