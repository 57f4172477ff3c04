//! Collaborators the core requires from its deployment.
//!
//! Components ask for the capabilities they need when they are constructed and
//! fail fast with [`GradingError::CapabilityUnavailable`] if one is missing.

use crate::error::GradingError;
use crate::geometry::{FootprintRasterizer, GeoRasterizer};
use crate::terrain::{FiniteDifferenceSlope, SlopeCalculator};
use crate::Result;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Capabilities {
    pub rasterizer: Option<Arc<dyn FootprintRasterizer>>,
    pub slope: Option<Arc<dyn SlopeCalculator>>,
}

impl Capabilities {
    /// Geometry rasterization via `geo` and finite-difference slope.
    pub fn standard() -> Self {
        Self {
            rasterizer: Some(Arc::new(GeoRasterizer)),
            slope: Some(Arc::new(FiniteDifferenceSlope)),
        }
    }

    pub fn none() -> Self {
        Self {
            rasterizer: None,
            slope: None,
        }
    }

    pub fn require_rasterizer(&self) -> Result<Arc<dyn FootprintRasterizer>> {
        self.rasterizer
            .clone()
            .ok_or(GradingError::CapabilityUnavailable("geometry rasterization"))
    }

    pub fn require_slope(&self) -> Result<Arc<dyn SlopeCalculator>> {
        self.slope
            .clone()
            .ok_or(GradingError::CapabilityUnavailable("slope calculation"))
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("rasterizer", &self.rasterizer.is_some())
            .field("slope", &self.slope.is_some())
            .finish()
    }
}
