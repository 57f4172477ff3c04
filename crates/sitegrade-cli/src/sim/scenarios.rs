//! Site scenarios: a terrain, design zones, an entrance and assets.

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sitegrade_core::{AssetSpec, GeometrySpec, RoadNetworkConfig, SitePoint, TerrainSpec, ZoneSpec};
use std::path::Path;

use super::terrain::HillTerrain;

/// Everything `plan_site` needs to grade a site and lay out its roads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteScenario {
    pub name: String,
    pub terrain: TerrainSpec,
    #[serde(default)]
    pub zones: Vec<ZoneSpec>,
    #[serde(default = "default_soil")]
    pub soil: String,
    #[serde(default = "default_true")]
    pub apply_shrink_swell: bool,
    /// Haul distance for costing; the cut/fill centroid distance when absent.
    #[serde(default)]
    pub haul_distance: Option<f64>,
    #[serde(default)]
    pub entrance: Option<SitePoint>,
    #[serde(default)]
    pub assets: Vec<AssetSpec>,
    #[serde(default)]
    pub roads: RoadNetworkConfig,
}

fn default_soil() -> String {
    "loam".to_string()
}

fn default_true() -> bool {
    true
}

impl SiteScenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }
}

/// Half-width of the pad graded around each synthetic asset.
const PAD_HALF_SIZE: f64 = 5.0;

/// Hilly site with an entrance on the south edge and pads around random assets.
pub fn synthetic_site(seed: u64, size: usize) -> SiteScenario {
    let mut rng = StdRng::seed_from_u64(seed);
    let hills = HillTerrain::random(&mut rng, size, 2.0);
    let extent = hills.extent();
    let margin = (PAD_HALF_SIZE * 2.0).min(extent / 4.0);

    let asset_count = rng.random_range(2..=5);
    let assets: Vec<AssetSpec> = (0..asset_count)
        .map(|idx| AssetSpec {
            id: format!("asset-{}", idx + 1),
            x: rng.random_range(margin..extent - margin),
            y: rng.random_range(extent / 2.0..extent - margin),
        })
        .collect();

    let zones = assets
        .iter()
        .enumerate()
        .map(|(idx, asset)| ZoneSpec::BuildingPad {
            geometry: GeometrySpec::Rectangle {
                min: [asset.x - PAD_HALF_SIZE, asset.y - PAD_HALF_SIZE],
                max: [asset.x + PAD_HALF_SIZE, asset.y + PAD_HALF_SIZE],
            },
            target_elevation: hills.elevation(asset.x, asset.y).round(),
            transition_slope: 3.0,
            priority: idx as i32,
        })
        .collect();

    SiteScenario {
        name: format!("synthetic-{seed}"),
        terrain: hills.to_spec(),
        zones,
        soil: default_soil(),
        apply_shrink_swell: true,
        haul_distance: None,
        entrance: Some(SitePoint::new(extent / 2.0, 1.0)),
        assets,
        roads: RoadNetworkConfig::default(),
    }
}
