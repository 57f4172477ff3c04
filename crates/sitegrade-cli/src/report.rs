//! Run a scenario through the core and collect a serializable report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sitegrade_core::{
    split_assets, AssetRoute, BalancingResult, Capabilities, EarthworkCost, FeatureCollection,
    GradingStatistics, NetworkStats, PostGradingModel, PreGradingModel, RoadNetwork,
    RoadSegment, SoilPropertiesSource, StandardSoils, TerrainStatistics, VolumeCalculator,
    VolumeResult,
};

use crate::sim::scenarios::SiteScenario;

#[derive(Debug, Serialize)]
pub struct SiteReport {
    pub scenario: String,
    pub generated_at: DateTime<Utc>,
    pub terrain: TerrainStatistics,
    pub grading: Option<GradingReport>,
    pub roads: Option<RoadReport>,
}

#[derive(Debug, Serialize)]
pub struct GradingReport {
    pub soil: String,
    pub statistics: GradingStatistics,
    pub volumes: VolumeResult,
    pub costs: EarthworkCost,
    pub balancing: BalancingResult,
}

#[derive(Debug, Serialize)]
pub struct RoadReport {
    pub success: bool,
    pub optimized: bool,
    pub stats: NetworkStats,
    pub routes: Vec<AssetRoute>,
    pub segments: Vec<RoadSegment>,
    pub features: FeatureCollection,
}

/// Grade the site when it has zones and build roads when it has assets.
pub fn run_scenario(scenario: &SiteScenario, optimize: bool) -> anyhow::Result<SiteReport> {
    let capabilities = Capabilities::standard();
    let grid = scenario.terrain.to_grid()?;
    let pre = PreGradingModel::new(grid.clone(), &capabilities)?;
    let terrain = pre.statistics()?;

    let grading = if scenario.zones.is_empty() {
        None
    } else {
        let soil = StandardSoils.require(&scenario.soil)?;
        let mut post = PostGradingModel::new(&pre);
        for zone in &scenario.zones {
            post.add_zone(zone.to_zone()?);
        }
        post.generate_grading()?;
        let mut calculator = VolumeCalculator::from_models(&pre, &post, soil)?;
        let volumes = calculator.calculate_volumes(scenario.apply_shrink_swell);
        let balancing = calculator.calculate_balancing();
        let haul = scenario
            .haul_distance
            .unwrap_or(balancing.optimal_haul_distance);
        let costs = calculator.calculate_costs(&volumes, haul)?;
        Some(GradingReport {
            soil: scenario.soil.clone(),
            statistics: post.statistics(),
            volumes,
            costs,
            balancing,
        })
    };

    let roads = match scenario.entrance {
        Some(entrance) if !scenario.assets.is_empty() => {
            let mut network =
                RoadNetwork::new(grid, entrance, scenario.roads.clone(), &capabilities)?;
            let (positions, ids) = split_assets(&scenario.assets);
            let success = network.generate_network(&positions, &ids, optimize)?;
            Some(RoadReport {
                success,
                optimized: optimize,
                stats: network.network_stats(),
                routes: network.routes().to_vec(),
                segments: network.segments().to_vec(),
                features: network.to_feature_collection(),
            })
        }
        _ => None,
    };

    Ok(SiteReport {
        scenario: scenario.name.clone(),
        generated_at: Utc::now(),
        terrain,
        grading,
        roads,
    })
}

/// Segments whose steepest chord exceeds `max_grade_percent`.
pub fn grade_violations(segments: &[RoadSegment], max_grade_percent: f64) -> Vec<(usize, f64)> {
    segments
        .iter()
        .filter(|segment| segment.max_grade > max_grade_percent + 1e-9)
        .map(|segment| (segment.id, segment.max_grade))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scenarios::synthetic_site;

    #[test]
    fn synthetic_site_reports_grading_and_roads() {
        let scenario = synthetic_site(5, 30);
        let report = run_scenario(&scenario, true).unwrap();
        let grading = report.grading.expect("pads were graded");
        assert!(grading.volumes.cut_volume >= 0.0);
        assert!(grading.volumes.import_volume == 0.0 || grading.volumes.export_volume == 0.0);

        let roads = report.roads.expect("assets were routed");
        assert_eq!(roads.routes.len(), scenario.assets.len());
        let max_grade = scenario.roads.pathfinder.max_grade_percent;
        assert!(grade_violations(&roads.segments, max_grade).is_empty());
    }

    #[test]
    fn terrain_only_scenario_skips_grading_and_roads() {
        let mut scenario = synthetic_site(5, 20);
        scenario.zones.clear();
        scenario.entrance = None;
        let report = run_scenario(&scenario, true).unwrap();
        assert!(report.grading.is_none());
        assert!(report.roads.is_none());
        assert!(report.terrain.valid_cells > 0);
    }
}
