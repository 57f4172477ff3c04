//! Site grading, earthwork volumes and terrain-aware road networks.

pub mod capability;
pub mod error;
pub mod features;
pub mod geometry;
pub mod models;
pub mod nav_graph;
pub mod pathfinding;
pub mod post_grading;
pub mod pre_grading;
pub mod road_network;
pub mod rules;
pub mod soil;
pub mod spatial;
pub mod store;
pub mod terrain;
pub mod volume;

pub use capability::Capabilities;
pub use error::GradingError;
pub use features::{Feature, FeatureCollection, FeatureGeometry};
pub use geometry::{
    CellCoverage, FootprintRasterizer, GeoRasterizer, GeometrySpec, SiteGeometry, SitePoint,
};
pub use models::{split_assets, AssetSpec, TerrainSpec, ZoneSpec};
pub use nav_graph::{GraphConfig, GraphEdge, GraphNode, GraphStats, NavigationGraph};
pub use pathfinding::{AStarPathfinder, Path, PathOutcome, PathPoint, PathfinderConfig};
pub use post_grading::{
    GradingState, GradingStatistics, GradingZone, PostGradingModel, RoadCorridorParams,
    SwaleParams, ZoneKind, DEFAULT_TRANSITION_SLOPE,
};
pub use pre_grading::{ElevationProfile, PreGradingModel, TerrainStatistics, MAX_PROFILE_SAMPLES};
pub use road_network::{
    AssetRoute, NetworkStats, RoadIntersection, RoadNetwork, RoadNetworkConfig, RoadNetworkState,
    RoadSegment,
};
pub use rules::{RoadClass, RoadClassRule, RoadDesignRules};
pub use soil::{SoilProperties, SoilPropertiesSource, StandardSoils};
pub use store::ResultStore;
pub use terrain::{
    Bounds, CoordinateSystem, ElevationGrid, ElevationSummary, FiniteDifferenceSlope,
    GeoTransform, LinearUnit, SlopeCalculator,
};
pub use volume::{
    BalancingResult, CostDatabase, CrossSection, EarthworkCost, VolumeCalculator, VolumeResult,
};

pub type Result<T> = std::result::Result<T, GradingError>;
