//! Road network from an entrance to a set of assets.
//!
//! Each asset gets a grade-constrained search from the entrance. With
//! `optimize`, the union of those paths is reduced to a minimum spanning tree
//! so shared approaches become one segment; the tree is then split into
//! classified segments at the entrance, the assets and every fork.

use crate::capability::Capabilities;
use crate::error::GradingError;
use crate::features::{Feature, FeatureCollection, FeatureGeometry};
use crate::geometry::{FootprintRasterizer, SiteGeometry, SitePoint};
use crate::nav_graph::{GraphConfig, GraphStats, NavigationGraph};
use crate::pathfinding::{AStarPathfinder, Path, PathOutcome, PathPoint, PathfinderConfig};
use crate::rules::{RoadClass, RoadDesignRules};
use crate::spatial::distance_to_segment;
use crate::terrain::{Bounds, ElevationGrid};
use crate::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadNetworkConfig {
    pub graph: GraphConfig,
    pub pathfinder: PathfinderConfig,
    pub rules: RoadDesignRules,
    /// Worker threads for the per-asset searches; 1 searches inline.
    pub search_threads: usize,
    /// Area covered by the navigation graph; the terrain bounds when absent.
    pub graph_bounds: Option<Bounds>,
}

impl Default for RoadNetworkConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            pathfinder: PathfinderConfig::default(),
            rules: RoadDesignRules::default(),
            search_threads: 1,
            graph_bounds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadNetworkState {
    Configured,
    Built,
    Failed,
}

/// Per-asset search diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRoute {
    pub asset_id: String,
    pub position: SitePoint,
    pub node_id: usize,
    pub reachable: bool,
    pub path_length: Option<f64>,
    pub edge_count: usize,
    pub nodes_expanded: usize,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub id: usize,
    pub class: RoadClass,
    /// Centerline after smoothing.
    pub points: Vec<PathPoint>,
    /// Graph nodes the segment follows.
    pub node_ids: Vec<usize>,
    pub length: f64,
    pub width: f64,
    /// Steepest chord of the smoothed centerline, not of the raw graph edges.
    pub max_grade: f64,
    /// Length-weighted mean grade, percent.
    pub avg_grade: f64,
    /// Cubic yards.
    pub cut_volume: f64,
    pub fill_volume: f64,
    /// Assets reached through this segment.
    pub assets: Vec<String>,
}

/// A tree node where three or more segments meet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadIntersection {
    pub id: usize,
    pub node_id: usize,
    pub x: f64,
    pub y: f64,
    pub elevation: f64,
    pub segment_ids: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub segment_count: usize,
    pub intersection_count: usize,
    pub total_length: f64,
    pub total_area: f64,
    pub total_cut_volume: f64,
    pub total_fill_volume: f64,
    pub total_volume: f64,
    pub count_by_class: BTreeMap<RoadClass, usize>,
    pub length_by_class: BTreeMap<RoadClass, f64>,
    pub max_grade: f64,
    pub avg_grade: f64,
    /// Distinct graph edges covered by the network.
    pub graph_edges_used: usize,
    pub unreachable_assets: usize,
}

pub struct RoadNetwork {
    terrain: ElevationGrid,
    capabilities: Capabilities,
    rasterizer: Arc<dyn FootprintRasterizer>,
    entrance: SitePoint,
    config: RoadNetworkConfig,
    pathfinder: AStarPathfinder,
    state: RoadNetworkState,
    entrance_node: Option<usize>,
    graph_stats: Option<GraphStats>,
    routes: Vec<AssetRoute>,
    segments: Vec<RoadSegment>,
    intersections: Vec<RoadIntersection>,
    graph_edges_used: usize,
}

impl RoadNetwork {
    pub fn new(
        terrain: ElevationGrid,
        entrance: SitePoint,
        config: RoadNetworkConfig,
        capabilities: &Capabilities,
    ) -> Result<Self> {
        let rasterizer = capabilities.require_rasterizer()?;
        capabilities.require_slope()?;
        terrain.require_projected("road network")?;
        if !entrance.is_finite() {
            return Err(GradingError::validation("entrance must be finite"));
        }
        let pathfinder = AStarPathfinder::new(config.pathfinder.clone())?;
        Ok(Self {
            terrain,
            capabilities: capabilities.clone(),
            rasterizer,
            entrance,
            config,
            pathfinder,
            state: RoadNetworkState::Configured,
            entrance_node: None,
            graph_stats: None,
            routes: Vec::new(),
            segments: Vec::new(),
            intersections: Vec::new(),
            graph_edges_used: 0,
        })
    }

    pub fn state(&self) -> RoadNetworkState {
        self.state
    }

    pub fn config(&self) -> &RoadNetworkConfig {
        &self.config
    }

    pub fn entrance(&self) -> SitePoint {
        self.entrance
    }

    pub fn entrance_node(&self) -> Option<usize> {
        self.entrance_node
    }

    pub fn graph_stats(&self) -> Option<&GraphStats> {
        self.graph_stats.as_ref()
    }

    pub fn routes(&self) -> &[AssetRoute] {
        &self.routes
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    pub fn intersections(&self) -> &[RoadIntersection] {
        &self.intersections
    }

    /// Build the network. `Ok(false)` when any asset cannot be reached under
    /// the grade limit; see [`routes`](Self::routes) for the per-asset detail.
    pub fn generate_network(
        &mut self,
        asset_positions: &[SitePoint],
        asset_ids: &[String],
        optimize: bool,
    ) -> Result<bool> {
        self.entrance_node = None;
        self.graph_stats = None;
        self.routes.clear();
        self.segments.clear();
        self.intersections.clear();
        self.graph_edges_used = 0;

        match self.build(asset_positions, asset_ids, optimize) {
            Ok(success) => {
                self.state = if success {
                    RoadNetworkState::Built
                } else {
                    RoadNetworkState::Failed
                };
                Ok(success)
            }
            Err(err) => {
                self.state = RoadNetworkState::Failed;
                Err(err)
            }
        }
    }

    fn build(&mut self, asset_positions: &[SitePoint], asset_ids: &[String], optimize: bool) -> Result<bool> {
        if asset_positions.len() != asset_ids.len() {
            return Err(GradingError::validation(format!(
                "{} asset positions but {} asset ids",
                asset_positions.len(),
                asset_ids.len()
            )));
        }

        let mut graph = NavigationGraph::new(
            self.terrain.clone(),
            self.config.graph.clone(),
            &self.capabilities,
        )?;
        graph.build_grid_graph(self.config.graph_bounds.unwrap_or(self.terrain.bounds()))?;
        let entrance = graph.inject_point(self.entrance.x, self.entrance.y)?;
        let asset_nodes = asset_positions
            .iter()
            .map(|p| graph.inject_point(p.x, p.y))
            .collect::<Result<Vec<_>>>()?;
        self.entrance_node = Some(entrance);
        self.graph_stats = Some(graph.graph_stats());

        let outcomes = self.search_all(&graph, entrance, &asset_nodes)?;
        self.routes = outcomes
            .iter()
            .enumerate()
            .map(|(idx, outcome)| self.route_for(idx, outcome, asset_positions, asset_ids, &asset_nodes))
            .collect();

        let unreachable = self.routes.iter().filter(|r| !r.reachable).count();
        if unreachable > 0 {
            tracing::warn!(
                unreachable,
                assets = asset_ids.len(),
                "road network incomplete: assets unreachable under grade limit"
            );
            return Ok(false);
        }
        let paths: Vec<Path> = outcomes.into_iter().filter_map(PathOutcome::into_path).collect();

        if optimize {
            self.assemble_tree(&graph, entrance, &asset_nodes, asset_ids, &paths);
        } else {
            for (idx, path) in paths.iter().enumerate() {
                if path.points.len() < 2 {
                    continue;
                }
                let segment = self.make_segment(
                    &graph,
                    self.segments.len(),
                    RoadClass::Primary,
                    path.node_ids.clone(),
                    path.points.clone(),
                    vec![asset_ids[idx].clone()],
                );
                self.segments.push(segment);
            }
            self.graph_edges_used = paths.iter().map(Path::edge_count).sum();
        }

        tracing::info!(
            segments = self.segments.len(),
            intersections = self.intersections.len(),
            optimize,
            "road network built"
        );
        Ok(true)
    }

    fn search_all(
        &self,
        graph: &NavigationGraph,
        entrance: usize,
        assets: &[usize],
    ) -> Result<Vec<PathOutcome>> {
        let search = |goal: &usize| self.pathfinder.find_path(graph, entrance, *goal);
        let threads = self.config.search_threads.max(1);
        if threads == 1 || assets.len() < 2 {
            return assets.iter().map(search).collect();
        }
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| assets.par_iter().map(search).collect()),
            Err(err) => {
                tracing::warn!("search pool unavailable, searching inline: {}", err);
                assets.iter().map(search).collect()
            }
        }
    }

    fn route_for(
        &self,
        idx: usize,
        outcome: &PathOutcome,
        positions: &[SitePoint],
        ids: &[String],
        nodes: &[usize],
    ) -> AssetRoute {
        let (reachable, path_length, edge_count, reason) = match outcome {
            PathOutcome::Found(path) => (true, Some(path.length), path.edge_count(), None),
            PathOutcome::Unreachable { .. } => (
                false,
                None,
                0,
                Some(format!(
                    "no route within the {}% grade limit",
                    self.config.pathfinder.max_grade_percent
                )),
            ),
            PathOutcome::ExpansionLimit { nodes_expanded } => (
                false,
                None,
                0,
                Some(format!("search stopped after {nodes_expanded} expansions")),
            ),
        };
        AssetRoute {
            asset_id: ids[idx].clone(),
            position: positions[idx],
            node_id: nodes[idx],
            reachable,
            path_length,
            edge_count,
            nodes_expanded: outcome.nodes_expanded(),
            reason,
        }
    }

    fn assemble_tree(
        &mut self,
        graph: &NavigationGraph,
        entrance: usize,
        asset_nodes: &[usize],
        asset_ids: &[String],
        paths: &[Path],
    ) {
        let adjacency = spanning_tree(graph, entrance, asset_nodes, paths);
        self.graph_edges_used = adjacency.values().map(Vec::len).sum::<usize>() / 2;

        let mut own_assets: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, node) in asset_nodes.iter().enumerate() {
            own_assets.entry(*node).or_default().push(idx);
        }

        // Root the tree at the entrance.
        let mut order = vec![entrance];
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut visited: HashSet<usize> = HashSet::from([entrance]);
        let mut queue = VecDeque::from([entrance]);
        while let Some(node) = queue.pop_front() {
            for &next in adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
                if visited.insert(next) {
                    children.entry(node).or_default().push(next);
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }

        let mut served: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        for &node in order.iter().rev() {
            let mut set: BTreeSet<usize> = own_assets.get(&node).cloned().unwrap_or_default().into_iter().collect();
            for child in children.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(child_set) = served.get(child) {
                    set.extend(child_set.iter().copied());
                }
            }
            served.insert(node, set);
        }

        let degree = |node: usize| adjacency.get(&node).map(Vec::len).unwrap_or(0);
        let significant =
            |node: usize| node == entrance || own_assets.contains_key(&node) || degree(node) != 2;

        let total_assets = asset_nodes.len();
        for &start in &order {
            if !significant(start) {
                continue;
            }
            for &child in children.get(&start).map(Vec::as_slice).unwrap_or(&[]) {
                let mut chain = vec![start, child];
                let mut cursor = child;
                while !significant(cursor) {
                    let Some(&next) = children.get(&cursor).and_then(|c| c.first()) else {
                        break;
                    };
                    chain.push(next);
                    cursor = next;
                }

                let assets_served = served.get(&child).cloned().unwrap_or_default();
                let class = if start == entrance || assets_served.len() == total_assets {
                    RoadClass::Primary
                } else if assets_served.len() >= 2 {
                    RoadClass::Secondary
                } else {
                    RoadClass::Access
                };
                let points = self.chain_points(graph, &chain);
                let names = assets_served.iter().map(|idx| asset_ids[*idx].clone()).collect();
                let segment =
                    self.make_segment(graph, self.segments.len(), class, chain, points, names);
                self.segments.push(segment);
            }
        }

        for &node in &order {
            if degree(node) < 3 {
                continue;
            }
            let Some(graph_node) = graph.node(node) else {
                continue;
            };
            let segment_ids = self
                .segments
                .iter()
                .filter(|s| s.node_ids.first() == Some(&node) || s.node_ids.last() == Some(&node))
                .map(|s| s.id)
                .collect();
            self.intersections.push(RoadIntersection {
                id: self.intersections.len(),
                node_id: node,
                x: graph_node.x,
                y: graph_node.y,
                elevation: graph_node.elevation,
                segment_ids,
            });
        }
    }

    fn chain_points(&self, graph: &NavigationGraph, chain: &[usize]) -> Vec<PathPoint> {
        let kept: Vec<usize> = if self.config.pathfinder.smoothing_enabled {
            self.pathfinder
                .smooth(graph, chain)
                .into_iter()
                .map(|idx| chain[idx])
                .collect()
        } else {
            chain.to_vec()
        };
        kept.iter()
            .filter_map(|id| graph.node(*id))
            .map(|node| PathPoint {
                x: node.x,
                y: node.y,
                elevation: node.elevation,
            })
            .collect()
    }

    fn make_segment(
        &self,
        graph: &NavigationGraph,
        id: usize,
        class: RoadClass,
        node_ids: Vec<usize>,
        points: Vec<PathPoint>,
        assets: Vec<String>,
    ) -> RoadSegment {
        let mut length = 0.0;
        let mut max_grade: f64 = 0.0;
        let mut weighted_grade = 0.0;
        for pair in points.windows(2) {
            let distance = graph
                .terrain()
                .ground_distance(pair[0].x, pair[0].y, pair[1].x, pair[1].y);
            if distance <= 0.0 {
                continue;
            }
            let grade = (pair[1].elevation - pair[0].elevation).abs() / distance * 100.0;
            length += distance;
            max_grade = max_grade.max(grade);
            weighted_grade += grade * distance;
        }
        let width = self.config.rules.width_for(class);
        let (cut_volume, fill_volume) =
            self.segment_earthwork(&points, self.config.rules.footprint_width(class));
        RoadSegment {
            id,
            class,
            points,
            node_ids,
            length,
            width,
            max_grade,
            avg_grade: if length > 0.0 { weighted_grade / length } else { 0.0 },
            cut_volume,
            fill_volume,
            assets,
        }
    }

    /// Cut and fill (cubic yards) to bring the strip under a centerline to the
    /// straight grade between its vertices.
    fn segment_earthwork(&self, points: &[PathPoint], width: f64) -> (f64, f64) {
        if points.len() < 2 || width <= 0.0 {
            return (0.0, 0.0);
        }
        let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
        let Ok(centerline) = SiteGeometry::line(&coords) else {
            return (0.0, 0.0);
        };
        let (cell_w, cell_h) = self.terrain.cell_size_ground();
        let cell_area = cell_w * cell_h;

        let mut cut = 0.0;
        let mut fill = 0.0;
        for cell in self
            .rasterizer
            .coverage(&centerline, &self.terrain, width / 2.0, 0.0)
            .into_iter()
            .filter(|cell| cell.edge_distance <= 0.0)
        {
            let Some(existing) = self.terrain.value(cell.row, cell.col) else {
                continue;
            };
            let (x, y) = self.terrain.cell_center(cell.row, cell.col);
            let design = points
                .windows(2)
                .map(|pair| {
                    let (offset, t) =
                        distance_to_segment(x, y, pair[0].x, pair[0].y, pair[1].x, pair[1].y);
                    (offset, pair[0].elevation + t * (pair[1].elevation - pair[0].elevation))
                })
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, elevation)| elevation)
                .unwrap_or(existing);
            let diff = design - existing;
            if diff > 0.0 {
                fill += diff * cell_area;
            } else {
                cut += -diff * cell_area;
            }
        }
        let unit = self.terrain.linear_unit();
        (unit.to_cubic_yards(cut), unit.to_cubic_yards(fill))
    }

    pub fn network_stats(&self) -> NetworkStats {
        let mut count_by_class: BTreeMap<RoadClass, usize> = BTreeMap::new();
        let mut length_by_class: BTreeMap<RoadClass, f64> = BTreeMap::new();
        for class in RoadClass::ALL {
            count_by_class.insert(class, 0);
            length_by_class.insert(class, 0.0);
        }

        let mut total_length = 0.0;
        let mut total_area = 0.0;
        let mut total_cut_volume = 0.0;
        let mut total_fill_volume = 0.0;
        let mut max_grade: f64 = 0.0;
        let mut weighted_grade = 0.0;
        for segment in &self.segments {
            *count_by_class.entry(segment.class).or_default() += 1;
            *length_by_class.entry(segment.class).or_default() += segment.length;
            total_length += segment.length;
            total_area += segment.length * segment.width;
            total_cut_volume += segment.cut_volume;
            total_fill_volume += segment.fill_volume;
            max_grade = max_grade.max(segment.max_grade);
            weighted_grade += segment.avg_grade * segment.length;
        }

        NetworkStats {
            segment_count: self.segments.len(),
            intersection_count: self.intersections.len(),
            total_length,
            total_area,
            total_cut_volume,
            total_fill_volume,
            total_volume: total_cut_volume + total_fill_volume,
            count_by_class,
            length_by_class,
            max_grade,
            avg_grade: if total_length > 0.0 {
                weighted_grade / total_length
            } else {
                0.0
            },
            graph_edges_used: self.graph_edges_used,
            unreachable_assets: self.routes.iter().filter(|r| !r.reachable).count(),
        }
    }

    /// Segments, intersections, the entrance and asset endpoints as map features.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let mut features = Vec::new();
        for segment in &self.segments {
            let coordinates = segment
                .points
                .iter()
                .map(|p| [p.x, p.y, p.elevation])
                .collect();
            features.push(
                Feature::new(FeatureGeometry::LineString { coordinates })
                    .with_property("kind", "road_segment")
                    .with_property("id", segment.id)
                    .with_property("class", segment.class.as_str())
                    .with_property("length", segment.length)
                    .with_property("width", segment.width)
                    .with_property("max_grade", segment.max_grade)
                    .with_property("avg_grade", segment.avg_grade)
                    .with_property("cut_volume", segment.cut_volume)
                    .with_property("fill_volume", segment.fill_volume)
                    .with_property("assets", segment.assets.clone()),
            );
        }
        for intersection in &self.intersections {
            features.push(
                Feature::new(FeatureGeometry::Point {
                    coordinates: [intersection.x, intersection.y, intersection.elevation],
                })
                .with_property("kind", "intersection")
                .with_property("id", intersection.id)
                .with_property("segments", intersection.segment_ids.clone()),
            );
        }
        if let Some(elevation) = self.terrain.sample(self.entrance.x, self.entrance.y) {
            features.push(
                Feature::new(FeatureGeometry::Point {
                    coordinates: [self.entrance.x, self.entrance.y, elevation],
                })
                .with_property("kind", "entrance"),
            );
        }
        for route in &self.routes {
            let elevation = self
                .terrain
                .sample(route.position.x, route.position.y)
                .unwrap_or(f64::NAN);
            features.push(
                Feature::new(FeatureGeometry::Point {
                    coordinates: [route.position.x, route.position.y, elevation],
                })
                .with_property("kind", "asset")
                .with_property("asset_id", route.asset_id.clone())
                .with_property("reachable", route.reachable),
            );
        }
        FeatureCollection::new(features)
    }
}

/// Kruskal over the union of path edges, cheapest first with discovery order
/// breaking ties, then pruned of leaves that are neither the entrance nor an asset.
fn spanning_tree(
    graph: &NavigationGraph,
    entrance: usize,
    asset_nodes: &[usize],
    paths: &[Path],
) -> BTreeMap<usize, Vec<usize>> {
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    let mut candidates: Vec<(f64, usize, usize, usize)> = Vec::new();
    for path in paths {
        for (a, b) in path.edges() {
            let key = (a.min(b), a.max(b));
            if seen.insert(key) {
                let cost = graph.edge(a, b).map(|e| e.cost).unwrap_or(f64::INFINITY);
                candidates.push((cost, candidates.len(), key.0, key.1));
            }
        }
    }
    candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

    let mut components = UnionFind::new(graph.nodes().len());
    let mut adjacency: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (_, _, a, b) in candidates {
        if components.union(a, b) {
            adjacency.entry(a).or_default().push(b);
            adjacency.entry(b).or_default().push(a);
        }
    }

    let terminals: HashSet<usize> = asset_nodes.iter().copied().chain([entrance]).collect();
    let mut queue: VecDeque<usize> = adjacency
        .iter()
        .filter(|(node, neighbors)| neighbors.len() <= 1 && !terminals.contains(*node))
        .map(|(node, _)| *node)
        .collect();
    while let Some(node) = queue.pop_front() {
        let Some(neighbors) = adjacency.remove(&node) else {
            continue;
        };
        for neighbor in neighbors {
            if let Some(list) = adjacency.get_mut(&neighbor) {
                list.retain(|n| *n != node);
                if list.len() <= 1 && !terminals.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
    }
    adjacency
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = node;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    /// False when both nodes were already joined.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// 60x60 plateau at 50 with a one-node-wide valley at 0: a trunk along
    /// x = 30 from y = 0 to 40 and a crossbar along y = 40 from x = 10 to 50.
    fn t_valley() -> ElevationGrid {
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|r| {
                (0..60)
                    .map(|c| {
                        let trunk = c == 30 && r >= 20;
                        let crossbar = r == 20 && (10..=50).contains(&c);
                        if trunk || crossbar {
                            0.0
                        } else {
                            50.0
                        }
                    })
                    .collect()
            })
            .collect();
        ElevationGrid::from_rows(rows, 1.0).unwrap()
    }

    fn network(config: RoadNetworkConfig) -> RoadNetwork {
        RoadNetwork::new(t_valley(), SitePoint::new(30.0, 2.0), config, &Capabilities::standard())
            .unwrap()
    }

    fn spaced_config() -> RoadNetworkConfig {
        RoadNetworkConfig {
            graph: GraphConfig {
                spacing: Some(2.0),
                ..GraphConfig::default()
            },
            ..RoadNetworkConfig::default()
        }
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn optimized_tree_classifies_trunk_branch_and_spurs() {
        let mut roads = network(spaced_config());
        assert_eq!(roads.state(), RoadNetworkState::Configured);
        let assets = [
            SitePoint::new(12.0, 40.0),
            SitePoint::new(40.0, 40.0),
            SitePoint::new(48.0, 40.0),
        ];
        let ok = roads
            .generate_network(&assets, &ids(&["west", "mid", "east"]), true)
            .unwrap();
        assert!(ok);
        assert_eq!(roads.state(), RoadNetworkState::Built);

        let stats = roads.network_stats();
        assert_eq!(stats.segment_count, 4);
        assert_eq!(stats.count_by_class[&RoadClass::Primary], 1);
        assert_eq!(stats.count_by_class[&RoadClass::Secondary], 1);
        assert_eq!(stats.count_by_class[&RoadClass::Access], 2);
        assert_eq!(stats.intersection_count, 1);
        assert_eq!(roads.intersections()[0].segment_ids.len(), 3);
        assert_eq!(stats.max_grade, 0.0);

        let primary = roads
            .segments()
            .iter()
            .find(|s| s.class == RoadClass::Primary)
            .unwrap();
        assert_eq!(primary.assets.len(), 3);
        assert_eq!(primary.points.len(), 2);
        assert_abs_diff_eq!(primary.width, 7.3);
        let secondary = roads
            .segments()
            .iter()
            .find(|s| s.class == RoadClass::Secondary)
            .unwrap();
        assert_eq!(secondary.assets, ids(&["mid", "east"]));
    }

    #[test]
    fn unoptimized_network_keeps_one_primary_per_asset() {
        let mut roads = network(spaced_config());
        let assets = [SitePoint::new(12.0, 40.0), SitePoint::new(48.0, 40.0)];
        assert!(roads.generate_network(&assets, &ids(&["a", "b"]), false).unwrap());
        let stats = roads.network_stats();
        assert_eq!(stats.segment_count, 2);
        assert_eq!(stats.count_by_class[&RoadClass::Primary], 2);
        assert_eq!(stats.intersection_count, 0);
        let routed: usize = roads.routes().iter().map(|r| r.edge_count).sum();
        assert_eq!(stats.graph_edges_used, routed);
    }

    #[test]
    fn unreachable_asset_fails_with_diagnostics() {
        let mut roads = network(spaced_config());
        let assets = [SitePoint::new(12.0, 40.0), SitePoint::new(30.0, 50.0)];
        let ok = roads
            .generate_network(&assets, &ids(&["valley", "plateau"]), true)
            .unwrap();
        assert!(!ok);
        assert_eq!(roads.state(), RoadNetworkState::Failed);
        assert!(roads.segments().is_empty());
        assert!(roads.routes()[0].reachable);
        let plateau = &roads.routes()[1];
        assert!(!plateau.reachable);
        assert!(plateau.reason.as_deref().unwrap().contains("grade limit"));
        assert_eq!(roads.network_stats().unreachable_assets, 1);
    }

    #[test]
    fn parallel_searches_match_sequential() {
        let assets = [
            SitePoint::new(12.0, 40.0),
            SitePoint::new(40.0, 40.0),
            SitePoint::new(48.0, 40.0),
        ];
        let names = ids(&["a", "b", "c"]);
        let mut sequential = network(spaced_config());
        sequential.generate_network(&assets, &names, true).unwrap();
        let mut parallel = network(RoadNetworkConfig {
            search_threads: 3,
            ..spaced_config()
        });
        parallel.generate_network(&assets, &names, true).unwrap();
        assert_eq!(sequential.segments(), parallel.segments());
        assert_eq!(sequential.routes(), parallel.routes());
    }

    #[test]
    fn invalid_inputs_are_validation_errors() {
        let mut roads = network(spaced_config());
        assert!(matches!(
            roads.generate_network(&[SitePoint::new(12.0, 40.0)], &[], true),
            Err(GradingError::Validation(_))
        ));
        assert!(matches!(
            roads.generate_network(&[SitePoint::new(500.0, 40.0)], &ids(&["far"]), true),
            Err(GradingError::Validation(_))
        ));
        assert_eq!(roads.state(), RoadNetworkState::Failed);
        assert!(RoadNetwork::new(
            t_valley(),
            SitePoint::new(0.0, 0.0),
            RoadNetworkConfig::default(),
            &Capabilities::none()
        )
        .is_err());
    }

    #[test]
    fn feature_collection_lists_segments_intersections_and_assets() {
        let mut roads = network(spaced_config());
        let assets = [SitePoint::new(12.0, 40.0), SitePoint::new(48.0, 40.0)];
        roads.generate_network(&assets, &ids(&["a", "b"]), true).unwrap();
        let collection = roads.to_feature_collection();
        let kinds: Vec<&str> = collection
            .features
            .iter()
            .filter_map(|f| f.properties.get("kind").and_then(|k| k.as_str()))
            .collect();
        assert_eq!(kinds.iter().filter(|k| **k == "road_segment").count(), 3);
        assert_eq!(kinds.iter().filter(|k| **k == "intersection").count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == "asset").count(), 2);
    }

    #[test]
    fn union_find_joins_once() {
        let mut uf = UnionFind::new(4);
        assert!(uf.union(0, 1));
        assert!(uf.union(2, 3));
        assert!(uf.union(1, 3));
        assert!(!uf.union(0, 2));
    }

    #[test]
    fn geographic_terrain_is_rejected() {
        let terrain = ElevationGrid::filled(40, 40, 10.0, 0.0001)
            .unwrap()
            .with_coordinate_system(crate::terrain::CoordinateSystem::Geographic);
        let result = RoadNetwork::new(
            terrain,
            SitePoint::new(0.00015, 0.00015),
            RoadNetworkConfig::default(),
            &Capabilities::standard(),
        );
        assert!(matches!(result, Err(GradingError::Validation(_))));
    }
}
