//! Grade-constrained A* over a [`NavigationGraph`].
//!
//! `g` is the accumulated edge cost and `h` the ground distance to the goal;
//! edge cost never drops below edge distance, so `h` stays admissible. Edges
//! steeper than `max_grade_percent` are never expanded.

use crate::error::GradingError;
use crate::nav_graph::NavigationGraph;
use crate::spatial::{compass_heading_deg, distance_to_segment, heading_change_deg};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

const GRADE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    /// Hard limit: steeper edges are excluded from the search.
    pub max_grade_percent: f64,
    pub switchback_detection: bool,
    /// Heading change (degrees) between consecutive edges that counts as a switchback.
    pub switchback_angle_deg: f64,
    /// Switchbacks are only penalized on edges at least this steep (percent).
    pub switchback_min_grade: f64,
    /// Extra cost as a multiple of the edge cost.
    pub switchback_penalty: f64,
    pub smoothing_enabled: bool,
    /// Max offset of a dropped vertex from the simplified chord; a quarter of
    /// the graph spacing when absent.
    pub smoothing_tolerance: Option<f64>,
    /// Node expansions before the search gives up.
    pub max_expansions: usize,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            max_grade_percent: 10.0,
            switchback_detection: true,
            switchback_angle_deg: 100.0,
            switchback_min_grade: 5.0,
            switchback_penalty: 2.0,
            smoothing_enabled: true,
            smoothing_tolerance: None,
            max_expansions: 250_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    pub elevation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Vertices after smoothing (or the raw node positions when disabled).
    pub points: Vec<PathPoint>,
    /// Raw graph nodes from start to goal.
    pub node_ids: Vec<usize>,
    /// Grade (percent) of each segment between consecutive `points`. These
    /// describe the smoothed design profile, not the graph edges in `node_ids`.
    pub segment_grades: Vec<f64>,
    /// Ground length along `points`.
    pub length: f64,
    /// Steepest entry of `segment_grades`.
    pub max_grade: f64,
    /// Total search cost, penalties included.
    pub cost: f64,
    pub nodes_expanded: usize,
}

impl Path {
    /// Graph edges traversed by the raw path.
    pub fn edge_count(&self) -> usize {
        self.node_ids.len().saturating_sub(1)
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.node_ids.windows(2).map(|pair| (pair[0], pair[1]))
    }

    pub fn start(&self) -> Option<&PathPoint> {
        self.points.first()
    }

    pub fn end(&self) -> Option<&PathPoint> {
        self.points.last()
    }
}

/// Result of a search. Not reaching the goal is a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    Found(Path),
    /// Start and goal are disconnected under the grade limit.
    Unreachable { nodes_expanded: usize },
    /// The expansion cap was hit first; treated as no path.
    ExpansionLimit { nodes_expanded: usize },
}

impl PathOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PathOutcome::Found(path) => Some(path),
            _ => None,
        }
    }

    pub fn into_path(self) -> Option<Path> {
        match self {
            PathOutcome::Found(path) => Some(path),
            _ => None,
        }
    }

    pub fn nodes_expanded(&self) -> usize {
        match self {
            PathOutcome::Found(path) => path.nodes_expanded,
            PathOutcome::Unreachable { nodes_expanded }
            | PathOutcome::ExpansionLimit { nodes_expanded } => *nodes_expanded,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    node: usize,
    g_score: FloatOrd,
    f_score: FloatOrd,
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_score
            .cmp(&other.f_score)
            .then_with(|| self.g_score.cmp(&other.g_score))
            .then_with(|| self.node.cmp(&other.node))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AStarPathfinder {
    config: PathfinderConfig,
}

impl AStarPathfinder {
    pub fn new(config: PathfinderConfig) -> Result<Self> {
        if !config.max_grade_percent.is_finite() || config.max_grade_percent <= 0.0 {
            return Err(GradingError::validation(format!(
                "max grade must be positive, got {}",
                config.max_grade_percent
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    pub fn find_path(&self, graph: &NavigationGraph, start: usize, goal: usize) -> Result<PathOutcome> {
        let node_count = graph.nodes().len();
        for id in [start, goal] {
            if id >= node_count {
                return Err(GradingError::UnknownNode(id));
            }
        }

        let mut g_score = vec![f64::INFINITY; node_count];
        let mut came_from: Vec<Option<usize>> = vec![None; node_count];
        let mut closed = vec![false; node_count];
        let mut open_set: BinaryHeap<Reverse<OpenNode>> = BinaryHeap::new();

        g_score[start] = 0.0;
        open_set.push(Reverse(OpenNode {
            node: start,
            g_score: FloatOrd(0.0),
            f_score: FloatOrd(self.heuristic(graph, start, goal)),
        }));

        let mut nodes_expanded = 0usize;
        while let Some(Reverse(current)) = open_set.pop() {
            if closed[current.node] {
                continue;
            }
            let best_g = g_score[current.node];
            if current.g_score.0 > best_g + 1e-9 {
                continue;
            }
            if nodes_expanded >= self.config.max_expansions {
                tracing::debug!(start, goal, nodes_expanded, "search hit expansion cap");
                return Ok(PathOutcome::ExpansionLimit { nodes_expanded });
            }
            nodes_expanded += 1;

            if current.node == goal {
                let mut node_ids = vec![goal];
                let mut cursor = came_from[goal];
                while let Some(node) = cursor {
                    node_ids.push(node);
                    cursor = came_from[node];
                }
                node_ids.reverse();
                return Ok(PathOutcome::Found(self.assemble(
                    graph,
                    node_ids,
                    best_g,
                    nodes_expanded,
                )));
            }

            closed[current.node] = true;
            let incoming = came_from[current.node]
                .and_then(|parent| heading_between(graph, parent, current.node));

            for edge in graph.neighbors(current.node) {
                if closed[edge.to] || edge.grade > self.config.max_grade_percent + GRADE_EPSILON {
                    continue;
                }
                let mut step_cost = edge.cost;
                if self.config.switchback_detection && edge.grade >= self.config.switchback_min_grade {
                    let outgoing = heading_between(graph, current.node, edge.to);
                    if let (Some(incoming), Some(outgoing)) = (incoming, outgoing) {
                        if heading_change_deg(incoming, outgoing) > self.config.switchback_angle_deg {
                            step_cost += edge.cost * self.config.switchback_penalty;
                        }
                    }
                }

                let tentative_g = best_g + step_cost;
                if tentative_g < g_score[edge.to] {
                    came_from[edge.to] = Some(current.node);
                    g_score[edge.to] = tentative_g;
                    open_set.push(Reverse(OpenNode {
                        node: edge.to,
                        g_score: FloatOrd(tentative_g),
                        f_score: FloatOrd(tentative_g + self.heuristic(graph, edge.to, goal)),
                    }));
                }
            }
        }

        Ok(PathOutcome::Unreachable { nodes_expanded })
    }

    /// Indices into `node_ids` kept by smoothing: each kept vertex jumps to the
    /// furthest later vertex whose chord stays within tolerance of every
    /// skipped vertex and within the grade limit.
    pub fn smooth(&self, graph: &NavigationGraph, node_ids: &[usize]) -> Vec<usize> {
        if node_ids.len() <= 2 {
            return (0..node_ids.len()).collect();
        }
        let tolerance = self
            .config
            .smoothing_tolerance
            .unwrap_or(graph.spacing() * 0.25);

        let mut kept = vec![0];
        let mut current_idx = 0usize;
        while current_idx < node_ids.len() - 1 {
            let mut furthest_valid = current_idx + 1;
            for target_idx in (current_idx + 2)..node_ids.len() {
                if self.chord_is_valid(graph, node_ids, current_idx, target_idx, tolerance) {
                    furthest_valid = target_idx;
                }
            }
            kept.push(furthest_valid);
            current_idx = furthest_valid;
        }
        kept
    }

    fn chord_is_valid(
        &self,
        graph: &NavigationGraph,
        node_ids: &[usize],
        start_idx: usize,
        end_idx: usize,
        tolerance: f64,
    ) -> bool {
        let nodes = graph.nodes();
        let (a, b) = (&nodes[node_ids[start_idx]], &nodes[node_ids[end_idx]]);
        let Some(length) = graph.distance(a.id, b.id) else {
            return false;
        };
        if length <= 0.0 {
            return false;
        }
        if (b.elevation - a.elevation).abs() / length * 100.0
            > self.config.max_grade_percent + GRADE_EPSILON
        {
            return false;
        }
        node_ids[start_idx + 1..end_idx].iter().all(|&id| {
            let node = &nodes[id];
            let (offset, _) = distance_to_segment(node.x, node.y, a.x, a.y, b.x, b.y);
            offset <= tolerance
        })
    }

    fn heuristic(&self, graph: &NavigationGraph, from: usize, goal: usize) -> f64 {
        graph.distance(from, goal).unwrap_or(0.0)
    }

    fn assemble(
        &self,
        graph: &NavigationGraph,
        node_ids: Vec<usize>,
        cost: f64,
        nodes_expanded: usize,
    ) -> Path {
        let kept: Vec<usize> = if self.config.smoothing_enabled {
            self.smooth(graph, &node_ids)
                .into_iter()
                .map(|idx| node_ids[idx])
                .collect()
        } else {
            node_ids.clone()
        };

        let nodes = graph.nodes();
        let points: Vec<PathPoint> = kept
            .iter()
            .map(|&id| PathPoint {
                x: nodes[id].x,
                y: nodes[id].y,
                elevation: nodes[id].elevation,
            })
            .collect();

        let mut length = 0.0;
        let mut segment_grades = Vec::with_capacity(kept.len().saturating_sub(1));
        for pair in kept.windows(2) {
            let distance = graph.distance(pair[0], pair[1]).unwrap_or(0.0);
            length += distance;
            let rise = (nodes[pair[1]].elevation - nodes[pair[0]].elevation).abs();
            segment_grades.push(if distance > 0.0 { rise / distance * 100.0 } else { 0.0 });
        }
        let max_grade = segment_grades.iter().copied().fold(0.0, f64::max);

        Path {
            points,
            node_ids,
            segment_grades,
            length,
            max_grade,
            cost,
            nodes_expanded,
        }
    }
}

fn heading_between(graph: &NavigationGraph, from: usize, to: usize) -> Option<f64> {
    let (a, b) = (graph.node(from)?, graph.node(to)?);
    compass_heading_deg(a.x, a.y, b.x, b.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use crate::nav_graph::GraphConfig;
    use crate::terrain::{Bounds, ElevationGrid};
    use approx::assert_abs_diff_eq;

    fn graph_over(rows: Vec<Vec<f64>>, spacing: f64) -> NavigationGraph {
        let terrain = ElevationGrid::from_rows(rows, 1.0).unwrap();
        let bounds = terrain.bounds();
        let config = GraphConfig {
            spacing: Some(spacing),
            ..GraphConfig::default()
        };
        let mut graph = NavigationGraph::new(terrain, config, &Capabilities::standard()).unwrap();
        graph.build_grid_graph(bounds).unwrap();
        graph
    }

    fn flat(size: usize) -> Vec<Vec<f64>> {
        vec![vec![50.0; size]; size]
    }

    #[test]
    fn straight_run_on_flat_ground_smooths_to_two_points() {
        let graph = graph_over(flat(20), 2.0);
        let start = graph.node_at(0, 0).unwrap().id;
        let goal = graph.node_at(0, 8).unwrap().id;
        let path = AStarPathfinder::default()
            .find_path(&graph, start, goal)
            .unwrap()
            .into_path()
            .unwrap();
        assert_eq!(path.edge_count(), 8);
        assert_eq!(path.points.len(), 2);
        assert_abs_diff_eq!(path.length, 16.0);
        assert_eq!(path.max_grade, 0.0);
    }

    #[test]
    fn steep_edges_are_never_used() {
        // A 5 m cliff between x < 10 and x >= 10 with a ramp cut through rows 15..20.
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|r| {
                (0..20)
                    .map(|c| {
                        if r < 5 {
                            // Gentle ramp rising 0.4 per column.
                            (c as f64 * 0.4).min(5.0)
                        } else if c >= 10 {
                            5.0
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();
        let graph = graph_over(rows, 1.0);
        let pathfinder = AStarPathfinder::new(PathfinderConfig {
            max_grade_percent: 45.0,
            ..PathfinderConfig::default()
        })
        .unwrap();
        let start = graph.node_at(10, 2).unwrap().id;
        let goal = graph.node_at(10, 17).unwrap().id;
        let path = pathfinder.find_path(&graph, start, goal).unwrap().into_path().unwrap();
        for (a, b) in path.edges() {
            assert!(graph.edge(a, b).unwrap().grade <= 45.0 + 1e-9);
        }
        assert!(path.segment_grades.iter().all(|g| *g <= 45.0 + 1e-9));
    }

    #[test]
    fn disconnected_goal_is_an_outcome_not_an_error() {
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|_| (0..10).map(|c| if c >= 5 { 20.0 } else { 0.0 }).collect())
            .collect();
        let graph = graph_over(rows, 1.0);
        let start = graph.node_at(5, 1).unwrap().id;
        let goal = graph.node_at(5, 8).unwrap().id;
        let outcome = AStarPathfinder::default().find_path(&graph, start, goal).unwrap();
        assert!(matches!(outcome, PathOutcome::Unreachable { nodes_expanded } if nodes_expanded > 0));
        assert!(matches!(
            AStarPathfinder::default().find_path(&graph, start, 10_000),
            Err(GradingError::UnknownNode(10_000))
        ));
    }

    #[test]
    fn expansion_cap_reports_limit() {
        let graph = graph_over(flat(30), 1.0);
        let pathfinder = AStarPathfinder::new(PathfinderConfig {
            max_expansions: 5,
            ..PathfinderConfig::default()
        })
        .unwrap();
        let start = graph.node_at(0, 0).unwrap().id;
        let goal = graph.node_at(29, 29).unwrap().id;
        let outcome = pathfinder.find_path(&graph, start, goal).unwrap();
        assert_eq!(outcome, PathOutcome::ExpansionLimit { nodes_expanded: 5 });
        assert!(outcome.path().is_none());
    }

    #[test]
    fn start_equal_to_goal_is_a_trivial_path() {
        let graph = graph_over(flat(5), 1.0);
        let id = graph.node_at(2, 2).unwrap().id;
        let path = AStarPathfinder::default().find_path(&graph, id, id).unwrap().into_path().unwrap();
        assert_eq!(path.node_ids, vec![id]);
        assert_eq!(path.length, 0.0);
    }

    #[test]
    fn smoothing_keeps_corners() {
        let graph = graph_over(flat(20), 1.0);
        let pathfinder = AStarPathfinder::default();
        let ids: Vec<usize> = (0..6)
            .map(|c| graph.node_at(0, c).unwrap().id)
            .chain((1..6).map(|r| graph.node_at(r, 5).unwrap().id))
            .collect();
        let kept = pathfinder.smooth(&graph, &ids);
        assert_eq!(kept, vec![0, 5, 10]);
    }

    #[test]
    fn rejects_non_positive_grade_limit() {
        assert!(AStarPathfinder::new(PathfinderConfig {
            max_grade_percent: 0.0,
            ..PathfinderConfig::default()
        })
        .is_err());
    }

    #[test]
    fn grid_bounds_cover_lattice() {
        let graph = graph_over(flat(4), 1.0);
        assert_eq!(graph.terrain().bounds(), Bounds::new(0.0, 0.0, 4.0, 4.0));
        assert_eq!(graph.graph_stats().node_count, 25);
    }

    /// L-shaped corridor: east along data row 0, then along data column 3.
    /// Every edge climbs 6%.
    fn l_corridor() -> NavigationGraph {
        let rows: Vec<Vec<f64>> = (0..4)
            .map(|r| {
                (0..4)
                    .map(|c| if r == 0 || c == 3 { 0.06 * (r + c) as f64 } else { -9999.0 })
                    .collect()
            })
            .collect();
        let terrain = ElevationGrid::from_rows(rows, 1.0).unwrap().with_no_data(-9999.0);
        let config = GraphConfig {
            spacing: Some(1.0),
            diagonal: false,
            ..GraphConfig::default()
        };
        let mut graph = NavigationGraph::new(terrain, config, &Capabilities::standard()).unwrap();
        graph.build_grid_graph(Bounds::new(0.25, 0.25, 3.75, 3.75)).unwrap();
        graph
    }

    fn corridor_cost(graph: &NavigationGraph, config: PathfinderConfig) -> f64 {
        let by_cell = |cell| graph.nodes().iter().find(|n| n.cell == cell).unwrap().id;
        let path = AStarPathfinder::new(config)
            .unwrap()
            .find_path(graph, by_cell((0, 0)), by_cell((3, 3)))
            .unwrap()
            .into_path()
            .unwrap();
        assert_eq!(path.edge_count(), 6);
        path.cost
    }

    #[test]
    fn switchbacks_are_penalized_only_on_steep_turns() {
        let graph = l_corridor();
        let turning = PathfinderConfig {
            switchback_angle_deg: 60.0,
            switchback_min_grade: 5.0,
            switchback_penalty: 2.0,
            ..PathfinderConfig::default()
        };
        let off = corridor_cost(
            &graph,
            PathfinderConfig {
                switchback_detection: false,
                ..turning.clone()
            },
        );
        let on = corridor_cost(&graph, turning.clone());
        // One 90 degree turn, charged twice the cost of the edge leaving it.
        let edge_cost = 1.0 + GraphConfig::default().grade_penalty(6.0);
        assert_abs_diff_eq!(off, 6.0 * edge_cost, epsilon = 1e-6);
        assert_abs_diff_eq!(on, off + 2.0 * edge_cost, epsilon = 1e-6);

        // Turning on a grade below the minimum costs nothing extra.
        let gentle = corridor_cost(
            &graph,
            PathfinderConfig {
                switchback_min_grade: 7.0,
                ..turning.clone()
            },
        );
        assert_abs_diff_eq!(gentle, off, epsilon = 1e-9);

        // A right angle is not a switchback under the default threshold.
        let default_angle = corridor_cost(
            &graph,
            PathfinderConfig {
                switchback_angle_deg: PathfinderConfig::default().switchback_angle_deg,
                ..turning
            },
        );
        assert_abs_diff_eq!(default_angle, off, epsilon = 1e-9);
    }
}
