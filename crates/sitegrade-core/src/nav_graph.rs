//! Terrain navigation graph: a regular lattice of nodes over an elevation grid
//! joined by grade-weighted, undirected edges.

use crate::capability::Capabilities;
use crate::error::GradingError;
use crate::terrain::{degrees_to_percent, Bounds, ElevationGrid};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Upper bound on lattice nodes built by one call.
pub const MAX_LATTICE_NODES: usize = 4_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Lattice spacing in world units; the terrain cell size when absent.
    pub spacing: Option<f64>,
    /// Connect diagonal neighbours as well as the 4 orthogonal ones.
    pub diagonal: bool,
    /// Grade (percent) above which the superlinear penalty applies.
    pub grade_penalty_threshold: f64,
    pub grade_penalty_weight: f64,
    pub grade_penalty_exponent: f64,
    /// Neighbours linked to a synthesized node by `inject_point`.
    pub inject_neighbors: usize,
    /// Reuse an existing node this close to an injected point; half the
    /// spacing when absent.
    pub snap_tolerance: Option<f64>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            spacing: None,
            diagonal: true,
            grade_penalty_threshold: 8.0,
            grade_penalty_weight: 4.0,
            grade_penalty_exponent: 2.0,
            inject_neighbors: 4,
            snap_tolerance: None,
        }
    }
}

impl GraphConfig {
    /// `cost / distance - 1` for an edge with the given grade (percent).
    pub fn grade_penalty(&self, grade_percent: f64) -> f64 {
        let grade = grade_percent.abs();
        let mut penalty = grade / 100.0;
        let threshold = self.grade_penalty_threshold.max(f64::EPSILON);
        if grade > threshold {
            penalty += self.grade_penalty_weight
                * ((grade - threshold) / threshold).powf(self.grade_penalty_exponent);
        }
        penalty
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: usize,
    /// Lattice position; `None` for injected nodes.
    pub lattice: Option<(usize, usize)>,
    /// Terrain cell the node snapped to.
    pub cell: (usize, usize),
    pub x: f64,
    pub y: f64,
    pub elevation: f64,
    /// Terrain slope at the snapped cell, percent.
    pub slope: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub to: usize,
    /// Ground distance between the endpoints.
    pub distance: f64,
    /// Absolute grade in percent.
    pub grade: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub injected_nodes: usize,
    pub component_count: usize,
    pub is_connected: bool,
}

#[derive(Debug, Clone, Default)]
struct Lattice {
    rows: usize,
    cols: usize,
    origin_x: f64,
    origin_y: f64,
    spacing: f64,
    slots: Vec<Option<usize>>,
}

pub struct NavigationGraph {
    terrain: ElevationGrid,
    slopes: Vec<Option<f64>>,
    config: GraphConfig,
    nodes: Vec<GraphNode>,
    adjacency: Vec<Vec<GraphEdge>>,
    lattice: Lattice,
}

impl NavigationGraph {
    pub fn new(terrain: ElevationGrid, config: GraphConfig, capabilities: &Capabilities) -> Result<Self> {
        let slope = capabilities.require_slope()?;
        terrain.require_projected("navigation graph")?;
        if let Some(spacing) = config.spacing {
            if !spacing.is_finite() || spacing <= 0.0 {
                return Err(GradingError::validation(format!(
                    "graph spacing must be positive, got {spacing}"
                )));
            }
        }
        let slopes = slope.slope_degrees(&terrain)?;
        Ok(Self {
            terrain,
            slopes,
            config,
            nodes: Vec::new(),
            adjacency: Vec::new(),
            lattice: Lattice::default(),
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn terrain(&self) -> &ElevationGrid {
        &self.terrain
    }

    pub fn spacing(&self) -> f64 {
        self.config.spacing.unwrap_or_else(|| {
            let (w, h) = self.terrain.cell_size();
            w.max(h)
        })
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn neighbors(&self, id: usize) -> &[GraphEdge] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge(&self, from: usize, to: usize) -> Option<&GraphEdge> {
        self.neighbors(from).iter().find(|edge| edge.to == to)
    }

    /// Node at a lattice position.
    pub fn node_at(&self, row: usize, col: usize) -> Option<&GraphNode> {
        if row >= self.lattice.rows || col >= self.lattice.cols {
            return None;
        }
        let id = self.lattice.slots[row * self.lattice.cols + col]?;
        self.nodes.get(id)
    }

    /// Ground distance between two nodes.
    pub fn distance(&self, a: usize, b: usize) -> Option<f64> {
        let (a, b) = (self.nodes.get(a)?, self.nodes.get(b)?);
        Some(self.terrain.ground_distance(a.x, a.y, b.x, b.y))
    }

    /// Lay a lattice over `bounds` (clipped to the terrain) and connect it.
    /// Replaces any previously built graph, injected nodes included.
    pub fn build_grid_graph(&mut self, bounds: Bounds) -> Result<GraphStats> {
        if !bounds.is_valid() {
            return Err(GradingError::validation("graph bounds are degenerate"));
        }
        let terrain_bounds = self.terrain.bounds();
        let clipped = Bounds::new(
            bounds.min_x.max(terrain_bounds.min_x),
            bounds.min_y.max(terrain_bounds.min_y),
            bounds.max_x.min(terrain_bounds.max_x),
            bounds.max_y.min(terrain_bounds.max_y),
        );
        if !clipped.is_valid() {
            return Err(GradingError::validation("graph bounds do not overlap the terrain"));
        }

        let spacing = self.spacing();
        let cols = (clipped.width() / spacing).floor() as usize + 1;
        let rows = (clipped.height() / spacing).floor() as usize + 1;
        if rows.saturating_mul(cols) > MAX_LATTICE_NODES {
            return Err(GradingError::validation(format!(
                "lattice of {rows}x{cols} nodes exceeds the limit of {MAX_LATTICE_NODES}"
            )));
        }

        self.nodes.clear();
        self.adjacency.clear();
        self.lattice = Lattice {
            rows,
            cols,
            origin_x: clipped.min_x,
            origin_y: clipped.min_y,
            spacing,
            slots: vec![None; rows * cols],
        };

        for row in 0..rows {
            for col in 0..cols {
                let x = clipped.min_x + col as f64 * spacing;
                let y = clipped.min_y + row as f64 * spacing;
                if let Some(id) = self.push_node(x, y, Some((row, col))) {
                    self.lattice.slots[row * cols + col] = Some(id);
                }
            }
        }

        let mut offsets = vec![(0i64, 1i64), (1, 0)];
        if self.config.diagonal {
            offsets.extend([(1, 1), (1, -1)]);
        }
        for row in 0..rows {
            for col in 0..cols {
                let Some(from) = self.lattice.slots[row * cols + col] else {
                    continue;
                };
                for (dr, dc) in &offsets {
                    let r = row as i64 + dr;
                    let c = col as i64 + dc;
                    if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
                        continue;
                    }
                    if let Some(to) = self.lattice.slots[r as usize * cols + c as usize] {
                        self.connect(from, to);
                    }
                }
            }
        }

        let stats = self.graph_stats();
        tracing::debug!(
            nodes = stats.node_count,
            edges = stats.edge_count,
            components = stats.component_count,
            spacing,
            "navigation graph built"
        );
        Ok(stats)
    }

    /// Node for an arbitrary point: an existing node within the snap tolerance,
    /// otherwise a new node linked to its nearest neighbours.
    pub fn inject_point(&mut self, x: f64, y: f64) -> Result<usize> {
        if !x.is_finite() || !y.is_finite() {
            return Err(GradingError::validation("injected point must be finite"));
        }
        if snap_cell(&self.terrain, x, y).is_none() {
            return Err(GradingError::validation(format!(
                "point ({x}, {y}) is outside the terrain or on no-data"
            )));
        }

        let spacing = self.spacing();
        let tolerance = self.config.snap_tolerance.unwrap_or(spacing / 2.0);
        let mut by_distance: Vec<(f64, usize)> = self
            .nodes
            .iter()
            .map(|node| (self.terrain.ground_distance(x, y, node.x, node.y), node.id))
            .filter(|(distance, _)| *distance <= 2.0 * spacing)
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        if let Some(&(distance, id)) = by_distance.first() {
            if distance <= tolerance {
                return Ok(id);
            }
        }

        let Some(id) = self.push_node(x, y, None) else {
            return Err(GradingError::validation(format!(
                "point ({x}, {y}) is outside the terrain or on no-data"
            )));
        };
        for &(_, neighbor) in by_distance.iter().take(self.config.inject_neighbors) {
            self.connect(id, neighbor);
        }
        tracing::trace!(id, x, y, links = self.adjacency[id].len(), "injected graph node");
        Ok(id)
    }

    pub fn graph_stats(&self) -> GraphStats {
        let edge_count = self.adjacency.iter().map(Vec::len).sum::<usize>() / 2;
        let mut component = vec![false; self.nodes.len()];
        let mut component_count = 0;
        for start in 0..self.nodes.len() {
            if component[start] {
                continue;
            }
            component_count += 1;
            component[start] = true;
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for edge in &self.adjacency[current] {
                    if !component[edge.to] {
                        component[edge.to] = true;
                        queue.push_back(edge.to);
                    }
                }
            }
        }
        GraphStats {
            node_count: self.nodes.len(),
            edge_count,
            injected_nodes: self.nodes.iter().filter(|n| n.lattice.is_none()).count(),
            component_count,
            is_connected: component_count == 1,
        }
    }

    fn push_node(&mut self, x: f64, y: f64, lattice: Option<(usize, usize)>) -> Option<usize> {
        let (row, col) = snap_cell(&self.terrain, x, y)?;
        let elevation = self.terrain.value(row, col)?;
        let slope = self.slopes[self.terrain.index(row, col)]
            .map(degrees_to_percent)
            .unwrap_or(0.0);
        let id = self.nodes.len();
        self.nodes.push(GraphNode {
            id,
            lattice,
            cell: (row, col),
            x,
            y,
            elevation,
            slope,
        });
        self.adjacency.push(Vec::new());
        Some(id)
    }

    fn connect(&mut self, a: usize, b: usize) {
        if a == b || self.adjacency[a].iter().any(|edge| edge.to == b) {
            return;
        }
        let (na, nb) = (&self.nodes[a], &self.nodes[b]);
        let distance = self.terrain.ground_distance(na.x, na.y, nb.x, nb.y);
        if distance <= 0.0 {
            return;
        }
        let grade = (nb.elevation - na.elevation).abs() / distance * 100.0;
        let cost = distance * (1.0 + self.config.grade_penalty(grade));
        self.adjacency[a].push(GraphEdge { to: b, distance, grade, cost });
        self.adjacency[b].push(GraphEdge { to: a, distance, grade, cost });
    }
}

/// Nearest terrain cell for a point inside the terrain bounds (edges included).
fn snap_cell(terrain: &ElevationGrid, x: f64, y: f64) -> Option<(usize, usize)> {
    if !terrain.bounds().contains(x, y) {
        return None;
    }
    let (row, col) = terrain.nearest_cell(x, y)?;
    terrain.value(row, col).map(|_| (row, col))
}
