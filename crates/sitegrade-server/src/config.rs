//! Server configuration from environment.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Stored responses kept before the oldest are evicted.
    pub result_capacity: usize,
    pub result_ttl_s: u64,
    pub default_soil: String,
    /// Largest terrain payload accepted, in cells.
    pub max_grid_cells: usize,
    pub search_threads: usize,
    /// Lattice spacing used when a road request does not set one.
    pub graph_spacing: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            result_capacity: 256,
            result_ttl_s: 3600,
            default_soil: "loam".to_string(),
            max_grid_cells: 4_000_000,
            search_threads: 1,
            graph_spacing: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_env("SITEGRADE_PORT").unwrap_or(defaults.server_port),
            result_capacity: parse_env("SITEGRADE_RESULT_CAPACITY")
                .unwrap_or(defaults.result_capacity),
            result_ttl_s: parse_env("SITEGRADE_RESULT_TTL_S").unwrap_or(defaults.result_ttl_s),
            default_soil: env::var("SITEGRADE_DEFAULT_SOIL").unwrap_or(defaults.default_soil),
            max_grid_cells: parse_env("SITEGRADE_MAX_GRID_CELLS")
                .unwrap_or(defaults.max_grid_cells),
            search_threads: parse_env::<usize>("SITEGRADE_SEARCH_THREADS")
                .unwrap_or(defaults.search_threads)
                .max(1),
            graph_spacing: parse_env::<f64>("SITEGRADE_GRAPH_SPACING")
                .filter(|spacing| spacing.is_finite() && *spacing > 0.0),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
