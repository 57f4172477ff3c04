//! Rolling terrain built from Gaussian hills on a base plane.

use rand::rngs::StdRng;
use rand::Rng;
use sitegrade_core::{CoordinateSystem, LinearUnit, TerrainSpec};

#[derive(Debug, Clone, PartialEq)]
pub struct Hill {
    pub x: f64,
    pub y: f64,
    /// Peak rise above the base; negative for a hollow.
    pub height: f64,
    /// Standard deviation of the bell, in world units.
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HillTerrain {
    pub size: usize,
    pub cell_size: f64,
    pub base_elevation: f64,
    pub hills: Vec<Hill>,
}

impl HillTerrain {
    pub fn random(rng: &mut StdRng, size: usize, cell_size: f64) -> Self {
        let extent = size as f64 * cell_size;
        let hill_count = rng.random_range(3..=7);
        let hills = (0..hill_count)
            .map(|_| Hill {
                x: rng.random_range(0.0..extent),
                y: rng.random_range(0.0..extent),
                height: rng.random_range(-3.0..6.0),
                radius: rng.random_range(0.12..0.3) * extent,
            })
            .collect();
        Self {
            size,
            cell_size,
            base_elevation: 100.0,
            hills,
        }
    }

    pub fn extent(&self) -> f64 {
        self.size as f64 * self.cell_size
    }

    pub fn elevation(&self, x: f64, y: f64) -> f64 {
        self.base_elevation
            + self
                .hills
                .iter()
                .map(|hill| {
                    let d2 = (x - hill.x).powi(2) + (y - hill.y).powi(2);
                    hill.height * (-d2 / (2.0 * hill.radius * hill.radius)).exp()
                })
                .sum::<f64>()
    }

    /// Sample cell centers, row 0 at the top edge.
    pub fn to_spec(&self) -> TerrainSpec {
        let rows = (0..self.size)
            .map(|row| {
                let y = (self.size - row) as f64 * self.cell_size - self.cell_size / 2.0;
                (0..self.size)
                    .map(|col| {
                        let x = (col as f64 + 0.5) * self.cell_size;
                        (self.elevation(x, y) * 1000.0).round() / 1000.0
                    })
                    .collect()
            })
            .collect();
        TerrainSpec {
            rows,
            cell_size: self.cell_size,
            origin: [0.0, 0.0],
            no_data: None,
            coordinate_system: CoordinateSystem::Projected,
            linear_unit: LinearUnit::Meters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn same_seed_same_terrain() {
        let a = HillTerrain::random(&mut StdRng::seed_from_u64(42), 20, 2.0);
        let b = HillTerrain::random(&mut StdRng::seed_from_u64(42), 20, 2.0);
        assert_eq!(a, b);
        assert_eq!(a.to_spec(), b.to_spec());
    }

    #[test]
    fn spec_rows_run_top_down() {
        let terrain = HillTerrain {
            size: 10,
            cell_size: 1.0,
            base_elevation: 0.0,
            hills: vec![Hill {
                x: 5.0,
                y: 10.0,
                height: 10.0,
                radius: 2.0,
            }],
        };
        let spec = terrain.to_spec();
        assert_eq!(spec.rows.len(), 10);
        // Hill sits on the top edge, so the first row is higher than the last.
        assert!(spec.rows[0][5] > spec.rows[9][5]);
        let grid = spec.to_grid().unwrap();
        assert_eq!(grid.sample(5.5, 9.5), Some(spec.rows[0][5]));
    }
}
