//! Synthetic sites for demos and stress runs.

pub mod scenarios;
pub mod terrain;

pub use terrain::{Hill, HillTerrain};
