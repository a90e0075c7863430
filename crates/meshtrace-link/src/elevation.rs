//! Elevation source abstraction.

use meshtrace_dem::{TileCache, TileLoader};

/// Something that can answer "how high is the ground here".
///
/// Implementations return `None` for no-data samples. Cells with no tile at
/// all should read as 0.0 rather than `None`.
pub trait ElevationSource: Send + Sync {
    /// Ground elevation in meters at a coordinate.
    fn elevation_m(&self, lat: f64, lon: f64) -> Option<f64>;
}

impl<L: TileLoader> ElevationSource for TileCache<L> {
    fn elevation_m(&self, lat: f64, lon: f64) -> Option<f64> {
        self.elevation(lat, lon)
    }
}

/// Flat terrain at a fixed height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatTerrain(pub f64);

impl ElevationSource for FlatTerrain {
    fn elevation_m(&self, _lat: f64, _lon: f64) -> Option<f64> {
        Some(self.0)
    }
}
