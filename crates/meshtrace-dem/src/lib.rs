//! # meshtrace-dem
//!
//! Elevation data for terrain-aware link costing.
//!
//! Tiles cover one degree of latitude and longitude and are identified by a
//! [`TileKey`] (their southwest corner). They can be read from:
//! - SRTM `.hgt` files (`N47W123.hgt`): square grids of big-endian `i16`
//! - GeoTIFF files, including USGS 3DEP tiles (`USGS_13_n48w123_*.tif`)
//! - in-memory grids, via [`DemTile::from_grid`]
//!
//! [`TileCache`] sits in front of any [`TileLoader`] and guarantees a single
//! load per tile under concurrent access. Missing tiles read as sea level and
//! are logged once.
//!
//! ## Example
//!
//! ```no_run
//! use meshtrace_dem::{DirectoryLoader, TileCache};
//!
//! let mut loader = DirectoryLoader::new();
//! loader.add_directory("dem_data")?;
//!
//! let cache = TileCache::new(loader);
//! if let Some(elevation) = cache.elevation(47.6062, -122.3321) {
//!     println!("Elevation: {} meters", elevation);
//! }
//! # Ok::<(), meshtrace_dem::DemError>(())
//! ```

mod cache;
mod error;
mod key;
mod loader;
mod tile;

pub use cache::{CacheStats, TileCache};
pub use error::DemError;
pub use key::TileKey;
pub use loader::{DirectoryLoader, TileLoader};
pub use tile::{DemTile, TileBounds};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;
