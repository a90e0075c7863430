//! DEM errors.

use crate::TileBounds;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or sampling elevation tiles.
#[derive(Debug, Error)]
pub enum DemError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF decode error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// A GeoTIFF carries neither georeferencing tags nor a recognisable name.
    #[error("{0}: no georeferencing tags and no tile name")]
    MissingGeoreference(PathBuf),

    /// The file name does not encode a tile corner.
    #[error("unrecognised tile file name: {0}")]
    UnrecognisedName(PathBuf),

    #[error("HGT data of {len} bytes is not a square grid of 16-bit samples")]
    InvalidHgtSize { len: usize },

    #[error("{width}x{height} grid needs {expected} samples, got {actual}")]
    InvalidGrid {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("({lat}, {lon}) lies outside tile {bounds}")]
    OutOfBounds {
        lat: f64,
        lon: f64,
        bounds: TileBounds,
    },

    /// One of the samples around the coordinate is void.
    #[error("no elevation data at ({lat}, {lon})")]
    NoData { lat: f64, lon: f64 },
}
