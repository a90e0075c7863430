//! In-memory elevation grids.

use crate::{DemError, Result, TileKey};
use std::fmt;
use std::io::{Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

/// Void marker in SRTM HGT files.
const HGT_VOID: i16 = -32768;

const MODEL_PIXEL_SCALE: Tag = Tag::Unknown(33550);
const MODEL_TIEPOINT: Tag = Tag::Unknown(33922);
const GDAL_NODATA: Tag = Tag::Unknown(42113);

/// Largest buffer the GeoTIFF decoder may allocate. 1/3 arc-second tiles
/// hold roughly 116 million `f32` samples.
const TIFF_BUFFER_LIMIT: usize = 1 << 30;

/// Geographic extent of a tile in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl TileBounds {
    /// Whether a coordinate lies inside or on the edge.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }
}

impl fmt::Display for TileBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..{}, {}..{}]",
            self.min_lat, self.max_lat, self.min_lon, self.max_lon
        )
    }
}

/// A grid of elevation samples covering [`TileBounds`].
///
/// Rows run north to south and columns west to east. The outer rows and
/// columns sit exactly on the tile edges, so a `w x h` grid has `w - 1`
/// intervals across.
#[derive(Debug)]
pub struct DemTile {
    samples: Vec<f32>,
    width: u32,
    height: u32,
    bounds: TileBounds,
    void: Option<f32>,
}

impl DemTile {
    /// Builds a tile from row-major samples.
    pub fn from_grid(
        bounds: TileBounds,
        width: u32,
        height: u32,
        samples: Vec<f32>,
        void: Option<f32>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize;
        if width < 2 || height < 2 || samples.len() != expected {
            return Err(DemError::InvalidGrid {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            samples,
            width,
            height,
            bounds,
            void,
        })
    }

    /// Reads an SRTM `.hgt` file, locating it by its name.
    pub fn from_hgt_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let key = key_from_path(path).ok_or_else(|| DemError::UnrecognisedName(path.into()))?;
        let bytes = std::fs::read(path)?;
        Self::from_hgt_bytes(key, &bytes)
    }

    /// Decodes SRTM HGT data: a square grid of big-endian `i16`.
    pub fn from_hgt_bytes(key: TileKey, bytes: &[u8]) -> Result<Self> {
        let count = bytes.len() / 2;
        let side = (count as f64).sqrt().round() as u32;
        if bytes.len() % 2 != 0 || (side as usize).pow(2) != count {
            return Err(DemError::InvalidHgtSize { len: bytes.len() });
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_be_bytes([b[0], b[1]])))
            .collect();
        Self::from_grid(key.bounds(), side, side, samples, Some(f32::from(HGT_VOID)))
            .map_err(|_| DemError::InvalidHgtSize { len: bytes.len() })
    }

    /// Reads a GeoTIFF tile.
    ///
    /// The extent comes from the tiepoint and pixel scale tags when present,
    /// otherwise from the file name.
    pub fn from_geotiff<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut limits = Limits::default();
        limits.decoding_buffer_size = TIFF_BUFFER_LIMIT;
        limits.intermediate_buffer_size = TIFF_BUFFER_LIMIT;
        limits.ifd_value_size = TIFF_BUFFER_LIMIT;
        let mut decoder = Decoder::new(std::fs::File::open(path)?)?.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        let bounds = match georeference(&mut decoder, width, height) {
            Some(bounds) => bounds,
            None => key_from_path(path)
                .map(|key| key.bounds())
                .ok_or_else(|| DemError::MissingGeoreference(path.into()))?,
        };
        let void = decoder
            .get_tag_ascii_string(GDAL_NODATA)
            .ok()
            .and_then(|s| s.trim_end_matches('\0').trim().parse().ok());
        let samples = widen(decoder.read_image()?);

        Self::from_grid(bounds, width, height, samples, void)
    }

    /// Bilinear elevation at a coordinate, in meters.
    ///
    /// Fails with [`DemError::NoData`] if a sample that contributes to the
    /// result is void.
    pub fn elevation(&self, lat: f64, lon: f64) -> Result<f32> {
        if !self.bounds.contains(lat, lon) {
            return Err(DemError::OutOfBounds {
                lat,
                lon,
                bounds: self.bounds,
            });
        }

        let x = (lon - self.bounds.min_lon) / self.bounds.lon_span() * f64::from(self.width - 1);
        let y = (self.bounds.max_lat - lat) / self.bounds.lat_span() * f64::from(self.height - 1);
        let (col, fx) = split_cell(x, self.width);
        let (row, fy) = split_cell(y, self.height);

        let mut total = 0.0;
        for (dc, dr, weight) in [
            (0, 0, (1.0 - fx) * (1.0 - fy)),
            (1, 0, fx * (1.0 - fy)),
            (0, 1, (1.0 - fx) * fy),
            (1, 1, fx * fy),
        ] {
            if weight == 0.0 {
                continue;
            }
            let value = self
                .sample(col + dc, row + dr)
                .ok_or(DemError::NoData { lat, lon })?;
            total += f64::from(value) * weight;
        }
        Ok(total as f32)
    }

    fn sample(&self, col: u32, row: u32) -> Option<f32> {
        let col = col.min(self.width - 1);
        let row = row.min(self.height - 1);
        let value = self.samples[(row * self.width + col) as usize];
        let is_void = self.void.is_some_and(|v| (value - v).abs() < 1e-3);
        (value.is_finite() && !is_void).then_some(value)
    }

    pub fn bounds(&self) -> TileBounds {
        self.bounds
    }

    /// Grid size as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Splits a fractional grid coordinate into a cell index and offset, keeping
/// the far edge inside the last cell.
fn split_cell(pos: f64, size: u32) -> (u32, f64) {
    let cell = (pos.floor().max(0.0) as u32).min(size - 2);
    (cell, pos - f64::from(cell))
}

fn key_from_path(path: &Path) -> Option<TileKey> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(TileKey::from_filename)
}

/// Extent from ModelTiepoint `[i, j, k, x, y, z]` and ModelPixelScale.
fn georeference<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
) -> Option<TileBounds> {
    let tie = decoder.get_tag_f64_vec(MODEL_TIEPOINT).ok()?;
    let scale = decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE).ok()?;
    if tie.len() < 6 || scale.len() < 2 {
        return None;
    }
    let (west, north) = (tie[3], tie[4]);
    Some(TileBounds {
        min_lat: north - f64::from(height) * scale[1],
        max_lat: north,
        min_lon: west,
        max_lon: west + f64::from(width) * scale[0],
    })
}

fn widen(image: DecodingResult) -> Vec<f32> {
    fn cast<T: Copy + Into<f64>>(v: Vec<T>) -> Vec<f32> {
        v.into_iter().map(|x| x.into() as f32).collect()
    }
    match image {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => cast(v),
        DecodingResult::I8(v) => cast(v),
        DecodingResult::I16(v) => cast(v),
        DecodingResult::I32(v) => cast(v),
        DecodingResult::U8(v) => cast(v),
        DecodingResult::U16(v) => cast(v),
        DecodingResult::U32(v) => cast(v),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
    }
}
