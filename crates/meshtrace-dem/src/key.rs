//! One-degree tile identity.

use crate::tile::TileBounds;
use std::fmt;

/// Identity of a 1x1 degree elevation tile, keyed by its southwest corner.
///
/// SRTM files are named after this corner (`N47W123.hgt` covers latitude
/// 47..48 and longitude -123..-122). USGS 3DEP files are named after the
/// northwest corner (`USGS_13_n48w123_*.tif` is the same cell);
/// [`TileKey::from_filename`] accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Latitude of the southwest corner.
    pub lat: i32,
    /// Longitude of the southwest corner.
    pub lon: i32,
}

impl TileKey {
    /// Creates a key from southwest-corner degrees.
    pub const fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    /// The tile containing a coordinate.
    pub fn from_coord(lat: f64, lon: f64) -> Self {
        Self {
            lat: lat.floor() as i32,
            lon: lon.floor() as i32,
        }
    }

    /// Parses a key from an SRTM (`N47W123.hgt`) or USGS
    /// (`USGS_13_n48w123_20240327.tif`) filename.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let usgs = filename
            .get(..4)
            .map(|p| p.eq_ignore_ascii_case("usgs"))
            .unwrap_or(false);

        let bytes = filename.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i].to_ascii_lowercase();
            if c == b'n' || c == b's' {
                if let Some((lat, lon)) = parse_corner(&bytes[i..]) {
                    let lat = if c == b'n' { lat } else { -lat };
                    // USGS names carry the north edge.
                    let lat = if usgs { lat - 1 } else { lat };
                    return Some(Self { lat, lon });
                }
            }
            i += 1;
        }
        None
    }

    /// Geographic bounds covered by this tile.
    pub fn bounds(&self) -> TileBounds {
        TileBounds {
            min_lat: self.lat as f64,
            max_lat: self.lat as f64 + 1.0,
            min_lon: self.lon as f64,
            max_lon: self.lon as f64 + 1.0,
        }
    }
}

/// Parses `<digits><e|w><digits>` following a hemisphere letter.
fn parse_corner(bytes: &[u8]) -> Option<(i32, i32)> {
    let rest = &bytes[1..];
    let lat_len = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if lat_len == 0 || lat_len > 2 {
        return None;
    }
    let lat: i32 = std::str::from_utf8(&rest[..lat_len]).ok()?.parse().ok()?;

    let dir = rest.get(lat_len)?.to_ascii_lowercase();
    if dir != b'e' && dir != b'w' {
        return None;
    }
    let lon_digits = &rest[lat_len + 1..];
    let lon_len = lon_digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if lon_len == 0 || lon_len > 3 {
        return None;
    }
    let lon: i32 = std::str::from_utf8(&lon_digits[..lon_len]).ok()?.parse().ok()?;

    Some((lat, if dir == b'w' { -lon } else { lon }))
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.lat >= 0 { 'N' } else { 'S' };
        let ew = if self.lon >= 0 { 'E' } else { 'W' };
        write!(f, "{}{:02}{}{:03}", ns, self.lat.abs(), ew, self.lon.abs())
    }
}
