//! Geographic primitives on a spherical Earth.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees (positive = north).
    pub lat: f64,
    /// Longitude in decimal degrees (positive = east).
    pub lon: f64,
}

impl Position {
    /// Creates a new position.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns true if both coordinates are finite and inside the valid ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_m(&self, other: &Position) -> f64 {
        haversine_m(self, other)
    }

    /// Great-circle distance to `other` in kilometers.
    pub fn distance_km(&self, other: &Position) -> f64 {
        haversine_m(self, other) / 1000.0
    }

    /// Unit vector in Earth-centered, Earth-fixed coordinates.
    pub fn to_unit_vector(&self) -> [f64; 3] {
        let (lat, lon) = (self.lat.to_radians(), self.lon.to_radians());
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }

    /// Earth-centered, Earth-fixed coordinates in meters on the mean sphere.
    pub fn to_ecef(&self) -> [f64; 3] {
        let [x, y, z] = self.to_unit_vector();
        [x * EARTH_RADIUS_M, y * EARTH_RADIUS_M, z * EARTH_RADIUS_M]
    }

    /// Converts an (unnormalized) ECEF direction back to a surface position.
    ///
    /// Returns `None` for the zero vector.
    pub fn from_vector(v: [f64; 3]) -> Option<Position> {
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if !(norm > f64::EPSILON) {
            return None;
        }
        let lat = (v[2] / norm).clamp(-1.0, 1.0).asin().to_degrees();
        let lon = v[1].atan2(v[0]).to_degrees();
        Some(Position { lat, lon })
    }

    /// Point a fraction `t` of the way along the great circle to `other`.
    pub fn interpolate(&self, other: &Position, t: f64) -> Position {
        let a = self.to_unit_vector();
        let b = other.to_unit_vector();
        let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
        let omega = dot.acos();
        let sin_omega = omega.sin();

        let (wa, wb) = if sin_omega.abs() < 1e-12 {
            (1.0 - t, t)
        } else {
            (
                ((1.0 - t) * omega).sin() / sin_omega,
                (t * omega).sin() / sin_omega,
            )
        };

        let v = [
            wa * a[0] + wb * b[0],
            wa * a[1] + wb * b[1],
            wa * a[2] + wb * b[2],
        ];
        Position::from_vector(v).unwrap_or(*self)
    }

    /// Spherical mean of a set of positions.
    pub fn centroid<'a, I>(positions: I) -> Option<Position>
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let mut sum = [0.0; 3];
        let mut count = 0usize;
        for p in positions {
            let v = p.to_unit_vector();
            sum[0] += v[0];
            sum[1] += v[1];
            sum[2] += v[2];
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Position::from_vector(sum)
    }

    /// Moves by a local east/north offset in meters (tangent-plane approximation).
    pub fn offset_m(&self, east_m: f64, north_m: f64) -> Position {
        let lat = self.lat + (north_m / EARTH_RADIUS_M).to_degrees();
        let cos_lat = self.lat.to_radians().cos().max(1e-9);
        let mut lon = self.lon + (east_m / (EARTH_RADIUS_M * cos_lat)).to_degrees();
        if lon > 180.0 {
            lon -= 360.0;
        } else if lon < -180.0 {
            lon += 360.0;
        }
        Position { lat, lon }
    }

    /// Local east/north offset of `other` from `self` in meters.
    ///
    /// Inverse of [`Position::offset_m`].
    pub fn local_offset_m(&self, other: &Position) -> (f64, f64) {
        let mut dlon = other.lon - self.lon;
        if dlon > 180.0 {
            dlon -= 360.0;
        } else if dlon < -180.0 {
            dlon += 360.0;
        }
        let cos_lat = self.lat.to_radians().cos().max(1e-9);
        let east = dlon.to_radians() * EARTH_RADIUS_M * cos_lat;
        let north = (other.lat - self.lat).to_radians() * EARTH_RADIUS_M;
        (east, north)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

/// Great-circle distance between two positions in meters (haversine formula).
pub fn haversine_m(a: &Position, b: &Position) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Height of the Earth bulge at the midpoint of a path of length `distance_m`.
///
/// `h = d² / (8R)`; about 49 m at 50 km.
pub fn earth_bulge_m(distance_m: f64) -> f64 {
    distance_m * distance_m / (8.0 * EARTH_RADIUS_M)
}

/// Curvature drop at a point `d1_m` from one end and `d2_m` from the other.
///
/// Equals [`earth_bulge_m`] at the midpoint.
pub fn curvature_drop_m(d1_m: f64, d2_m: f64) -> f64 {
    d1_m * d2_m / (2.0 * EARTH_RADIUS_M)
}

/// Straight-line chord length subtending a surface arc of `arc_m`.
pub fn chord_length_m(arc_m: f64) -> f64 {
    2.0 * EARTH_RADIUS_M * (arc_m / (2.0 * EARTH_RADIUS_M)).sin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bulge_at_50km() {
        // 50 km over 6371 km radius
        assert_relative_eq!(earth_bulge_m(50_000.0), 49.05, epsilon = 0.01);
    }

    #[test]
    fn test_curvature_drop_matches_bulge_at_midpoint() {
        let d = 80_000.0;
        assert_relative_eq!(curvature_drop_m(d / 2.0, d / 2.0), earth_bulge_m(d), epsilon = 1e-9);
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(1.0, 0.0);
        assert_relative_eq!(a.distance_km(&b), 111.195, epsilon = 0.001);
    }

    #[test]
    fn test_haversine_across_antimeridian() {
        let a = Position::new(0.0, 179.9);
        let b = Position::new(0.0, -179.9);
        assert!(a.distance_km(&b) < 25.0);
    }

    #[test]
    fn test_interpolate_endpoints_and_midpoint() {
        let a = Position::new(10.0, 20.0);
        let b = Position::new(10.0, 21.0);

        let start = a.interpolate(&b, 0.0);
        let end = a.interpolate(&b, 1.0);
        assert_relative_eq!(start.lat, a.lat, epsilon = 1e-9);
        assert_relative_eq!(end.lon, b.lon, epsilon = 1e-9);

        let mid = a.interpolate(&b, 0.5);
        assert_relative_eq!(mid.distance_m(&a), mid.distance_m(&b), epsilon = 1e-6);
    }

    #[test]
    fn test_centroid_of_symmetric_points() {
        let points = [Position::new(1.0, 0.0), Position::new(-1.0, 0.0)];
        let c = Position::centroid(points.iter()).unwrap();
        assert_relative_eq!(c.lat, 0.0, epsilon = 1e-9);
        assert_relative_eq!(c.lon, 0.0, epsilon = 1e-9);
        assert!(Position::centroid(std::iter::empty()).is_none());
    }

    #[test]
    fn test_offset_roundtrip() {
        let origin = Position::new(47.6, -122.3);
        let moved = origin.offset_m(1_500.0, -2_000.0);
        let (east, north) = origin.local_offset_m(&moved);
        assert_relative_eq!(east, 1_500.0, epsilon = 1e-6);
        assert_relative_eq!(north, -2_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_validity() {
        assert!(Position::new(45.0, 7.0).is_valid());
        assert!(!Position::new(91.0, 7.0).is_valid());
        assert!(!Position::new(45.0, -181.0).is_valid());
        assert!(!Position::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_chord_shorter_than_arc() {
        let arc = 100_000.0;
        let chord = chord_length_m(arc);
        assert!(chord < arc);
        assert!(arc - chord < 2.0);
    }
}
