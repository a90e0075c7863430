//! Pairwise link cost evaluation.

use crate::{db_to_cost, fresnel_radius_m, ElevationSource, LinkCostParams};
use meshtrace_common::{curvature_drop_m, earth_bulge_m, haversine_m, Position};
use std::sync::Arc;
use tracing::trace;

/// Cost and geometry of one feasible link.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkCost {
    /// Total cost in negative-log-likelihood units (always finite, >= 0).
    pub cost: f64,
    /// Total penalty in dB (`cost / DB_TO_COST`).
    pub penalty_db: f64,
    /// Great-circle distance in km.
    pub distance_km: f64,
    /// Earth bulge at the path midpoint in meters.
    pub bulge_m: f64,
    /// Bulge above the antenna height in meters.
    pub bulge_excess_m: f64,
    /// Whether terrain infringes the required Fresnel clearance.
    pub terrain_blocked: bool,
}

/// Evaluates link costs between positions.
///
/// Cheap to clone; the elevation source is shared.
#[derive(Clone)]
pub struct LinkModel {
    params: LinkCostParams,
    terrain: Option<Arc<dyn ElevationSource>>,
}

impl LinkModel {
    /// A geometry-only model.
    pub fn new(params: LinkCostParams) -> Self {
        Self {
            params,
            terrain: None,
        }
    }

    /// Adds a terrain source for Fresnel clearance checks.
    pub fn with_terrain(mut self, terrain: Arc<dyn ElevationSource>) -> Self {
        self.terrain = Some(terrain);
        self
    }

    /// Model parameters.
    pub fn params(&self) -> &LinkCostParams {
        &self.params
    }

    /// Whether a terrain source is attached.
    pub fn has_terrain(&self) -> bool {
        self.terrain.is_some()
    }

    /// Costs the link between two positions.
    ///
    /// Returns `None` if the link is beyond the horizon cutoff. Otherwise the
    /// cost is the base cost plus the bulge penalty plus, if terrain blocks
    /// the path, the terrain penalty, all converted from dB.
    pub fn evaluate(&self, a: &Position, b: &Position) -> Option<LinkCost> {
        let distance_m = haversine_m(a, b);
        if !distance_m.is_finite() || distance_m > self.params.horizon_m() {
            return None;
        }

        if distance_m < self.params.colocated_distance_m {
            return Some(LinkCost {
                cost: 0.0,
                penalty_db: 0.0,
                distance_km: distance_m / 1000.0,
                bulge_m: 0.0,
                bulge_excess_m: 0.0,
                terrain_blocked: false,
            });
        }

        let bulge_m = earth_bulge_m(distance_m);
        let bulge_excess_m = (bulge_m - self.params.antenna_height_m).max(0.0);
        let terrain_blocked = match &self.terrain {
            Some(terrain) => self.terrain_blocked(terrain.as_ref(), a, b, distance_m),
            None => false,
        };

        let mut penalty_db =
            self.params.base_cost_db + bulge_excess_m * self.params.bulge_penalty_db_per_m;
        if terrain_blocked {
            penalty_db += self.params.terrain_penalty_db;
        }

        Some(LinkCost {
            cost: db_to_cost(penalty_db),
            penalty_db,
            distance_km: distance_m / 1000.0,
            bulge_m,
            bulge_excess_m,
            terrain_blocked,
        })
    }

    /// Shortcut for `evaluate(..).map(|l| l.cost)`.
    pub fn cost(&self, a: &Position, b: &Position) -> Option<f64> {
        self.evaluate(a, b).map(|link| link.cost)
    }

    /// Walks the terrain profile between two antenna tips and reports whether
    /// any sample, raised by Earth curvature, reaches into the required
    /// fraction of the first Fresnel zone.
    ///
    /// Samples without data are skipped.
    fn terrain_blocked(
        &self,
        terrain: &dyn ElevationSource,
        a: &Position,
        b: &Position,
        distance_m: f64,
    ) -> bool {
        let params = &self.params;
        let segments = ((distance_m / params.terrain_sample_spacing_m).ceil() as usize)
            .clamp(2, params.max_terrain_samples);

        let ground = |p: &Position| {
            terrain
                .elevation_m(p.lat, p.lon)
                .filter(|e| e.is_finite())
                .unwrap_or(0.0)
        };
        let tip_a = ground(a) + params.antenna_height_m;
        let tip_b = ground(b) + params.antenna_height_m;
        let wavelength = params.wavelength_m();

        let mut skipped = 0usize;
        for i in 1..segments {
            let t = i as f64 / segments as f64;
            let d1 = distance_m * t;
            let d2 = distance_m - d1;
            let point = a.interpolate(b, t);

            let Some(elevation) = terrain
                .elevation_m(point.lat, point.lon)
                .filter(|e| e.is_finite())
            else {
                skipped += 1;
                continue;
            };

            let obstruction = elevation + curvature_drop_m(d1, d2);
            let ray = tip_a + (tip_b - tip_a) * t;
            let clearance = params.fresnel_clearance * fresnel_radius_m(wavelength, d1, d2);

            if obstruction > ray - clearance {
                trace!(
                    from = %a,
                    to = %b,
                    at = %point,
                    obstruction,
                    ray,
                    clearance,
                    "terrain infringes Fresnel zone"
                );
                return true;
            }
        }

        if skipped > 0 {
            trace!(from = %a, to = %b, skipped, "excluded no-data terrain samples");
        }
        false
    }
}

impl std::fmt::Debug for LinkModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkModel")
            .field("params", &self.params)
            .field("terrain", &self.terrain.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FlatTerrain, DB_TO_COST};
    use approx::assert_relative_eq;

    /// One degree of latitude on the 6371 km sphere.
    const KM_PER_DEG: f64 = 111.194_926_644_558_73;

    fn north_of(origin: Position, km: f64) -> Position {
        Position::new(origin.lat + km / KM_PER_DEG, origin.lon)
    }

    #[test]
    fn test_beyond_horizon_is_infeasible() {
        let model = LinkModel::new(LinkCostParams::default());
        let a = Position::new(45.0, 7.0);
        assert!(model.evaluate(&a, &north_of(a, 100.5)).is_none());
        assert!(model.evaluate(&a, &north_of(a, 99.5)).is_some());
    }

    #[test]
    fn test_short_link_costs_base_only() {
        let model = LinkModel::new(LinkCostParams::default());
        let a = Position::new(45.0, 7.0);
        let link = model.evaluate(&a, &north_of(a, 10.0)).unwrap();
        assert_eq!(link.bulge_excess_m, 0.0);
        assert!(!link.terrain_blocked);
        assert_relative_eq!(link.cost, 6.0 * DB_TO_COST, epsilon = 1e-12);
    }

    #[test]
    fn test_bulge_penalty_is_monotonic_and_continuous() {
        let model = LinkModel::new(LinkCostParams::default());
        let a = Position::new(45.0, 7.0);
        let mut previous = 0.0;
        for km in [20.0, 30.0, 40.0, 60.0, 80.0, 99.0] {
            let link = model.evaluate(&a, &north_of(a, km)).unwrap();
            assert!(link.cost >= previous, "cost should not fall with distance");
            previous = link.cost;
        }

        // 50 km: bulge ~49.05 m, excess ~29.05 m at 0.2 dB/m
        let link = model.evaluate(&a, &north_of(a, 50.0)).unwrap();
        assert_relative_eq!(link.bulge_m, 49.05, epsilon = 0.01);
        assert_relative_eq!(link.penalty_db, 6.0 + 29.05 * 0.2, epsilon = 0.01);
    }

    #[test]
    fn test_colocated_is_free() {
        let model = LinkModel::new(LinkCostParams::default());
        let a = Position::new(45.0, 7.0);
        let link = model.evaluate(&a, &a).unwrap();
        assert_eq!(link.cost, 0.0);
    }

    #[test]
    fn test_flat_terrain_does_not_block_short_link() {
        let model = LinkModel::new(LinkCostParams::default()).with_terrain(Arc::new(FlatTerrain(120.0)));
        let a = Position::new(45.0, 7.0);
        let link = model.evaluate(&a, &north_of(a, 5.0)).unwrap();
        assert!(!link.terrain_blocked);
    }

    #[test]
    fn test_curvature_blocks_long_link_over_flat_terrain() {
        // 60 km with 20 m masts: midpoint drop ~70.6 m clears nothing
        let model = LinkModel::new(LinkCostParams::default()).with_terrain(Arc::new(FlatTerrain(0.0)));
        let a = Position::new(45.0, 7.0);
        let link = model.evaluate(&a, &north_of(a, 60.0)).unwrap();
        assert!(link.terrain_blocked);
        assert!(link.penalty_db >= 36.0);
    }

    struct Wall {
        lat_min: f64,
        lat_max: f64,
        height: f64,
    }

    impl ElevationSource for Wall {
        fn elevation_m(&self, lat: f64, _lon: f64) -> Option<f64> {
            if lat >= self.lat_min && lat <= self.lat_max {
                Some(self.height)
            } else {
                Some(0.0)
            }
        }
    }

    #[test]
    fn test_wall_blocks_and_adds_penalty() {
        let a = Position::new(45.0, 7.0);
        let b = north_of(a, 10.0);
        let wall = Arc::new(Wall {
            lat_min: 45.04,
            lat_max: 45.05,
            height: 300.0,
        });
        let model = LinkModel::new(LinkCostParams::default()).with_terrain(wall);
        let link = model.evaluate(&a, &b).unwrap();
        assert!(link.terrain_blocked);
        assert_relative_eq!(link.penalty_db, 36.0, epsilon = 1e-9);
    }

    struct Holes;

    impl ElevationSource for Holes {
        fn elevation_m(&self, lat: f64, _lon: f64) -> Option<f64> {
            // Every interior sample is no-data or non-finite
            if lat > 45.0 + 1e-9 && lat < 45.0 + 10.0 / KM_PER_DEG - 1e-9 {
                if lat < 45.05 {
                    None
                } else {
                    Some(f64::NAN)
                }
            } else {
                Some(0.0)
            }
        }
    }

    #[test]
    fn test_no_data_samples_are_excluded() {
        let a = Position::new(45.0, 7.0);
        let b = north_of(a, 10.0);
        let model = LinkModel::new(LinkCostParams::default()).with_terrain(Arc::new(Holes));
        let link = model.evaluate(&a, &b).unwrap();
        assert!(!link.terrain_blocked);
    }
}
