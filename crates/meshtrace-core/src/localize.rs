//! Maximum-likelihood placement of a ghost cluster.
//!
//! Each member charges a candidate location the implied path-loss cost of
//! relaying that packet: the link cost from its left anchor to the candidate
//! plus the link cost on to its right anchor, with terrain and bulge applied
//! by the shared [`LinkModel`]. A geometric residual in km keeps the surface
//! well-posed where link cost is flat:
//!
//! - distance from the member's own interpolated estimate,
//! - detour past the straight line between its two anchors,
//! - weighted overshoot of the horizon to either anchor.
//!
//! Link cost is piecewise constant wherever terrain decides the outcome, so
//! the search starts from the best point of a coarse grid over the clustering
//! radius and is then refined with Nelder-Mead in a local east/north plane
//! (km) centered on the cluster centroid.

use crate::cluster::Cluster;
use crate::config::{ClusteringConfig, LocalizationConfig};
use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::neldermead::NelderMead;
use meshtrace_common::Position;
use meshtrace_link::LinkModel;
use statrs::statistics::Statistics;
use thiserror::Error;

/// Errors refining a cluster location.
#[derive(Debug, Error)]
pub enum LocalizeError {
    /// The cluster has no members.
    #[error("cluster has no members")]
    EmptyCluster,

    /// The optimizer failed.
    #[error("optimization failed: {0}")]
    OptimizationFailed(String),
}

/// Refined location of a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Localization {
    /// Estimated position.
    pub position: Position,
    /// Confidence in (0, 1].
    pub confidence: f64,
    /// Mean anchor-to-anchor link cost through the estimate.
    pub mean_link_cost: f64,
    /// Mean geometric member residual at the estimate, km.
    pub mean_residual_km: f64,
    /// Population standard deviation of geometric member residuals, km.
    pub residual_spread_km: f64,
}

/// Charged for a leg the link model rejects, in cost units. Large enough to
/// dominate any feasible pair of legs, finite so the simplex can still move.
const INFEASIBLE_LEG_COST: f64 = 50.0;

/// Grid points on each side of the centroid in the seed search.
const SEED_STEPS: i32 = 2;

/// Member geometry in plane coordinates (km), plus its anchors for the link
/// model.
#[derive(Debug, Clone, Copy)]
struct Member {
    estimate: [f64; 2],
    left: [f64; 2],
    right: [f64; 2],
    span: f64,
    left_at: Position,
    right_at: Position,
}

#[derive(Debug, Clone)]
struct PlacementCost {
    origin: Position,
    members: Vec<Member>,
    model: LinkModel,
    horizon_weight: f64,
    link_cost_weight: f64,
}

fn plane_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

impl PlacementCost {
    fn position(&self, x: [f64; 2]) -> Position {
        self.origin.offset_m(x[0] * 1000.0, x[1] * 1000.0)
    }

    fn geometric(&self, member: &Member, x: [f64; 2]) -> f64 {
        let horizon_km = self.model.params().horizon_km;
        let to_left = plane_distance(x, member.left);
        let to_right = plane_distance(x, member.right);
        let detour = (to_left + to_right - member.span).max(0.0);
        let overshoot = (to_left - horizon_km).max(0.0) + (to_right - horizon_km).max(0.0);
        plane_distance(x, member.estimate) + detour + self.horizon_weight * overshoot
    }

    fn link_cost(&self, member: &Member, at: &Position) -> f64 {
        let leg = |anchor: &Position| self.model.cost(anchor, at).unwrap_or(INFEASIBLE_LEG_COST);
        leg(&member.left_at) + leg(&member.right_at)
    }

    fn total(&self, x: [f64; 2]) -> f64 {
        let at = self.position(x);
        self.members
            .iter()
            .map(|m| self.geometric(m, x) + self.link_cost_weight * self.link_cost(m, &at))
            .sum()
    }

    /// Best point of a square grid of `2 * SEED_STEPS + 1` points a side
    /// spanning `radius_km` around the centroid.
    fn seed(&self, radius_km: f64) -> [f64; 2] {
        let step = radius_km / f64::from(SEED_STEPS);
        let mut best = ([0.0, 0.0], self.total([0.0, 0.0]));
        for i in -SEED_STEPS..=SEED_STEPS {
            for j in -SEED_STEPS..=SEED_STEPS {
                let x = [f64::from(i) * step, f64::from(j) * step];
                let cost = self.total(x);
                if cost < best.1 {
                    best = (x, cost);
                }
            }
        }
        best.0
    }
}

impl CostFunction for PlacementCost {
    type Param = Vec<f64>; // [east_km, north_km]
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> Result<Self::Output, ArgminError> {
        Ok(self.total([p[0], p[1]]))
    }
}

/// Confidence from support and residual spread.
///
/// Grows with the number of supporting packets relative to `min_points` and
/// shrinks as residuals spread out relative to the clustering radius.
pub fn confidence(support: usize, spread_km: f64, clustering: &ClusteringConfig) -> f64 {
    let size = 1.0 - (-(support as f64) / clustering.min_points.max(1) as f64).exp();
    size / (1.0 + spread_km.max(0.0) / clustering.radius_km)
}

/// Refines a cluster's location against the link model, terrain included
/// when the model has a terrain source.
pub fn localize(
    cluster: &Cluster,
    model: &LinkModel,
    clustering: &ClusteringConfig,
    config: &LocalizationConfig,
) -> Result<Localization, LocalizeError> {
    if cluster.members.is_empty() {
        return Err(LocalizeError::EmptyCluster);
    }

    let origin = cluster.centroid;
    let to_plane = |p: &Position| {
        let (east, north) = origin.local_offset_m(p);
        [east / 1000.0, north / 1000.0]
    };
    let members = cluster
        .members
        .iter()
        .map(|m| Member {
            estimate: to_plane(&m.position),
            left: to_plane(&m.left),
            right: to_plane(&m.right),
            span: m.left.distance_km(&m.right),
            left_at: m.left,
            right_at: m.right,
        })
        .collect();
    let cost_fn = PlacementCost {
        origin,
        members,
        model: model.clone(),
        horizon_weight: config.horizon_weight,
        link_cost_weight: config.link_cost_weight,
    };

    let scorer = cost_fn.clone();
    let step = clustering.radius_km / 2.0;
    let [e, n] = scorer.seed(clustering.radius_km);
    let solver = NelderMead::new(vec![vec![e, n], vec![e + step, n], vec![e, n + step]]);

    let res = Executor::new(cost_fn, solver)
        .configure(|state| state.max_iters(config.max_iters))
        .run()
        .map_err(|e| LocalizeError::OptimizationFailed(e.to_string()))?;

    let best = res
        .state()
        .get_best_param()
        .ok_or_else(|| LocalizeError::OptimizationFailed("no solution found".to_string()))?;
    let x = [best[0], best[1]];
    if !(x[0].is_finite() && x[1].is_finite()) {
        return Err(LocalizeError::OptimizationFailed(format!(
            "non-finite estimate ({}, {})",
            x[0], x[1]
        )));
    }

    let position = scorer.position(x);
    let count = scorer.members.len() as f64;
    let residuals: Vec<f64> = scorer.members.iter().map(|m| scorer.geometric(m, x)).collect();
    let mean = residuals.iter().sum::<f64>() / count;
    let spread = residuals.iter().population_std_dev();
    let spread = if spread.is_finite() { spread } else { 0.0 };
    let mean_link_cost = scorer
        .members
        .iter()
        .map(|m| scorer.link_cost(m, &position))
        .sum::<f64>()
        / count;

    Ok(Localization {
        position,
        confidence: confidence(cluster.support(), spread, clustering),
        mean_link_cost,
        mean_residual_km: mean,
        residual_spread_km: spread,
    })
}

/// Fallback when refinement fails: the centroid, with confidence from
/// support alone.
pub fn centroid_only(cluster: &Cluster, clustering: &ClusteringConfig) -> Localization {
    Localization {
        position: cluster.centroid,
        confidence: confidence(cluster.support(), 0.0, clustering),
        mean_link_cost: 0.0,
        mean_residual_km: 0.0,
        residual_spread_km: 0.0,
    }
}
