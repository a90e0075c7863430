//! # meshtrace-link
//!
//! Physical plausibility of a radio link between two positions, expressed as
//! an additive cost in negative-log-likelihood units.
//!
//! The model has three terms, all specified in dB and converted with
//! [`DB_TO_COST`]:
//!
//! - a distance-independent base cost per hop
//! - a linear penalty for Earth bulge above the antenna height
//! - a fixed penalty when terrain infringes the first Fresnel zone
//!
//! Links longer than the horizon cutoff are infeasible and have no cost.

mod cost;
mod elevation;
mod params;

pub use cost::{LinkCost, LinkModel};
pub use elevation::{ElevationSource, FlatTerrain};
pub use params::{
    cost_to_db, db_to_cost, fresnel_radius_m, LinkCostParams, LinkParamsError, DB_TO_COST,
};
