//! Link cost parameters and unit conversion.

use thiserror::Error;

/// Converts decibels into cost units (natural-log likelihood).
///
/// A power ratio of `x` dB has negative log-likelihood `x * ln(10) / 10`
/// nats, so dB penalties and costs add in the same space.
pub const DB_TO_COST: f64 = std::f64::consts::LN_10 / 10.0;

/// Speed of light in m/s.
const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Converts a dB penalty into cost units.
pub fn db_to_cost(db: f64) -> f64 {
    db * DB_TO_COST
}

/// Converts cost units back into dB.
pub fn cost_to_db(cost: f64) -> f64 {
    cost / DB_TO_COST
}

/// Invalid link cost parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkParamsError {
    /// A numeric parameter is outside its valid range.
    #[error("{name} must be {requirement}, got {value}")]
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Value supplied.
        value: f64,
        /// Human-readable constraint.
        requirement: &'static str,
    },

    /// The terrain profile needs at least two segments.
    #[error("max_terrain_samples must be at least 2, got {0}")]
    TooFewSamples(usize),
}

/// Parameters of the physical link cost model.
///
/// Defaults describe an EU 869 MHz LoRa mesh of rooftop repeaters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkCostParams {
    /// Hard range cutoff in km. Longer links are infeasible.
    pub horizon_km: f64,
    /// Antenna height above ground in meters; Earth bulge up to this is free.
    pub antenna_height_m: f64,
    /// Penalty per meter of bulge above the antenna height, in dB.
    pub bulge_penalty_db_per_m: f64,
    /// Penalty for a terrain-obstructed path, in dB.
    pub terrain_penalty_db: f64,
    /// Distance-independent cost of any over-the-air hop, in dB.
    pub base_cost_db: f64,
    /// Link quality with zero excess cost, in dBm. Used to convert quality
    /// figures such as the ghost penalty into cost units.
    pub reference_quality_dbm: f64,
    /// Carrier frequency in MHz (sets the Fresnel zone width).
    pub frequency_mhz: f64,
    /// Fraction of the first Fresnel zone that must stay clear.
    pub fresnel_clearance: f64,
    /// Distance between terrain samples along a path, in meters.
    pub terrain_sample_spacing_m: f64,
    /// Upper bound on segments per terrain profile.
    pub max_terrain_samples: usize,
    /// Endpoints closer than this are the same site and cost nothing.
    pub colocated_distance_m: f64,
}

impl Default for LinkCostParams {
    fn default() -> Self {
        Self {
            horizon_km: 100.0,
            antenna_height_m: 20.0,
            bulge_penalty_db_per_m: 0.2,
            terrain_penalty_db: 30.0,
            base_cost_db: 6.0,
            reference_quality_dbm: -80.0,
            frequency_mhz: 869.525,
            fresnel_clearance: 0.6,
            terrain_sample_spacing_m: 100.0,
            max_terrain_samples: 1024,
            colocated_distance_m: 1.0,
        }
    }
}

impl LinkCostParams {
    /// Checks every parameter against its valid range.
    pub fn validate(&self) -> Result<(), LinkParamsError> {
        positive("horizon_km", self.horizon_km)?;
        non_negative("antenna_height_m", self.antenna_height_m)?;
        non_negative("bulge_penalty_db_per_m", self.bulge_penalty_db_per_m)?;
        non_negative("terrain_penalty_db", self.terrain_penalty_db)?;
        non_negative("base_cost_db", self.base_cost_db)?;
        if !self.reference_quality_dbm.is_finite() {
            return Err(LinkParamsError::OutOfRange {
                name: "reference_quality_dbm",
                value: self.reference_quality_dbm,
                requirement: "finite",
            });
        }
        positive("frequency_mhz", self.frequency_mhz)?;
        non_negative("fresnel_clearance", self.fresnel_clearance)?;
        positive("terrain_sample_spacing_m", self.terrain_sample_spacing_m)?;
        non_negative("colocated_distance_m", self.colocated_distance_m)?;
        if self.max_terrain_samples < 2 {
            return Err(LinkParamsError::TooFewSamples(self.max_terrain_samples));
        }
        Ok(())
    }

    /// Horizon cutoff in meters.
    pub fn horizon_m(&self) -> f64 {
        self.horizon_km * 1000.0
    }

    /// Carrier wavelength in meters.
    pub fn wavelength_m(&self) -> f64 {
        SPEED_OF_LIGHT / (self.frequency_mhz * 1e6)
    }

    /// Cost of a link with the given quality in dBm.
    ///
    /// -122 dBm against the default -80 dBm reference is 42 dB, about 9.67.
    pub fn quality_to_cost(&self, quality_dbm: f64) -> f64 {
        db_to_cost(self.reference_quality_dbm - quality_dbm)
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), LinkParamsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LinkParamsError::OutOfRange {
            name,
            value,
            requirement: "positive",
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), LinkParamsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LinkParamsError::OutOfRange {
            name,
            value,
            requirement: "non-negative",
        })
    }
}

/// Radius of the first Fresnel zone at `d1_m`/`d2_m` from the endpoints.
pub fn fresnel_radius_m(wavelength_m: f64, d1_m: f64, d2_m: f64) -> f64 {
    let total = d1_m + d2_m;
    if total <= 0.0 {
        return 0.0;
    }
    (wavelength_m * d1_m * d2_m / total).sqrt()
}
