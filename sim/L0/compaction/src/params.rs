//! Sample and loading parameters.
//!
//! Defaults reproduce the reference sandstone experiment: a 23x15 lattice of
//! unit bonds whose rest length shrinks by 6% on compaction, thresholds
//! around 0.03 and a friction boost of 20 on the platen rows.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CompactionError, Result};

/// Geometry and material of a rock sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleParams {
    /// Number of node rows (`nlines`).
    pub lines: usize,
    /// Number of nodes on a long row (`ncols`).
    pub cols: usize,
    /// Rest length of an intact bond (`leq0`).
    pub rest_length: f64,
    /// Compacted rest length over intact rest length (`Rl`).
    pub length_ratio: f64,
    /// Cross-sectional area of an intact bond (`A0`).
    pub area: f64,
    /// Compacted area over intact area (`Ka`).
    pub area_ratio: f64,
    /// Young's modulus of an intact bond (`E0`).
    pub youngs_modulus: f64,
    /// Compacted modulus over intact modulus (`Ke`).
    pub modulus_ratio: f64,
    /// Mean compaction threshold (`F0cr`), layer 0 in stratified samples.
    pub threshold_mean: f64,
    /// Threshold standard deviation relative to the mean (`D`).
    pub disorder: f64,
    /// Dipping layers with a second threshold mean, if any.
    pub stratification: Option<StratifiedParams>,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            lines: 23,
            cols: 15,
            rest_length: 1.0,
            length_ratio: 0.94,
            area: 1.0,
            area_ratio: 1.0,
            youngs_modulus: 1.0,
            modulus_ratio: 1.0,
            threshold_mean: 0.03,
            disorder: 0.0,
            stratification: None,
        }
    }
}

impl SampleParams {
    /// Create parameters for a `lines` x `cols` sample with default material.
    #[must_use]
    pub fn new(lines: usize, cols: usize) -> Self {
        Self {
            lines,
            cols,
            ..Default::default()
        }
    }

    /// Set the mean threshold and the disorder.
    #[must_use]
    pub fn with_thresholds(mut self, mean: f64, disorder: f64) -> Self {
        self.threshold_mean = mean;
        self.disorder = disorder;
        self
    }

    /// Set the intact bond rest length.
    #[must_use]
    pub fn with_rest_length(mut self, rest_length: f64) -> Self {
        self.rest_length = rest_length;
        self
    }

    /// Set how a compacted bond differs from an intact one.
    #[must_use]
    pub fn with_compaction_ratios(mut self, length: f64, area: f64, modulus: f64) -> Self {
        self.length_ratio = length;
        self.area_ratio = area;
        self.modulus_ratio = modulus;
        self
    }

    /// Make the sample stratified.
    #[must_use]
    pub fn stratified(mut self, layers: StratifiedParams) -> Self {
        self.stratification = Some(layers);
        self
    }

    /// Base bond stiffness `alpha0 = E0 * A0 / leq0`.
    #[must_use]
    pub fn base_stiffness(&self) -> f64 {
        self.youngs_modulus * self.area / self.rest_length
    }

    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::InvalidParameter`] naming the first
    /// parameter out of range.
    pub fn validate(&self) -> Result<()> {
        if self.lines < 3 {
            return Err(CompactionError::invalid_parameter(
                "lines",
                format!("must be at least 3, got {}", self.lines),
            ));
        }
        if self.cols < 3 {
            return Err(CompactionError::invalid_parameter(
                "cols",
                format!("must be at least 3, got {}", self.cols),
            ));
        }

        for (name, value) in [
            ("rest_length", self.rest_length),
            ("length_ratio", self.length_ratio),
            ("area", self.area),
            ("area_ratio", self.area_ratio),
            ("youngs_modulus", self.youngs_modulus),
            ("modulus_ratio", self.modulus_ratio),
            ("threshold_mean", self.threshold_mean),
        ] {
            positive(name, value)?;
        }

        if !self.disorder.is_finite() || self.disorder < 0.0 {
            return Err(CompactionError::invalid_parameter(
                "disorder",
                format!("must be non-negative, got {}", self.disorder),
            ));
        }

        if let Some(layers) = &self.stratification {
            layers.validate()?;
        }

        Ok(())
    }
}

/// Second layer type of a stratified sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StratifiedParams {
    /// Mean compaction threshold in layer 1 (`F1cr`).
    pub threshold_mean: f64,
    /// Dip of the bedding in degrees.
    pub dip_degrees: f64,
    /// Thickness of layer 0 bands.
    pub thickness0: f64,
    /// Thickness of layer 1 bands.
    pub thickness1: f64,
}

impl Default for StratifiedParams {
    fn default() -> Self {
        Self {
            threshold_mean: 0.032,
            dip_degrees: 0.0,
            thickness0: 15.0,
            thickness1: 15.0,
        }
    }
}

impl StratifiedParams {
    /// Validate the layer parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::InvalidParameter`] for a non-positive
    /// threshold mean, a negative thickness or two empty layers.
    pub fn validate(&self) -> Result<()> {
        positive("layer_threshold_mean", self.threshold_mean)?;
        for (name, value) in [("thickness0", self.thickness0), ("thickness1", self.thickness1)] {
            if !value.is_finite() || value < 0.0 {
                return Err(CompactionError::invalid_parameter(
                    name,
                    format!("layer thickness cannot be negative, got {value}"),
                ));
            }
        }
        if self.thickness0 + self.thickness1 <= 0.0 {
            return Err(CompactionError::invalid_parameter(
                "thickness1",
                "layers cannot both be empty",
            ));
        }
        Ok(())
    }
}

/// Loading protocol of a compression experiment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoadingParams {
    /// Horizontal confinement force on the side nodes (`F0x`).
    pub confinement_force: f64,
    /// Stiffness boost on the platen rows from friction (`Kbc`).
    pub friction: f64,
    /// Prescribed platen displacement before loading starts (`d0`).
    pub initial_displacement: f64,
    /// Displacement added once a step produces no new compaction.
    pub displacement_increment: f64,
    /// Stop once this percentage of bonds is compacted.
    pub max_compaction: f64,
    /// Stop once the mean vertical platen force exceeds this value.
    pub force_ceiling: Option<f64>,
    /// Stop after this many solves.
    pub max_iterations: Option<u64>,
}

impl Default for LoadingParams {
    fn default() -> Self {
        Self {
            confinement_force: 0.0,
            friction: 20.0,
            initial_displacement: 0.0,
            displacement_increment: 0.005,
            max_compaction: 40.0,
            force_ceiling: None,
            max_iterations: None,
        }
    }
}

impl LoadingParams {
    /// Set the confinement force.
    #[must_use]
    pub fn with_confinement(mut self, force: f64) -> Self {
        self.confinement_force = force;
        self
    }

    /// Set the platen friction multiplier.
    #[must_use]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    /// Set the displacement increment.
    #[must_use]
    pub fn with_increment(mut self, increment: f64) -> Self {
        self.displacement_increment = increment;
        self
    }

    /// Set the initial displacement.
    #[must_use]
    pub fn with_initial_displacement(mut self, displacement: f64) -> Self {
        self.initial_displacement = displacement;
        self
    }

    /// Set the target compaction percentage.
    #[must_use]
    pub fn with_max_compaction(mut self, percent: f64) -> Self {
        self.max_compaction = percent;
        self
    }

    /// Stop when the vertical force exceeds `ceiling`.
    #[must_use]
    pub fn with_force_ceiling(mut self, ceiling: f64) -> Self {
        self.force_ceiling = Some(ceiling);
        self
    }

    /// Stop after `iterations` solves.
    #[must_use]
    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Validate the loading protocol.
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::InvalidParameter`] naming the first
    /// parameter out of range.
    pub fn validate(&self) -> Result<()> {
        if !self.confinement_force.is_finite() {
            return Err(CompactionError::invalid_parameter(
                "confinement_force",
                "must be finite",
            ));
        }
        if !self.friction.is_finite() || self.friction < 1.0 {
            return Err(CompactionError::invalid_parameter(
                "friction",
                format!("must be at least 1, got {}", self.friction),
            ));
        }
        if !self.initial_displacement.is_finite() {
            return Err(CompactionError::invalid_parameter(
                "initial_displacement",
                "must be finite",
            ));
        }
        if !self.displacement_increment.is_finite() || self.displacement_increment < 0.0 {
            return Err(CompactionError::invalid_parameter(
                "displacement_increment",
                format!("must be non-negative, got {}", self.displacement_increment),
            ));
        }
        if !(self.max_compaction > 0.0 && self.max_compaction < 100.0) {
            return Err(CompactionError::invalid_parameter(
                "max_compaction",
                format!("must be in (0, 100), got {}", self.max_compaction),
            ));
        }
        if let Some(ceiling) = self.force_ceiling {
            positive("force_ceiling", ceiling)?;
        }
        if self.max_iterations == Some(0) {
            return Err(CompactionError::invalid_parameter(
                "max_iterations",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CompactionError::invalid_parameter(
            name,
            format!("must be positive, got {value}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SampleParams::default().validate().is_ok());
        assert!(LoadingParams::default().validate().is_ok());
        assert!(
            SampleParams::default()
                .stratified(StratifiedParams::default())
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_base_stiffness() {
        let mut params = SampleParams::new(5, 5);
        params.youngs_modulus = 3.0;
        params.area = 2.0;
        params.rest_length = 1.5;
        assert_relative_eq!(params.base_stiffness(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_sample() {
        assert!(SampleParams::new(2, 5).validate().is_err());
        assert!(SampleParams::new(5, 5).with_rest_length(0.0).validate().is_err());
        assert!(SampleParams::new(5, 5).with_thresholds(0.03, -0.1).validate().is_err());
        assert!(
            SampleParams::new(5, 5)
                .with_compaction_ratios(0.0, 1.0, 1.0)
                .validate()
                .is_err()
        );

        let layers = StratifiedParams {
            thickness0: -1.0,
            ..Default::default()
        };
        assert!(SampleParams::new(5, 5).stratified(layers).validate().is_err());
    }

    #[test]
    fn test_rejects_bad_loading() {
        assert!(LoadingParams::default().with_friction(0.5).validate().is_err());
        assert!(LoadingParams::default().with_increment(-0.1).validate().is_err());
        assert!(LoadingParams::default().with_max_compaction(0.0).validate().is_err());
        assert!(LoadingParams::default().with_max_compaction(100.0).validate().is_err());
        assert!(LoadingParams::default().with_force_ceiling(0.0).validate().is_err());
        assert!(LoadingParams::default().with_max_iterations(0).validate().is_err());
    }
}
