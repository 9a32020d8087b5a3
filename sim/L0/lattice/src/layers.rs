//! Dipping stratification of a sample into two alternating layer types.
//!
//! A point is projected onto the axis perpendicular to the bedding planes,
//! `p = y * cos(dip) - x * sin(dip)`, and the projection is folded into the
//! combined period `thickness0 + thickness1`. Bands are half-open: a point
//! belongs to layer 0 when `p mod period` lies in `[0, thickness0)`.

use nalgebra::Point2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, Result};

/// Which of the two alternating layer types a point falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Layer {
    /// Layers of thickness `thickness0`.
    Zero,
    /// Layers of thickness `thickness1`.
    One,
}

impl Layer {
    /// Numeric layer id (0 or 1).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

/// Bedding geometry: dip angle and the thickness of both layer types.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stratification {
    dip_degrees: f64,
    thickness0: f64,
    thickness1: f64,
}

impl Stratification {
    /// Create a stratification.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::InvalidParameter`] if a thickness is negative
    /// or non-finite, if both thicknesses are zero, or if the dip is not
    /// finite.
    pub fn new(dip_degrees: f64, thickness0: f64, thickness1: f64) -> Result<Self> {
        if !dip_degrees.is_finite() {
            return Err(LatticeError::invalid_parameter(
                "dip",
                format!("must be finite, got {dip_degrees}"),
            ));
        }
        for (name, value) in [("thickness0", thickness0), ("thickness1", thickness1)] {
            if !value.is_finite() || value < 0.0 {
                return Err(LatticeError::invalid_parameter(
                    name,
                    format!("layer thickness cannot be negative, got {value}"),
                ));
            }
        }
        if thickness0 + thickness1 <= 0.0 {
            return Err(LatticeError::invalid_parameter(
                "thickness0",
                "at least one layer type must have a positive thickness",
            ));
        }

        Ok(Self {
            dip_degrees,
            thickness0,
            thickness1,
        })
    }

    /// Dip angle in degrees.
    #[must_use]
    pub const fn dip_degrees(&self) -> f64 {
        self.dip_degrees
    }

    /// Thickness of layer 0.
    #[must_use]
    pub const fn thickness0(&self) -> f64 {
        self.thickness0
    }

    /// Thickness of layer 1.
    #[must_use]
    pub const fn thickness1(&self) -> f64 {
        self.thickness1
    }

    /// Combined thickness of one layer pair.
    #[must_use]
    pub fn period(&self) -> f64 {
        self.thickness0 + self.thickness1
    }

    /// Signed distance of `point` along the axis normal to the bedding.
    #[must_use]
    pub fn projection(&self, point: Point2<f64>) -> f64 {
        let (sin, cos) = self.dip_degrees.to_radians().sin_cos();
        point.y * cos - point.x * sin
    }

    /// Layer containing the given projection.
    #[must_use]
    pub fn layer_of_projection(&self, projection: f64) -> Layer {
        if projection.rem_euclid(self.period()) < self.thickness0 {
            Layer::Zero
        } else {
            Layer::One
        }
    }

    /// Layer containing `point`.
    #[must_use]
    pub fn layer_at(&self, point: Point2<f64>) -> Layer {
        self.layer_of_projection(self.projection(point))
    }
}
