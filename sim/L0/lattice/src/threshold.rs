//! Per-bond compaction thresholds.
//!
//! Each bond gets a force threshold drawn once from a Gaussian with mean
//! `F0cr` and standard deviation `F0cr * D`, where `D` is the disorder. In a
//! stratified sample the mean depends on the layer of the bond's
//! lower-indexed endpoint.
//!
//! Thresholds are stored per node and per direction, and both ends of a bond
//! hold the same value.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::direction::Direction;
use crate::error::{LatticeError, Result};
use crate::layers::Stratification;
use crate::topology::LatticeTopology;

/// Compaction thresholds for every bond of a lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdField {
    values: Vec<[Option<f64>; 6]>,
}

impl ThresholdField {
    /// Draw thresholds with a single mean for the whole lattice.
    ///
    /// # Errors
    ///
    /// Fails if `mean` is not positive or `disorder` is negative.
    pub fn generate<T, R>(topology: &T, mean: f64, disorder: f64, rng: &mut R) -> Result<Self>
    where
        T: LatticeTopology + ?Sized,
        R: Rng + ?Sized,
    {
        let normal = gaussian(mean, disorder)?;
        Self::sample_bonds(topology, rng, |_| Ok(normal))
    }

    /// Draw thresholds whose mean depends on the layer of each bond.
    ///
    /// `means[0]` applies to layer 0 and `means[1]` to layer 1. Node
    /// positions are scaled by `rest_length` before being classified.
    ///
    /// # Errors
    ///
    /// Fails if a mean is not positive or `disorder` is negative.
    pub fn stratified<T, R>(
        topology: &T,
        rest_length: f64,
        stratification: &Stratification,
        means: [f64; 2],
        disorder: f64,
        rng: &mut R,
    ) -> Result<Self>
    where
        T: LatticeTopology + ?Sized,
        R: Rng + ?Sized,
    {
        let normals = [gaussian(means[0], disorder)?, gaussian(means[1], disorder)?];
        Self::sample_bonds(topology, rng, |node| {
            let position = topology.rest_position(node)? * rest_length;
            Ok(normals[stratification.layer_at(position).index()])
        })
    }

    fn sample_bonds<T, R, F>(topology: &T, rng: &mut R, mut distribution: F) -> Result<Self>
    where
        T: LatticeTopology + ?Sized,
        R: Rng + ?Sized,
        F: FnMut(usize) -> Result<Normal<f64>>,
    {
        let n = topology.node_count();
        let mut values = vec![[None; 6]; n];

        for node in 0..n {
            let normal = distribution(node)?;
            for dir in Direction::FORWARD {
                if let Some(other) = topology.neighbor(node, dir)? {
                    let threshold = normal.sample(rng);
                    values[node][dir.slot()] = Some(threshold);
                    values[other][dir.opposite().slot()] = Some(threshold);
                }
            }
        }

        Ok(Self { values })
    }

    /// Threshold of the bond leaving `node` in direction `dir`.
    ///
    /// Returns `None` for a missing bond or an unknown node.
    #[must_use]
    pub fn get(&self, node: usize, dir: Direction) -> Option<f64> {
        self.values.get(node).and_then(|slots| slots[dir.slot()])
    }

    /// Number of nodes covered by the field.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.values.len()
    }

    /// Iterate over `(node, direction, threshold)` for every bond end.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Direction, f64)> + '_ {
        self.values.iter().enumerate().flat_map(|(node, slots)| {
            Direction::ALL
                .into_iter()
                .filter_map(move |dir| slots[dir.slot()].map(|value| (node, dir, value)))
        })
    }
}

fn gaussian(mean: f64, disorder: f64) -> Result<Normal<f64>> {
    if !mean.is_finite() || mean <= 0.0 {
        return Err(LatticeError::invalid_parameter(
            "threshold_mean",
            format!("must be positive, got {mean}"),
        ));
    }
    if !disorder.is_finite() || disorder < 0.0 {
        return Err(LatticeError::invalid_parameter(
            "disorder",
            format!("must be non-negative, got {disorder}"),
        ));
    }
    Normal::new(mean, mean * disorder)
        .map_err(|e| LatticeError::InvalidDistribution(e.to_string()))
}
