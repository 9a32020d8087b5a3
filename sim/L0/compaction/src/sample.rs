//! Rock sample state: lattice, thresholds, displacement and compaction.

use std::fmt;

use nalgebra::{DVector, Point2, Vector2};
use rand::Rng;
use sim_lattice::{Direction, LatticeTopology, Stratification, ThresholdField, TriangularLattice};
use tracing::{debug, info};

use crate::bonds::BondStates;
use crate::error::{CompactionError, Result};
use crate::params::SampleParams;

/// Elastic constants shared by every bond.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Material {
    rest_length: f64,
    length_ratio: f64,
    /// `Ke * Ka / Rl`
    compacted_factor: f64,
    alpha0: f64,
}

impl Material {
    fn from_params(params: &SampleParams) -> Self {
        Self {
            rest_length: params.rest_length,
            length_ratio: params.length_ratio,
            compacted_factor: params.modulus_ratio * params.area_ratio / params.length_ratio,
            alpha0: params.base_stiffness(),
        }
    }
}

/// A rock sample under compression.
///
/// Owns the node displacement vector `u` (`[ux_0..ux_n, uy_0..uy_n]`), the
/// compaction state of every bond and the threshold field. The lattice
/// geometry is composed in through [`LatticeTopology`].
#[derive(Debug, Clone)]
pub struct Sample<T: LatticeTopology = TriangularLattice> {
    topology: T,
    thresholds: ThresholdField,
    bonds: BondStates,
    displacement: DVector<f64>,
    material: Material,
    threshold_mean: f64,
    disorder: f64,
    initial_height: f64,
}

impl Sample<TriangularLattice> {
    /// Build a sample from parameters, drawing thresholds from `rng`.
    ///
    /// A stratified sample uses `params.threshold_mean` in layer 0 and the
    /// stratification's own mean in layer 1.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of range. No partial sample
    /// is ever returned.
    pub fn new<R: Rng + ?Sized>(params: &SampleParams, rng: &mut R) -> Result<Self> {
        params.validate()?;
        let lattice = TriangularLattice::new(params.lines, params.cols)?;

        let thresholds = match &params.stratification {
            None => ThresholdField::generate(&lattice, params.threshold_mean, params.disorder, rng)?,
            Some(layers) => {
                let stratification =
                    Stratification::new(layers.dip_degrees, layers.thickness0, layers.thickness1)?;
                ThresholdField::stratified(
                    &lattice,
                    params.rest_length,
                    &stratification,
                    [params.threshold_mean, layers.threshold_mean],
                    params.disorder,
                    rng,
                )?
            }
        };

        let sample = Self::from_parts(lattice, thresholds, params)?;
        info!(
            lines = params.lines,
            cols = params.cols,
            nodes = sample.node_count(),
            bonds = sample.bond_count(),
            disorder = params.disorder,
            stratified = params.stratification.is_some(),
            "sample built"
        );
        Ok(sample)
    }
}

impl<T: LatticeTopology> Sample<T> {
    /// Assemble a sample from an existing topology and threshold field.
    ///
    /// Only the material fields of `params` are used; the dimensions come
    /// from `topology`.
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::InvalidParameter`] if the material is out
    /// of range or the field does not cover the topology.
    pub fn from_parts(topology: T, thresholds: ThresholdField, params: &SampleParams) -> Result<Self> {
        let material_only = SampleParams {
            lines: 3,
            cols: 3,
            stratification: None,
            ..params.clone()
        };
        material_only.validate()?;

        let n = topology.node_count();
        if thresholds.node_count() != n {
            return Err(CompactionError::invalid_parameter(
                "thresholds",
                format!("field covers {} nodes, lattice has {n}", thresholds.node_count()),
            ));
        }

        let mut initial_height = 0.0_f64;
        for node in 0..n {
            initial_height = initial_height.max(topology.rest_position(node)?.y);
        }

        Ok(Self {
            topology,
            thresholds,
            bonds: BondStates::new(n),
            displacement: DVector::zeros(2 * n),
            material: Material::from_params(params),
            threshold_mean: params.threshold_mean,
            disorder: params.disorder,
            initial_height,
        })
    }

    /// Lattice geometry.
    pub const fn topology(&self) -> &T {
        &self.topology
    }

    /// Compaction thresholds.
    pub const fn thresholds(&self) -> &ThresholdField {
        &self.thresholds
    }

    /// Compaction state of the bonds.
    pub const fn bonds(&self) -> &BondStates {
        &self.bonds
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.topology.node_count()
    }

    /// Number of bonds.
    pub fn bond_count(&self) -> usize {
        self.topology.bond_count()
    }

    /// Number of compacted bonds.
    pub fn compacted_count(&self) -> usize {
        self.bonds.compacted_count()
    }

    /// Percentage of bonds compacted; 0 for a topology without bonds.
    pub fn compaction_rate(&self) -> f64 {
        let bonds = self.bond_count();
        if bonds == 0 {
            return 0.0;
        }
        self.compacted_count() as f64 / bonds as f64 * 100.0
    }

    /// Mean compaction threshold (layer 0 for stratified samples).
    pub const fn threshold_mean(&self) -> f64 {
        self.threshold_mean
    }

    /// Relative threshold spread.
    pub const fn disorder(&self) -> f64 {
        self.disorder
    }

    /// Intact bond rest length `leq0`.
    pub const fn rest_length(&self) -> f64 {
        self.material.rest_length
    }

    /// Compacted over intact rest length `Rl`.
    pub const fn length_ratio(&self) -> f64 {
        self.material.length_ratio
    }

    /// Base bond stiffness `alpha0`.
    pub const fn base_stiffness(&self) -> f64 {
        self.material.alpha0
    }

    /// Initial height `h0`, in bond lengths.
    pub const fn initial_height(&self) -> f64 {
        self.initial_height
    }

    /// Rest length lost by a bond on compaction, `leq0 * (1 - Rl)`.
    pub fn compaction_shortening(&self) -> f64 {
        self.material.rest_length * (1.0 - self.material.length_ratio)
    }

    /// Stiffness of the bond leaving `node` in direction `dir`.
    ///
    /// `boost` multiplies the base stiffness (the platen friction or 1), and
    /// compacted bonds are further scaled by `Ke * Ka / Rl`.
    pub fn bond_stiffness(&self, node: usize, dir: Direction, boost: f64) -> f64 {
        let alpha = self.material.alpha0 * boost;
        if self.bonds.is_compacted(node, dir) {
            alpha * self.material.compacted_factor
        } else {
            alpha
        }
    }

    /// Full displacement vector, x components first.
    pub const fn displacement(&self) -> &DVector<f64> {
        &self.displacement
    }

    pub(crate) fn set_displacement(&mut self, displacement: DVector<f64>) {
        debug_assert_eq!(displacement.len(), self.displacement.len());
        self.displacement = displacement;
    }

    /// Displacement of one node.
    ///
    /// # Errors
    ///
    /// Fails if `node` is out of range.
    pub fn node_displacement(&self, node: usize) -> Result<Vector2<f64>> {
        let n = self.node_count();
        if node >= n {
            return Err(sim_lattice::LatticeError::index_out_of_range(node, n).into());
        }
        Ok(Vector2::new(self.displacement[node], self.displacement[node + n]))
    }

    /// Rest position of `node`.
    ///
    /// # Errors
    ///
    /// Fails if `node` is out of range.
    pub fn rest_position(&self, node: usize) -> Result<Point2<f64>> {
        Ok(self.topology.rest_position(node)? * self.material.rest_length)
    }

    /// Displaced position of `node`.
    ///
    /// # Errors
    ///
    /// Fails if `node` is out of range.
    pub fn position(&self, node: usize) -> Result<Point2<f64>> {
        Ok(self.rest_position(node)? + self.node_displacement(node)?)
    }

    /// Current length of the bond leaving `node` in direction `dir`, or
    /// `None` if there is no such bond.
    ///
    /// # Errors
    ///
    /// Fails if `node` is out of range.
    pub fn bond_length(&self, node: usize, dir: Direction) -> Result<Option<f64>> {
        let Some(other) = self.topology.neighbor(node, dir)? else {
            return Ok(None);
        };
        let axis = dir.unit() * self.material.rest_length;
        let stretch = self.node_displacement(other)? - self.node_displacement(node)?;
        Ok(Some((axis + stretch).norm()))
    }

    /// Compressive force carried by the bond leaving `node` in direction
    /// `dir`; positive when the bond is shorter than its rest length.
    ///
    /// Horizontal bonds on the platen rows are stiffened by `friction`.
    ///
    /// # Errors
    ///
    /// Fails if `node` is out of range.
    pub fn bond_tension(&self, node: usize, dir: Direction, friction: f64) -> Result<Option<f64>> {
        let Some(length) = self.bond_length(node, dir)? else {
            return Ok(None);
        };
        let boost = if dir.is_horizontal() && self.topology.is_platen(node)? {
            friction
        } else {
            1.0
        };
        let rest = if self.bonds.is_compacted(node, dir) {
            self.material.rest_length * self.material.length_ratio
        } else {
            self.material.rest_length
        };
        Ok(Some(-self.bond_stiffness(node, dir, boost) * (length - rest)))
    }

    /// Compact every intact bond whose tension exceeds its threshold.
    ///
    /// Each bond is examined once, from its lower endpoint looking right or
    /// up. Returns the number of bonds compacted by this call.
    ///
    /// # Errors
    ///
    /// Fails only on an inconsistent topology.
    pub fn find_compacted(&mut self, friction: f64) -> Result<usize> {
        let mut newly = 0;
        for node in 0..self.node_count() {
            for dir in Direction::RISING {
                if self.bonds.is_compacted(node, dir) {
                    continue;
                }
                let Some(other) = self.topology.neighbor(node, dir)? else {
                    continue;
                };
                let Some(threshold) = self.thresholds.get(node, dir) else {
                    continue;
                };
                let Some(tension) = self.bond_tension(node, dir, friction)? else {
                    continue;
                };
                if tension > threshold && self.bonds.compact(node, dir, other) {
                    newly += 1;
                }
            }
        }

        if newly > 0 {
            debug!(
                newly,
                total = self.compacted_count(),
                rate = self.compaction_rate(),
                "bonds compacted"
            );
        }
        Ok(newly)
    }
}

impl fmt::Display for Sample<TriangularLattice> {
    /// Draws the lattice in ASCII art followed by its main properties.
    ///
    /// ```text
    /// *---*---*
    ///  \ / \ /
    ///   *---*
    ///  / \ / \
    /// *---*---*
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self.topology.lines();
        let cols = self.topology.cols();
        let long_row = format!("{}*", "*---".repeat(cols - 1));
        let falling = " \\ /".repeat(cols - 1);
        let short_row = format!("  *{}", "---*".repeat(cols - 2));
        let rising = " / \\".repeat(cols - 1);

        for pair in 0..lines / 2 {
            writeln!(f, "{long_row}")?;
            writeln!(f, "{falling}")?;
            writeln!(f, "{short_row}")?;
            if lines % 2 == 1 || pair + 1 < lines / 2 {
                writeln!(f, "{rising}")?;
            }
        }
        if lines % 2 == 1 {
            writeln!(f, "{long_row}")?;
        }

        writeln!(f, "Disorder: {:.6}", self.disorder)?;
        writeln!(f, "F0cr: {:.6}", self.threshold_mean)?;
        writeln!(f, "Compacted springs: {:.0} %", self.compaction_rate().floor())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::params::StratifiedParams;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample(lines: usize, cols: usize) -> Sample {
        let params = SampleParams::new(lines, cols);
        Sample::new(&params, &mut StdRng::seed_from_u64(0)).unwrap()
    }

    #[test]
    fn test_new_sample_is_at_rest() {
        let s = sample(3, 3);
        assert_eq!(s.node_count(), 8);
        assert_eq!(s.bond_count(), 13);
        assert_eq!(s.displacement().len(), 16);
        assert!(s.displacement().iter().all(|&u| u == 0.0));
        assert_eq!(s.compacted_count(), 0);
        assert_relative_eq!(s.initial_height(), 3.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_invalid_params() {
        let mut rng = StdRng::seed_from_u64(0);
        let params = SampleParams::new(3, 3).with_rest_length(-1.0);
        assert!(matches!(
            Sample::new(&params, &mut rng),
            Err(CompactionError::InvalidParameter { name: "rest_length", .. })
        ));

        let layers = StratifiedParams {
            thickness0: 0.0,
            thickness1: 0.0,
            ..Default::default()
        };
        let params = SampleParams::new(3, 3).stratified(layers);
        assert!(Sample::new(&params, &mut rng).is_err());
    }

    #[test]
    fn test_from_parts_checks_field_size() {
        let lattice = TriangularLattice::new(3, 3).unwrap();
        let other = TriangularLattice::new(5, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let field = ThresholdField::generate(&other, 0.03, 0.0, &mut rng).unwrap();
        assert!(Sample::from_parts(lattice, field, &SampleParams::default()).is_err());
    }

    #[test]
    fn test_stiffness_rules() {
        let params = SampleParams::new(3, 3).with_compaction_ratios(0.5, 2.0, 3.0);
        let mut s = Sample::new(&params, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_relative_eq!(s.bond_stiffness(3, Direction::Right, 1.0), 1.0);
        assert_relative_eq!(s.bond_stiffness(0, Direction::Right, 20.0), 20.0);

        s.bonds.compact(3, Direction::Right, 4);
        // Ke * Ka / Rl = 3 * 2 / 0.5
        assert_relative_eq!(s.bond_stiffness(3, Direction::Right, 1.0), 12.0);
        assert_relative_eq!(s.bond_stiffness(4, Direction::Left, 2.0), 24.0);
        assert_relative_eq!(s.compaction_shortening(), 0.5);
    }

    #[test]
    fn test_bond_tension_under_compression() {
        let mut s = sample(3, 3);
        // Push the middle row down by 0.01: diagonals from the top shorten.
        let mut u = DVector::zeros(16);
        u[8 + 3] = 0.01;
        u[8 + 4] = 0.01;
        s.set_displacement(u);

        let down = s.bond_tension(3, Direction::DownLeft, 20.0).unwrap().unwrap();
        let up = s.bond_tension(3, Direction::UpLeft, 20.0).unwrap().unwrap();
        assert!(down > 0.0);
        assert!(up < 0.0);
        assert_eq!(s.bond_tension(0, Direction::Left, 20.0).unwrap(), None);
        // Unchanged horizontal bonds carry nothing.
        assert_relative_eq!(s.bond_tension(0, Direction::Right, 20.0).unwrap().unwrap(), 0.0);
    }

    #[test]
    fn test_find_compacted_uses_thresholds() {
        let mut s = sample(3, 3);
        let mut u = DVector::zeros(16);
        // Shorten every top-to-middle diagonal by roughly 0.043.
        for node in [0, 1, 2] {
            u[8 + node] = 0.05;
        }
        s.set_displacement(u);

        let newly = s.find_compacted(20.0).unwrap();
        assert_eq!(newly, 4);
        assert_eq!(s.compacted_count(), 4);
        assert!(s.bonds().is_compacted(3, Direction::UpLeft));
        assert!(s.bonds().is_compacted(0, Direction::DownRight));
        assert!(!s.bonds().is_compacted(3, Direction::DownLeft));

        // A second pass finds nothing new.
        assert_eq!(s.find_compacted(20.0).unwrap(), 0);
    }

    #[test]
    fn test_platen_friction_stiffens_horizontal_bonds() {
        let mut s = sample(3, 3);
        let mut u = DVector::zeros(16);
        // Squeeze the top horizontal bond 0-1 by 0.002.
        u[1] = -0.002;
        s.set_displacement(u);

        let soft = s.bond_tension(0, Direction::Right, 1.0).unwrap().unwrap();
        let stiff = s.bond_tension(0, Direction::Right, 20.0).unwrap().unwrap();
        assert_relative_eq!(soft, 0.002, epsilon = 1e-12);
        assert_relative_eq!(stiff, 0.04, epsilon = 1e-12);

        // 0.04 exceeds the 0.03 threshold only with friction.
        assert_eq!(s.clone().find_compacted(1.0).unwrap(), 0);
        assert_eq!(s.find_compacted(20.0).unwrap(), 1);
    }

    #[test]
    fn test_positions_scale_with_rest_length() {
        let params = SampleParams::new(3, 3).with_rest_length(2.0);
        let s = Sample::new(&params, &mut StdRng::seed_from_u64(0)).unwrap();
        let p = s.rest_position(4).unwrap();
        assert_relative_eq!(p.x, 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 3.0_f64.sqrt(), epsilon = 1e-12);
        assert!(s.position(8).is_err());
    }

    #[test]
    fn test_display_odd_lines() {
        let text = sample(3, 3).to_string();
        let expected = "*---*---*\n \\ / \\ /\n  *---*\n / \\ / \\\n*---*---*\n\
                        Disorder: 0.000000\nF0cr: 0.030000\nCompacted springs: 0 %\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_display_even_lines() {
        let text = sample(4, 3).to_string();
        let expected = "*---*---*\n \\ / \\ /\n  *---*\n / \\ / \\\n*---*---*\n \\ / \\ /\n  *---*\n";
        assert!(text.starts_with(expected));
        assert!(text.contains("Disorder"));
    }
}
