//! Quasi-static equilibrium of the lattice.
//!
//! One solver cycle is **assemble -> solve -> postprocess**:
//!
//! 1. Assemble the `2n x 2n` stiffness matrix `A` and the load vector `F`
//!    from the sample's current compaction state.
//! 2. Solve `A u = F` for the node displacements.
//! 3. Compute the mean vertical force on the platens and compact every bond
//!    whose force exceeds its threshold.
//!
//! # Boundary conditions
//!
//! The y displacement of the top and bottom rows is prescribed: their y rows
//! of `A` are replaced by identity rows and `F` holds `+d/2` on top and
//! `-d/2` at the bottom. Their x rows keep the elastic stencil with every
//! bond stiffened by the platen friction `Kbc`. Side nodes carry the
//! confinement force `F0x`.
//!
//! Nothing pins the sample horizontally, so `A` has a rigid x translation
//! in its null space. The solve closes it by requiring the x displacements
//! to sum to zero: `A` is bordered with one row and one column of ones over
//! the x unknowns and the `(2n + 1)` system is solved instead. The load is
//! always consistent with `A`, so the multiplier of the extra row is zero.
//!
//! # Storage
//!
//! Assembly produces a sparse [`StiffnessMatrix`], but the solve copies it
//! into a dense `(2n + 1) x (2n + 1)` matrix and factors that with LU on
//! every cycle. The sparse form is the assembly and inspection format only.

use nalgebra::{DMatrix, DVector};
use sim_lattice::{Direction, LatticeTopology};
use tracing::debug;

use crate::assembly::{StiffnessBuilder, StiffnessMatrix};
use crate::error::{CompactionError, Result};
use crate::params::LoadingParams;
use crate::sample::Sample;

/// Result of one solver cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equilibrium {
    /// Mean vertical force on the platen nodes (`Fy`).
    pub vertical_force: f64,
    /// Bonds compacted by this cycle.
    pub newly_compacted: usize,
}

/// Builds and solves the equilibrium system for a fixed set of boundary
/// conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumSolver {
    friction: f64,
    confinement_force: f64,
}

impl EquilibriumSolver {
    /// Create a solver with platen friction `friction` (`Kbc`) and side
    /// confinement `confinement_force` (`F0x`).
    #[must_use]
    pub const fn new(friction: f64, confinement_force: f64) -> Self {
        Self {
            friction,
            confinement_force,
        }
    }

    /// Solver for the boundary conditions of a loading protocol.
    #[must_use]
    pub const fn from_params(params: &LoadingParams) -> Self {
        Self::new(params.friction, params.confinement_force)
    }

    /// Platen friction multiplier.
    #[must_use]
    pub const fn friction(&self) -> f64 {
        self.friction
    }

    /// Side confinement force.
    #[must_use]
    pub const fn confinement_force(&self) -> f64 {
        self.confinement_force
    }

    /// Assemble the global stiffness matrix.
    ///
    /// # Errors
    ///
    /// Fails only on an inconsistent topology.
    pub fn assemble_stiffness<T: LatticeTopology>(&self, sample: &Sample<T>) -> Result<StiffnessMatrix> {
        let topology = sample.topology();
        let n = topology.node_count();
        let mut builder = StiffnessBuilder::new(2 * n);

        for node in 0..n {
            let platen = topology.is_platen(node)?;
            let boost = if platen {
                builder.add(node + n, node + n, 1.0);
                self.friction
            } else {
                1.0
            };

            for dir in Direction::ALL {
                let Some(other) = topology.neighbor(node, dir)? else {
                    continue;
                };
                let alpha = sample.bond_stiffness(node, dir, boost);
                builder.add_bond(node, other, n, &dir.unit(), alpha, platen);
            }
        }

        Ok(builder.build())
    }

    /// Assemble the load vector for prescribed platen displacement
    /// `displacement`.
    ///
    /// # Errors
    ///
    /// Fails only on an inconsistent topology.
    pub fn assemble_load<T: LatticeTopology>(
        &self,
        sample: &Sample<T>,
        displacement: f64,
    ) -> Result<DVector<f64>> {
        let topology = sample.topology();
        let n = topology.node_count();
        let shortening = sample.compaction_shortening();
        let mut load = DVector::zeros(2 * n);

        for node in 0..n {
            if topology.is_left(node)? {
                load[node] += self.confinement_force;
            } else if topology.is_right(node)? {
                load[node] -= self.confinement_force;
            }

            let top = topology.is_top(node)?;
            let bottom = topology.is_bottom(node)?;
            if top {
                load[node + n] = displacement / 2.0;
            } else if bottom {
                load[node + n] = -displacement / 2.0;
            }
            let platen = top || bottom;
            let boost = if platen { self.friction } else { 1.0 };

            // Compacted bonds pull their ends toward the shorter rest length.
            for dir in Direction::ALL {
                if topology.neighbor(node, dir)?.is_none() || !sample.bonds().is_compacted(node, dir) {
                    continue;
                }
                let correction = -sample.bond_stiffness(node, dir, boost) * shortening;
                let axis = dir.unit();
                load[node] += correction * axis.x;
                if !platen {
                    load[node + n] += correction * axis.y;
                }
            }
        }

        Ok(load)
    }

    /// Solve `A u = F` with the x displacements summing to zero.
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::SingularSystem`] if the system cannot be
    /// factored or the solution is not finite.
    pub fn solve_displacement(&self, stiffness: &StiffnessMatrix, load: &DVector<f64>) -> Result<DVector<f64>> {
        let size = stiffness.size();
        let singular = || CompactionError::SingularSystem { dimension: size };
        if load.len() != size || size % 2 != 0 {
            return Err(singular());
        }
        let n = size / 2;

        // Border the system with the x-translation gauge row and column.
        let mut system = DMatrix::zeros(size + 1, size + 1);
        for (row_idx, row) in stiffness.csr().row_iter().enumerate() {
            for (&col, &value) in row.col_indices().iter().zip(row.values()) {
                system[(row_idx, col)] = value;
            }
        }
        for i in 0..n {
            system[(i, size)] = 1.0;
            system[(size, i)] = 1.0;
        }
        let mut rhs = DVector::zeros(size + 1);
        rhs.rows_mut(0, size).copy_from(load);

        let solution = system.lu().solve(&rhs).ok_or_else(singular)?;
        let displacement = solution.rows(0, size).into_owned();
        if displacement.iter().any(|u| !u.is_finite()) {
            return Err(singular());
        }
        Ok(displacement)
    }

    /// Mean vertical force transmitted to the platens.
    ///
    /// For each top node the two downward bonds, and for each bottom node
    /// the two upward bonds, contribute the vertical component of their
    /// force; the magnitude per node is averaged over all platen nodes.
    ///
    /// # Errors
    ///
    /// Fails only on an inconsistent topology.
    pub fn vertical_force<T: LatticeTopology>(&self, sample: &Sample<T>) -> Result<f64> {
        let topology = sample.topology();
        let shortening = sample.compaction_shortening();
        let mut total = 0.0;
        let mut count = 0_usize;

        for node in 0..topology.node_count() {
            let dirs = if topology.is_bottom(node)? {
                [Direction::UpRight, Direction::UpLeft]
            } else if topology.is_top(node)? {
                [Direction::DownRight, Direction::DownLeft]
            } else {
                continue;
            };

            let here = sample.node_displacement(node)?;
            let mut fy = 0.0;
            for dir in dirs {
                let Some(other) = topology.neighbor(node, dir)? else {
                    continue;
                };
                let axis = dir.unit();
                let mut stretch = (sample.node_displacement(other)? - here).dot(&axis);
                if sample.bonds().is_compacted(node, dir) {
                    stretch += shortening;
                }
                fy += sample.bond_stiffness(node, dir, 1.0) * stretch * axis.y;
            }
            total += fy.abs();
            count += 1;
        }

        if count == 0 {
            return Ok(0.0);
        }
        Ok(total / count as f64)
    }

    /// Run one full cycle at prescribed platen displacement `displacement`:
    /// solve, store the displacement in `sample`, measure the platen force
    /// and compact overloaded bonds.
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::SingularSystem`] if the solve fails; the
    /// sample is left untouched in that case.
    pub fn cycle<T: LatticeTopology>(&self, sample: &mut Sample<T>, displacement: f64) -> Result<Equilibrium> {
        let stiffness = self.assemble_stiffness(sample)?;
        let load = self.assemble_load(sample, displacement)?;
        let u = self.solve_displacement(&stiffness, &load)?;
        sample.set_displacement(u);

        let vertical_force = self.vertical_force(sample)?;
        let newly_compacted = sample.find_compacted(self.friction)?;

        debug!(
            displacement,
            nnz = stiffness.nnz(),
            vertical_force,
            newly_compacted,
            "equilibrium solved"
        );

        Ok(Equilibrium {
            vertical_force,
            newly_compacted,
        })
    }
}
