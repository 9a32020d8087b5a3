//! Property-based tests for the equilibrium solve.
//!
//! Run with: cargo test -p sim-compaction -- proptest

use approx::relative_eq;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sim_compaction::sim_lattice::{Direction, LatticeTopology};
use sim_compaction::{EquilibriumSolver, Sample, SampleParams};

fn arb_sample() -> impl Strategy<Value = Sample> {
    (3usize..8, 3usize..7, any::<u64>(), 0.0f64..0.3).prop_map(|(lines, cols, seed, disorder)| {
        let params = SampleParams::new(lines, cols).with_thresholds(0.03, disorder);
        Sample::new(&params, &mut StdRng::seed_from_u64(seed))
            .unwrap_or_else(|e| panic!("valid sample: {e}"))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn proptest_solution_satisfies_system(
        sample in arb_sample(),
        displacement in 0.0f64..0.2,
        confinement in -0.05f64..0.05,
        friction in 1.0f64..40.0,
    ) {
        let solver = EquilibriumSolver::new(friction, confinement);
        let a = solver.assemble_stiffness(&sample).unwrap();
        let f = solver.assemble_load(&sample, displacement).unwrap();
        let u = solver.solve_displacement(&a, &f).unwrap();

        let residual = (a.mul_vec(&u) - &f).amax();
        prop_assert!(residual < 1e-9, "residual {}", residual);

        let n = sample.node_count();
        let topology = sample.topology();
        for node in 0..n {
            if topology.is_top(node).unwrap() {
                prop_assert!(relative_eq!(u[node + n], displacement / 2.0, epsilon = 1e-10));
            } else if topology.is_bottom(node).unwrap() {
                prop_assert!(relative_eq!(u[node + n], -displacement / 2.0, epsilon = 1e-10));
            }
        }
        let x_sum: f64 = u.rows(0, n).sum();
        prop_assert!(x_sum.abs() < 1e-9);
    }

    #[test]
    fn proptest_cycle_leaves_no_overloaded_bond(
        mut sample in arb_sample(),
        displacement in 0.0f64..0.5,
    ) {
        let solver = EquilibriumSolver::new(20.0, 0.0);
        let before = sample.compacted_count();
        let eq = solver.cycle(&mut sample, displacement).unwrap();
        prop_assert_eq!(sample.compacted_count(), before + eq.newly_compacted);
        prop_assert!(eq.vertical_force.is_finite() && eq.vertical_force >= 0.0);

        for node in 0..sample.node_count() {
            for dir in Direction::RISING {
                if sample.bonds().is_compacted(node, dir) {
                    continue;
                }
                if let Some(tension) = sample.bond_tension(node, dir, 20.0).unwrap() {
                    let threshold = sample.thresholds().get(node, dir).unwrap();
                    prop_assert!(tension <= threshold);
                }
            }
        }
    }
}
