//! Property-based tests for lattice geometry, layering and thresholds.
//!
//! Run with: cargo test -p sim-lattice -- proptest

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sim_lattice::{Direction, Layer, LatticeTopology, Stratification, ThresholdField, TriangularLattice};

// =============================================================================
// Strategies
// =============================================================================

fn arb_lattice() -> impl Strategy<Value = TriangularLattice> {
    (3usize..14, 3usize..14).prop_map(|(lines, cols)| {
        TriangularLattice::new(lines, cols).unwrap_or_else(|e| panic!("valid dimensions: {e}"))
    })
}

/// Band search over alternating layers, walking away from the origin one
/// layer at a time. Returns `None` exactly at the origin.
fn walking_layer(projection: f64, t0: f64, t1: f64) -> Option<usize> {
    let mut edge = 0.0;
    if projection > 0.0 {
        while edge < projection {
            edge += t0;
            if edge >= projection {
                return Some(0);
            }
            edge += t1;
            if edge >= projection {
                return Some(1);
            }
        }
        None
    } else if projection < 0.0 {
        while edge > projection {
            edge -= t1;
            if edge < projection {
                return Some(1);
            }
            edge -= t0;
            if edge < projection {
                return Some(0);
            }
        }
        Some(0)
    } else {
        None
    }
}

// =============================================================================
// Geometry
// =============================================================================

proptest! {
    #[test]
    fn proptest_neighbor_symmetry(lattice in arb_lattice()) {
        for i in 0..lattice.node_count() {
            for dir in Direction::ALL {
                if let Some(k) = lattice.neighbor(i, dir).unwrap() {
                    prop_assert!(k < lattice.node_count());
                    prop_assert_eq!(lattice.neighbor(k, dir.opposite()).unwrap(), Some(i));
                }
            }
        }
    }

    #[test]
    fn proptest_bond_count_matches_enumeration(lattice in arb_lattice()) {
        let mut forward = 0;
        let mut rising = 0;
        for i in 0..lattice.node_count() {
            for dir in Direction::FORWARD {
                if let Some(k) = lattice.neighbor(i, dir).unwrap() {
                    prop_assert!(k > i);
                    forward += 1;
                }
            }
            for dir in Direction::RISING {
                if lattice.neighbor(i, dir).unwrap().is_some() {
                    rising += 1;
                }
            }
        }
        prop_assert_eq!(forward, lattice.bond_count());
        prop_assert_eq!(rising, lattice.bond_count());
    }

    #[test]
    fn proptest_border_coverage(lattice in arb_lattice()) {
        let n = lattice.node_count();
        let mut left = 0;
        let mut right = 0;
        for i in 0..n {
            let top = lattice.is_top(i).unwrap();
            let bottom = lattice.is_bottom(i).unwrap();
            prop_assert!(!(top && bottom), "node {} is both top and bottom", i);

            // Top nodes have nothing above, bottom nodes nothing below.
            if top {
                prop_assert_eq!(lattice.neighbor(i, Direction::UpLeft).unwrap(), None);
                prop_assert_eq!(lattice.neighbor(i, Direction::UpRight).unwrap(), None);
            }
            if bottom {
                prop_assert_eq!(lattice.neighbor(i, Direction::DownLeft).unwrap(), None);
                prop_assert_eq!(lattice.neighbor(i, Direction::DownRight).unwrap(), None);
            }
            if !top && !bottom {
                let above = lattice.neighbor(i, Direction::UpLeft).unwrap()
                    .or(lattice.neighbor(i, Direction::UpRight).unwrap());
                let below = lattice.neighbor(i, Direction::DownLeft).unwrap()
                    .or(lattice.neighbor(i, Direction::DownRight).unwrap());
                prop_assert!(above.is_some() && below.is_some());
            }

            if lattice.is_left(i).unwrap() {
                left += 1;
                prop_assert_eq!(lattice.neighbor(i, Direction::Left).unwrap(), None);
            }
            if lattice.is_right(i).unwrap() {
                right += 1;
                prop_assert_eq!(lattice.neighbor(i, Direction::Right).unwrap(), None);
            }
        }
        // One left and one right node per row.
        prop_assert_eq!(left, lattice.lines());
        prop_assert_eq!(right, lattice.lines());

        let top_count = (0..n).filter(|&i| lattice.is_top(i).unwrap()).count();
        prop_assert_eq!(top_count, lattice.cols());
    }

    #[test]
    fn proptest_out_of_range_rejected(lattice in arb_lattice(), extra in 0usize..100) {
        let index = lattice.node_count() + extra;
        prop_assert!(lattice.neighbor(index, Direction::Right).is_err());
        prop_assert!(lattice.is_bottom(index).is_err());
        prop_assert!(lattice.is_left(index).is_err());
    }
}

// =============================================================================
// Layering
// =============================================================================

proptest! {
    #[test]
    fn proptest_layer_matches_walking_search(
        t0 in 0.5f64..20.0,
        t1 in 0.5f64..20.0,
        projection in -200.0f64..200.0,
    ) {
        let period = t0 + t1;
        let folded = projection.rem_euclid(period);
        let margin = 1e-6;
        prop_assume!(projection.abs() > margin);
        prop_assume!(folded > margin && (folded - t0).abs() > margin && period - folded > margin);

        let s = Stratification::new(0.0, t0, t1).unwrap();
        let expected = walking_layer(projection, t0, t1);
        prop_assert_eq!(Some(s.layer_of_projection(projection).index()), expected);
    }

    #[test]
    fn proptest_layer_is_periodic(
        t0 in 0.1f64..10.0,
        t1 in 0.1f64..10.0,
        projection in -50.0f64..50.0,
        shift in -5i32..5,
    ) {
        let s = Stratification::new(0.0, t0, t1).unwrap();
        let folded = projection.rem_euclid(s.period());
        prop_assume!(folded > 1e-6 && (folded - t0).abs() > 1e-6 && s.period() - folded > 1e-6);
        let shifted = projection + f64::from(shift) * s.period();
        prop_assert_eq!(s.layer_of_projection(projection), s.layer_of_projection(shifted));
    }
}

#[test]
fn test_band_edges_are_half_open() {
    let s = Stratification::new(0.0, 4.0, 8.0).unwrap();
    assert_eq!(s.layer_of_projection(0.0), Layer::Zero);
    assert_eq!(s.layer_of_projection(4.0), Layer::One);
    assert_eq!(s.layer_of_projection(12.0), Layer::Zero);
    assert_eq!(s.layer_of_projection(-8.0), Layer::One);
}

// =============================================================================
// Thresholds
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn proptest_threshold_symmetry(
        lattice in arb_lattice(),
        seed in any::<u64>(),
        disorder in 0.0f64..0.5,
        dip in -90.0f64..90.0,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let plain = ThresholdField::generate(&lattice, 0.03, disorder, &mut rng).unwrap();

        let s = Stratification::new(dip, 2.0, 3.0).unwrap();
        let layered = ThresholdField::stratified(&lattice, 1.0, &s, [0.028, 0.032], disorder, &mut rng)
            .unwrap();

        for field in [&plain, &layered] {
            let mut ends = 0;
            for (node, dir, value) in field.iter() {
                let other = lattice.neighbor(node, dir).unwrap();
                prop_assert!(other.is_some());
                prop_assert_eq!(field.get(other.unwrap(), dir.opposite()), Some(value));
                ends += 1;
            }
            prop_assert_eq!(ends, 2 * lattice.bond_count());
        }
    }
}
