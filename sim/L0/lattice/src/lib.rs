//! Triangular spring-lattice geometry for compaction simulations.
//!
//! A rock sample is modeled as point masses on a triangular lattice joined by
//! elastic bonds. This crate covers everything about the lattice that does
//! not depend on the displacement field:
//!
//! - [`LatticeTopology`] / [`TriangularLattice`] - node indexing, the six
//!   neighbor lookups, border classification and rest positions
//! - [`Direction`] - bond directions and their unit vectors
//! - [`Stratification`] - dipping layers for stratified samples
//! - [`ThresholdField`] - per-bond compaction thresholds
//!
//! # Example
//!
//! ```
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use sim_lattice::{Direction, LatticeTopology, ThresholdField, TriangularLattice};
//!
//! let lattice = TriangularLattice::new(3, 3)?;
//! assert_eq!(lattice.node_count(), 8);
//! assert_eq!(lattice.neighbor(3, Direction::UpLeft)?, Some(0));
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let thresholds = ThresholdField::generate(&lattice, 0.03, 0.0, &mut rng)?;
//! assert_eq!(thresholds.get(0, Direction::Right), Some(0.03));
//! # Ok::<(), sim_lattice::LatticeError>(())
//! ```
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with no Bevy dependencies.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
// Node indices are far below 2^52
#![allow(clippy::cast_precision_loss)]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod direction;
pub mod error;
pub mod layers;
pub mod threshold;
pub mod topology;

pub use direction::{Direction, ROW_SPACING};
pub use error::{LatticeError, Result};
pub use layers::{Layer, Stratification};
pub use threshold::ThresholdField;
pub use topology::{LatticeTopology, TriangularLattice};
