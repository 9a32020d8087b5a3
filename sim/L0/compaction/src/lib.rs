//! Compaction of a spring-lattice rock sample under uniaxial loading.
//!
//! A sample is a triangular lattice of elastic bonds (see [`sim_lattice`]).
//! Each bond compacts irreversibly, shortening its rest length and changing
//! its stiffness, once the compressive force it carries exceeds a random
//! threshold. Loading alternates between solving the linear equilibrium of
//! the lattice and compacting overloaded bonds:
//!
//! - [`Sample`] - displacement field, bond compaction state, thresholds
//! - [`EquilibriumSolver`] - stiffness/load assembly, solve, platen force
//! - [`LoadingController`] - the incremental loading protocol
//! - [`ObservationSink`] - force/strain points and [`Snapshot`]s for display
//!
//! # Example
//!
//! ```
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use sim_compaction::{LoadingController, LoadingParams, RecordingSink, Sample, SampleParams};
//!
//! let params = SampleParams::new(5, 4).with_thresholds(0.03, 0.05);
//! let sample = Sample::new(&params, &mut StdRng::seed_from_u64(1))?;
//!
//! let loading = LoadingParams::default()
//!     .with_increment(0.02)
//!     .with_max_compaction(10.0)
//!     .with_max_iterations(500);
//! let mut controller = LoadingController::new(sample, loading)?;
//!
//! let mut sink = RecordingSink::default();
//! let summary = controller.run(&mut sink)?;
//! assert!(summary.state.is_finished());
//! assert!(!sink.series.is_empty());
//! # Ok::<(), sim_compaction::CompactionError>(())
//! ```
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with no Bevy dependencies. It never installs a
//! `tracing` subscriber.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
// Node and bond counts are far below 2^52
#![allow(clippy::cast_precision_loss)]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod assembly;
pub mod bonds;
pub mod controller;
pub mod error;
pub mod observer;
pub mod params;
pub mod sample;
pub mod solver;

pub use assembly::{StiffnessBuilder, StiffnessMatrix};
pub use bonds::BondStates;
pub use controller::{LoadingController, LoadingState, RunSummary, StopHandle, TerminationReason};
pub use error::{CompactionError, Result};
pub use observer::{
    BondView, NullSink, Observation, ObservationSink, RecordingSink, Snapshot, SnapshotCadence,
};
pub use params::{LoadingParams, SampleParams, StratifiedParams};
pub use sample::Sample;
pub use solver::{Equilibrium, EquilibriumSolver};

// Re-export the lattice crate for downstream users.
pub use sim_lattice;
