//! Quasi-static loading protocol.
//!
//! The controller drives the platens toward each other in fixed increments.
//! After every solve it compares the compaction count with the count before
//! the solve:
//!
//! - no new compaction: emit `(strain, Fy)` and advance the displacement
//! - new compaction: solve again at the same displacement until the damage
//!   settles
//!
//! ```text
//! Initial --step--> Loading --target/ceiling/platens met--> Done
//!                      |
//!                      +--stop request/iteration limit/stalled--> Stopped
//! ```
//!
//! Every run ends: the prescribed displacement only grows, and once it
//! reaches the sample height the platens have met. With a zero increment
//! the run ends at the first settled solve, since nothing can change
//! after it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sim_lattice::{LatticeTopology, TriangularLattice};
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CompactionError, Result};
use crate::observer::{CadenceState, ObservationSink, Snapshot, SnapshotCadence};
use crate::params::LoadingParams;
use crate::sample::Sample;
use crate::solver::EquilibriumSolver;

/// Lifecycle of a loading run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LoadingState {
    /// Initial state solved, loading not started.
    Initial,
    /// Loading in progress.
    Loading,
    /// Ended early by the caller.
    Stopped,
    /// Ended by reaching a target.
    Done,
}

impl LoadingState {
    /// Whether the run has ended.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Stopped | Self::Done)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TerminationReason {
    /// The compaction rate reached `max_compaction`.
    CompactionTarget,
    /// The vertical force reached `force_ceiling`.
    ForceCeiling,
    /// The prescribed displacement reached the sample height.
    PlatensMet,
    /// A settled solve with a zero increment; further steps repeat it.
    Stalled,
    /// `max_iterations` solves were performed.
    IterationLimit,
    /// A stop was requested through a [`StopHandle`].
    StopRequested,
}

impl TerminationReason {
    /// State the run ends in.
    #[must_use]
    pub const fn final_state(self) -> LoadingState {
        match self {
            Self::CompactionTarget | Self::ForceCeiling | Self::PlatensMet => LoadingState::Done,
            Self::IterationLimit | Self::StopRequested | Self::Stalled => LoadingState::Stopped,
        }
    }
}

/// Cloneable handle to request a stop from another thread.
///
/// The request is polled between iterations; a solve in progress always
/// completes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the run to stop before its next iteration.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    /// Final state.
    pub state: LoadingState,
    /// Why the run ended.
    pub reason: Option<TerminationReason>,
    /// Solves performed after the initial one.
    pub iterations: u64,
    /// Final prescribed displacement.
    pub displacement: f64,
    /// Final strain in percent.
    pub strain: f64,
    /// Final percentage of compacted bonds.
    pub compaction_rate: f64,
    /// Number of compacted bonds.
    pub compacted: usize,
    /// Last mean vertical force.
    pub vertical_force: f64,
}

/// Runs a compression experiment on a sample.
#[derive(Debug)]
pub struct LoadingController<T: LatticeTopology = TriangularLattice> {
    sample: Sample<T>,
    params: LoadingParams,
    solver: EquilibriumSolver,
    cadence: SnapshotCadence,
    cadence_state: CadenceState,
    state: LoadingState,
    reason: Option<TerminationReason>,
    displacement: f64,
    vertical_force: f64,
    iteration: u64,
    stop: StopHandle,
}

impl<T: LatticeTopology> LoadingController<T> {
    /// Set up an experiment and solve the initial state (displacement `d0`,
    /// confinement only).
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::InvalidParameter`] for an invalid loading
    /// protocol and [`CompactionError::SolveFailed`] if the initial state
    /// cannot be solved.
    pub fn new(mut sample: Sample<T>, params: LoadingParams) -> Result<Self> {
        params.validate()?;
        let solver = EquilibriumSolver::from_params(&params);
        let cadence = SnapshotCadence::default();

        if params.displacement_increment == 0.0 {
            warn!("displacement increment is zero, loading will not advance");
        }

        let displacement = params.initial_displacement;
        let equilibrium = match solver.cycle(&mut sample, displacement) {
            Ok(eq) => eq,
            Err(CompactionError::SingularSystem { .. }) => {
                let snapshot =
                    Snapshot::capture(&sample, 0, displacement, 0.0, cadence.display_scale)?;
                return Err(CompactionError::SolveFailed {
                    iteration: 0,
                    snapshot: Box::new(snapshot),
                });
            }
            Err(e) => return Err(e),
        };

        info!(
            nodes = sample.node_count(),
            bonds = sample.bond_count(),
            friction = params.friction,
            confinement = params.confinement_force,
            increment = params.displacement_increment,
            target = params.max_compaction,
            initial_force = equilibrium.vertical_force,
            "experiment ready"
        );

        Ok(Self {
            sample,
            params,
            solver,
            cadence,
            cadence_state: CadenceState::default(),
            state: LoadingState::Initial,
            reason: None,
            displacement,
            vertical_force: equilibrium.vertical_force,
            iteration: 0,
            stop: StopHandle::default(),
        })
    }

    /// Use a different snapshot cadence.
    #[must_use]
    pub fn with_cadence(mut self, cadence: SnapshotCadence) -> Self {
        self.cadence = cadence;
        self
    }

    /// Handle for requesting a stop from elsewhere.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LoadingState {
        self.state
    }

    /// Why the run ended, once it has.
    #[must_use]
    pub const fn reason(&self) -> Option<TerminationReason> {
        self.reason
    }

    /// The sample being loaded.
    #[must_use]
    pub const fn sample(&self) -> &Sample<T> {
        &self.sample
    }

    /// Give the sample back.
    #[must_use]
    pub fn into_sample(self) -> Sample<T> {
        self.sample
    }

    /// Loading protocol.
    #[must_use]
    pub const fn params(&self) -> &LoadingParams {
        &self.params
    }

    /// Prescribed platen displacement `d` for the next solve.
    #[must_use]
    pub const fn displacement(&self) -> f64 {
        self.displacement
    }

    /// Strain `d / h0` in percent.
    #[must_use]
    pub fn strain(&self) -> f64 {
        self.displacement / self.sample.initial_height() * 100.0
    }

    /// Mean vertical force of the last solve.
    #[must_use]
    pub const fn vertical_force(&self) -> f64 {
        self.vertical_force
    }

    /// Solves performed since loading started.
    #[must_use]
    pub const fn iterations(&self) -> u64 {
        self.iteration
    }

    /// Copy of the current state.
    ///
    /// # Errors
    ///
    /// Fails only on an inconsistent topology.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::capture(
            &self.sample,
            self.iteration,
            self.displacement,
            self.vertical_force,
            self.cadence.display_scale,
        )
    }

    /// Summary of the run so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            state: self.state,
            reason: self.reason,
            iterations: self.iteration,
            displacement: self.displacement,
            strain: self.strain(),
            compaction_rate: self.sample.compaction_rate(),
            compacted: self.sample.compacted_count(),
            vertical_force: self.vertical_force,
        }
    }

    /// Perform one loading iteration.
    ///
    /// The first call leaves [`LoadingState::Initial`] and applies the first
    /// increment. Calls on a finished run do nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::SolveFailed`] if the system cannot be
    /// solved. The run cannot continue after that.
    pub fn step<S: ObservationSink + ?Sized>(&mut self, sink: &mut S) -> Result<LoadingState> {
        if self.state.is_finished() {
            return Ok(self.state);
        }
        if self.stop.is_stop_requested() {
            warn!(iteration = self.iteration, "stop requested");
            return self.finish(TerminationReason::StopRequested, sink);
        }
        if self.state == LoadingState::Initial {
            self.state = LoadingState::Loading;
            self.displacement += self.params.displacement_increment;
            info!(displacement = self.displacement, "loading started");
        }
        if let Some(reason) = self.termination() {
            return self.finish(reason, sink);
        }

        self.iteration += 1;
        let equilibrium = match self.solver.cycle(&mut self.sample, self.displacement) {
            Ok(eq) => eq,
            Err(CompactionError::SingularSystem { .. }) => {
                return Err(CompactionError::SolveFailed {
                    iteration: self.iteration,
                    snapshot: Box::new(self.snapshot()?),
                });
            }
            Err(e) => return Err(e),
        };
        self.vertical_force = equilibrium.vertical_force;

        let rate = self.sample.compaction_rate();
        if self.cadence_state.due(&self.cadence, rate) {
            sink.on_snapshot(self.snapshot()?);
        }

        debug!(
            iteration = self.iteration,
            displacement = self.displacement,
            compacted = self.sample.compacted_count(),
            rate,
            vertical_force = self.vertical_force,
            "loading iteration"
        );

        let settled = equilibrium.newly_compacted == 0;
        if settled {
            sink.on_series_point(self.strain(), self.vertical_force);
            self.displacement += self.params.displacement_increment;
        }

        let stalled = settled && self.params.displacement_increment == 0.0;
        if let Some(reason) = self
            .termination()
            .or_else(|| stalled.then_some(TerminationReason::Stalled))
        {
            return self.finish(reason, sink);
        }
        Ok(self.state)
    }

    /// Step until the run ends.
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::SolveFailed`] if a solve fails.
    pub fn run<S: ObservationSink + ?Sized>(&mut self, sink: &mut S) -> Result<RunSummary> {
        while !self.step(sink)?.is_finished() {}
        Ok(self.summary())
    }

    /// Sample height in length units; the platens meet at this displacement.
    fn closing_displacement(&self) -> f64 {
        self.sample.initial_height() * self.sample.rest_length()
    }

    fn termination(&self) -> Option<TerminationReason> {
        if self.sample.compaction_rate() >= self.params.max_compaction {
            return Some(TerminationReason::CompactionTarget);
        }
        if self.displacement >= self.closing_displacement() {
            return Some(TerminationReason::PlatensMet);
        }
        if self
            .params
            .force_ceiling
            .is_some_and(|ceiling| self.vertical_force >= ceiling)
        {
            return Some(TerminationReason::ForceCeiling);
        }
        if self
            .params
            .max_iterations
            .is_some_and(|limit| self.iteration >= limit)
        {
            return Some(TerminationReason::IterationLimit);
        }
        None
    }

    fn finish<S: ObservationSink + ?Sized>(
        &mut self,
        reason: TerminationReason,
        sink: &mut S,
    ) -> Result<LoadingState> {
        self.state = reason.final_state();
        self.reason = Some(reason);
        if self.cadence.on_finish {
            sink.on_snapshot(self.snapshot()?);
        }
        info!(
            ?reason,
            iterations = self.iteration,
            displacement = self.displacement,
            compaction_rate = self.sample.compaction_rate(),
            vertical_force = self.vertical_force,
            "run finished"
        );
        Ok(self.state)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::observer::{NullSink, RecordingSink};
    use crate::params::SampleParams;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn controller(params: LoadingParams) -> LoadingController {
        let sample = Sample::new(&SampleParams::new(3, 3), &mut StdRng::seed_from_u64(0)).unwrap();
        LoadingController::new(sample, params).unwrap()
    }

    #[test]
    fn test_starts_initial_at_rest() {
        let c = controller(LoadingParams::default());
        assert_eq!(c.state(), LoadingState::Initial);
        assert_eq!(c.iterations(), 0);
        assert_relative_eq!(c.displacement(), 0.0);
        assert_relative_eq!(c.vertical_force(), 0.0, epsilon = 1e-12);
        assert_eq!(c.reason(), None);
    }

    #[test]
    fn test_rejects_invalid_loading() {
        let sample = Sample::new(&SampleParams::new(3, 3), &mut StdRng::seed_from_u64(0)).unwrap();
        let result = LoadingController::new(sample, LoadingParams::default().with_friction(0.0));
        assert!(matches!(
            result,
            Err(CompactionError::InvalidParameter { name: "friction", .. })
        ));
    }

    #[test]
    fn test_first_step_applies_increment() {
        let mut c = controller(LoadingParams::default());
        let mut sink = RecordingSink::default();
        assert_eq!(c.step(&mut sink).unwrap(), LoadingState::Loading);
        assert_eq!(c.iterations(), 1);

        // Solved at d = 0.005, then advanced since nothing compacted.
        assert_eq!(sink.series.len(), 1);
        let h0 = 3.0_f64.sqrt();
        assert_relative_eq!(sink.series[0].0, 0.005 / h0 * 100.0, epsilon = 1e-12);
        assert_relative_eq!(c.displacement(), 0.010, epsilon = 1e-15);
    }

    #[test]
    fn test_stop_before_first_step() {
        let mut c = controller(LoadingParams::default());
        c.stop_handle().request_stop();
        let summary = c.run(&mut NullSink).unwrap();
        assert_eq!(summary.state, LoadingState::Stopped);
        assert_eq!(summary.reason, Some(TerminationReason::StopRequested));
        assert_eq!(summary.iterations, 0);
        assert_relative_eq!(summary.displacement, 0.0);
    }

    #[test]
    fn test_iteration_limit() {
        let mut c = controller(LoadingParams::default().with_max_iterations(3));
        let summary = c.run(&mut NullSink).unwrap();
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.state, LoadingState::Stopped);
        assert_eq!(summary.reason, Some(TerminationReason::IterationLimit));
    }

    #[test]
    fn test_force_ceiling() {
        let mut c = controller(
            LoadingParams::default()
                .with_force_ceiling(0.001)
                .with_max_iterations(1000),
        );
        let summary = c.run(&mut NullSink).unwrap();
        assert_eq!(summary.reason, Some(TerminationReason::ForceCeiling));
        assert_eq!(summary.state, LoadingState::Done);
        assert!(summary.vertical_force >= 0.001);
    }

    #[test]
    fn test_zero_increment_stalls() {
        let mut c = controller(LoadingParams::default().with_increment(0.0));
        let mut sink = RecordingSink::default();
        let summary = c.run(&mut sink).unwrap();
        assert_eq!(summary.reason, Some(TerminationReason::Stalled));
        assert_eq!(summary.state, LoadingState::Stopped);
        assert_eq!(summary.iterations, 1);
        assert_eq!(sink.series.len(), 1);
        assert_relative_eq!(summary.displacement, 0.0);
    }

    #[test]
    fn test_platens_met() {
        // A single increment past the sample height ends the run unsolved.
        let mut c = controller(
            LoadingParams::default()
                .with_increment(2.0)
                .with_max_compaction(99.0),
        );
        let summary = c.run(&mut NullSink).unwrap();
        assert_eq!(summary.reason, Some(TerminationReason::PlatensMet));
        assert_eq!(summary.state, LoadingState::Done);
        assert_eq!(summary.iterations, 0);
        assert!(summary.displacement >= 3.0_f64.sqrt());
    }

    #[test]
    fn test_finished_run_does_nothing() {
        let mut c = controller(LoadingParams::default().with_max_iterations(1));
        c.run(&mut NullSink).unwrap();
        let d = c.displacement();
        assert_eq!(c.step(&mut NullSink).unwrap(), LoadingState::Stopped);
        assert_eq!(c.iterations(), 1);
        assert_relative_eq!(c.displacement(), d);
    }

    #[test]
    fn test_final_snapshot() {
        let mut c = controller(LoadingParams::default().with_max_iterations(2));
        let mut sink = RecordingSink::default();
        c.run(&mut sink).unwrap();
        // One at the 0% mark, one at the end.
        assert_eq!(sink.snapshots.len(), 2);
        assert_eq!(sink.snapshots[1].iteration, 2);

        let mut c = controller(LoadingParams::default().with_max_iterations(2))
            .with_cadence(SnapshotCadence::never());
        let mut sink = RecordingSink::default();
        c.run(&mut sink).unwrap();
        assert!(sink.snapshots.is_empty());
        assert_eq!(sink.series.len(), 2);
    }
}
