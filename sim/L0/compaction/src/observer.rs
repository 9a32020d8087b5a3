//! Observation of a running experiment.
//!
//! The controller reports to an [`ObservationSink`]: a `(strain, Fy)` point
//! each time the load advances, and a [`Snapshot`] of the whole sample at
//! the cadence set by [`SnapshotCadence`]. Snapshots are owned copies, so a
//! sink may hand them to another thread while the solver keeps mutating
//! the sample.

use std::sync::mpsc::Sender;

use nalgebra::{Point2, Vector2};
use sim_lattice::{Direction, LatticeTopology};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sample::Sample;

/// One bond in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BondView {
    /// Lower node index.
    pub from: usize,
    /// Higher node index.
    pub to: usize,
    /// Whether the bond is compacted.
    pub compacted: bool,
}

/// Immutable copy of the sample state and scalar metrics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    /// Loading iteration the snapshot was taken at.
    pub iteration: u64,
    /// Rest position of each node.
    pub positions: Vec<Point2<f64>>,
    /// Displacement of each node.
    pub displacements: Vec<Vector2<f64>>,
    /// Every bond once, lower index first.
    pub bonds: Vec<BondView>,
    /// Drawing scale requested by the caller.
    pub scale: f64,
    /// Prescribed platen displacement `d`.
    pub displacement: f64,
    /// Strain in percent.
    pub strain: f64,
    /// Percentage of bonds compacted.
    pub compaction_rate: f64,
    /// Mean vertical platen force.
    pub vertical_force: f64,
}

impl Snapshot {
    /// Copy the state of `sample`.
    ///
    /// # Errors
    ///
    /// Fails only on an inconsistent topology.
    pub fn capture<T: LatticeTopology>(
        sample: &Sample<T>,
        iteration: u64,
        displacement: f64,
        vertical_force: f64,
        scale: f64,
    ) -> Result<Self> {
        let n = sample.node_count();
        let mut positions = Vec::with_capacity(n);
        let mut displacements = Vec::with_capacity(n);
        let mut bonds = Vec::with_capacity(sample.bond_count());

        for node in 0..n {
            positions.push(sample.rest_position(node)?);
            displacements.push(sample.node_displacement(node)?);
            for dir in Direction::FORWARD {
                if let Some(other) = sample.topology().neighbor(node, dir)? {
                    bonds.push(BondView {
                        from: node,
                        to: other,
                        compacted: sample.bonds().is_compacted(node, dir),
                    });
                }
            }
        }

        Ok(Self {
            iteration,
            positions,
            displacements,
            bonds,
            scale,
            displacement,
            strain: displacement / sample.initial_height() * 100.0,
            compaction_rate: sample.compaction_rate(),
            vertical_force,
        })
    }

    /// Displaced position of `node` multiplied by the drawing scale.
    #[must_use]
    pub fn scaled_position(&self, node: usize) -> Option<Point2<f64>> {
        let rest = self.positions.get(node)?;
        let u = self.displacements.get(node)?;
        Some((rest + u) * self.scale)
    }

    /// Number of compacted bonds.
    #[must_use]
    pub fn compacted_count(&self) -> usize {
        self.bonds.iter().filter(|b| b.compacted).count()
    }
}

/// Receiver of experiment output. Calls are fire-and-forget.
pub trait ObservationSink {
    /// A full sample snapshot.
    fn on_snapshot(&mut self, snapshot: Snapshot);

    /// A point of the force/strain curve.
    fn on_series_point(&mut self, strain: f64, vertical_force: f64);
}

impl<S: ObservationSink + ?Sized> ObservationSink for &mut S {
    fn on_snapshot(&mut self, snapshot: Snapshot) {
        (**self).on_snapshot(snapshot);
    }

    fn on_series_point(&mut self, strain: f64, vertical_force: f64) {
        (**self).on_series_point(strain, vertical_force);
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ObservationSink for NullSink {
    fn on_snapshot(&mut self, _snapshot: Snapshot) {}

    fn on_series_point(&mut self, _strain: f64, _vertical_force: f64) {}
}

/// Sink that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Snapshots in emission order.
    pub snapshots: Vec<Snapshot>,
    /// `(strain, Fy)` points in emission order.
    pub series: Vec<(f64, f64)>,
}

impl ObservationSink for RecordingSink {
    fn on_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    fn on_series_point(&mut self, strain: f64, vertical_force: f64) {
        self.series.push((strain, vertical_force));
    }
}

/// Message form of the sink calls, for channel-based consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// See [`ObservationSink::on_snapshot`].
    Snapshot(Box<Snapshot>),
    /// See [`ObservationSink::on_series_point`].
    SeriesPoint {
        /// Strain in percent.
        strain: f64,
        /// Mean vertical platen force.
        vertical_force: f64,
    },
}

/// Forwards observations over a channel. A disconnected receiver is
/// ignored: the experiment does not depend on its observers.
impl ObservationSink for Sender<Observation> {
    fn on_snapshot(&mut self, snapshot: Snapshot) {
        let _ = self.send(Observation::Snapshot(Box::new(snapshot)));
    }

    fn on_series_point(&mut self, strain: f64, vertical_force: f64) {
        let _ = self.send(Observation::SeriesPoint {
            strain,
            vertical_force,
        });
    }
}

/// When the controller emits snapshots.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SnapshotCadence {
    /// Emit when the first bond compacts.
    pub on_first_compaction: bool,
    /// Emit each time the compaction rate passes the next multiple of this
    /// many percent. Non-positive disables it.
    pub compaction_rate_step: f64,
    /// Drawing scale passed along with each snapshot.
    pub display_scale: f64,
    /// Emit once more when the run ends.
    pub on_finish: bool,
}

impl Default for SnapshotCadence {
    fn default() -> Self {
        Self {
            on_first_compaction: true,
            compaction_rate_step: 3.0,
            display_scale: 10.0,
            on_finish: true,
        }
    }
}

impl SnapshotCadence {
    /// No snapshots at all.
    #[must_use]
    pub fn never() -> Self {
        Self {
            on_first_compaction: false,
            compaction_rate_step: 0.0,
            display_scale: 10.0,
            on_finish: false,
        }
    }
}

/// Progress through a [`SnapshotCadence`].
#[derive(Debug, Clone, Default)]
pub(crate) struct CadenceState {
    first_seen: bool,
    next_rate: f64,
}

impl CadenceState {
    /// Whether a snapshot is due at compaction rate `rate`.
    pub(crate) fn due(&mut self, cadence: &SnapshotCadence, rate: f64) -> bool {
        let mut due = false;
        if !self.first_seen && rate > 0.0 {
            self.first_seen = true;
            due |= cadence.on_first_compaction;
        }
        let step = cadence.compaction_rate_step;
        if step > 0.0 && rate >= self.next_rate {
            while self.next_rate <= rate {
                self.next_rate += step;
            }
            due = true;
        }
        due
    }
}
