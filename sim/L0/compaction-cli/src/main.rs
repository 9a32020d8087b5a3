//! Headless compaction experiment.
//!
//! Builds a sample from the command line, loads it until a stop condition
//! is met and writes the force/strain curve as CSV to stdout. Snapshot
//! progress and the final sample go to stderr.
//!
//! ```text
//! compaction-run --lines 23 --cols 15 --disorder 0.1 --seed 7 > curve.csv
//! ```

use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use rand::SeedableRng;
use rand::rngs::StdRng;
use sim_compaction::{
    LoadingController, LoadingParams, Observation, Sample, SampleParams, SnapshotCadence,
    StratifiedParams,
};

/// Compress a spring-lattice sample between two platens.
#[derive(Parser, Debug)]
#[command(name = "compaction-run")]
#[command(about = "Run a spring-lattice compaction experiment", long_about = None)]
#[command(version)]
struct Cli {
    /// Number of node rows
    #[arg(long, default_value_t = 23)]
    lines: usize,

    /// Number of nodes on a long row
    #[arg(long, default_value_t = 15)]
    cols: usize,

    /// Mean compaction threshold
    #[arg(long, default_value_t = 0.03)]
    threshold_mean: f64,

    /// Threshold standard deviation relative to the mean
    #[arg(long, default_value_t = 0.0)]
    disorder: f64,

    #[command(flatten)]
    material: MaterialArgs,

    /// Horizontal confinement force on the side nodes
    #[arg(long, default_value_t = 0.0)]
    confinement: f64,

    /// Stiffness multiplier on the platen rows
    #[arg(long, default_value_t = 20.0)]
    friction: f64,

    /// Platen displacement added per load step
    #[arg(long, default_value_t = 0.005)]
    increment: f64,

    /// Platen displacement of the initial solve
    #[arg(long, default_value_t = 0.0)]
    initial_displacement: f64,

    /// Stop at this percentage of compacted bonds
    #[arg(long, default_value_t = 40.0)]
    max_compaction: f64,

    /// Stop once the vertical force reaches this value
    #[arg(long)]
    force_ceiling: Option<f64>,

    /// Stop after this many solves
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Seed of the threshold draw
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Snapshot every time this many more percent of bonds compact (0 disables)
    #[arg(long, default_value_t = 3.0)]
    snapshot_step: f64,

    /// Drawing scale attached to snapshots
    #[arg(long, default_value_t = 10.0)]
    scale: f64,

    #[command(flatten)]
    layers: LayerArgs,
}

/// Elastic constants of intact and compacted bonds.
#[derive(Args, Debug)]
struct MaterialArgs {
    /// Rest length of an intact bond
    #[arg(long, default_value_t = 1.0)]
    rest_length: f64,

    /// Compacted over intact rest length
    #[arg(long, default_value_t = 0.94)]
    length_ratio: f64,

    /// Cross-sectional area of an intact bond
    #[arg(long, default_value_t = 1.0)]
    area: f64,

    /// Compacted over intact area
    #[arg(long, default_value_t = 1.0)]
    area_ratio: f64,

    /// Young's modulus of an intact bond
    #[arg(long, default_value_t = 1.0)]
    youngs_modulus: f64,

    /// Compacted over intact modulus
    #[arg(long, default_value_t = 1.0)]
    modulus_ratio: f64,
}

/// Dipping layers. Enabled by `--layer-threshold`.
#[derive(Args, Debug)]
struct LayerArgs {
    /// Mean threshold of the second layer type
    #[arg(long)]
    layer_threshold: Option<f64>,

    /// Dip of the bedding in degrees
    #[arg(long, default_value_t = 0.0, requires = "layer_threshold")]
    dip: f64,

    /// Thickness of first-type bands
    #[arg(long, default_value_t = 15.0, requires = "layer_threshold")]
    thickness0: f64,

    /// Thickness of second-type bands
    #[arg(long, default_value_t = 15.0, requires = "layer_threshold")]
    thickness1: f64,
}

impl Cli {
    fn sample_params(&self) -> SampleParams {
        let material = &self.material;
        let params = SampleParams {
            area: material.area,
            youngs_modulus: material.youngs_modulus,
            ..SampleParams::new(self.lines, self.cols)
        }
        .with_thresholds(self.threshold_mean, self.disorder)
        .with_rest_length(material.rest_length)
        .with_compaction_ratios(
            material.length_ratio,
            material.area_ratio,
            material.modulus_ratio,
        );
        match self.layers.layer_threshold {
            Some(threshold_mean) => params.stratified(StratifiedParams {
                threshold_mean,
                dip_degrees: self.layers.dip,
                thickness0: self.layers.thickness0,
                thickness1: self.layers.thickness1,
            }),
            None => params,
        }
    }

    fn loading_params(&self) -> LoadingParams {
        let mut loading = LoadingParams::default()
            .with_confinement(self.confinement)
            .with_friction(self.friction)
            .with_increment(self.increment)
            .with_initial_displacement(self.initial_displacement)
            .with_max_compaction(self.max_compaction);
        if let Some(ceiling) = self.force_ceiling {
            loading = loading.with_force_ceiling(ceiling);
        }
        if let Some(iterations) = self.max_iterations {
            loading = loading.with_max_iterations(iterations);
        }
        loading
    }

    fn cadence(&self) -> SnapshotCadence {
        SnapshotCadence {
            compaction_rate_step: self.snapshot_step,
            display_scale: self.scale,
            ..SnapshotCadence::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let sample = Sample::new(&cli.sample_params(), &mut rng).context("building sample")?;
    let cadence = cli.cadence();
    let mut controller = LoadingController::new(sample, cli.loading_params())
        .context("initial solve")?
        .with_cadence(cadence);

    let (mut tx, rx) = mpsc::channel::<Observation>();
    let reporter = thread::spawn(move || report(&rx));

    let outcome = controller.run(&mut tx);
    drop(tx);
    let written = reporter
        .join()
        .map_err(|_| anyhow::anyhow!("reporter thread panicked"))?;
    written.context("writing series")?;

    let summary = outcome.context("loading failed")?;
    eprintln!("{}", controller.sample());
    eprintln!(
        "{:?} ({:?}) after {} iterations: strain {:.4} %, Fy {:.6}, {} bonds compacted ({:.2} %)",
        summary.state,
        summary.reason,
        summary.iterations,
        summary.strain,
        summary.vertical_force,
        summary.compacted,
        summary.compaction_rate,
    );
    Ok(())
}

/// Drain observations until the controller hangs up.
fn report(rx: &mpsc::Receiver<Observation>) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "strain,vertical_force")?;
    for observation in rx {
        match observation {
            Observation::SeriesPoint {
                strain,
                vertical_force,
            } => writeln!(out, "{strain},{vertical_force}")?,
            Observation::Snapshot(snapshot) => eprintln!(
                "snapshot @ {}: strain {:.4} %, {:.2} % compacted, Fy {:.6}",
                snapshot.iteration,
                snapshot.strain,
                snapshot.compaction_rate,
                snapshot.vertical_force,
            ),
        }
    }
    out.flush()
}
