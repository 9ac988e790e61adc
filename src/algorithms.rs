// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

mod exact_solver;
mod local_search;
mod oracle;

pub use exact_solver::{ExactSolver, MAX_EXACT_COMPONENT_SIZE};
pub use local_search::{LocalSearch, FLIPS_PER_NODE};
pub use oracle::OracleSolver;

use crate::formulate::CoefficientModel;
use crate::graph::SignedGraph;
use crate::imbalance::{annotate, SolutionResult};
use crate::{Error, Partition};

/// Graphs with at most this many nodes are solved exactly by default.
pub const DEFAULT_EXACT_THRESHOLD: usize = 20;

/// Default number of local search restarts.
pub const DEFAULT_RESTARTS: usize = 50;

/// How an assignment was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveMode {
    /// Exhaustive enumeration, the result is a global minimum.
    Exact,
    /// Randomized local search, the result is the best local minimum found.
    Heuristic,
    /// An external solver (e.g. an annealer) produced the assignment.
    External,
}

impl SolveMode {
    /// Whether results in this mode are guaranteed to be optimal.
    pub fn is_optimal(self) -> bool {
        matches!(self, SolveMode::Exact)
    }
}

impl fmt::Display for SolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveMode::Exact => write!(f, "exact"),
            SolveMode::Heuristic => write!(f, "heuristic"),
            SolveMode::External => write!(f, "external"),
        }
    }
}

/// Diagnostic data of a solver run.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub mode: SolveMode,

    /// Ising energy of the returned assignment.
    pub energy: f64,

    /// Number of local search restarts that ran (0 for other modes).
    pub restarts: usize,

    /// Number of restarts that reached the returned energy.
    pub best_hits: usize,

    /// Single node flips performed: Gray code steps in exact mode, descent moves in heuristic mode.
    pub flips: usize,

    /// Whether the time limit cut the search short.
    pub timed_out: bool,

    /// The distinct assignments reached, lowest energy first. The first one is the
    /// returned assignment.
    pub samples: Vec<Sample>,
}

impl SolveReport {
    /// Number of assignments drawn, i.e. the sum of the sample occurrences.
    pub fn reads(&self) -> usize {
        self.samples.iter().map(|sample| sample.occurrences).sum()
    }
}

/// An assignment reached by a solver and how many times it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<usize>,
    pub energy: f64,
    pub occurrences: usize,
}

impl Sample {
    /// A sample seen once.
    pub fn single(labels: &[usize], energy: f64) -> Self {
        Sample {
            labels: labels.to_vec(),
            energy,
            occurrences: 1,
        }
    }
}

/// Which solver `solve` uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Exact up to `exact_threshold` nodes, heuristic above. Problems with a connected
    /// component over `MAX_EXACT_COMPONENT_SIZE` nodes always go to the heuristic.
    #[default]
    Auto,
    Exact,
    Heuristic,
}

/// Solver configuration.
///
/// Deserializes from JSON with every field optional, e.g. `{"restarts": 200, "seed": 7}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub strategy: Strategy,

    /// Largest node count that is solved exactly under the `auto` strategy.
    pub exact_threshold: usize,

    /// Number of local search restarts.
    pub restarts: usize,

    /// Flip budget of each restart. Defaults to `FLIPS_PER_NODE` times the node count.
    pub max_flips: Option<usize>,

    /// Seed of the local search. Runs with the same seed and no time limit are reproducible.
    pub seed: Option<u64>,

    /// Wall clock budget of the local search in milliseconds.
    pub time_limit_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            strategy: Strategy::Auto,
            exact_threshold: DEFAULT_EXACT_THRESHOLD,
            restarts: DEFAULT_RESTARTS,
            max_flips: None,
            seed: None,
            time_limit_ms: None,
        }
    }
}

impl SolverConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    /// The mode picked for a problem with `num_of_nodes` nodes, before component sizes
    /// are taken into account.
    pub fn mode_for(&self, num_of_nodes: usize) -> SolveMode {
        match self.strategy {
            Strategy::Exact => SolveMode::Exact,
            Strategy::Heuristic => SolveMode::Heuristic,
            Strategy::Auto if num_of_nodes <= self.exact_threshold => SolveMode::Exact,
            Strategy::Auto => SolveMode::Heuristic,
        }
    }

    fn local_search(&self) -> LocalSearch {
        LocalSearch {
            restarts: self.restarts,
            max_flips: self.max_flips,
            seed: self.seed,
            time_limit: self.time_limit(),
        }
    }
}

fn fits_exact_search(coefficients: &CoefficientModel) -> bool {
    coefficients
        .components()
        .iter()
        .all(|component| component.len() <= MAX_EXACT_COMPONENT_SIZE)
}

/// Frustration solver
///
/// Picks exhaustive enumeration or local search according to its configuration and
/// the size of the problem.
///
/// # Example
///
/// ```rust
/// use structural_imbalance::algorithms::{FrustrationSolver, SolverConfig};
/// use structural_imbalance::formulate::formulate;
/// use structural_imbalance::graph::{SignedGraph, Sign};
/// use structural_imbalance::Partition;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut graph = SignedGraph::new();
/// graph.add_node(0usize)?;
/// graph.add_node(1usize)?;
/// graph.add_edge(&0, &1, Sign::Hostile)?;
///
/// let mut sides = vec![0; graph.node_count()];
/// let report = FrustrationSolver::new(SolverConfig::default()).partition(&mut sides, &formulate(&graph))?;
///
/// assert_ne!(sides[0], sides[1]);
/// assert!(report.mode.is_optimal());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FrustrationSolver {
    pub config: SolverConfig,
}

impl FrustrationSolver {
    pub fn new(config: SolverConfig) -> Self {
        FrustrationSolver { config }
    }
}

impl<'a> Partition<&'a CoefficientModel> for FrustrationSolver {
    type Metadata = SolveReport;
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        coefficients: &'a CoefficientModel,
    ) -> Result<Self::Metadata, Self::Error> {
        match self.config.mode_for(coefficients.len()) {
            SolveMode::Exact if self.config.strategy == Strategy::Auto && !fits_exact_search(coefficients) => {
                debug!("a component is too large for exact search, falling back to local search");
                self.config.local_search().partition(part_ids, coefficients)
            }
            SolveMode::Heuristic => self.config.local_search().partition(part_ids, coefficients),
            _ => ExactSolver::default().partition(part_ids, coefficients),
        }
    }
}

/// A distinct assignment reached by the solver, annotated on the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult<N> {
    pub result: SolutionResult<N>,
    pub energy: f64,
    pub occurrences: usize,
}

/// An assignment together with how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution<N> {
    pub result: SolutionResult<N>,
    pub report: SolveReport,

    /// Every distinct assignment reached, lowest energy first.
    pub samples: Vec<SampleResult<N>>,
}

impl<N> Solution<N> {
    /// Whether the frustration count is guaranteed to be the minimum.
    pub fn is_optimal(&self) -> bool {
        self.report.mode.is_optimal()
    }

    /// Number of assignments the solver drew.
    pub fn number_of_reads(&self) -> usize {
        self.report.reads()
    }
}

/// Find a bipartition of `graph` minimising the energy of `coefficients`.
///
/// `coefficients` is expected to come from [`crate::formulate::formulate`] on the same
/// graph. Heuristic results are best effort and may be above the true minimum; check
/// [`Solution::is_optimal`].
pub fn solve<N>(
    graph: &SignedGraph<N>,
    coefficients: &CoefficientModel,
    config: &SolverConfig,
) -> Result<Solution<N>, Error>
where
    N: Clone + Eq + Hash + fmt::Display,
{
    solve_with(graph, coefficients, &mut FrustrationSolver::new(config.clone()))
}

/// Like [`solve`], with an explicitly chosen solver, e.g. an [`OracleSolver`].
pub fn solve_with<N, S>(
    graph: &SignedGraph<N>,
    coefficients: &CoefficientModel,
    solver: &mut S,
) -> Result<Solution<N>, Error>
where
    N: Clone + Eq + Hash + fmt::Display,
    S: for<'a> Partition<&'a CoefficientModel, Metadata = SolveReport, Error = Error>,
{
    if graph.is_empty() {
        return Err(Error::EmptyGraph);
    }
    if coefficients.len() != graph.node_count() {
        return Err(Error::InputLenMismatch {
            expected: graph.node_count(),
            actual: coefficients.len(),
        });
    }

    let mut part_ids = vec![0; graph.node_count()];
    let report = solver.partition(&mut part_ids, coefficients)?;
    let result = annotate(graph, &part_ids)?;

    let mut samples = Vec::with_capacity(report.samples.len());
    for sample in &report.samples {
        samples.push(SampleResult {
            result: annotate(graph, &sample.labels)?,
            energy: sample.energy,
            occurrences: sample.occurrences,
        });
    }

    if coefficients.frustration_for_energy(report.energy) != Some(result.frustration_count) {
        warn!(
            frustration = result.frustration_count,
            energy = report.energy,
            "coefficients do not match the graph's edges"
        );
    }
    info!(
        mode = %report.mode,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        frustration = result.frustration_count,
        energy = report.energy,
        timed_out = report.timed_out,
        "solved structural imbalance"
    );

    Ok(Solution { result, report, samples })
}
