// Randomized greedy local search for the imbalance problem.
//
// Each restart draws a random bipartition and then repeatedly moves the node whose
// move lowers the energy the most, until no single move helps or the flip budget is
// spent. Restarts are independent and run on the rayon thread pool, each with its own
// random stream. The best local minimum wins; the distinct minima reached are
// reported with the number of restarts that reached them.
//
// This is a heuristic: local minima are not global minima in general.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::algorithms::{Sample, SolveMode, SolveReport};
use crate::formulate::{spin, CoefficientModel};
use crate::Error;

/// Default flip budget of a restart, per node of the problem.
pub const FLIPS_PER_NODE: usize = 10;

const IMPROVEMENT_EPSILON: f64 = 1e-9;

#[derive(Debug)]
struct Descent {
    // Side of every node at the end of the descent.
    partition: Vec<usize>,

    energy: f64,

    flips: usize,

    // Whether the deadline stopped the descent before a local minimum.
    timed_out: bool,
}

fn local_search(
    partition: &mut [usize],
    model: &CoefficientModel,
    restarts: usize,
    max_flips: Option<usize>,
    seed: Option<u64>,
    time_limit: Option<Duration>,
) -> SolveReport {
    debug_assert_eq!(partition.len(), model.len());

    let base_seed = match seed {
        Some(seed) => seed,
        None => SmallRng::from_entropy().gen(),
    };
    let deadline = time_limit.map(|limit| Instant::now() + limit);
    let flip_budget = max_flips.unwrap_or(FLIPS_PER_NODE * model.len());

    // Restart 0 always runs so that there is a result to return.
    let descents: Vec<Descent> = (0..restarts)
        .into_par_iter()
        .filter_map(|restart| {
            if restart > 0 && deadline_passed(deadline) {
                return None;
            }
            let mut rng = SmallRng::seed_from_u64(base_seed.wrapping_add(restart as u64));
            Some(greedy_descent(model, &mut rng, flip_budget, deadline))
        })
        .collect();

    let samples = group_samples(&descents);
    let best = &samples[0];
    let best_hits = samples
        .iter()
        .filter(|sample| (sample.energy - best.energy).abs() <= IMPROVEMENT_EPSILON)
        .map(|sample| sample.occurrences)
        .sum();
    let timed_out = descents.len() < restarts || descents.iter().any(|descent| descent.timed_out);

    debug!(
        restarts = descents.len(),
        distinct = samples.len(),
        best_energy = best.energy,
        best_hits,
        timed_out,
        "local search finished"
    );

    partition.copy_from_slice(&best.labels);
    SolveReport {
        mode: SolveMode::Heuristic,
        energy: best.energy,
        restarts: descents.len(),
        best_hits,
        flips: descents.iter().map(|descent| descent.flips).sum(),
        timed_out,
        samples,
    }
}

// Merges the descents that ended on the same partition. Samples are ordered by energy,
// then by the first restart that reached them.
fn group_samples(descents: &[Descent]) -> Vec<Sample> {
    let mut positions: FxHashMap<&[usize], usize> = FxHashMap::default();
    let mut samples: Vec<Sample> = Vec::new();
    for descent in descents {
        match positions.get(descent.partition.as_slice()) {
            Some(&position) => samples[position].occurrences += 1,
            None => {
                positions.insert(&descent.partition, samples.len());
                samples.push(Sample::single(&descent.partition, descent.energy));
            }
        }
    }
    samples.sort_by(|a, b| a.energy.total_cmp(&b.energy));
    samples
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

fn greedy_descent(
    model: &CoefficientModel,
    rng: &mut SmallRng,
    flip_budget: usize,
    deadline: Option<Instant>,
) -> Descent {
    let mut partition: Vec<usize> = (0..model.len()).map(|_| rng.gen_range(0..2)).collect();
    let mut fields: Vec<f64> = (0..model.len())
        .map(|vertex| model.local_field(vertex, &partition))
        .collect();
    let mut energy = model.energy(&partition);
    let mut flips = 0;
    let mut timed_out = false;

    while flips < flip_budget {
        if deadline_passed(deadline) {
            timed_out = true;
            break;
        }
        let Some((vertex, delta)) = best_move(&partition, &fields) else {
            break;
        };
        move_vertex(model, &mut partition, &mut fields, vertex);
        energy += delta;
        flips += 1;
    }

    Descent {
        partition,
        energy,
        flips,
        timed_out,
    }
}

// The move that lowers the energy the most, if any does. Ties go to the lowest index.
fn best_move(partition: &[usize], fields: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (vertex, (&label, &field)) in partition.iter().zip(fields).enumerate() {
        let delta = -2.0 * spin(label) * field;
        if delta < -IMPROVEMENT_EPSILON && best.map_or(true, |(_, best_delta)| delta < best_delta) {
            best = Some((vertex, delta));
        }
    }
    best
}

// Moves a vertex to the other side and updates the fields of its neighbors.
fn move_vertex(model: &CoefficientModel, partition: &mut [usize], fields: &mut [f64], vertex: usize) {
    partition[vertex] = 1 - partition[vertex];
    let new_spin = spin(partition[vertex]);
    for (neighbor, coupling) in model.neighbors(vertex) {
        fields[neighbor] += 2.0 * coupling * new_spin;
    }
}

/// Local search solver
///
/// Best-effort minimisation of the imbalance energy by random-restart greedy descent.
/// The result is the best local minimum over all restarts; it is not guaranteed to be
/// the global minimum.
///
/// # Example
///
/// ```rust
/// use structural_imbalance::algorithms::LocalSearch;
/// use structural_imbalance::formulate::formulate;
/// use structural_imbalance::gen_graphs::gen_random_signed_graph;
/// use structural_imbalance::Partition;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let graph = gen_random_signed_graph(200, 0.05, 0.5, Some(1))?;
/// let mut sides = vec![0; graph.node_count()];
///
/// let report = LocalSearch { seed: Some(42), ..Default::default() }.partition(&mut sides, &formulate(&graph))?;
///
/// assert_eq!(report.restarts, 50);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LocalSearch {
    /// Number of independent random restarts.
    pub restarts: usize,

    /// Maximum number of node moves in a restart. Defaults to `FLIPS_PER_NODE` times
    /// the number of nodes.
    pub max_flips: Option<usize>,

    /// Seed of the random streams. Restart `i` uses the stream seeded with `seed + i`,
    /// so runs with the same seed and no time limit give the same result.
    pub seed: Option<u64>,

    /// Wall clock budget. When it runs out the best partition found so far is returned.
    pub time_limit: Option<Duration>,
}

impl Default for LocalSearch {
    fn default() -> Self {
        LocalSearch {
            restarts: crate::algorithms::DEFAULT_RESTARTS,
            max_flips: None,
            seed: None,
            time_limit: None,
        }
    }
}

impl<'a> crate::Partition<&'a CoefficientModel> for LocalSearch {
    type Metadata = SolveReport;
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        model: &'a CoefficientModel,
    ) -> Result<Self::Metadata, Self::Error> {
        if self.restarts == 0 {
            return Err(Error::InvalidConfig("at least one restart is required".to_string()));
        }
        if model.is_empty() {
            return Err(Error::EmptyGraph);
        }
        if part_ids.len() != model.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: model.len(),
            });
        }
        Ok(local_search(
            part_ids,
            model,
            self.restarts,
            self.max_flips,
            self.seed,
            self.time_limit,
        ))
    }
}
