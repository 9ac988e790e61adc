// Exhaustive search of the bipartitions of each connected component.
//
// Components never interact, so the minimum of the whole model is the sum of the
// component minima. Inside a component the labellings are enumerated in reflected
// Gray code order: two consecutive labellings differ by a single node, and the energy
// is updated with that node's flip delta instead of being recomputed.

use tracing::debug;

use crate::algorithms::{Sample, SolveMode, SolveReport};
use crate::formulate::CoefficientModel;
use crate::Error;

/// Largest component the exact solver enumerates.
pub const MAX_EXACT_COMPONENT_SIZE: usize = 30;

// Energies are sums of small integers; anything below this is rounding noise.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

fn exact_solver(partition: &mut [usize], model: &CoefficientModel, max_component_size: usize) -> Result<SolveReport, Error> {
    debug_assert_eq!(partition.len(), model.len());

    let components = model.components();
    if let Some(largest) = components.iter().map(Vec::len).max() {
        if largest > max_component_size {
            return Err(Error::ComponentTooLarge {
                limit: max_component_size,
                actual: largest,
            });
        }
    }

    partition.fill(0);
    let mut energy = model.energy(partition);
    let mut flips = 0;

    for component in &components {
        let (gain, steps) = solve_component(partition, model, component);
        debug!(size = component.len(), gain, steps, "enumerated component");
        energy += gain;
        flips += steps;
    }

    Ok(SolveReport {
        mode: SolveMode::Exact,
        energy,
        restarts: 0,
        best_hits: 1,
        flips,
        timed_out: false,
        samples: vec![Sample::single(partition, energy)],
    })
}

// Enumerates the labellings of one component, starting from all zeros, and leaves the
// first minimum in `partition`. Returns the energy change relative to the all-zero
// labelling and the number of Gray code steps taken.
fn solve_component(partition: &mut [usize], model: &CoefficientModel, component: &[usize]) -> (f64, usize) {
    // Without linear terms flipping every label leaves the energy unchanged, so the
    // first node can stay on side 0.
    let symmetric = component.iter().all(|&vertex| model.linear[vertex] == 0.0);
    let fixed = usize::from(symmetric).min(component.len());
    let free_nodes = &component[fixed..];

    let mut current = 0f64;
    let mut best = 0f64;
    let mut best_labels: Vec<usize> = free_nodes.iter().map(|&vertex| partition[vertex]).collect();

    let num_of_steps = (1u64 << free_nodes.len()) - 1;
    for step in 1..=num_of_steps {
        let vertex = free_nodes[step.trailing_zeros() as usize];
        current += model.flip_delta(vertex, partition);
        partition[vertex] = 1 - partition[vertex];

        if current < best - IMPROVEMENT_EPSILON {
            best = current;
            for (label, &node) in best_labels.iter_mut().zip(free_nodes) {
                *label = partition[node];
            }
        }
    }

    for (&label, &node) in best_labels.iter().zip(free_nodes) {
        partition[node] = label;
    }

    (best, num_of_steps as usize)
}

/// Exact solver
///
/// Enumerates every bipartition of each connected component and keeps the first
/// minimum met. The result only depends on the model and its node order.
#[derive(Debug, Clone, Copy)]
pub struct ExactSolver {
    /// Components with more nodes than this are rejected with `Error::ComponentTooLarge`.
    pub max_component_size: usize,
}

impl Default for ExactSolver {
    fn default() -> Self {
        ExactSolver {
            max_component_size: MAX_EXACT_COMPONENT_SIZE,
        }
    }
}

impl<'a> crate::Partition<&'a CoefficientModel> for ExactSolver {
    type Metadata = SolveReport;
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        model: &'a CoefficientModel,
    ) -> Result<Self::Metadata, Self::Error> {
        if model.is_empty() {
            return Err(Error::EmptyGraph);
        }
        if part_ids.len() != model.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: model.len(),
            });
        }
        let max_component_size = self.max_component_size.min(MAX_EXACT_COMPONENT_SIZE);
        exact_solver(part_ids, model, max_component_size)
    }
}
