use std::fmt;

use tracing::debug;

use crate::algorithms::{Sample, SolveMode, SolveReport};
use crate::formulate::CoefficientModel;
use crate::Error;

/// Adapter for solvers that live outside this crate, such as an annealing service.
///
/// The oracle receives the Ising coefficients and answers with one side label per
/// node, or `None` when it could not produce an answer. Its answer is validated and
/// its energy recomputed from the coefficients; nothing is assumed about optimality.
///
/// # Example
///
/// ```rust
/// use structural_imbalance::algorithms::{solve_with, OracleSolver, SolveMode};
/// use structural_imbalance::formulate::formulate;
/// use structural_imbalance::graph::{SignedGraph, Sign};
/// # fn main() -> Result<(), structural_imbalance::Error> {
/// let mut graph = SignedGraph::new();
/// graph.add_node("x")?;
/// graph.add_node("y")?;
/// graph.add_edge(&"x", &"y", Sign::Friendly)?;
///
/// let mut oracle = OracleSolver::new(|coefficients| Some(vec![1; coefficients.len()]));
/// let solution = solve_with(&graph, &formulate(&graph), &mut oracle)?;
///
/// assert_eq!(solution.report.mode, SolveMode::External);
/// assert_eq!(solution.result.frustration_count, 0);
/// # Ok(())
/// # }
/// ```
pub struct OracleSolver<F> {
    oracle: F,
}

impl<F> OracleSolver<F>
where
    F: FnMut(&CoefficientModel) -> Option<Vec<usize>>,
{
    pub fn new(oracle: F) -> Self {
        OracleSolver { oracle }
    }
}

impl<F> fmt::Debug for OracleSolver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleSolver").finish_non_exhaustive()
    }
}

impl<'a, F> crate::Partition<&'a CoefficientModel> for OracleSolver<F>
where
    F: FnMut(&CoefficientModel) -> Option<Vec<usize>>,
{
    type Metadata = SolveReport;
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        model: &'a CoefficientModel,
    ) -> Result<Self::Metadata, Self::Error> {
        if part_ids.len() != model.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: model.len(),
            });
        }

        let sample = (self.oracle)(model).ok_or(Error::NotFound)?;
        if sample.len() != part_ids.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: sample.len(),
            });
        }
        if let Some((index, &label)) = sample.iter().enumerate().find(|&(_, &label)| label > 1) {
            return Err(Error::InvalidLabel { index, label });
        }

        part_ids.copy_from_slice(&sample);
        let energy = model.energy(part_ids);
        debug!(energy, "oracle returned an assignment");

        Ok(SolveReport {
            mode: SolveMode::External,
            energy,
            restarts: 0,
            best_hits: 1,
            flips: 0,
            timed_out: false,
            samples: vec![Sample::single(part_ids, energy)],
        })
    }
}
