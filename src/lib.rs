// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe
//! Structural imbalance of signed social networks.
//!
//! A signed graph links people or organisations with friendly (+1) or hostile (-1)
//! edges. Its structural imbalance (frustration) is the smallest number of edges that
//! break the rule "friends on the same side, enemies on opposite sides" over all
//! bipartitions of the nodes. The problem is posed as an Ising model and solved by
//! exhaustive enumeration for small graphs and by randomized local search otherwise.
//!
//! ```rust
//! use structural_imbalance::algorithms::{solve, SolverConfig};
//! use structural_imbalance::formulate::formulate;
//! use structural_imbalance::graph::{SignedGraph, Sign};
//! # fn main() -> Result<(), structural_imbalance::Error> {
//! let mut graph = SignedGraph::new();
//! for id in ["a", "b", "c"] {
//!     graph.add_node(id)?;
//! }
//! graph.add_edge(&"a", &"b", Sign::Hostile)?;
//! graph.add_edge(&"b", &"c", Sign::Hostile)?;
//! graph.add_edge(&"c", &"a", Sign::Hostile)?;
//!
//! let coefficients = formulate(&graph);
//! let solution = solve(&graph, &coefficients, &SolverConfig::default())?;
//! assert_eq!(solution.result.frustration_count, 1);
//! # Ok(())
//! # }
//! ```
pub mod algorithms;
pub mod dataset;
pub mod formulate;
pub mod gen_graphs;
pub mod graph;
pub mod imbalance;
pub mod io;

mod error;

pub use error::Error;

// The `Partition` trait allows for splitting the nodes of a problem in two sides.
// Every imbalance solver implements this trait, so callers pick the solver per call.
// The generic argument `M` defines the input of the algorithms (e.g. the Ising
// coefficients of a signed graph).
// The input partition must be of the correct size and its contents may or may
// not be used by the algorithms.
pub trait Partition<M> {
    // Diagnostic data returned for a specific run of the algorithm.
    type Metadata;

    // Error details, should the algorithm fail to run.
    type Error;

    // Partition the given data and output the side (0 or 1) of each element in
    // `part_ids`.
    fn partition(&mut self, part_ids: &mut [usize], data: M)
                 -> Result<Self::Metadata, Self::Error>;
}
