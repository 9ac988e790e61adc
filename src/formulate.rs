// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe
use std::fmt;
use std::hash::Hash;
use std::iter::{Cloned, Zip};
use std::slice::Iter;

use num_traits::ToPrimitive;
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

use crate::graph::SignedGraph;

/// The spin of a side label: side 0 is spin -1, side 1 is spin +1.
pub fn spin(label: usize) -> f64 {
    if label == 0 { -1.0 } else { 1.0 }
}

/// Ising coefficients of a structural imbalance problem.
///
/// The energy of an assignment of spins `s` is
/// `E(s) = sum_v h(v) s(v) + sum_{u<v} J(u, v) s(u) s(v)`.
#[derive(Debug, Clone)]
pub struct CoefficientModel {
    /// Linear coefficient `h` of each node, by node index.
    pub linear: Vec<f64>,

    /// Quadratic coefficients `J` stored symmetrically as a sparse matrix in CSR format.
    /// Pairs without an edge are structural zeros.
    pub couplings: CsMat<f64>,
}

/// Derive the Ising coefficients of a signed graph.
///
/// Every node gets `h = 0`. Every edge gets `J = -1` when friendly and `J = +1` when
/// hostile, so that an edge contributes `+1` to the energy exactly when it is frustrated
/// and `-1` otherwise.
pub fn formulate<N>(graph: &SignedGraph<N>) -> CoefficientModel
where
    N: Clone + Eq + Hash + fmt::Display,
{
    let num_of_nodes = graph.node_count();
    // Construction of the couplings. First contruct a TriMat and then convert it to CSR format.
    let mut triplet_matrix = TriMat::with_capacity((num_of_nodes, num_of_nodes), 2 * graph.edge_count());
    for &(source, target, sign) in graph.indexed_edges() {
        triplet_matrix.add_triplet(source, target, sign.coupling());
        triplet_matrix.add_triplet(target, source, sign.coupling());
    }

    CoefficientModel {
        linear: vec![0.0; num_of_nodes],
        couplings: triplet_matrix.to_csr(),
    }
}

impl CoefficientModel {
    /// The number of nodes (spins) in the model.
    pub fn len(&self) -> usize {
        self.linear.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linear.is_empty()
    }

    /// The number of pairwise interactions, i.e. edges of the source graph.
    pub fn interaction_count(&self) -> usize {
        self.couplings.nnz() / 2
    }

    /// An iterator over the interacting nodes of a node with their coupling.
    pub fn neighbors(&self, vertex: usize) -> Zip<Cloned<Iter<'_, usize>>, Cloned<Iter<'_, f64>>> {
        let (indices, data) = match self.couplings.outer_view(vertex) {
            Some(row) => row.into_raw_storage(),
            None => (&[][..], &[][..]),
        };
        indices.iter().cloned().zip(data.iter().cloned())
    }

    /// The coupling between two nodes, if they interact.
    pub fn coupling(&self, u: usize, v: usize) -> Option<f64> {
        self.couplings.get(u, v).cloned()
    }

    /// The energy of an assignment of side labels.
    pub fn energy(&self, labels: &[usize]) -> f64 {
        debug_assert_eq!(self.len(), labels.len());

        (0..self.len())
            .into_par_iter()
            .map(|vertex| {
                let s = spin(labels[vertex]);
                let pairwise: f64 = self
                    .neighbors(vertex)
                    .filter(|(neighbor, _)| *neighbor < vertex)
                    .map(|(neighbor, coupling)| coupling * spin(labels[neighbor]))
                    .sum();
                s * (self.linear[vertex] + pairwise)
            })
            .sum()
    }

    /// The field acting on a node: `h(v) + sum_u J(u, v) s(u)`.
    pub fn local_field(&self, vertex: usize, labels: &[usize]) -> f64 {
        self.linear[vertex]
            + self
                .neighbors(vertex)
                .map(|(neighbor, coupling)| coupling * spin(labels[neighbor]))
                .sum::<f64>()
    }

    /// The change in energy caused by moving a node to the other side.
    pub fn flip_delta(&self, vertex: usize, labels: &[usize]) -> f64 {
        -2.0 * spin(labels[vertex]) * self.local_field(vertex, labels)
    }

    /// Number of frustrated edges of an assignment with the given energy.
    ///
    /// Each edge contributes +1 when frustrated and -1 otherwise, so
    /// `frustration = (E + m) / 2` with `m` edges. The relation only holds without
    /// linear terms: `None` when the model has any, or when the energy is out of range
    /// for the model's edges.
    pub fn frustration_for_energy(&self, energy: f64) -> Option<usize> {
        if self.linear.iter().any(|&h| h != 0.0) {
            return None;
        }
        let num_of_edges = self.interaction_count();
        ((energy + num_of_edges as f64) / 2.0)
            .round()
            .to_usize()
            .filter(|&frustration| frustration <= num_of_edges)
    }

    /// The connected components of the interaction graph.
    ///
    /// Components are ordered by their lowest node index and list their nodes in
    /// ascending order, so the result only depends on the node order.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.len()];
        let mut components = Vec::new();

        for root in 0..self.len() {
            if visited[root] {
                continue;
            }
            visited[root] = true;
            let mut component = vec![root];
            let mut stack = vec![root];
            while let Some(vertex) = stack.pop() {
                for (neighbor, _) in self.neighbors(vertex) {
                    if !visited[neighbor] {
                        visited[neighbor] = true;
                        component.push(neighbor);
                        stack.push(neighbor);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }

        components
    }
}
