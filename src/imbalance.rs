use std::fmt;
use std::hash::Hash;

use num_traits::ToPrimitive;

use crate::graph::{Edge, Sign, SignedGraph};
use crate::Error;

/// A bipartition of a signed graph with its frustrated edges.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionResult<N> {
    /// Node ids in index order.
    pub nodes: Vec<N>,

    /// Side (0 or 1) of every node, by node index.
    pub labels: Vec<usize>,

    /// Edges in the graph's insertion order.
    pub edges: Vec<Edge<N>>,

    /// Whether each edge of `edges` is frustrated.
    pub frustrated: Vec<bool>,

    /// Number of frustrated edges.
    pub frustration_count: usize,
}

/// Whether an edge breaks "friends on the same side, enemies on opposite sides".
pub fn is_frustrated(sign: Sign, source_label: usize, target_label: usize) -> bool {
    match sign {
        Sign::Friendly => source_label != target_label,
        Sign::Hostile => source_label == target_label,
    }
}

/// The share of frustrated edges, 0 for a graph without edges.
pub fn frustration_ratio(frustration_count: usize, num_of_edges: usize) -> f64 {
    if num_of_edges == 0 {
        return 0.0;
    }
    frustration_count.to_f64().unwrap_or(0.0) / num_of_edges.to_f64().unwrap_or(1.0)
}

/// Mark the frustrated edges of a graph under the given assignment of sides.
///
/// The graph is not modified; the annotations live in the returned result.
pub fn annotate<N>(graph: &SignedGraph<N>, labels: &[usize]) -> Result<SolutionResult<N>, Error>
where
    N: Clone + Eq + Hash + fmt::Display,
{
    if labels.len() != graph.node_count() {
        return Err(Error::InputLenMismatch {
            expected: graph.node_count(),
            actual: labels.len(),
        });
    }
    if let Some((index, &label)) = labels.iter().enumerate().find(|&(_, &label)| label > 1) {
        return Err(Error::InvalidLabel { index, label });
    }

    let frustrated: Vec<bool> = graph
        .indexed_edges()
        .iter()
        .map(|&(source, target, sign)| is_frustrated(sign, labels[source], labels[target]))
        .collect();
    let frustration_count = frustrated.iter().filter(|&&flag| flag).count();

    Ok(SolutionResult {
        nodes: graph.nodes(),
        labels: labels.to_vec(),
        edges: graph.edges(),
        frustrated,
        frustration_count,
    })
}

impl<N: PartialEq> SolutionResult<N> {
    /// The side of a node.
    pub fn label_of(&self, id: &N) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| node == id)
            .map(|index| self.labels[index])
    }
}

impl<N> SolutionResult<N> {
    /// The frustrated edges, in the graph's insertion order.
    pub fn frustrated_edges(&self) -> impl Iterator<Item = &Edge<N>> + '_ {
        self.edges
            .iter()
            .zip(&self.frustrated)
            .filter(|&(_, &flag)| flag)
            .map(|(edge, _)| edge)
    }

    /// The nodes on side 0 and on side 1.
    pub fn groups(&self) -> (Vec<&N>, Vec<&N>) {
        let mut side_0 = Vec::new();
        let mut side_1 = Vec::new();
        for (node, &label) in self.nodes.iter().zip(&self.labels) {
            if label == 0 {
                side_0.push(node);
            } else {
                side_1.push(node);
            }
        }
        (side_0, side_1)
    }

    /// The share of edges that are frustrated.
    pub fn frustration_ratio(&self) -> f64 {
        frustration_ratio(self.frustration_count, self.edges.len())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_ulps_eq;
    use itertools::assert_equal;
    use super::*;

    fn unbalanced_square() -> SignedGraph<&'static str> {
        let mut graph = SignedGraph::new();
        for id in ["w", "x", "y", "z"] {
            graph.add_node(id).unwrap();
        }
        graph.add_edge(&"w", &"x", Sign::Friendly).unwrap();
        graph.add_edge(&"x", &"y", Sign::Hostile).unwrap();
        graph.add_edge(&"y", &"z", Sign::Friendly).unwrap();
        graph.add_edge(&"z", &"w", Sign::Friendly).unwrap();
        graph
    }

    #[test]
    fn test_is_frustrated() {
        assert!(!is_frustrated(Sign::Friendly, 0, 0));
        assert!(is_frustrated(Sign::Friendly, 0, 1));
        assert!(is_frustrated(Sign::Hostile, 1, 1));
        assert!(!is_frustrated(Sign::Hostile, 1, 0));
    }

    #[test]
    fn test_annotate() {
        // Arrange
        let graph = unbalanced_square();
        let labels = [0, 0, 1, 1];

        // Act
        let result = annotate(&graph, &labels).unwrap();

        // Assert
        assert_eq!(result.frustrated, vec![false, false, false, true]);
        assert_eq!(result.frustration_count, 1);
        assert_equal(result.frustrated_edges().map(|edge| (edge.source, edge.target)), [("z", "w")]);
        assert_eq!(result.label_of(&"y"), Some(1));
        assert_eq!(result.label_of(&"q"), None);
        assert_eq!(result.groups(), (vec![&"w", &"x"], vec![&"y", &"z"]));
        assert_ulps_eq!(result.frustration_ratio(), 0.25);
    }

    #[test]
    fn test_annotate_is_symmetric_under_global_flip() {
        // Arrange
        let graph = unbalanced_square();
        let labels = [1, 0, 0, 1];
        let flipped: Vec<usize> = labels.iter().map(|label| 1 - label).collect();

        // Act
        let result = annotate(&graph, &labels).unwrap();
        let flipped_result = annotate(&graph, &flipped).unwrap();

        // Assert
        assert_eq!(result.frustrated, flipped_result.frustrated);
        assert_eq!(result.frustration_count, flipped_result.frustration_count);
    }

    #[test]
    fn test_annotate_rejects_bad_assignments() {
        // Arrange
        let graph = unbalanced_square();

        // Act
        let short = annotate(&graph, &[0, 1]);
        let bad_label = annotate(&graph, &[0, 1, 3, 0]);

        // Assert
        assert!(matches!(short, Err(Error::InputLenMismatch { expected: 4, actual: 2 })));
        assert!(matches!(bad_label, Err(Error::InvalidLabel { index: 2, label: 3 })));
    }

    #[test]
    fn test_frustration_ratio_without_edges() {
        assert_ulps_eq!(frustration_ratio(0, 0), 0.0);
        assert_ulps_eq!(frustration_ratio(3, 12), 0.25);
    }
}
