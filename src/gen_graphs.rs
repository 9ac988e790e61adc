use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::graph::{Sign, SignedGraph};
use crate::Error;

fn rng_from(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), Error> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidConfig(format!("{name} must lie in [0, 1], got {value}")));
    }
    Ok(())
}

/// Generate a random signed graph on nodes `0..num_of_nodes`.
///
/// Each pair of nodes is linked with probability `edge_probability`, and each edge is
/// hostile with probability `hostile_probability`.
pub fn gen_random_signed_graph(
    num_of_nodes: usize,
    edge_probability: f64,
    hostile_probability: f64,
    seed: Option<u64>,
) -> Result<SignedGraph<usize>, Error> {
    check_probability("edge probability", edge_probability)?;
    check_probability("hostile probability", hostile_probability)?;
    let mut rng = rng_from(seed);

    let mut graph = SignedGraph::new();
    for id in 0..num_of_nodes {
        graph.add_node(id)?;
    }
    for u in 0..num_of_nodes {
        for v in (u + 1)..num_of_nodes {
            if rng.gen_bool(edge_probability) {
                let sign = if rng.gen_bool(hostile_probability) { Sign::Hostile } else { Sign::Friendly };
                graph.add_edge(&u, &v, sign)?;
            }
        }
    }

    Ok(graph)
}

/// Generate a random signed graph with a planted bipartition and no frustration.
///
/// Nodes are split in two camps at random; edges inside a camp are friendly and edges
/// across camps hostile. Returns the graph and the side of every node.
pub fn gen_balanced_signed_graph(
    num_of_nodes: usize,
    edge_probability: f64,
    seed: Option<u64>,
) -> Result<(SignedGraph<usize>, Vec<usize>), Error> {
    check_probability("edge probability", edge_probability)?;
    let mut rng = rng_from(seed);

    let camps: Vec<usize> = (0..num_of_nodes).map(|_| rng.gen_range(0..2)).collect();
    let mut graph = SignedGraph::new();
    for id in 0..num_of_nodes {
        graph.add_node(id)?;
    }
    for u in 0..num_of_nodes {
        for v in (u + 1)..num_of_nodes {
            if rng.gen_bool(edge_probability) {
                let sign = if camps[u] == camps[v] { Sign::Friendly } else { Sign::Hostile };
                graph.add_edge(&u, &v, sign)?;
            }
        }
    }

    Ok((graph, camps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imbalance::annotate;

    #[test]
    fn test_gen_random_signed_graph_is_reproducible() {
        // Act
        let first = gen_random_signed_graph(30, 0.3, 0.5, Some(17)).unwrap();
        let second = gen_random_signed_graph(30, 0.3, 0.5, Some(17)).unwrap();

        // Assert
        assert_eq!(first.node_count(), 30);
        assert_eq!(first.edges(), second.edges());
    }

    #[test]
    fn test_gen_random_signed_graph_extremes() {
        // Act
        let complete = gen_random_signed_graph(6, 1.0, 0.0, Some(1)).unwrap();
        let empty = gen_random_signed_graph(6, 0.0, 1.0, Some(1)).unwrap();

        // Assert
        assert_eq!(complete.edge_count(), 15);
        assert!(complete.edges().iter().all(|edge| edge.sign == Sign::Friendly));
        assert_eq!(empty.edge_count(), 0);
    }

    #[test]
    fn test_gen_balanced_signed_graph_has_no_frustration() {
        // Act
        let (graph, camps) = gen_balanced_signed_graph(40, 0.2, Some(9)).unwrap();

        // Assert
        assert_eq!(annotate(&graph, &camps).unwrap().frustration_count, 0);
    }

    #[test]
    fn test_rejects_invalid_probabilities() {
        assert!(matches!(gen_random_signed_graph(3, 1.5, 0.5, None), Err(Error::InvalidConfig(_))));
        assert!(matches!(gen_balanced_signed_graph(3, -0.1, None), Err(Error::InvalidConfig(_))));
    }
}
