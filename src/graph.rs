use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::Error;

/// The relation carried by an edge of a signed graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    /// Allies, encoded as +1.
    Friendly,
    /// Enemies, encoded as -1.
    Hostile,
}

impl Sign {
    /// The numeric encoding of the sign (+1 or -1).
    pub fn value(self) -> i8 {
        match self {
            Sign::Friendly => 1,
            Sign::Hostile => -1,
        }
    }

    /// The Ising coupling of an edge with this sign.
    ///
    /// Friendly edges favour equal spins (J = -1), hostile edges favour opposite spins (J = +1).
    pub fn coupling(self) -> f64 {
        -f64::from(self.value())
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Friendly => write!(f, "friendly"),
            Sign::Hostile => write!(f, "hostile"),
        }
    }
}

impl TryFrom<i64> for Sign {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Sign::Friendly),
            -1 => Ok(Sign::Hostile),
            other => Err(Error::InvalidSign(other.to_string())),
        }
    }
}

impl TryFrom<f64> for Sign {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value == 1.0 {
            Ok(Sign::Friendly)
        } else if value == -1.0 {
            Ok(Sign::Hostile)
        } else {
            Err(Error::InvalidSign(value.to_string()))
        }
    }
}

impl FromStr for Sign {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "friendly" | "+1" | "1" => Ok(Sign::Friendly),
            "hostile" | "-1" => Ok(Sign::Hostile),
            _ => Err(Error::InvalidSign(s.to_string())),
        }
    }
}

/// An undirected signed edge, as handed out by [`SignedGraph::edges`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge<N> {
    pub source: N,
    pub target: N,
    pub sign: Sign,
}

/// Struct that represents an undirected signed graph.
///
/// Nodes keep their insertion order, and the position of a node in that order is its
/// index. Coefficient models and assignments are indexed the same way.
#[derive(Debug, Clone)]
pub struct SignedGraph<N> {
    nodes: Vec<N>,
    node_index: FxHashMap<N, usize>,
    /// Edges as (source index, target index, sign) in insertion order.
    edges: Vec<(usize, usize, Sign)>,
    /// Unordered pair (lower index, higher index) to position in `edges`.
    edge_index: FxHashMap<(usize, usize), usize>,
}

impl<N> Default for SignedGraph<N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            node_index: FxHashMap::default(),
            edges: Vec::new(),
            edge_index: FxHashMap::default(),
        }
    }
}

fn pair_key(u: usize, v: usize) -> (usize, usize) {
    if u < v { (u, v) } else { (v, u) }
}

impl<N> SignedGraph<N>
where
    N: Clone + Eq + Hash + fmt::Display,
{
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_node(&self, id: &N) -> bool {
        self.node_index.contains_key(id)
    }

    /// The index of a node, i.e. its position in insertion order.
    pub fn index_of(&self, id: &N) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    /// The id of the node at the given index.
    pub fn node(&self, index: usize) -> Option<&N> {
        self.nodes.get(index)
    }

    /// Insert a node without edges.
    pub fn add_node(&mut self, id: N) -> Result<usize, Error> {
        if self.node_index.contains_key(&id) {
            return Err(Error::DuplicateNode(id.to_string()));
        }
        let index = self.nodes.len();
        self.node_index.insert(id.clone(), index);
        self.nodes.push(id);
        Ok(index)
    }

    /// Insert an edge between two existing nodes.
    ///
    /// The graph is left untouched when the edge is rejected.
    pub fn add_edge(&mut self, u: &N, v: &N, sign: Sign) -> Result<(), Error> {
        let source = self.require(u)?;
        let target = self.require(v)?;
        if source == target {
            return Err(Error::SelfLoop(u.to_string()));
        }
        let key = pair_key(source, target);
        if self.edge_index.contains_key(&key) {
            return Err(Error::DuplicateEdge(u.to_string(), v.to_string()));
        }
        self.edge_index.insert(key, self.edges.len());
        self.edges.push((source, target, sign));
        Ok(())
    }

    /// Insert an edge whose sign is given in its numeric form (+1 or -1).
    pub fn add_signed_edge(&mut self, u: &N, v: &N, value: i64) -> Result<(), Error> {
        let sign = Sign::try_from(value)?;
        self.add_edge(u, v, sign)
    }

    /// A snapshot of the node ids in index order.
    pub fn nodes(&self) -> Vec<N> {
        self.nodes.clone()
    }

    /// An iterator over the node ids in index order.
    pub fn nodes_iter(&self) -> impl Iterator<Item = &N> + '_ {
        self.nodes.iter()
    }

    /// A snapshot of the edges in insertion order.
    pub fn edges(&self) -> Vec<Edge<N>> {
        self.edges
            .iter()
            .map(|&(source, target, sign)| Edge {
                source: self.nodes[source].clone(),
                target: self.nodes[target].clone(),
                sign,
            })
            .collect()
    }

    /// Edges as (source index, target index, sign), in insertion order.
    pub fn indexed_edges(&self) -> &[(usize, usize, Sign)] {
        &self.edges
    }

    /// The sign of the edge between two nodes, if they share one.
    pub fn sign_between(&self, u: &N, v: &N) -> Option<Sign> {
        let source = self.index_of(u)?;
        let target = self.index_of(v)?;
        self.edge_index
            .get(&pair_key(source, target))
            .map(|&position| self.edges[position].2)
    }

    /// The subgraph induced by the given nodes.
    ///
    /// Nodes keep the relative order they have in this graph, whatever the order of
    /// `subset`. Repeated ids in `subset` are taken once.
    pub fn subgraph_on<'a, I>(&self, subset: I) -> Result<SignedGraph<N>, Error>
    where
        I: IntoIterator<Item = &'a N>,
        N: 'a,
    {
        let mut keep = vec![false; self.nodes.len()];
        for id in subset {
            keep[self.require(id)?] = true;
        }
        Ok(self.restrict(&keep, |_| true))
    }

    /// The subgraph made of the edges accepted by `predicate` and the nodes they touch.
    ///
    /// The predicate receives the edge's position in insertion order together with the edge.
    pub fn edge_subgraph<F>(&self, mut predicate: F) -> SignedGraph<N>
    where
        F: FnMut(usize, &Edge<N>) -> bool,
    {
        let mut keep_edge = vec![false; self.edges.len()];
        let mut keep_node = vec![false; self.nodes.len()];
        for (position, &(source, target, sign)) in self.edges.iter().enumerate() {
            let edge = Edge {
                source: self.nodes[source].clone(),
                target: self.nodes[target].clone(),
                sign,
            };
            if predicate(position, &edge) {
                keep_edge[position] = true;
                keep_node[source] = true;
                keep_node[target] = true;
            }
        }
        self.restrict(&keep_node, |position| keep_edge[position])
    }

    fn restrict<F>(&self, keep_node: &[bool], keep_edge: F) -> SignedGraph<N>
    where
        F: Fn(usize) -> bool,
    {
        let mut subgraph = SignedGraph::new();
        let mut new_index = vec![None; self.nodes.len()];
        for (index, id) in self.nodes.iter().enumerate() {
            if keep_node[index] {
                new_index[index] = Some(subgraph.nodes.len());
                subgraph.node_index.insert(id.clone(), subgraph.nodes.len());
                subgraph.nodes.push(id.clone());
            }
        }
        for (position, &(source, target, sign)) in self.edges.iter().enumerate() {
            if let (Some(s), Some(t)) = (new_index[source], new_index[target]) {
                if keep_edge(position) {
                    subgraph.edge_index.insert(pair_key(s, t), subgraph.edges.len());
                    subgraph.edges.push((s, t, sign));
                }
            }
        }
        subgraph
    }

    fn require(&self, id: &N) -> Result<usize, Error> {
        self.index_of(id).ok_or_else(|| Error::UnknownNode(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> SignedGraph<&'static str> {
        let mut graph = SignedGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(id).unwrap();
        }
        graph.add_edge(&"a", &"b", Sign::Friendly).unwrap();
        graph.add_edge(&"b", &"c", Sign::Hostile).unwrap();
        graph.add_edge(&"c", &"a", Sign::Hostile).unwrap();
        graph
    }

    #[test]
    fn test_add_node_rejects_duplicates() {
        // Arrange
        let mut graph = SignedGraph::new();
        graph.add_node(7usize).unwrap();

        // Act
        let result = graph.add_node(7usize);

        // Assert
        assert!(matches!(result, Err(Error::DuplicateNode(id)) if id == "7"));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_add_edge_validation_leaves_graph_untouched() {
        // Arrange
        let mut graph = triangle();
        graph.add_node("d").unwrap();

        // Act
        let unknown = graph.add_edge(&"a", &"z", Sign::Friendly);
        let self_loop = graph.add_edge(&"d", &"d", Sign::Friendly);
        let duplicate = graph.add_edge(&"b", &"a", Sign::Hostile);
        let invalid = graph.add_signed_edge(&"a", &"d", 0);

        // Assert
        assert!(matches!(unknown, Err(Error::UnknownNode(id)) if id == "z"));
        assert!(matches!(self_loop, Err(Error::SelfLoop(_))));
        assert!(matches!(duplicate, Err(Error::DuplicateEdge(_, _))));
        assert!(matches!(invalid, Err(Error::InvalidSign(_))));
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.sign_between(&"a", &"b"), Some(Sign::Friendly));
        assert_eq!(graph.sign_between(&"a", &"d"), None);
    }

    #[test]
    fn test_snapshots_are_detached() {
        // Arrange
        let mut graph = triangle();
        let nodes = graph.nodes();
        let edges = graph.edges();

        // Act
        graph.add_node("d").unwrap();
        graph.add_edge(&"a", &"d", Sign::Friendly).unwrap();

        // Assert
        assert_eq!(nodes, vec!["a", "b", "c"]);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[1], Edge { source: "b", target: "c", sign: Sign::Hostile });
    }

    #[test]
    fn test_subgraph_on() {
        // Arrange
        let graph = triangle();

        // Act
        let subgraph = graph.subgraph_on(&["c", "a"]).unwrap();
        let missing = graph.subgraph_on(&["a", "x"]);

        // Assert
        assert_eq!(subgraph.nodes(), vec!["a", "c"]);
        assert_eq!(subgraph.edge_count(), 1);
        assert_eq!(subgraph.sign_between(&"a", &"c"), Some(Sign::Hostile));
        assert!(matches!(missing, Err(Error::UnknownNode(id)) if id == "x"));
    }

    #[test]
    fn test_edge_subgraph_drops_untouched_nodes() {
        // Arrange
        let graph = triangle();

        // Act
        let friendly_only = graph.edge_subgraph(|_, edge| edge.sign == Sign::Friendly);

        // Assert
        assert_eq!(friendly_only.nodes(), vec!["a", "b"]);
        assert_eq!(friendly_only.edge_count(), 1);
    }

    #[test]
    fn test_sign_parsing() {
        assert_eq!(Sign::try_from(1i64).unwrap(), Sign::Friendly);
        assert_eq!(Sign::try_from(-1.0f64).unwrap(), Sign::Hostile);
        assert_eq!("hostile".parse::<Sign>().unwrap(), Sign::Hostile);
        assert!(Sign::try_from(2i64).is_err());
        assert!(Sign::try_from(0.5f64).is_err());
        assert!("neutral".parse::<Sign>().is_err());
        assert_eq!(Sign::Friendly.coupling(), -1.0);
        assert_eq!(Sign::Hostile.coupling(), 1.0);
    }
}
