use std::ops::RangeInclusive;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::algorithms::{solve, SolveMode, SolverConfig};
use crate::formulate::formulate;
use crate::graph::{Sign, SignedGraph};
use crate::imbalance::{frustration_ratio, SolutionResult};
use crate::Error;

/// Metadata of a group, kept next to the graph rather than inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    /// Map (region) the group was recorded on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,

    /// Any other field of the source record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Metadata of a relationship between two groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    /// Year of the event that established the relationship.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_year: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Key of the side map of edge attributes: the two endpoints in lexical order.
pub fn edge_key(u: &str, v: &str) -> (String, String) {
    if u <= v {
        (u.to_string(), v.to_string())
    } else {
        (v.to_string(), u.to_string())
    }
}

/// A signed network of named groups together with the metadata of its nodes and edges.
#[derive(Debug, Clone, Default)]
pub struct SignedNetwork {
    pub graph: SignedGraph<String>,
    pub node_attributes: FxHashMap<String, NodeAttributes>,
    pub edge_attributes: FxHashMap<(String, String), EdgeAttributes>,
}

/// Structural imbalance of a network restricted to the events up to a year.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow {
    pub year: i64,
    pub groups: usize,
    pub edges: usize,
    pub imbalanced_edges: usize,
    /// Share of imbalanced edges, `None` when there are no edges.
    pub structural_imbalance: Option<f64>,
    /// `None` when the network was empty that year and nothing was solved.
    pub mode: Option<SolveMode>,

    /// The subarea's share of the network under the same assignment, when the timeline
    /// was asked for one.
    pub subarea: Option<SubareaRow>,
}

/// The groups and edges of a subarea, judged by the assignment of the whole network.
#[derive(Debug, Clone, PartialEq)]
pub struct SubareaRow {
    pub groups: usize,
    pub edges: usize,
    pub imbalanced_edges: usize,
    /// Share of imbalanced edges, `None` when the subarea has no edges.
    pub structural_imbalance: Option<f64>,
}

impl SignedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: String, attributes: NodeAttributes) -> Result<(), Error> {
        self.graph.add_node(id.clone())?;
        self.node_attributes.insert(id, attributes);
        Ok(())
    }

    pub fn add_edge(&mut self, source: &String, target: &String, sign: Sign, attributes: EdgeAttributes) -> Result<(), Error> {
        self.graph.add_edge(source, target, sign)?;
        self.edge_attributes.insert(edge_key(source, target), attributes);
        Ok(())
    }

    pub fn node_attributes(&self, id: &str) -> Option<&NodeAttributes> {
        self.node_attributes.get(id)
    }

    pub fn edge_attributes(&self, u: &str, v: &str) -> Option<&EdgeAttributes> {
        self.edge_attributes.get(&edge_key(u, v))
    }

    /// The groups recorded on one of the given maps, with the edges among them.
    ///
    /// An empty list of regions keeps the whole network.
    pub fn in_regions<S: AsRef<str>>(&self, regions: &[S]) -> Result<SignedNetwork, Error> {
        if regions.is_empty() {
            return Ok(self.clone());
        }
        let members: Vec<&String> = self
            .graph
            .nodes_iter()
            .filter(|id| {
                self.node_attributes(id)
                    .and_then(|attributes| attributes.map.as_deref())
                    .is_some_and(|map| regions.iter().any(|region| region.as_ref() == map))
            })
            .collect();
        let graph = self.graph.subgraph_on(members)?;
        Ok(self.with_graph(graph))
    }

    /// The events in or before `year` and the groups involved in them.
    ///
    /// Edges without an event year are left out.
    pub fn up_to_year(&self, year: i64) -> SignedNetwork {
        let graph = self.graph.edge_subgraph(|_, edge| {
            self.edge_attributes(&edge.source, &edge.target)
                .and_then(|attributes| attributes.event_year)
                .is_some_and(|event_year| event_year <= year)
        });
        self.with_graph(graph)
    }

    /// The first and last event years, if any edge carries one.
    pub fn year_span(&self) -> Option<(i64, i64)> {
        let years = self.edge_attributes.values().filter_map(|attributes| attributes.event_year);
        years.fold(None, |span, year| match span {
            None => Some((year, year)),
            Some((first, last)) => Some((first.min(year), last.max(year))),
        })
    }

    /// Solve the network restricted to the events up to each year of `years`.
    ///
    /// With a non-empty `subarea` list of regions, each row also reports the groups and
    /// edges recorded on those maps, with their edges judged by the assignment of the
    /// whole network rather than by solving the subarea on its own.
    pub fn timeline<S: AsRef<str>>(
        &self,
        years: RangeInclusive<i64>,
        subarea: &[S],
        config: &SolverConfig,
    ) -> Result<Vec<TimelineRow>, Error> {
        let regional = if subarea.is_empty() { None } else { Some(self.in_regions(subarea)?) };

        let mut rows = Vec::new();
        for year in years {
            let network = self.up_to_year(year);
            let graph = &network.graph;
            let regional = regional.as_ref().map(|regional| regional.up_to_year(year));
            if graph.is_empty() {
                debug!(year, "no events up to this year");
                rows.push(TimelineRow {
                    year,
                    groups: 0,
                    edges: 0,
                    imbalanced_edges: 0,
                    structural_imbalance: None,
                    mode: None,
                    subarea: regional.map(|_| SubareaRow {
                        groups: 0,
                        edges: 0,
                        imbalanced_edges: 0,
                        structural_imbalance: None,
                    }),
                });
                continue;
            }

            let solution = solve(graph, &formulate(graph), config)?;
            let imbalanced_edges = solution.result.frustration_count;
            let subarea = regional.map(|regional| subarea_row(&regional, &solution.result));
            rows.push(TimelineRow {
                year,
                groups: graph.node_count(),
                edges: graph.edge_count(),
                imbalanced_edges,
                structural_imbalance: Some(frustration_ratio(imbalanced_edges, graph.edge_count())),
                mode: Some(solution.report.mode),
                subarea,
            });
        }
        Ok(rows)
    }

    fn with_graph(&self, graph: SignedGraph<String>) -> SignedNetwork {
        let node_attributes = graph
            .nodes_iter()
            .filter_map(|id| self.node_attributes.get(id).map(|attributes| (id.clone(), attributes.clone())))
            .collect();
        let edge_attributes = graph
            .edges()
            .into_iter()
            .filter_map(|edge| {
                let key = edge_key(&edge.source, &edge.target);
                self.edge_attributes.get(&key).map(|attributes| (key, attributes.clone()))
            })
            .collect();
        SignedNetwork {
            graph,
            node_attributes,
            edge_attributes,
        }
    }
}

fn subarea_row(regional: &SignedNetwork, result: &SolutionResult<String>) -> SubareaRow {
    let frustrated: FxHashSet<(String, String)> = result
        .frustrated_edges()
        .map(|edge| edge_key(&edge.source, &edge.target))
        .collect();
    let edges = regional.graph.edges();
    let imbalanced_edges = edges
        .iter()
        .filter(|edge| frustrated.contains(&edge_key(&edge.source, &edge.target)))
        .count();
    SubareaRow {
        groups: regional.graph.node_count(),
        edges: edges.len(),
        imbalanced_edges,
        structural_imbalance: (!edges.is_empty()).then(|| frustration_ratio(imbalanced_edges, edges.len())),
    }
}
