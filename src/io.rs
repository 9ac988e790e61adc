use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use num_traits::ToPrimitive;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sprs::io::read_matrix_market;
use sprs::TriMat;
use tracing::debug;

use crate::algorithms::{SolveMode, Solution};
use crate::dataset::{EdgeAttributes, NodeAttributes, SignedNetwork, TimelineRow};
use crate::graph::{Sign, SignedGraph};
use crate::imbalance::SolutionResult;
use crate::Error;

/// Read a matrix market file as a signed graph.
///
/// Row and column indices (0-based) are the node ids. Every off-diagonal entry is an
/// edge whose value must be +1 (friendly) or -1 (hostile). An entry and its mirror
/// with the same value describe the same edge.
pub fn read_matrix_market_as_signed_graph(file_path: &Path) -> Result<SignedGraph<usize>, Error> {
    // read the matrix market file as a TriMat with the signs as values.
    let tri_matrix: TriMat<f64> = read_matrix_market(file_path)?;
    let (rows, cols) = tri_matrix.shape();

    let mut graph = SignedGraph::new();
    for id in 0..rows.max(cols) {
        graph.add_node(id)?;
    }

    // For each unordered pair: its sign and which orientations were already read.
    let mut seen: FxHashMap<(usize, usize), (Sign, [bool; 2])> = FxHashMap::default();
    let entries = tri_matrix.row_inds().iter().zip(tri_matrix.col_inds()).zip(tri_matrix.data());
    for ((&row, &col), &value) in entries {
        if row == col {
            return Err(Error::SelfLoop(row.to_string()));
        }
        let sign = Sign::try_from(value)?;
        let key = (row.min(col), row.max(col));
        let orientation = usize::from(row > col);

        match seen.get_mut(&key) {
            Some((known_sign, orientations)) => {
                if *known_sign != sign || orientations[orientation] {
                    return Err(Error::DuplicateEdge(row.to_string(), col.to_string()));
                }
                orientations[orientation] = true;
            }
            None => {
                graph.add_edge(&row, &col, sign)?;
                let mut orientations = [false; 2];
                orientations[orientation] = true;
                seen.insert(key, (sign, orientations));
            }
        }
    }

    debug!(nodes = graph.node_count(), edges = graph.edge_count(), "read matrix market graph");
    Ok(graph)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeId {
    Integer(i64),
    Text(String),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Integer(id) => write!(f, "{id}"),
            NodeId::Text(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: NodeId,
    #[serde(flatten)]
    attributes: NodeAttributes,
}

#[derive(Debug, Deserialize)]
struct LinkRecord {
    source: NodeId,
    target: NodeId,
    sign: f64,
    #[serde(flatten)]
    attributes: EdgeAttributes,
}

#[derive(Debug, Deserialize)]
struct NodeLinkData {
    nodes: Vec<NodeRecord>,
    links: Vec<LinkRecord>,
}

// Results of a query are wrapped as `{"results": [graph, ...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeLinkDocument {
    Wrapped { results: Vec<NodeLinkData> },
    Plain(NodeLinkData),
}

/// Parse node-link JSON (`{"nodes": [...], "links": [...]}`) into a signed network.
///
/// Node ids may be numbers or strings; both are keyed by their text, so `1` and `"1"`
/// name the same node and listing both is a `DuplicateNode` error.
///
/// Fields other than `id`, `source`, `target` and `sign` are kept as node and edge
/// metadata; annotations of a previous solve (`color`, `frustrated`) are dropped.
pub fn parse_node_link(json: &str) -> Result<SignedNetwork, Error> {
    let data = match serde_json::from_str::<NodeLinkDocument>(json)? {
        NodeLinkDocument::Plain(data) => data,
        NodeLinkDocument::Wrapped { results } => results.into_iter().next().ok_or(Error::EmptyGraph)?,
    };

    let mut network = SignedNetwork::new();
    for NodeRecord { id, mut attributes } in data.nodes {
        attributes.extra.remove("color");
        network.add_node(id.to_string(), attributes)?;
    }
    for LinkRecord { source, target, sign, mut attributes } in data.links {
        attributes.extra.remove("frustrated");
        let sign = Sign::try_from(sign)?;
        network.add_edge(&source.to_string(), &target.to_string(), sign, attributes)?;
    }

    debug!(
        nodes = network.graph.node_count(),
        edges = network.graph.edge_count(),
        "parsed node-link data"
    );
    Ok(network)
}

/// Read a node-link JSON file into a signed network.
pub fn read_node_link(file_path: &Path) -> Result<SignedNetwork, Error> {
    let json = std::fs::read_to_string(file_path)?;
    parse_node_link(&json)
}

#[derive(Debug, Serialize)]
struct AnnotatedNode<'a, N> {
    id: &'a N,
    color: usize,
    #[serde(flatten)]
    attributes: NodeAttributes,
}

#[derive(Debug, Serialize)]
struct AnnotatedLink<'a, N> {
    source: &'a N,
    target: &'a N,
    sign: i8,
    frustrated: bool,
    #[serde(flatten)]
    attributes: EdgeAttributes,
}

#[derive(Debug, Serialize)]
struct AnnotatedSample<'a, N> {
    nodes: Vec<AnnotatedNode<'a, N>>,
    links: Vec<AnnotatedLink<'a, N>>,
    frustration: usize,
    energy: f64,
    #[serde(rename = "numOfOccurrences")]
    num_of_occurrences: usize,
    #[serde(rename = "percentageOfOccurrences")]
    percentage_of_occurrences: f64,
}

#[derive(Debug, Serialize)]
struct AnnotatedGraph<'a, N> {
    directed: bool,
    multigraph: bool,
    nodes: Vec<AnnotatedNode<'a, N>>,
    links: Vec<AnnotatedLink<'a, N>>,
    frustration: usize,
    frustration_ratio: f64,
    energy: f64,
    mode: SolveMode,
    optimal: bool,
    results: Vec<AnnotatedSample<'a, N>>,
    #[serde(rename = "numberOfReads")]
    number_of_reads: usize,
}

fn annotate_elements<'a, N, FN, FE>(
    result: &'a SolutionResult<N>,
    node_attributes: &FN,
    edge_attributes: &FE,
) -> (Vec<AnnotatedNode<'a, N>>, Vec<AnnotatedLink<'a, N>>)
where
    FN: Fn(&N) -> NodeAttributes,
    FE: Fn(&N, &N) -> EdgeAttributes,
{
    let nodes = result
        .nodes
        .iter()
        .zip(&result.labels)
        .map(|(id, &color)| AnnotatedNode {
            id,
            color,
            attributes: node_attributes(id),
        })
        .collect();
    let links = result
        .edges
        .iter()
        .zip(&result.frustrated)
        .map(|(edge, &frustrated)| AnnotatedLink {
            source: &edge.source,
            target: &edge.target,
            sign: edge.sign.value(),
            frustrated,
            attributes: edge_attributes(&edge.source, &edge.target),
        })
        .collect();
    (nodes, links)
}

/// Node-link JSON of a solved graph: each node gets its `color` (side) and each link a
/// `frustrated` flag. `node_attributes` and `edge_attributes` supply the metadata
/// written next to them.
///
/// The top level describes the returned assignment. `results` lists every distinct
/// assignment the solver reached, lowest energy first, with how often it was reached;
/// `numberOfReads` is the total number of assignments drawn.
pub fn annotated_node_link<N, FN, FE>(
    solution: &Solution<N>,
    node_attributes: FN,
    edge_attributes: FE,
) -> Result<serde_json::Value, Error>
where
    N: Serialize,
    FN: Fn(&N) -> NodeAttributes,
    FE: Fn(&N, &N) -> EdgeAttributes,
{
    let number_of_reads = solution.number_of_reads();
    let results = solution
        .samples
        .iter()
        .map(|sample| {
            let (nodes, links) = annotate_elements(&sample.result, &node_attributes, &edge_attributes);
            AnnotatedSample {
                nodes,
                links,
                frustration: sample.result.frustration_count,
                energy: sample.energy,
                num_of_occurrences: sample.occurrences,
                percentage_of_occurrences: 100.0 * sample.occurrences.to_f64().unwrap_or(0.0)
                    / number_of_reads.to_f64().unwrap_or(1.0),
            }
        })
        .collect();

    let result = &solution.result;
    let (nodes, links) = annotate_elements(result, &node_attributes, &edge_attributes);
    let graph = AnnotatedGraph {
        directed: false,
        multigraph: false,
        nodes,
        links,
        frustration: result.frustration_count,
        frustration_ratio: result.frustration_ratio(),
        energy: solution.report.energy,
        mode: solution.report.mode,
        optimal: solution.is_optimal(),
        results,
        number_of_reads,
    };
    Ok(serde_json::to_value(graph)?)
}

/// Annotated node-link JSON of a solved network, with the network's metadata.
pub fn annotated_network(network: &SignedNetwork, solution: &Solution<String>) -> Result<serde_json::Value, Error> {
    annotated_node_link(
        solution,
        |id| network.node_attributes(id).cloned().unwrap_or_default(),
        |u, v| network.edge_attributes(u, v).cloned().unwrap_or_default(),
    )
}

#[derive(Debug, Serialize)]
struct PlainNode<'a, N> {
    id: &'a N,
}

#[derive(Debug, Serialize)]
struct PlainLink<'a, N> {
    source: &'a N,
    target: &'a N,
    sign: i8,
}

#[derive(Debug, Serialize)]
struct PlainGraph<'a, N> {
    directed: bool,
    multigraph: bool,
    nodes: Vec<PlainNode<'a, N>>,
    links: Vec<PlainLink<'a, N>>,
}

/// Node-link JSON of a signed graph, readable by [`parse_node_link`].
pub fn node_link<N>(graph: &SignedGraph<N>) -> Result<serde_json::Value, Error>
where
    N: Clone + Eq + std::hash::Hash + fmt::Display + Serialize,
{
    let nodes = graph.nodes_iter().map(|id| PlainNode { id }).collect();
    let links = graph
        .indexed_edges()
        .iter()
        .filter_map(|&(source, target, sign)| {
            Some(PlainLink {
                source: graph.node(source)?,
                target: graph.node(target)?,
                sign: sign.value(),
            })
        })
        .collect();
    Ok(serde_json::to_value(PlainGraph {
        directed: false,
        multigraph: false,
        nodes,
        links,
    })?)
}

/// Write a JSON value to a file.
pub fn write_json_to_file(value: &serde_json::Value, file_path: &Path) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(file_path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}

/// Write the side of every node to a file.
pub fn write_partition_data_to_file<N: fmt::Display>(solution: &Solution<N>, file_path: &Path) -> Result<(), Error> {
    let mut file = BufWriter::new(File::create(file_path)?);
    for (id, label) in solution.result.nodes.iter().zip(&solution.result.labels) {
        writeln!(file, "node {} => side {}", id, label)?;
    }
    Ok(())
}

fn ratio_cell(ratio: Option<f64>) -> String {
    match ratio {
        Some(ratio) => ratio.to_string(),
        None => "-".to_string(),
    }
}

/// Write the structural imbalance per year as CSV.
///
/// With a `subarea_name`, four more columns hold the subarea's groups, edges,
/// imbalanced edges and structural imbalance.
pub fn write_timeline_to_file(rows: &[TimelineRow], subarea_name: Option<&str>, file_path: &Path) -> Result<(), Error> {
    let mut file = BufWriter::new(File::create(file_path)?);
    write!(file, "year,total groups,total edges,imbalanced edges,structural imbalance")?;
    if let Some(name) = subarea_name {
        write!(file, ",{name} groups,{name} edges,{name} imbalanced edges,{name} structural imbalance")?;
    }
    writeln!(file)?;

    for row in rows {
        write!(
            file,
            "{},{},{},{},{}",
            row.year,
            row.groups,
            row.edges,
            row.imbalanced_edges,
            ratio_cell(row.structural_imbalance)
        )?;
        if let (Some(_), Some(subarea)) = (subarea_name, &row.subarea) {
            write!(
                file,
                ",{},{},{},{}",
                subarea.groups,
                subarea.edges,
                subarea.imbalanced_edges,
                ratio_cell(subarea.structural_imbalance)
            )?;
        }
        writeln!(file)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;
    use super::*;
    use crate::algorithms::{solve, SolverConfig, Strategy};
    use crate::formulate::formulate;

    fn create_mock_file(dir: &Path, filename: &str, content: &str) -> String {
        let file_path = dir.join(filename);
        let mut file = File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path.to_str().unwrap().to_string()
    }

    const SYRIA: &str = r#"{
        "directed": false,
        "nodes": [
            {"id": 1, "map": "Aleppo"},
            {"id": 523, "map": "Syria"},
            {"id": "ahrar", "map": "Syria", "founded": 2011}
        ],
        "links": [
            {"source": 1, "target": 523, "sign": 1, "event_year": 2013, "event_id": "1821"},
            {"source": 523, "target": "ahrar", "sign": -1, "event_year": 2014, "frustrated": true},
            {"source": "ahrar", "target": 1, "sign": 1}
        ]
    }"#;

    #[test]
    fn test_read_matrix_market_as_signed_graph() -> Result<(), std::io::Error> {
        // Arrange
        let temp_dir = tempdir()?;
        let content = "%%MatrixMarket matrix coordinate integer general\n%\n4 4 4\n1 2 1\n2 3 -1\n3 2 -1\n4 1 -1\n";
        let file_path = create_mock_file(temp_dir.path(), "signed.mtx", content);

        // Act
        let graph = read_matrix_market_as_signed_graph(Path::new(&file_path)).unwrap();

        // Assert
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.sign_between(&0, &1), Some(Sign::Friendly));
        assert_eq!(graph.sign_between(&2, &1), Some(Sign::Hostile));
        assert_eq!(graph.sign_between(&0, &3), Some(Sign::Hostile));

        Ok(())
    }

    #[test]
    fn test_read_matrix_market_rejects_bad_entries() -> Result<(), std::io::Error> {
        // Arrange
        let temp_dir = tempdir()?;
        let invalid_sign = create_mock_file(
            temp_dir.path(),
            "invalid_sign.mtx",
            "%%MatrixMarket matrix coordinate integer general\n3 3 1\n1 2 2\n",
        );
        let conflicting = create_mock_file(
            temp_dir.path(),
            "conflicting.mtx",
            "%%MatrixMarket matrix coordinate integer general\n3 3 2\n1 2 1\n2 1 -1\n",
        );
        let self_loop = create_mock_file(
            temp_dir.path(),
            "self_loop.mtx",
            "%%MatrixMarket matrix coordinate integer general\n3 3 1\n2 2 1\n",
        );

        // Act & Assert
        assert!(matches!(read_matrix_market_as_signed_graph(Path::new(&invalid_sign)), Err(Error::InvalidSign(_))));
        assert!(matches!(read_matrix_market_as_signed_graph(Path::new(&conflicting)), Err(Error::DuplicateEdge(_, _))));
        assert!(matches!(read_matrix_market_as_signed_graph(Path::new(&self_loop)), Err(Error::SelfLoop(_))));

        Ok(())
    }

    #[test]
    fn test_parse_node_link() {
        // Act
        let network = parse_node_link(SYRIA).unwrap();

        // Assert
        assert_eq!(network.graph.nodes(), vec!["1", "523", "ahrar"]);
        assert_eq!(network.graph.edge_count(), 3);
        assert_eq!(network.graph.sign_between(&"1".to_string(), &"523".to_string()), Some(Sign::Friendly));
        let founded = network.node_attributes("ahrar").and_then(|attributes| attributes.extra.get("founded"));
        assert_eq!(founded, Some(&serde_json::json!(2011)));
        let link = network.edge_attributes("523", "1").unwrap();
        assert_eq!(link.event_year, Some(2013));
        assert_eq!(link.extra.get("event_id"), Some(&serde_json::json!("1821")));
        assert!(network.edge_attributes("ahrar", "523").unwrap().extra.get("frustrated").is_none());
    }

    #[test]
    fn test_parse_node_link_errors() {
        let wrapped = r#"{"results": [{"nodes": [{"id": 1}], "links": []}]}"#;
        let bad_sign = r#"{"nodes": [{"id": 1}, {"id": 2}], "links": [{"source": 1, "target": 2, "sign": 0}]}"#;
        let unknown = r#"{"nodes": [{"id": 1}], "links": [{"source": 1, "target": 9, "sign": 1}]}"#;

        assert_eq!(parse_node_link(wrapped).unwrap().graph.node_count(), 1);
        assert!(matches!(parse_node_link(bad_sign), Err(Error::InvalidSign(_))));
        assert!(matches!(parse_node_link(unknown), Err(Error::UnknownNode(id)) if id == "9"));
        assert!(matches!(parse_node_link("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_parse_node_link_numeric_and_text_ids_are_one_node() {
        let mixed_nodes = r#"{"nodes": [{"id": 1}, {"id": "1"}], "links": []}"#;
        let mixed_link = r#"{"nodes": [{"id": 1}, {"id": "b"}], "links": [{"source": "1", "target": "b", "sign": -1}]}"#;

        assert!(matches!(parse_node_link(mixed_nodes), Err(Error::DuplicateNode(id)) if id == "1"));
        let network = parse_node_link(mixed_link).unwrap();
        assert_eq!(network.graph.sign_between(&"1".to_string(), &"b".to_string()), Some(Sign::Hostile));
    }

    #[test]
    fn test_node_link_is_readable() {
        // Arrange
        let mut graph = SignedGraph::new();
        for id in 0..3usize {
            graph.add_node(id).unwrap();
        }
        graph.add_edge(&2, &0, Sign::Hostile).unwrap();

        // Act
        let value = node_link(&graph).unwrap();
        let network = parse_node_link(&value.to_string()).unwrap();

        // Assert
        assert_eq!(value["links"][0]["source"], serde_json::json!(2));
        assert_eq!(network.graph.nodes(), vec!["0", "1", "2"]);
        assert_eq!(network.graph.sign_between(&"0".to_string(), &"2".to_string()), Some(Sign::Hostile));
    }

    #[test]
    fn test_annotated_network() {
        // Arrange
        let network = parse_node_link(SYRIA).unwrap();
        let solution = solve(&network.graph, &formulate(&network.graph), &SolverConfig::default()).unwrap();

        // Act
        let value = annotated_network(&network, &solution).unwrap();

        // Assert
        assert_eq!(value["frustration"], serde_json::json!(1));
        assert_eq!(value["mode"], serde_json::json!("exact"));
        assert_eq!(value["optimal"], serde_json::json!(true));
        assert_eq!(value["nodes"][0]["map"], serde_json::json!("Aleppo"));
        assert_eq!(value["nodes"][0]["color"], serde_json::json!(0));
        assert_eq!(value["links"][0]["event_id"], serde_json::json!("1821"));
        let frustrated_links = value["links"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|link| link["frustrated"] == serde_json::json!(true))
            .count();
        assert_eq!(frustrated_links, 1);
        assert_eq!(value["numberOfReads"], serde_json::json!(1));
        assert_eq!(value["results"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["results"][0]["numOfOccurrences"], serde_json::json!(1));
        assert_eq!(value["results"][0]["percentageOfOccurrences"], serde_json::json!(100.0));
        assert_eq!(value["results"][0]["nodes"], value["nodes"]);
    }

    #[test]
    fn test_annotated_node_link_lists_heuristic_samples() {
        // Arrange
        let mut graph = SignedGraph::new();
        for id in 0..3usize {
            graph.add_node(id).unwrap();
        }
        graph.add_edge(&0, &1, Sign::Hostile).unwrap();
        graph.add_edge(&1, &2, Sign::Hostile).unwrap();
        graph.add_edge(&2, &0, Sign::Hostile).unwrap();
        let config = SolverConfig { strategy: Strategy::Heuristic, seed: Some(6), ..Default::default() };
        let solution = solve(&graph, &formulate(&graph), &config).unwrap();

        // Act
        let value = annotated_node_link(&solution, |_| NodeAttributes::default(), |_, _| EdgeAttributes::default()).unwrap();

        // Assert
        let results = value["results"].as_array().unwrap();
        assert_eq!(value["numberOfReads"], serde_json::json!(50));
        assert_eq!(results.len(), solution.samples.len());
        let occurrences: u64 = results.iter().filter_map(|result| result["numOfOccurrences"].as_u64()).sum();
        assert_eq!(occurrences, 50);
        let percentages: f64 = results.iter().filter_map(|result| result["percentageOfOccurrences"].as_f64()).sum();
        assert!((percentages - 100.0).abs() < 1e-9);
        assert!(results.iter().all(|result| result["frustration"] == serde_json::json!(1)));
    }

    #[test]
    fn test_write_partition_and_timeline() -> Result<(), Box<dyn std::error::Error>> {
        // Arrange
        let temp_dir = tempdir()?;
        let network = parse_node_link(SYRIA)?;
        let solution = solve(&network.graph, &formulate(&network.graph), &SolverConfig::default())?;
        let rows = network.timeline(2012..=2014, &["Syria"], &SolverConfig::default())?;
        let partition_path = temp_dir.path().join("partition.txt");
        let timeline_path = temp_dir.path().join("timeline.csv");

        // Act
        write_partition_data_to_file(&solution, &partition_path)?;
        write_timeline_to_file(&rows, Some("Syria"), &timeline_path)?;

        // Assert
        let partition = std::fs::read_to_string(&partition_path)?;
        assert_eq!(partition.lines().count(), 3);
        assert!(partition.starts_with("node 1 => side 0"));
        let timeline = std::fs::read_to_string(&timeline_path)?;
        let lines: Vec<&str> = timeline.lines().collect();
        assert_eq!(
            lines[0],
            "year,total groups,total edges,imbalanced edges,structural imbalance,\
             Syria groups,Syria edges,Syria imbalanced edges,Syria structural imbalance"
        );
        assert_eq!(lines[1], "2012,0,0,0,-,0,0,0,-");
        assert_eq!(lines[2], "2013,2,1,0,0,0,0,0,-");
        assert_eq!(lines[3], "2014,3,2,0,0,2,1,0,0");

        Ok(())
    }
}
