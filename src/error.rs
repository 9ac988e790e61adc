use thiserror::Error;

/// Errors raised while building signed graphs, solving them or reading/writing them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A node with this id is already part of the graph.
    #[error("node `{0}` is already present in the graph")]
    DuplicateNode(String),

    /// The node is not part of the graph.
    #[error("node `{0}` is not present in the graph")]
    UnknownNode(String),

    /// Both endpoints of an edge are the same node.
    #[error("edge from node `{0}` to itself is not allowed")]
    SelfLoop(String),

    /// The unordered pair already carries an edge.
    #[error("an edge between `{0}` and `{1}` already exists")]
    DuplicateEdge(String, String),

    /// The sign value is neither friendly (+1) nor hostile (-1).
    #[error("invalid sign `{0}`, expected +1 (friendly) or -1 (hostile)")]
    InvalidSign(String),

    /// There is nothing to solve.
    #[error("graph has no nodes to solve the problem on")]
    EmptyGraph,

    /// Input sets don't have matching lengths.
    #[error("input sets don't have the same length (expected {expected} items, got {actual})")]
    InputLenMismatch { expected: usize, actual: usize },

    /// An assignment contains a label other than 0 or 1.
    #[error("node index {index} has label {label}, expected 0 or 1")]
    InvalidLabel { index: usize, label: usize },

    /// The solver could not produce any assignment.
    #[error("no assignment found")]
    NotFound,

    /// A connected component is too large for exhaustive enumeration.
    #[error("exact search supports components of at most {limit} nodes, got {actual}")]
    ComponentTooLarge { limit: usize, actual: usize },

    /// The solver configuration cannot be used.
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not read matrix market file: {0}")]
    MatrixMarket(#[from] sprs::io::IoError),

    #[error("could not parse node-link data: {0}")]
    Json(#[from] serde_json::Error),
}
