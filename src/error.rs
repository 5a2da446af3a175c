//! Error type shared by every grid-transfer operation.

use thiserror::Error;

use crate::geometry::Axis;
use crate::grid::NodeId;

/// Failures raised to the immediate caller. Nothing here is retried.
///
/// Lonely target nodes are deliberately absent: they are an expected outcome
/// of a distance cutoff and are counted on the correspondence table instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    /// An argument fails a type/shape precondition.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("grid '{0}' already exists, use update_grid() instead")]
    DuplicateGrid(String),

    #[error("grid '{0}' is not registered")]
    UnknownGrid(String),

    #[error("node {0} already exists in this grid")]
    DuplicateNode(NodeId),

    #[error("node {0} does not exist in this grid")]
    UnknownNode(NodeId),

    /// Axis-aligned bounds of the two grids do not intersect on `axis`.
    #[error(
        "grids '{source_grid}' and '{target_grid}' do not overlap along {axis}: \
         [{source_min}, {source_max}] vs [{target_min}, {target_max}]"
    )]
    NonOverlappingGrids {
        source_grid: String,
        target_grid: String,
        axis: Axis,
        source_min: f64,
        source_max: f64,
        target_min: f64,
        target_max: f64,
    },

    #[error("no correspondence built from '{source_grid}' to '{target_grid}'")]
    MissingCorrespondence {
        source_grid: String,
        target_grid: String,
    },

    /// The table exists but no longer matches the grids it is applied to.
    #[error("correspondence from '{source_grid}' to '{target_grid}' is stale: {reason}")]
    StaleCorrespondence {
        source_grid: String,
        target_grid: String,
        reason: String,
    },

    #[error("field '{0}' has never been assigned on any node")]
    UnknownField(String),

    #[error("field '{field}' was never assigned on {} node(s): {nodes:?}", .nodes.len())]
    IncompleteAssignment { field: String, nodes: Vec<NodeId> },
}

pub type Result<T> = std::result::Result<T, TransferError>;
