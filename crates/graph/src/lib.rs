mod node_graph;
mod operation;
pub mod ops;

pub use node_graph::{GraphNodeProducer, NodeGraph, NodeId};
pub use operation::{FormatRequirements, Operation, OperationContext};

use model::Rect;
use thiserror::Error;
use tiles::{BufferError, IteratorError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("operation `{operation}` needs an input buffer")]
    MissingInput { operation: &'static str },
    #[error("operation `{operation}` needs a bounded input")]
    UnboundedInput { operation: &'static str },
    #[error("shift amount {0} outside 1..=200")]
    InvalidShiftAmount(u32),
    #[error("checkerboard cell size must be at least one pixel")]
    InvalidCellSize,
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    Iterator(#[from] IteratorError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("node {0:?} is not part of the graph")]
    UnknownNode(NodeId),
    #[error("operation `{operation}` failed on {rect:?}")]
    Operation {
        operation: &'static str,
        rect: Rect,
        #[source]
        source: OperationError,
    },
    #[error(transparent)]
    Buffer(#[from] BufferError),
}
