use std::sync::{Arc, PoisonError, RwLock};

use model::{AbyssPolicy, DEFAULT_TILE_EDGE, Rect};
use slotmap::SlotMap;
use tiles::{TiledBuffer, TiledBufferConfig};

use crate::{GraphError, Operation, OperationContext};

slotmap::new_key_type! {
    pub struct NodeId;
}

#[derive(Debug)]
struct Node {
    operation: Box<dyn Operation>,
    input: Option<NodeId>,
}

/// Operation nodes with at most one input each. A node's input must exist
/// when the node is added, so the graph is acyclic by construction.
#[derive(Debug)]
pub struct NodeGraph {
    nodes: SlotMap<NodeId, Node>,
    scratch_tile_edge: u32,
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::with_scratch_tile_edge(DEFAULT_TILE_EDGE)
    }

    /// Tile edge of the intermediate buffers inputs are rendered into.
    pub fn with_scratch_tile_edge(scratch_tile_edge: u32) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            scratch_tile_edge,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn add_source(&mut self, operation: impl Operation + 'static) -> NodeId {
        self.nodes.insert(Node {
            operation: Box::new(operation),
            input: None,
        })
    }

    pub fn add_filter(
        &mut self,
        operation: impl Operation + 'static,
        input: NodeId,
    ) -> Result<NodeId, GraphError> {
        self.node(input)?;
        Ok(self.nodes.insert(Node {
            operation: Box::new(operation),
            input: Some(input),
        }))
    }

    pub fn input(&self, node: NodeId) -> Result<Option<NodeId>, GraphError> {
        Ok(self.node(node)?.input)
    }

    pub fn operation(&self, node: NodeId) -> Result<&dyn Operation, GraphError> {
        Ok(self.node(node)?.operation.as_ref())
    }

    /// Replaces the operation of `node` and returns the area of `node` whose
    /// pixels may have changed: the union of the old and new bounding boxes.
    /// `None` means unbounded.
    pub fn set_operation(
        &mut self,
        node: NodeId,
        operation: impl Operation + 'static,
    ) -> Result<Option<Rect>, GraphError> {
        let before = self.bounding_box(node)?;
        let previous = std::mem::replace(&mut self.node_mut(node)?.operation, Box::new(operation));
        let after = self.bounding_box(node)?;
        log::debug!(
            "node {node:?} operation `{}` replaced by `{}`",
            previous.name(),
            self.node(node)?.operation.name()
        );
        Ok(before.zip(after).map(|(before, after)| before.union(&after)))
    }

    /// Area in which `node` can produce non-empty pixels; `None` is unbounded.
    pub fn bounding_box(&self, node: NodeId) -> Result<Option<Rect>, GraphError> {
        let entry = self.node(node)?;
        let input = match entry.input {
            Some(input) => self.bounding_box(input)?,
            None => None,
        };
        Ok(entry.operation.bounding_box(input))
    }

    /// Renders `rect` (level-0 units) of `node` at `level` into `output`.
    pub fn compute(
        &self,
        node: NodeId,
        rect: Rect,
        level: u8,
        output: &TiledBuffer,
    ) -> Result<(), GraphError> {
        let entry = self.node(node)?;
        let input_bounding_box = match entry.input {
            Some(input) => self.bounding_box(input)?,
            None => None,
        };
        let requirements = entry
            .operation
            .prepare(&OperationContext { input_bounding_box });

        let scratch = match (entry.input, requirements.input) {
            (Some(input), Some(format)) => {
                let region = entry.operation.input_region(rect);
                let scratch = TiledBuffer::new(
                    region,
                    TiledBufferConfig {
                        tile_edge: self.scratch_tile_edge,
                        format,
                        abyss: AbyssPolicy::Clear,
                    },
                )?;
                let needed = match input_bounding_box {
                    Some(bounds) => region.intersect(&bounds),
                    None => region,
                };
                if !needed.is_empty() {
                    self.compute(input, needed, level, &scratch)?;
                }
                Some(scratch)
            }
            _ => None,
        };

        log::trace!(
            "node {node:?} `{}` processing {rect:?} at level {level}",
            entry.operation.name()
        );
        entry
            .operation
            .process(scratch.as_ref(), output, rect, level)
            .map_err(|source| GraphError::Operation {
                operation: entry.operation.name(),
                rect,
                source,
            })
    }

    fn node(&self, node: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(node).ok_or(GraphError::UnknownNode(node))
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(node).ok_or(GraphError::UnknownNode(node))
    }
}

/// One node of a shared graph, seen as a source of pixels for a cache.
#[derive(Debug, Clone)]
pub struct GraphNodeProducer {
    graph: Arc<RwLock<NodeGraph>>,
    node: NodeId,
}

impl GraphNodeProducer {
    pub fn new(graph: Arc<RwLock<NodeGraph>>, node: NodeId) -> Self {
        Self { graph, node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn graph(&self) -> &Arc<RwLock<NodeGraph>> {
        &self.graph
    }

    pub fn bounding_box(&self) -> Result<Option<Rect>, GraphError> {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bounding_box(self.node)
    }

    pub fn compute(&self, rect: Rect, level: u8, output: &TiledBuffer) -> Result<(), GraphError> {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .compute(self.node, rect, level, output)
    }
}
