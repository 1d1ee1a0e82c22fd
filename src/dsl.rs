//! DSL module: builder API for graphs with named nodes.

use crate::graph::{Graph, GraphError, NodeId, PortId};
use crate::node::NodeKind;
use std::collections::HashMap;
use std::fmt;

/// Handle to a node in the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(pub NodeId);

/// The graph builder.
#[derive(Debug)]
pub struct GraphBuilder {
    graph: Graph,
    node_names: HashMap<String, NodeId>,
}

impl GraphBuilder {
    /// Create a new builder around a fresh graph.
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            node_names: HashMap::new(),
        }
    }

    /// Add an anonymous node.
    pub fn node(&mut self, kind: NodeKind) -> NodeHandle {
        NodeHandle(self.graph.create_node(kind))
    }

    /// Add a named node.
    pub fn node_named(&mut self, name: &str, kind: NodeKind) -> Result<NodeHandle, DslError> {
        if self.node_names.contains_key(name) {
            return Err(DslError::DuplicateName(name.to_string()));
        }
        let handle = self.node(kind);
        self.node_names.insert(name.to_string(), handle.0);
        Ok(handle)
    }

    /// Look up a named node.
    pub fn handle(&self, name: &str) -> Result<NodeHandle, DslError> {
        self.node_names
            .get(name)
            .map(|&id| NodeHandle(id))
            .ok_or_else(|| DslError::MissingNode(name.to_string()))
    }

    /// Connect two ports.
    pub fn connect(
        &mut self,
        from: NodeHandle,
        from_port: usize,
        to: NodeHandle,
        to_port: usize,
    ) -> Result<(), DslError> {
        self.graph
            .connect(from.0, PortId(from_port), to.0, PortId(to_port))
            .map_err(DslError::Graph)
    }

    /// Connect two named nodes.
    pub fn connect_named(
        &mut self,
        from: &str,
        from_port: usize,
        to: &str,
        to_port: usize,
    ) -> Result<(), DslError> {
        let from = self.handle(from)?;
        let to = self.handle(to)?;
        self.connect(from, from_port, to, to_port)
    }

    /// Build the graph.
    pub fn build(self) -> Graph {
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// DSL-specific errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DslError {
    Graph(GraphError),
    MissingNode(String),
    DuplicateName(String),
}

impl fmt::Display for DslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DslError::Graph(e) => write!(f, "{}", e),
            DslError::MissingNode(name) => write!(f, "no node named '{}'", name),
            DslError::DuplicateName(name) => write!(f, "node name '{}' already used", name),
        }
    }
}

impl std::error::Error for DslError {}
