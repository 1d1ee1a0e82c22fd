//! Graph module: node arena and link table.
//!
//! Nodes live in an arena indexed by [`NodeId`]; removed slots stay `None` so
//! ids are never reused. Links are kept in a flat table. Every input port is
//! fed by at most one link, and the destination node mirrors that link in its
//! input references.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::capture::CAPTURE_CAPACITY;
use crate::connector::Connector;
use crate::invariant_ppt::{
    assert_invariant, GRAPH_FAN_IN_UNIQUE, GRAPH_INPUT_REFS_CONSISTENT, GRAPH_REJECTS_INVALID,
};
use crate::node::{
    NodeKind, Param, SinkParams, MIC_GAIN_RANGE, SINE_FREQUENCY_RANGE, SINE_MAX_SAMPLES,
    SINK_MAX_RANGE,
};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Index of a port on a node (input and output ports are numbered separately).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub usize);

/// An output port on a specific node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    /// The producing node.
    pub node: NodeId,
    /// The output port index.
    pub port: PortId,
}

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// The source node ID.
    pub from_node: NodeId,
    /// The source output port.
    pub from_port: PortId,
    /// The destination node ID.
    pub to_node: NodeId,
    /// The destination input port.
    pub to_port: PortId,
}

/// Link query; `None` fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkFilter {
    /// Source node.
    pub from_node: Option<NodeId>,
    /// Source output port.
    pub from_port: Option<PortId>,
    /// Destination node.
    pub to_node: Option<NodeId>,
    /// Destination input port.
    pub to_port: Option<PortId>,
}

impl LinkFilter {
    /// Match every link.
    pub fn any() -> Self {
        Self::default()
    }

    /// Links leaving `node`.
    pub fn from(node: NodeId) -> Self {
        Self {
            from_node: Some(node),
            ..Self::default()
        }
    }

    /// Links leaving one output port.
    pub fn from_port(node: NodeId, port: PortId) -> Self {
        Self {
            from_node: Some(node),
            from_port: Some(port),
            ..Self::default()
        }
    }

    /// Links entering `node`.
    pub fn into(node: NodeId) -> Self {
        Self {
            to_node: Some(node),
            ..Self::default()
        }
    }

    /// Links entering one input port.
    pub fn into_port(node: NodeId, port: PortId) -> Self {
        Self {
            to_node: Some(node),
            to_port: Some(port),
            ..Self::default()
        }
    }

    /// Whether `link` satisfies this filter.
    pub fn matches(&self, link: &Link) -> bool {
        self.from_node.map_or(true, |n| n == link.from_node)
            && self.from_port.map_or(true, |p| p == link.from_port)
            && self.to_node.map_or(true, |n| n == link.to_node)
            && self.to_port.map_or(true, |p| p == link.to_port)
    }
}

/// A node in the graph.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// The unique ID of this node.
    pub id: NodeId,
    /// Kind and parameters.
    pub kind: NodeKind,
    inputs: Vec<Option<PortRef>>,
    outputs: Vec<Connector>,
}

impl NodeData {
    fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            inputs: vec![None; kind.input_port_count()],
            outputs: vec![Connector::new(); kind.output_port_count()],
        }
    }

    /// The producer feeding input `port`, if linked.
    pub fn input(&self, port: PortId) -> Option<PortRef> {
        self.inputs.get(port.0).copied().flatten()
    }

    /// All input references, one per input port.
    pub fn inputs(&self) -> &[Option<PortRef>] {
        &self.inputs
    }

    /// The connector behind output `port`.
    pub fn output(&self, port: PortId) -> Option<&Connector> {
        self.outputs.get(port.0)
    }

    /// All output connectors.
    pub fn outputs(&self) -> &[Connector] {
        &self.outputs
    }
}

/// Display data for a sink: its range and the clamped input samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkView {
    /// Lower display bound.
    pub min: f32,
    /// Upper display bound.
    pub max: f32,
    /// Input samples clamped into `[min, max]`; empty when unlinked.
    pub samples: Vec<f32>,
}

/// Errors returned by graph mutations and queries.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Node does not exist.
    InvalidNode,
    /// Port index out of range for the node's kind.
    InvalidPort,
    /// A link from a node to itself.
    SameNode,
    /// The link would close a cycle.
    CycleDetected,
    /// Microphone sample count larger than the capture block.
    CaptureOverrun {
        /// Requested sample count.
        requested: usize,
        /// Capture block capacity.
        capacity: usize,
    },
    /// Parameter does not belong to the node's kind.
    ParamMismatch,
    /// Parameter value is not acceptable.
    InvalidParam,
    /// The palette node cannot be removed.
    Protected,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::InvalidNode => write!(f, "invalid node"),
            GraphError::InvalidPort => write!(f, "invalid port"),
            GraphError::SameNode => write!(f, "cannot link a node to itself"),
            GraphError::CycleDetected => write!(f, "link would create a cycle"),
            GraphError::CaptureOverrun {
                requested,
                capacity,
            } => write!(
                f,
                "sample count {} exceeds capture capacity {}",
                requested, capacity
            ),
            GraphError::ParamMismatch => write!(f, "parameter does not apply to this node"),
            GraphError::InvalidParam => write!(f, "invalid parameter value"),
            GraphError::Protected => write!(f, "node cannot be removed"),
        }
    }
}

impl std::error::Error for GraphError {}

/// The signal graph: node arena plus link table.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Option<NodeData>>,
    links: Vec<Link>,
}

impl Graph {
    /// Id of the bootstrap palette node present in every graph.
    pub const PALETTE: NodeId = NodeId(0);

    /// Create a graph holding only the palette node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(NodeData::new(Self::PALETTE, NodeKind::Palette))],
            links: Vec::new(),
        }
    }

    /// Add a node. Parameters are brought into range; this never fails.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let kind = kind.normalized();
        self.nodes.push(Some(NodeData::new(id, kind)));
        debug!(node = id.0, kind = kind.display_name(), "node created");
        id
    }

    /// Look up a live node.
    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    /// Iterate over live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.nodes.iter().flatten()
    }

    /// Number of live nodes, palette included.
    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    /// One past the largest id ever handed out.
    pub fn id_bound(&self) -> usize {
        self.nodes.len()
    }

    /// The whole link table.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Linear scan for links matching `filter`.
    pub fn find_links(&self, filter: LinkFilter) -> impl Iterator<Item = &Link> + '_ {
        self.links.iter().filter(move |l| filter.matches(l))
    }

    /// Link `from.from_port` to `to.to_port`, replacing any link already
    /// feeding that input port.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_port: PortId,
        to: NodeId,
        to_port: PortId,
    ) -> Result<(), GraphError> {
        let src = self.node(from).ok_or(GraphError::InvalidNode)?;
        let dst = self.node(to).ok_or(GraphError::InvalidNode)?;
        if from_port.0 >= src.kind.output_port_count() || to_port.0 >= dst.kind.input_port_count()
        {
            return Err(GraphError::InvalidPort);
        }
        if from == to {
            return Err(GraphError::SameNode);
        }
        if self.would_create_cycle(from, to) {
            assert_invariant(
                GRAPH_REJECTS_INVALID,
                self.would_create_cycle(from, to),
                "Cycle detected, rejecting",
                Some("connect"),
            );
            debug!(from = from.0, to = to.0, "link rejected: cycle");
            return Err(GraphError::CycleDetected);
        }

        self.remove_links(LinkFilter::into_port(to, to_port));
        self.links.push(Link {
            from_node: from,
            from_port,
            to_node: to,
            to_port,
        });
        if let Some(dst) = self.node_mut(to) {
            dst.inputs[to_port.0] = Some(PortRef {
                node: from,
                port: from_port,
            });
        }
        debug!(
            from = from.0,
            from_port = from_port.0,
            to = to.0,
            to_port = to_port.0,
            "linked"
        );
        self.check_link_invariants("connect");
        Ok(())
    }

    /// Remove every link leaving `from.from_port`. Returns how many went away.
    pub fn disconnect(&mut self, from: NodeId, from_port: PortId) -> Result<usize, GraphError> {
        let node = self.node(from).ok_or(GraphError::InvalidNode)?;
        if from_port.0 >= node.kind.output_port_count() {
            return Err(GraphError::InvalidPort);
        }
        let removed = self.remove_links(LinkFilter::from_port(from, from_port));
        debug!(node = from.0, port = from_port.0, removed, "output disconnected");
        self.check_link_invariants("disconnect");
        Ok(removed)
    }

    /// Remove the link feeding `to.to_port`. Returns whether one existed.
    pub fn disconnect_at(&mut self, to: NodeId, to_port: PortId) -> Result<bool, GraphError> {
        let node = self.node(to).ok_or(GraphError::InvalidNode)?;
        if to_port.0 >= node.kind.input_port_count() {
            return Err(GraphError::InvalidPort);
        }
        let removed = self.remove_links(LinkFilter::into_port(to, to_port));
        debug!(node = to.0, port = to_port.0, removed, "input disconnected");
        self.check_link_invariants("disconnect_at");
        Ok(removed > 0)
    }

    /// Remove a node, its connectors and every link touching it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        if id == Self::PALETTE {
            return Err(GraphError::Protected);
        }
        if self.node(id).is_none() {
            return Err(GraphError::InvalidNode);
        }
        self.remove_links(LinkFilter::from(id));
        self.remove_links(LinkFilter::into(id));
        self.nodes[id.0] = None;
        debug!(node = id.0, "node deleted");
        self.check_link_invariants("delete_node");
        Ok(())
    }

    /// Update one parameter. Validation happens before anything changes.
    pub fn set_param(&mut self, id: NodeId, param: Param) -> Result<(), GraphError> {
        let node = self.node_mut(id).ok_or(GraphError::InvalidNode)?;
        let mut kind = node.kind;
        match (&mut kind, param) {
            (NodeKind::Sine(p), Param::FrequencyStep(v)) => {
                p.frequency_step = finite(v)?.clamp(SINE_FREQUENCY_RANGE.0, SINE_FREQUENCY_RANGE.1);
            }
            (NodeKind::Sine(p), Param::SampleCount(n)) => {
                p.sample_count = n.min(SINE_MAX_SAMPLES);
            }
            (NodeKind::Microphone(p), Param::SampleCount(n)) => {
                if n > CAPTURE_CAPACITY {
                    return Err(GraphError::CaptureOverrun {
                        requested: n,
                        capacity: CAPTURE_CAPACITY,
                    });
                }
                p.sample_count = n;
            }
            (NodeKind::Microphone(p), Param::Gain(v)) => {
                p.gain = finite(v)?.clamp(MIC_GAIN_RANGE.0, MIC_GAIN_RANGE.1);
            }
            (NodeKind::Sink(p), Param::DisplayMax(v)) => {
                let max = finite(v)?.clamp(SINK_MAX_RANGE.0, SINK_MAX_RANGE.1);
                *p = SinkParams { min: -max, max };
            }
            (NodeKind::Sink(p), Param::DisplayMin(v)) => {
                let min = finite(v)?;
                if min >= p.max {
                    return Err(GraphError::InvalidParam);
                }
                p.min = min;
            }
            _ => return Err(GraphError::ParamMismatch),
        }
        node.kind = kind;
        debug!(node = id.0, ?param, "parameter set");
        Ok(())
    }

    /// Read-only view of an output connector: the written samples and their count.
    pub fn read_output(&self, id: NodeId, port: PortId) -> Result<(&[f32], usize), GraphError> {
        let node = self.node(id).ok_or(GraphError::InvalidNode)?;
        let connector = node.output(port).ok_or(GraphError::InvalidPort)?;
        Ok((connector.as_slice(), connector.sample_count()))
    }

    /// The connector a sink is currently reading, if it is linked.
    pub fn sink_input(&self, sink: NodeId) -> Result<Option<&Connector>, GraphError> {
        let node = self.node(sink).ok_or(GraphError::InvalidNode)?;
        if !node.kind.is_sink() {
            return Err(GraphError::ParamMismatch);
        }
        Ok(node.input(PortId(0)).and_then(|r| self.connector(r)))
    }

    /// Clamped samples and range for rendering a sink.
    pub fn sink_view(&self, sink: NodeId) -> Result<SinkView, GraphError> {
        let range = match self.node(sink).map(|n| n.kind) {
            Some(NodeKind::Sink(p)) => p,
            Some(_) => return Err(GraphError::ParamMismatch),
            None => return Err(GraphError::InvalidNode),
        };
        let samples = self
            .sink_input(sink)?
            .map(|c| c.as_slice().iter().map(|&s| range.clamp(s)).collect())
            .unwrap_or_default();
        Ok(SinkView {
            min: range.min,
            max: range.max,
            samples,
        })
    }

    /// Resolve an output reference to its connector.
    pub fn connector(&self, port: PortRef) -> Option<&Connector> {
        self.node(port.node).and_then(|n| n.output(port.port))
    }

    /// Move a node's connectors out so it can be computed while its inputs
    /// are borrowed from the rest of the arena.
    pub(crate) fn take_outputs(&mut self, id: NodeId) -> Vec<Connector> {
        self.node_mut(id)
            .map(|n| std::mem::take(&mut n.outputs))
            .unwrap_or_default()
    }

    pub(crate) fn restore_outputs(&mut self, id: NodeId, outputs: Vec<Connector>) {
        if let Some(node) = self.node_mut(id) {
            node.outputs = outputs;
        }
    }

    /// Insert a link without any validation.
    #[cfg(test)]
    pub(crate) fn force_link(&mut self, link: Link) {
        self.links.push(link);
        if let Some(dst) = self.node_mut(link.to_node) {
            dst.inputs[link.to_port.0] = Some(PortRef {
                node: link.from_node,
                port: link.from_port,
            });
        }
    }

    /// Drop matching links and sever the destinations' input references.
    fn remove_links(&mut self, filter: LinkFilter) -> usize {
        let before = self.links.len();
        let mut severed = Vec::new();
        self.links.retain(|l| {
            let hit = filter.matches(l);
            if hit {
                severed.push((l.to_node, l.to_port));
            }
            !hit
        });
        for (node, port) in severed {
            if let Some(dst) = self.node_mut(node) {
                dst.inputs[port.0] = None;
            }
        }
        before - self.links.len()
    }

    fn would_create_cycle(&self, from: NodeId, to: NodeId) -> bool {
        // Adding from -> to closes a cycle iff `to` already reaches `from`.
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![to];
        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            if std::mem::replace(&mut visited[current.0], true) {
                continue;
            }
            stack.extend(self.find_links(LinkFilter::from(current)).map(|l| l.to_node));
        }
        false
    }

    fn check_link_invariants(&self, context: &str) {
        let mut feeding: HashMap<(NodeId, PortId), (PortRef, usize)> =
            HashMap::with_capacity(self.links.len());
        for l in &self.links {
            let source = PortRef {
                node: l.from_node,
                port: l.from_port,
            };
            feeding.entry((l.to_node, l.to_port)).or_insert((source, 0)).1 += 1;
        }
        assert_invariant(
            GRAPH_FAN_IN_UNIQUE,
            feeding.values().all(|&(_, count)| count == 1),
            "Input port fed by more than one link",
            Some(context),
        );

        let refs_consistent = self.nodes().all(|n| {
            n.inputs.iter().enumerate().all(|(port, input)| {
                feeding.get(&(n.id, PortId(port))).map(|&(source, _)| source) == *input
            })
        });
        assert_invariant(
            GRAPH_INPUT_REFS_CONSISTENT,
            refs_consistent,
            "Input references disagree with link table",
            Some(context),
        );
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

fn finite(v: f32) -> Result<f32, GraphError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(GraphError::InvalidParam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MicParams;
    use proptest::prelude::*;

    #[test]
    fn graph_starts_with_palette() {
        let graph = Graph::new();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node(Graph::PALETTE).unwrap().kind, NodeKind::Palette);
    }

    #[test]
    fn graph_cycle_detection() {
        let mut graph = Graph::new();
        let a = graph.create_node(NodeKind::Tee);
        let b = graph.create_node(NodeKind::Tee);
        graph.connect(a, PortId(0), b, PortId(0)).unwrap();
        assert_eq!(
            graph.connect(b, PortId(0), a, PortId(0)),
            Err(GraphError::CycleDetected)
        );
        assert_eq!(graph.links().len(), 1);
    }

    #[test]
    fn graph_self_link_rejected() {
        let mut graph = Graph::new();
        let tee = graph.create_node(NodeKind::Tee);
        assert_eq!(
            graph.connect(tee, PortId(0), tee, PortId(0)),
            Err(GraphError::SameNode)
        );
    }

    #[test]
    fn palette_is_protected() {
        let mut graph = Graph::new();
        assert_eq!(graph.delete_node(Graph::PALETTE), Err(GraphError::Protected));
    }

    #[test]
    fn mic_sample_count_over_capacity_rejected() {
        let mut graph = Graph::new();
        let mic = graph.create_node(NodeKind::microphone());
        let err = graph
            .set_param(mic, Param::SampleCount(CAPTURE_CAPACITY + 1))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::CaptureOverrun {
                requested: CAPTURE_CAPACITY + 1,
                capacity: CAPTURE_CAPACITY
            }
        );
        assert_eq!(
            graph.node(mic).unwrap().kind,
            NodeKind::Microphone(MicParams::default())
        );
    }

    #[test]
    fn param_must_match_kind() {
        let mut graph = Graph::new();
        let tee = graph.create_node(NodeKind::Tee);
        assert_eq!(
            graph.set_param(tee, Param::Gain(2.0)),
            Err(GraphError::ParamMismatch)
        );
    }

    #[test]
    fn display_max_keeps_range_symmetric() {
        let mut graph = Graph::new();
        let sink = graph.create_node(NodeKind::sink());
        graph.set_param(sink, Param::DisplayMax(4.0)).unwrap();
        assert_eq!(
            graph.node(sink).unwrap().kind,
            NodeKind::Sink(SinkParams { min: -4.0, max: 4.0 })
        );
        assert_eq!(
            graph.set_param(sink, Param::DisplayMin(5.0)),
            Err(GraphError::InvalidParam)
        );
    }

    proptest! {
        #[test]
        fn nan_params_rejected(step in prop::num::f32::ANY) {
            let mut graph = Graph::new();
            let sine = graph.create_node(NodeKind::sine());
            let result = graph.set_param(sine, Param::FrequencyStep(step));
            prop_assert_eq!(result.is_ok(), step.is_finite());
        }
    }
}
