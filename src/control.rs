//! Deferred graph edits.
//!
//! A UI thread can push [`GraphEdit`]s through a lock-free SPSC queue; the
//! frame loop drains and applies them only between frames, so an evaluation
//! pass never observes a half-applied topology change.
//!
//! All messages are `Copy` and self-contained, so pushing never allocates.

use crate::graph::{Graph, GraphError, NodeId, PortId};
use crate::node::{NodeKind, Param};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, warn};

/// Capacity for the edit queue.
/// Should absorb a burst of slider drags between two frames.
pub const EDIT_QUEUE_CAPACITY: usize = 256;

/// Creates a new edit queue pair.
///
/// Returns (producer for the UI thread, consumer for the frame loop).
pub fn new_edit_queue() -> (Producer<GraphEdit>, Consumer<GraphEdit>) {
    RingBuffer::new(EDIT_QUEUE_CAPACITY)
}

/// A graph mutation waiting for the next frame boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphEdit {
    /// Create a node.
    CreateNode(NodeKind),
    /// Delete a node and its links.
    DeleteNode(NodeId),
    /// Link an output port to an input port.
    Connect {
        from: NodeId,
        from_port: PortId,
        to: NodeId,
        to_port: PortId,
    },
    /// Remove every link leaving an output port.
    Disconnect { from: NodeId, from_port: PortId },
    /// Remove the link feeding an input port.
    DisconnectAt { to: NodeId, to_port: PortId },
    /// Change one node parameter.
    SetParam { node: NodeId, param: Param },
}

/// What an applied edit produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// A node was created with this id.
    Created(NodeId),
    /// Number of links removed.
    Removed(usize),
    /// The edit took effect.
    Applied,
}

impl GraphEdit {
    /// Apply this edit to `graph`.
    pub fn apply(self, graph: &mut Graph) -> Result<EditOutcome, GraphError> {
        match self {
            GraphEdit::CreateNode(kind) => Ok(EditOutcome::Created(graph.create_node(kind))),
            GraphEdit::DeleteNode(node) => graph.delete_node(node).map(|_| EditOutcome::Applied),
            GraphEdit::Connect {
                from,
                from_port,
                to,
                to_port,
            } => graph
                .connect(from, from_port, to, to_port)
                .map(|_| EditOutcome::Applied),
            GraphEdit::Disconnect { from, from_port } => graph
                .disconnect(from, from_port)
                .map(EditOutcome::Removed),
            GraphEdit::DisconnectAt { to, to_port } => graph
                .disconnect_at(to, to_port)
                .map(|removed| EditOutcome::Removed(removed as usize)),
            GraphEdit::SetParam { node, param } => graph
                .set_param(node, param)
                .map(|_| EditOutcome::Applied),
        }
    }
}

/// Apply every queued edit in FIFO order, collecting each result.
pub fn drain_edits(
    rx: &mut Consumer<GraphEdit>,
    graph: &mut Graph,
) -> Vec<Result<EditOutcome, GraphError>> {
    let mut results = Vec::new();
    while let Ok(edit) = rx.pop() {
        let result = edit.apply(graph);
        match &result {
            Ok(outcome) => debug!(?edit, ?outcome, "edit applied"),
            Err(err) => warn!(?edit, %err, "edit rejected"),
        }
        results.push(result);
    }
    results
}
