//! Evaluation engine: one demand-driven pass over the graph per frame.
//!
//! Every link that ends in a sink seeds a post-order depth-first walk
//! upstream. A per-node marker makes each producer compute at most once per
//! frame, before any consumer reads it, and doubles as the cycle guard.
//! Nodes with no path to a sink are never touched.

use crate::capture::{CaptureBlock, CAPTURE_CAPACITY};
use crate::connector::Connector;
use crate::graph::{Graph, NodeId, PortRef};
use crate::invariant_ppt::{
    assert_invariant, CAPTURE_IN_BOUNDS, CONNECTOR_WITHIN_CAPACITY, EVAL_ONCE_PER_FRAME,
    PRODUCER_BEFORE_CONSUMER,
};
use crate::node::{NodeKind, MAX_INPUT_PORTS};
use crate::stage::{self, Scratch, StageContext};
use std::fmt;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Errors raised while evaluating a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The walk re-entered a node that was still being evaluated.
    CycleDetected {
        /// The node reached twice on one path.
        node: NodeId,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::CycleDetected { node } => {
                write!(f, "cycle detected at node {}", node.0)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Summary of one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Index of the frame just evaluated, starting at zero.
    pub frame: u64,
    /// Nodes whose stage ran.
    pub evaluated: usize,
    /// Links into sinks that seeded the pass.
    pub seeds: usize,
}

/// Frame evaluator. Holds only per-frame bookkeeping and scratch space; all
/// graph state lives in the [`Graph`] passed to [`Engine::advance_frame`].
#[derive(Debug)]
pub struct Engine {
    marks: Vec<Mark>,
    evaluations: Vec<u32>,
    order: Vec<NodeId>,
    seeds: Vec<NodeId>,
    scratch: Scratch,
    frame: u64,
}

impl Engine {
    /// Create an idle engine.
    pub fn new() -> Self {
        Self {
            marks: Vec::new(),
            evaluations: Vec::new(),
            order: Vec::new(),
            seeds: Vec::new(),
            scratch: Scratch::default(),
            frame: 0,
        }
    }

    /// Number of frames evaluated so far.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    /// How many times `node` was computed in the last frame.
    pub fn evaluations(&self, node: NodeId) -> u32 {
        self.evaluations.get(node.0).copied().unwrap_or(0)
    }

    /// Nodes in the order they were computed in the last frame.
    pub fn evaluation_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Run one evaluation pass.
    pub fn advance_frame(
        &mut self,
        graph: &mut Graph,
        capture: &CaptureBlock,
    ) -> Result<FrameReport, EngineError> {
        let bound = graph.id_bound();
        self.marks.clear();
        self.marks.resize(bound, Mark::Unvisited);
        self.evaluations.clear();
        self.evaluations.resize(bound, 0);
        self.order.clear();
        self.seeds.clear();

        self.seeds.extend(
            graph
                .links()
                .iter()
                .filter(|l| graph.node(l.to_node).map_or(false, |n| n.kind.is_sink()))
                .map(|l| l.from_node),
        );
        for i in 0..self.seeds.len() {
            let seed = self.seeds[i];
            self.evaluate(graph, capture, seed)?;
        }

        assert_invariant(
            EVAL_ONCE_PER_FRAME,
            self.evaluations.iter().all(|&n| n <= 1),
            "Node computed more than once in a frame",
            Some("advance_frame"),
        );

        let report = FrameReport {
            frame: self.frame,
            evaluated: self.order.len(),
            seeds: self.seeds.len(),
        };
        self.frame += 1;
        trace!(
            frame = report.frame,
            evaluated = report.evaluated,
            seeds = report.seeds,
            "frame evaluated"
        );
        Ok(report)
    }

    fn evaluate(
        &mut self,
        graph: &mut Graph,
        capture: &CaptureBlock,
        id: NodeId,
    ) -> Result<(), EngineError> {
        match self.marks.get(id.0) {
            Some(Mark::Done) | None => return Ok(()),
            Some(Mark::InProgress) => {
                warn!(node = id.0, "cycle reached during evaluation");
                return Err(EngineError::CycleDetected { node: id });
            }
            Some(Mark::Unvisited) => {}
        }
        // Input references mirror the link table, so they name the producers.
        let mut slots: [Option<PortRef>; MAX_INPUT_PORTS] = [None; MAX_INPUT_PORTS];
        let kind = match graph.node(id) {
            Some(node) => {
                for (slot, input) in slots.iter_mut().zip(node.inputs()) {
                    *slot = *input;
                }
                node.kind
            }
            None => return Ok(()),
        };
        let producers = &slots[..kind.input_port_count().min(MAX_INPUT_PORTS)];
        self.marks[id.0] = Mark::InProgress;

        for producer in producers.iter().flatten() {
            self.evaluate(graph, capture, producer.node)?;
        }

        assert_invariant(
            PRODUCER_BEFORE_CONSUMER,
            producers
                .iter()
                .flatten()
                .all(|p| self.marks[p.node.0] == Mark::Done),
            "Consumer computed before its producer",
            Some("evaluate"),
        );
        if let NodeKind::Microphone(p) = kind {
            assert_invariant(
                CAPTURE_IN_BOUNDS,
                p.sample_count <= CAPTURE_CAPACITY,
                "Microphone reads past the capture block",
                Some("evaluate"),
            );
        }

        let mut outputs = graph.take_outputs(id);
        {
            let mut inputs: [Option<&Connector>; MAX_INPUT_PORTS] = [None; MAX_INPUT_PORTS];
            for (input, producer) in inputs.iter_mut().zip(producers) {
                *input = producer.and_then(|r| graph.connector(r));
            }
            let mut ctx = StageContext {
                capture,
                scratch: &mut self.scratch,
            };
            stage::process(&kind, &inputs[..producers.len()], &mut outputs, &mut ctx);
        }
        assert_invariant(
            CONNECTOR_WITHIN_CAPACITY,
            outputs.iter().all(|c| c.sample_count() <= c.capacity()),
            "Connector length exceeds its capacity",
            Some("evaluate"),
        );
        graph.restore_outputs(id, outputs);

        self.marks[id.0] = Mark::Done;
        self.evaluations[id.0] += 1;
        self.order.push(id);
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::empty_block;
    use crate::graph::{Link, PortId};
    use crate::node::MicParams;

    #[test]
    fn empty_graph_evaluates_nothing() {
        let mut graph = Graph::new();
        let mut engine = Engine::new();
        let report = engine.advance_frame(&mut graph, &empty_block()).unwrap();
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.seeds, 0);
        assert_eq!(engine.frames(), 1);
    }

    #[test]
    fn unreachable_node_not_evaluated() {
        let mut graph = Graph::new();
        let sine = graph.create_node(NodeKind::sine());
        let mut engine = Engine::new();
        engine.advance_frame(&mut graph, &empty_block()).unwrap();
        assert_eq!(engine.evaluations(sine), 0);
        assert_eq!(graph.read_output(sine, PortId(0)).unwrap().1, 0);
    }

    #[test]
    fn cycle_reached_at_evaluation_is_an_error() {
        let mut graph = Graph::new();
        let a = graph.create_node(NodeKind::Tee);
        let b = graph.create_node(NodeKind::Tee);
        let sink = graph.create_node(NodeKind::sink());
        graph.connect(a, PortId(0), b, PortId(0)).unwrap();
        graph.connect(b, PortId(1), sink, PortId(0)).unwrap();
        // connect() refuses cycles, so plant one behind its back.
        graph.force_link(Link {
            from_node: b,
            from_port: PortId(0),
            to_node: a,
            to_port: PortId(0),
        });
        let mut engine = Engine::new();
        let err = engine.advance_frame(&mut graph, &empty_block()).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { .. }));
    }

    #[test]
    fn microphone_reads_the_callers_block_each_frame() {
        let mut graph = Graph::new();
        let mic = graph.create_node(NodeKind::Microphone(MicParams {
            gain: 1.0,
            sample_count: 8,
        }));
        let sink = graph.create_node(NodeKind::sink());
        graph.connect(mic, PortId(0), sink, PortId(0)).unwrap();

        let mut engine = Engine::new();
        let mut block = empty_block();
        block[7] = 0.75;
        engine.advance_frame(&mut graph, &block).unwrap();
        assert_eq!(graph.read_output(mic, PortId(0)).unwrap().0[7], 0.75);

        block[7] = -0.25;
        engine.advance_frame(&mut graph, &block).unwrap();
        assert_eq!(graph.read_output(mic, PortId(0)).unwrap().0[7], -0.25);
    }

    #[test]
    fn seeds_recounted_every_frame() {
        let mut graph = Graph::new();
        let sine = graph.create_node(NodeKind::sine());
        let a = graph.create_node(NodeKind::sink());
        let b = graph.create_node(NodeKind::sink());
        graph.connect(sine, PortId(0), a, PortId(0)).unwrap();
        graph.connect(sine, PortId(0), b, PortId(0)).unwrap();

        let mut engine = Engine::new();
        assert_eq!(engine.advance_frame(&mut graph, &empty_block()).unwrap().seeds, 2);
        graph.disconnect_at(b, PortId(0)).unwrap();
        let report = engine.advance_frame(&mut graph, &empty_block()).unwrap();
        assert_eq!(report.seeds, 1);
        assert_eq!(report.evaluated, 1);
    }
}
