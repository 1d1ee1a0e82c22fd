//! Session: the frame loop that owns a graph and drives it.

use crate::capture::{empty_block, CaptureBlock, CaptureError, CaptureSource, Silence};
use crate::control::{drain_edits, new_edit_queue, EditOutcome, GraphEdit};
use crate::engine::{Engine, EngineError, FrameReport};
use crate::graph::{Graph, GraphError};
use rtrb::{Consumer, Producer};
use std::fmt;
use tracing::debug;

/// Errors from a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The capture source failed; no frame was evaluated.
    Capture(CaptureError),
    /// Evaluation failed.
    Engine(EngineError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Capture(e) => write!(f, "capture failed: {}", e),
            SessionError::Engine(e) => write!(f, "evaluation failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<CaptureError> for SessionError {
    fn from(e: CaptureError) -> Self {
        SessionError::Capture(e)
    }
}

impl From<EngineError> for SessionError {
    fn from(e: EngineError) -> Self {
        SessionError::Engine(e)
    }
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Results of the edits applied before evaluation, in queue order.
    pub edits: Vec<Result<EditOutcome, GraphError>>,
    /// The evaluation summary.
    pub report: FrameReport,
}

/// Owns the graph, the engine, a capture source and the receiving end of
/// the edit queue.
pub struct Session {
    graph: Graph,
    engine: Engine,
    source: Box<dyn CaptureSource>,
    block: Box<CaptureBlock>,
    edits: Consumer<GraphEdit>,
}

impl Session {
    /// Create a session around `source`. Returns the session and the edit
    /// producer to hand to the UI thread.
    pub fn new(source: Box<dyn CaptureSource>) -> (Self, Producer<GraphEdit>) {
        let (tx, rx) = new_edit_queue();
        let session = Self {
            graph: Graph::new(),
            engine: Engine::new(),
            source,
            block: empty_block(),
            edits: rx,
        };
        (session, tx)
    }

    /// A session that captures silence.
    pub fn silent() -> (Self, Producer<GraphEdit>) {
        Self::new(Box::new(Silence))
    }

    /// The graph, for rendering.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The graph, for synchronous edits between ticks.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// The engine, for per-frame statistics.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Apply queued edits, capture one block and evaluate one frame.
    pub fn tick(&mut self) -> Result<Tick, SessionError> {
        let edits = drain_edits(&mut self.edits, &mut self.graph);
        if !edits.is_empty() {
            debug!(count = edits.len(), "edits applied at frame boundary");
        }
        self.source.fill(&mut self.block)?;
        let report = self.engine.advance_frame(&mut self.graph, &self.block)?;
        Ok(Tick { edits, report })
    }
}
