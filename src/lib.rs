//! Demand-driven signal graph engine.
//!
//! A [`graph::Graph`] holds generator, transform, tee and sink nodes joined by
//! links. Each frame the [`engine::Engine`] walks upstream from every sink,
//! computing each live node once and leaving the results in the nodes'
//! output connectors for a renderer to read.

pub mod capture;
pub mod connector;
pub mod control;
pub mod dsl;
pub mod engine;
pub mod fft;
pub mod graph;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod node;
pub mod session;
pub mod stage;

pub use capture::{CaptureBlock, CaptureSource, CAPTURE_CAPACITY};
pub use connector::Connector;
pub use engine::{Engine, EngineError, FrameReport};
pub use graph::{Graph, GraphError, Link, LinkFilter, NodeId, PortId, PortRef};
pub use node::{MicParams, NodeKind, Param, SineParams, SinkParams};
pub use session::Session;
