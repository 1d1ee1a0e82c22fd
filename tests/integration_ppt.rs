//! Contract test: every invariant the graph and engine promise is actually
//! checked on a realistic workload. Kept as a single test because the
//! invariant log is process-wide.

use sigscope::capture::empty_block;
use sigscope::dsl::GraphBuilder;
use sigscope::engine::Engine;
use sigscope::graph::{GraphError, PortId};
use sigscope::invariant_ppt::{
    clear_invariant_log, contract_test, CAPTURE_IN_BOUNDS, CONNECTOR_WITHIN_CAPACITY,
    EVAL_ONCE_PER_FRAME, GRAPH_FAN_IN_UNIQUE, GRAPH_INPUT_REFS_CONSISTENT,
    GRAPH_REJECTS_INVALID, PRODUCER_BEFORE_CONSUMER,
};
use sigscope::node::NodeKind;

#[test]
fn all_invariants_enforced_on_scope_pipeline() {
    clear_invariant_log();

    // mic -> tee -> fft -> inverse -> plot, with the tee's second leg plotted raw.
    let mut builder = GraphBuilder::new();
    builder.node_named("mic", NodeKind::microphone()).unwrap();
    builder.node_named("tee", NodeKind::Tee).unwrap();
    builder.node_named("fft", NodeKind::Fft).unwrap();
    builder.node_named("inverse", NodeKind::InverseFft).unwrap();
    builder.node_named("plot", NodeKind::sink()).unwrap();
    builder.node_named("raw", NodeKind::sink()).unwrap();
    builder.connect_named("mic", 0, "tee", 0).unwrap();
    builder.connect_named("tee", 0, "fft", 0).unwrap();
    builder.connect_named("fft", 0, "inverse", 0).unwrap();
    builder.connect_named("fft", 1, "inverse", 1).unwrap();
    builder.connect_named("inverse", 0, "plot", 0).unwrap();
    builder.connect_named("tee", 1, "raw", 0).unwrap();
    let mic = builder.handle("mic").unwrap().0;
    let tee = builder.handle("tee").unwrap().0;
    let inverse = builder.handle("inverse").unwrap().0;
    let mut graph = builder.build();

    assert_eq!(
        graph.connect(inverse, PortId(0), mic, PortId(0)),
        Err(GraphError::InvalidPort)
    );
    assert_eq!(
        graph.connect(inverse, PortId(0), tee, PortId(0)),
        Err(GraphError::CycleDetected)
    );

    let mut block = empty_block();
    for (i, s) in block.iter_mut().enumerate() {
        *s = ((i % 32) as f32 / 16.0) - 1.0;
    }
    let mut engine = Engine::new();
    for _ in 0..3 {
        engine.advance_frame(&mut graph, &block).unwrap();
    }

    contract_test(
        "scope pipeline",
        &[
            GRAPH_FAN_IN_UNIQUE,
            GRAPH_INPUT_REFS_CONSISTENT,
            GRAPH_REJECTS_INVALID,
            EVAL_ONCE_PER_FRAME,
            PRODUCER_BEFORE_CONSUMER,
            CONNECTOR_WITHIN_CAPACITY,
            CAPTURE_IN_BOUNDS,
        ],
    );
}
