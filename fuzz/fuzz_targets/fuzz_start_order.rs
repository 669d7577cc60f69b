#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use trellis_bench::{GraphNode, resolve};

#[derive(Debug, Arbitrary)]
struct Graph {
    nodes: Vec<Vec<u8>>,
}

fuzz_target!(|graph: Graph| {
    let nodes: Vec<GraphNode> = graph
        .nodes
        .iter()
        .enumerate()
        .take(64)
        .map(|(i, deps)| GraphNode::new(format!("m{i}"), deps.iter().map(|d| format!("m{d}"))))
        .collect();
    let resolution = resolve(&nodes);
    assert_eq!(resolution.len(), nodes.len());
});
