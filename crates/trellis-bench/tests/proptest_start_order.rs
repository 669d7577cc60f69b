//! Property-based invariants of start-order resolution.
//!
//! 1. Every module appears exactly once in the start order.
//! 2. Within the resolved layers, every dependency starts before its
//!    dependents.
//! 3. Acyclic graphs over known ids resolve completely.
//! 4. The unresolved tail keeps registration order.

use std::collections::HashMap;

use proptest::prelude::*;
use trellis_bench::{GraphNode, ModuleId, resolve};

fn name(i: usize) -> String {
    format!("m{i}")
}

/// Arbitrary graph: each node may depend on any id, including unknown ones
/// and itself.
fn graph_strategy() -> impl Strategy<Value = Vec<GraphNode>> {
    (1usize..=12).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(0usize..n + 2, 0..=3), n).prop_map(
            |deps| {
                deps.into_iter()
                    .enumerate()
                    .map(|(i, deps)| GraphNode::new(name(i), deps.into_iter().map(name)))
                    .collect()
            },
        )
    })
}

/// Acyclic graph: node `i` only depends on nodes registered before it, in
/// shuffled registration order.
fn dag_strategy() -> impl Strategy<Value = Vec<GraphNode>> {
    (1usize..=12)
        .prop_flat_map(|n| {
            let deps = (0..n)
                .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(3)))
                .collect::<Vec<_>>();
            (deps, Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        })
        .prop_map(|(deps, order)| {
            order
                .into_iter()
                .map(|i| {
                    let edges = deps[i].iter().copied().filter(|&d| d < i).map(name);
                    GraphNode::new(name(i), edges)
                })
                .collect()
        })
}

proptest! {
    #[test]
    fn order_is_a_permutation(nodes in graph_strategy()) {
        let order = resolve(&nodes).order();
        let mut got: Vec<ModuleId> = order.clone();
        let mut want: Vec<ModuleId> = nodes.iter().map(|n| n.id.clone()).collect();
        got.sort();
        want.sort();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn layered_dependencies_start_first(nodes in graph_strategy()) {
        let resolution = resolve(&nodes);
        let position: HashMap<&ModuleId, usize> = resolution
            .layers
            .iter()
            .enumerate()
            .flat_map(|(layer, ids)| ids.iter().map(move |id| (id, layer)))
            .collect();
        for node in &nodes {
            let Some(&layer) = position.get(&node.id) else { continue };
            for dep in &node.deps {
                let dep_layer = position.get(dep).copied();
                prop_assert!(
                    dep_layer.is_some_and(|d| d < layer),
                    "{} (layer {}) placed before its dependency {}",
                    node.id, layer, dep
                );
            }
        }
    }

    #[test]
    fn unresolved_tail_keeps_registration_order(nodes in graph_strategy()) {
        let resolution = resolve(&nodes);
        let registered: Vec<&ModuleId> = nodes
            .iter()
            .map(|n| &n.id)
            .filter(|id| resolution.unresolved.contains(*id))
            .collect();
        let tail: Vec<&ModuleId> = resolution.unresolved.iter().collect();
        prop_assert_eq!(tail, registered);
    }

    #[test]
    fn acyclic_graphs_resolve_completely(nodes in dag_strategy()) {
        let resolution = resolve(&nodes);
        prop_assert!(resolution.is_complete());
        prop_assert_eq!(resolution.len(), nodes.len());
    }
}
