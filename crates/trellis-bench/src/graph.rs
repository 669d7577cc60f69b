#![forbid(unsafe_code)]

//! Start-order resolution over declared module dependencies.
//!
//! Resolution is iterative layering: each pass takes every remaining module
//! whose dependencies were all placed by earlier passes. When a pass finds
//! nothing ready (a cycle, or a dependency on an id nobody registered) the
//! remaining modules are appended in registration order as the unresolved
//! tail, and a warning is logged.

use ahash::AHashSet;
use tracing::warn;

use crate::module::ModuleId;

/// One module as the resolver sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: ModuleId,
    pub deps: Vec<ModuleId>,
}

impl GraphNode {
    #[must_use]
    pub fn new(id: impl Into<ModuleId>, deps: impl IntoIterator<Item = impl Into<ModuleId>>) -> Self {
        Self {
            id: id.into(),
            deps: deps.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Ready sets in start order; members of one layer keep registration
    /// order.
    pub layers: Vec<Vec<ModuleId>>,
    /// Modules that never became ready, in registration order.
    pub unresolved: Vec<ModuleId>,
}

impl Resolution {
    /// Full start order: every layer, then the unresolved tail.
    #[must_use]
    pub fn order(&self) -> Vec<ModuleId> {
        self.layers
            .iter()
            .flatten()
            .chain(&self.unresolved)
            .cloned()
            .collect()
    }

    /// Whether every module was placed by dependency order.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.iter().map(Vec::len).sum::<usize>() + self.unresolved.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn resolve(nodes: &[GraphNode]) -> Resolution {
    let mut placed: AHashSet<&ModuleId> = AHashSet::with_capacity(nodes.len());
    let mut remaining: Vec<&GraphNode> = nodes.iter().collect();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&GraphNode>, Vec<&GraphNode>) = remaining
            .into_iter()
            .partition(|node| node.deps.iter().all(|dep| placed.contains(dep)));
        remaining = blocked;
        if ready.is_empty() {
            break;
        }
        placed.extend(ready.iter().map(|&node| &node.id));
        layers.push(ready.into_iter().map(|node| node.id.clone()).collect());
    }

    let unresolved: Vec<ModuleId> = remaining.into_iter().map(|node| node.id.clone()).collect();
    if !unresolved.is_empty() {
        warn!(
            unresolved = ?unresolved,
            "dependencies could not be ordered; starting the rest in registration order"
        );
    }
    Resolution { layers, unresolved }
}
