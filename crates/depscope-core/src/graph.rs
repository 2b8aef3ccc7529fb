//! Graph wrapper using petgraph::StableDiGraph keyed by unit id

use crate::model::*;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

/// The dependency graph, a directed multigraph of units with typed edges.
///
/// An edge `a -> b` means `a` depends on `b`. At most one edge exists per
/// (source, sink, kind); self-loops are dropped.
pub struct DependencyGraph {
    inner: StableDiGraph<Unit, DependencyKind>,
    index: HashMap<UnitId, NodeIndex>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("unit_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add a unit. Returns false if a unit with the same id already exists.
    pub fn add_unit(&mut self, unit: Unit) -> bool {
        if self.index.contains_key(&unit.id) {
            return false;
        }
        let id = unit.id.clone();
        let idx = self.inner.add_node(unit);
        self.index.insert(id, idx);
        true
    }

    /// Add a typed edge. Returns false for self-loops, unknown units and duplicates.
    pub fn add_edge(&mut self, source: &str, sink: &str, kind: DependencyKind) -> bool {
        if source == sink || self.has_edge(source, sink, kind) {
            return false;
        }
        let (Some(&from), Some(&to)) = (self.index.get(source), self.index.get(sink)) else {
            return false;
        };
        self.inner.add_edge(from, to, kind);
        true
    }

    /// Get a unit by id.
    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.index
            .get(id)
            .and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Total number of units.
    pub fn unit_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// All unit ids, sorted.
    pub fn unit_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.index.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Find the unit declaring a module.
    pub fn unit_for_module(&self, module: &str) -> Option<&Unit> {
        self.units().find(|u| u.declares(module))
    }

    /// Outgoing edges of a unit, sorted by (sink, kind).
    pub fn edges_from(&self, source: &str) -> Vec<DependencyLink> {
        self.links(source, Direction::Outgoing)
    }

    /// Incoming edges of a unit, sorted by (source, kind).
    pub fn edges_to(&self, sink: &str) -> Vec<DependencyLink> {
        self.links(sink, Direction::Incoming)
    }

    fn links(&self, id: &str, direction: Direction) -> Vec<DependencyLink> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut links: Vec<DependencyLink> = self
            .inner
            .edges_directed(idx, direction)
            .filter_map(|edge_ref| {
                let source = self.inner.node_weight(edge_ref.source())?;
                let sink = self.inner.node_weight(edge_ref.target())?;
                Some(DependencyLink::new(*edge_ref.weight(), source.id.clone(), sink.id.clone()))
            })
            .collect();
        links.sort_by(|a, b| {
            (&a.sink, &a.source, a.dependency_type).cmp(&(&b.sink, &b.source, b.dependency_type))
        });
        links
    }

    /// Check if an edge exists between two units with a specific kind.
    pub fn has_edge(&self, source: &str, sink: &str, kind: DependencyKind) -> bool {
        let (Some(&from), Some(&to)) = (self.index.get(source), self.index.get(sink)) else {
            return false;
        };
        self.inner
            .edges_directed(from, Direction::Outgoing)
            .any(|e| e.target() == to && *e.weight() == kind)
    }

    /// Per-unit view listing outgoing edges only, sorted by unit id.
    pub fn summarize(&self) -> Vec<UnitSummary> {
        self.unit_ids()
            .into_iter()
            .map(|id| UnitSummary {
                path: id.to_string(),
                outgoing_edges: self.edges_from(id),
            })
            .collect()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
