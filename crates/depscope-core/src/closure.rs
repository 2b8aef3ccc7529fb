//! Recompile-dependency closure over the typed graph
//!
//! A path `v0 -> v1 -> ... -> vk` explains why `v0` recompiles when `vk`
//! changes. Only four edge-kind compositions qualify, each mapped to a
//! [`RecompileReason`]:
//!
//! | hops                 | reason                 |
//! |----------------------|------------------------|
//! | `Compile+`           | `Compile`              |
//! | `Exports Compile+`   | `ExportsThenCompile`   |
//! | `Exports`            | `Exports`              |
//! | `Compile+ Runtime+`  | `CompileThenRuntime`   |
//!
//! The search runs breadth-first over (unit, prefix state) pairs, so the
//! first path recorded for a pair is the shortest one, and expanding
//! neighbours in sorted order makes it the lexicographically smallest
//! among those. A shortest walk in that product can only repeat a unit when
//! it passes through its own target (for example `Exports` into a compile
//! cycle that returns to the target). Those targets are searched again with
//! the target made terminal, so every reported path is simple.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use rayon::prelude::*;
use tracing::debug;

use crate::graph::DependencyGraph;
use crate::model::{CausalPath, DependencyKind, DependencyLink, RecompileReason, RecompileSet, UnitId};

/// Hard ceiling on path length.
pub const DEFAULT_MAX_PATH_DEPTH: usize = 64;

/// Prefix automaton over edge kinds. Every state is also accepting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PathState {
    Compile,
    Exports,
    ExportsThenCompile,
    CompileThenRuntime,
}

impl PathState {
    fn start(kind: DependencyKind) -> Option<Self> {
        match kind {
            DependencyKind::Compile => Some(PathState::Compile),
            DependencyKind::Exports => Some(PathState::Exports),
            DependencyKind::Runtime => None,
        }
    }

    fn step(self, kind: DependencyKind) -> Option<Self> {
        use DependencyKind as K;
        match (self, kind) {
            (PathState::Compile, K::Compile) => Some(PathState::Compile),
            (PathState::Compile, K::Runtime) => Some(PathState::CompileThenRuntime),
            (PathState::Exports | PathState::ExportsThenCompile, K::Compile) => {
                Some(PathState::ExportsThenCompile)
            }
            (PathState::CompileThenRuntime, K::Runtime) => Some(PathState::CompileThenRuntime),
            _ => None,
        }
    }

    fn reason(self) -> RecompileReason {
        match self {
            PathState::Compile => RecompileReason::Compile,
            PathState::Exports => RecompileReason::Exports,
            PathState::ExportsThenCompile => RecompileReason::ExportsThenCompile,
            PathState::CompileThenRuntime => RecompileReason::CompileThenRuntime,
        }
    }
}

/// Sorted outgoing adjacency, borrowed from the graph.
struct Adjacency<'g> {
    out: HashMap<&'g str, Vec<(&'g str, DependencyKind)>>,
}

impl<'g> Adjacency<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        let mut out: HashMap<&'g str, Vec<(&'g str, DependencyKind)>> = HashMap::new();
        for unit in graph.units() {
            out.entry(unit.id.as_str()).or_default();
        }
        for unit in graph.units() {
            for link in graph.edges_from(&unit.id) {
                // Re-borrow the sink id from the graph so it lives as long as 'g.
                if let Some(sink) = graph.unit(&link.sink) {
                    out.entry(unit.id.as_str())
                        .or_default()
                        .push((sink.id.as_str(), link.dependency_type));
                }
            }
        }
        for neighbours in out.values_mut() {
            neighbours.sort_unstable();
        }
        Adjacency { out }
    }

    fn neighbours(&self, unit: &str) -> &[(&'g str, DependencyKind)] {
        self.out.get(unit).map_or(&[], Vec::as_slice)
    }
}

struct Visit<'g> {
    unit: &'g str,
    state: PathState,
    kind: DependencyKind,
    parent: Option<usize>,
    depth: usize,
}

/// Recompile dependencies of `vertex`, bounded by [`DEFAULT_MAX_PATH_DEPTH`].
pub fn recompile_dependencies(graph: &DependencyGraph, vertex: &str) -> RecompileSet {
    recompile_dependencies_bounded(graph, vertex, DEFAULT_MAX_PATH_DEPTH)
}

/// Recompile dependencies of `vertex` with paths no longer than `max_depth` hops.
///
/// Unknown vertices yield an empty set.
pub fn recompile_dependencies_bounded(
    graph: &DependencyGraph,
    vertex: &str,
    max_depth: usize,
) -> RecompileSet {
    let adjacency = Adjacency::new(graph);
    closure_of(&adjacency, vertex, max_depth)
}

/// Closure of every vertex, computed in parallel.
pub fn recompile_all(graph: &DependencyGraph, max_depth: usize) -> BTreeMap<UnitId, RecompileSet> {
    let adjacency = Adjacency::new(graph);
    let ids = graph.unit_ids();
    let result: BTreeMap<UnitId, RecompileSet> = ids
        .par_iter()
        .map(|id| (id.to_string(), closure_of(&adjacency, id, max_depth)))
        .collect();
    debug!(
        "Computed recompile closures for {} units ({} entries)",
        result.len(),
        result.values().map(RecompileSet::len).sum::<usize>()
    );
    result
}

fn closure_of(adjacency: &Adjacency<'_>, vertex: &str, max_depth: usize) -> RecompileSet {
    let mut set = RecompileSet::new();
    if !adjacency.out.contains_key(vertex) || max_depth == 0 {
        return set;
    }

    let visits = search(adjacency, vertex, max_depth, None);

    // Each target may be reached in up to four states; the smallest reason wins.
    let mut reached: BTreeMap<&str, BTreeMap<RecompileReason, usize>> = BTreeMap::new();
    for (idx, visit) in visits.iter().enumerate() {
        reached.entry(visit.unit).or_default().insert(visit.state.reason(), idx);
    }

    for (unit, states) in reached {
        let mut detour: Option<Vec<Visit<'_>>> = None;
        for (reason, idx) in states {
            let path = reconstruct(&visits, idx, vertex);
            if path.is_simple() {
                set.insert(reason, unit.to_string(), path);
                break;
            }
            // The walk loops back through `unit`; retry without leaving it.
            let detour = detour.get_or_insert_with(|| search(adjacency, vertex, max_depth, Some(unit)));
            let found = detour
                .iter()
                .position(|visit| visit.unit == unit && visit.state.reason() == reason);
            if let Some(idx) = found {
                let path = reconstruct(detour, idx, vertex);
                debug_assert!(path.is_simple(), "non-simple causal path {path}");
                set.insert(reason, unit.to_string(), path);
                break;
            }
        }
    }
    set.finish();
    set
}

/// Breadth-first walk over (unit, state) pairs starting at `vertex`.
///
/// Visits of `terminal` are recorded but never expanded.
fn search<'g>(
    adjacency: &Adjacency<'g>,
    vertex: &str,
    max_depth: usize,
    terminal: Option<&str>,
) -> Vec<Visit<'g>> {
    let mut visits: Vec<Visit<'g>> = Vec::new();
    let mut seen: HashSet<(&'g str, PathState)> = HashSet::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for &(next, kind) in adjacency.neighbours(vertex) {
        if next == vertex {
            continue;
        }
        let Some(state) = PathState::start(kind) else {
            continue;
        };
        if seen.insert((next, state)) {
            visits.push(Visit { unit: next, state, kind, parent: None, depth: 1 });
            queue.push_back(visits.len() - 1);
        }
    }

    while let Some(idx) = queue.pop_front() {
        let (unit, state, depth) = (visits[idx].unit, visits[idx].state, visits[idx].depth);
        if depth >= max_depth || terminal == Some(unit) {
            continue;
        }
        for &(next, kind) in adjacency.neighbours(unit) {
            if next == vertex {
                continue;
            }
            let Some(next_state) = state.step(kind) else {
                continue;
            };
            if seen.insert((next, next_state)) {
                visits.push(Visit {
                    unit: next,
                    state: next_state,
                    kind,
                    parent: Some(idx),
                    depth: depth + 1,
                });
                queue.push_back(visits.len() - 1);
            }
        }
    }
    visits
}

fn reconstruct(visits: &[Visit<'_>], mut idx: usize, vertex: &str) -> CausalPath {
    let mut hops = Vec::new();
    loop {
        let visit = &visits[idx];
        let from = visit.parent.map_or(vertex, |p| visits[p].unit);
        hops.push(DependencyLink::new(visit.kind, from, visit.unit));
        match visit.parent {
            Some(p) => idx = p,
            None => break,
        }
    }
    hops.reverse();
    CausalPath::new(hops)
}
