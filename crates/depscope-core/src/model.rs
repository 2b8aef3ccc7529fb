//! Core data structures for the dependency graph

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Path-like identifier of a compiled unit, unique within one build.
pub type UnitId = String;

/// A compiled source file. One vertex of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    /// Module names the unit declares, in declaration order.
    pub modules: Vec<String>,
    pub source_path: PathBuf,
}

impl Unit {
    pub fn new(id: impl Into<UnitId>, modules: Vec<String>, source_path: impl Into<PathBuf>) -> Self {
        Unit {
            id: id.into(),
            modules,
            source_path: source_path.into(),
        }
    }

    /// Whether this unit declares `module`.
    pub fn declares(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }
}

/// Strength of a dependency's effect on forced recompilation.
///
/// The derived ordering is the strength order: `Runtime < Exports < Compile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Called from inside a function body. Never forces recompilation by itself.
    Runtime,
    /// Depends on the public surface (imports, struct shape).
    Exports,
    /// Macro expansion or top-level invocation. Always forces recompilation.
    Compile,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 3] = [
        DependencyKind::Compile,
        DependencyKind::Exports,
        DependencyKind::Runtime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Compile => "compile",
            DependencyKind::Exports => "exports",
            DependencyKind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a dependency change would (or might) force a unit to rebuild.
///
/// Declaration order is the classification priority: when several paths
/// reach the same target, the smallest reason wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecompileReason {
    /// Every hop is a compile edge.
    Compile,
    /// First hop is an exports edge, every later hop a compile edge.
    ExportsThenCompile,
    /// A single exports edge.
    Exports,
    /// Compile hops followed by one or more trailing runtime hops.
    CompileThenRuntime,
}

impl RecompileReason {
    pub const ALL: [RecompileReason; 4] = [
        RecompileReason::Compile,
        RecompileReason::ExportsThenCompile,
        RecompileReason::Exports,
        RecompileReason::CompileThenRuntime,
    ];

    /// True when the unit recompiles no matter what changed in the dependency.
    pub fn is_guaranteed(&self) -> bool {
        matches!(self, RecompileReason::Compile | RecompileReason::CompileThenRuntime)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecompileReason::Compile => "compile",
            RecompileReason::ExportsThenCompile => "exports_then_compile",
            RecompileReason::Exports => "exports",
            RecompileReason::CompileThenRuntime => "compile_then_runtime",
        }
    }
}

impl fmt::Display for RecompileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecompileReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecompileReason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown recompile reason: {s}"))
    }
}

/// One typed edge of the graph; `source` depends on `sink`.
///
/// Also used as one hop of a [`CausalPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyLink {
    pub dependency_type: DependencyKind,
    pub source: UnitId,
    pub sink: UnitId,
}

impl DependencyLink {
    pub fn new(dependency_type: DependencyKind, source: impl Into<UnitId>, sink: impl Into<UnitId>) -> Self {
        DependencyLink {
            dependency_type,
            source: source.into(),
            sink: sink.into(),
        }
    }
}

/// Chain of edges from the recompiling unit to the unit whose change causes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CausalPath(pub Vec<DependencyLink>);

impl CausalPath {
    pub fn new(hops: Vec<DependencyLink>) -> Self {
        CausalPath(hops)
    }

    pub fn hops(&self) -> &[DependencyLink] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The recompiling unit.
    pub fn origin(&self) -> Option<&str> {
        self.0.first().map(|h| h.source.as_str())
    }

    /// The unit whose change triggers the recompilation.
    pub fn target(&self) -> Option<&str> {
        self.0.last().map(|h| h.sink.as_str())
    }

    /// Every unit on the path, origin first.
    pub fn units(&self) -> Vec<&str> {
        let mut units: Vec<&str> = self.0.iter().map(|h| h.source.as_str()).collect();
        if let Some(last) = self.0.last() {
            units.push(last.sink.as_str());
        }
        units
    }

    /// No unit appears twice.
    pub fn is_simple(&self) -> bool {
        let mut seen = HashSet::new();
        self.units().into_iter().all(|u| seen.insert(u))
    }

    pub fn kinds(&self) -> impl Iterator<Item = DependencyKind> + '_ {
        self.0.iter().map(|h| h.dependency_type)
    }
}

impl fmt::Display for CausalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(origin) = self.origin() else {
            return Ok(());
        };
        write!(f, "{origin}")?;
        for hop in &self.0 {
            write!(f, " -[{}]-> {}", hop.dependency_type, hop.sink)?;
        }
        Ok(())
    }
}

/// Recompile dependencies of one vertex, partitioned by reason.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecompileSet {
    buckets: BTreeMap<RecompileReason, Vec<(UnitId, CausalPath)>>,
}

impl RecompileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `unit` under `reason`. Callers guarantee a unit is recorded once.
    pub fn insert(&mut self, reason: RecompileReason, unit: UnitId, path: CausalPath) {
        self.buckets.entry(reason).or_default().push((unit, path));
    }

    /// Entries under one reason, sorted by unit id once [`RecompileSet::finish`] ran.
    pub fn get(&self, reason: RecompileReason) -> &[(UnitId, CausalPath)] {
        self.buckets.get(&reason).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, reason: RecompileReason, unit: &str) -> bool {
        self.get(reason).iter().any(|(u, _)| u == unit)
    }

    /// Reason a unit was classified under, if any.
    pub fn reason_for(&self, unit: &str) -> Option<RecompileReason> {
        self.buckets
            .iter()
            .find(|(_, entries)| entries.iter().any(|(u, _)| u == unit))
            .map(|(reason, _)| *reason)
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecompileReason, &UnitId, &CausalPath)> {
        self.buckets
            .iter()
            .flat_map(|(reason, entries)| entries.iter().map(move |(u, p)| (*reason, u, p)))
    }

    /// Sort every bucket by unit id.
    pub fn finish(&mut self) {
        for entries in self.buckets.values_mut() {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
        }
    }

    /// Flatten into the wire representation for `source`.
    pub fn to_dependencies(&self, source: &str) -> Vec<RecompileDependency> {
        self.iter()
            .map(|(reason, unit, path)| RecompileDependency {
                id: format!("{source}->{unit}"),
                path: unit.clone(),
                reason,
                dependency_chain: path.clone(),
            })
            .collect()
    }
}

/// Outgoing edges of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub path: UnitId,
    pub outgoing_edges: Vec<DependencyLink>,
}

/// A recompile dependency as handed to UI layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecompileDependency {
    pub id: String,
    pub path: UnitId,
    pub reason: RecompileReason,
    pub dependency_chain: CausalPath,
}

/// One unit of the graph summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: UnitId,
    pub outgoing_edges: Vec<DependencyLink>,
    pub recompile_dependencies: Vec<RecompileDependency>,
}

impl AsRef<str> for FileEntry {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

impl AsRef<str> for RecompileDependency {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

/// Source excerpt around one cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub content: String,
    /// Unpadded 1-based line span of the cause.
    pub highlight: (usize, usize),
    /// 1-based line span covered by `content`.
    pub lines_span: (usize, usize),
}

/// One entry of an explanation.
///
/// Runtime entries cover a whole run of consecutive runtime hops and carry
/// no snippets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyCause {
    #[serde(rename = "type")]
    pub dependency_type: DependencyKind,
    pub source: UnitId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intermediates: Vec<UnitId>,
    pub sink: UnitId,
    pub snippets: Vec<CodeSnippet>,
}
