//! Graph builder: compiled-unit records in, typed dependency graph out.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use depscope_core::{DependencyGraph, DependencyKind, Unit, UnitId};
use globset::GlobSet;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::causes::scan_causes;
use crate::error::ScanError;
use crate::manifest::{ManifestReader, ModuleExports, UnitRecord};
use crate::scanner::{self, SourceFile};

/// Public surface of every module in the build, plus which modules define
/// a struct.
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    modules: HashMap<String, ModuleExports>,
    structs: HashSet<String>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: impl Into<String>, exports: ModuleExports) {
        self.modules.insert(module.into(), exports);
    }

    pub fn add_struct(&mut self, module: impl Into<String>) {
        self.structs.insert(module.into());
    }

    pub fn exports(&self, module: &str) -> Option<&ModuleExports> {
        self.modules.get(module)
    }

    pub fn defines_struct(&self, module: &str) -> bool {
        self.structs.contains(module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct BuildResult {
    pub graph: DependencyGraph,
    pub exports: ExportTable,
    /// Units kept as vertices without edges because their scan failed.
    pub failed: Vec<UnitId>,
}

pub struct GraphBuilder<'m> {
    manifest: &'m dyn ManifestReader,
    exclude: GlobSet,
}

impl<'m> GraphBuilder<'m> {
    pub fn new(manifest: &'m dyn ManifestReader) -> Self {
        GraphBuilder { manifest, exclude: GlobSet::empty() }
    }

    pub fn with_exclude(mut self, exclude: GlobSet) -> Self {
        self.exclude = exclude;
        self
    }

    fn is_excluded(&self, record: &UnitRecord) -> bool {
        self.exclude.is_match(&record.id) || self.exclude.is_match(&record.source)
    }

    pub fn build(&self) -> BuildResult {
        let records: Vec<UnitRecord> = self
            .manifest
            .list_compiled_units()
            .into_iter()
            .filter(|record| !self.is_excluded(record))
            .collect();
        if records.is_empty() {
            info!("No compiled units; graph is empty");
            return BuildResult::default();
        }

        let parsed: Vec<(UnitRecord, Result<SourceFile, ScanError>)> = records
            .into_par_iter()
            .map(|record| {
                let file = SourceFile::load(&record.source);
                (record, file)
            })
            .collect();

        let exports = self.export_table(&parsed);
        let owners: HashMap<&str, &str> = parsed
            .iter()
            .flat_map(|(record, _)| record.modules.iter().map(move |m| (m.as_str(), record.id.as_str())))
            .collect();

        let edges: Vec<(UnitId, BTreeMap<UnitId, BTreeSet<DependencyKind>>)> = parsed
            .par_iter()
            .filter_map(|(record, file)| match file {
                Ok(file) => Some((record.id.clone(), classify(record, file, &owners, &exports))),
                Err(_) => None,
            })
            .collect();

        let mut graph = DependencyGraph::new();
        let mut failed = Vec::new();
        for (record, file) in &parsed {
            if let Err(e) = file {
                warn!("Skipping edges of {}: {}", record.id, e);
                failed.push(record.id.clone());
            }
            graph.add_unit(Unit::new(record.id.clone(), record.modules.clone(), record.source.clone()));
        }
        for (source, sinks) in &edges {
            for (sink, kinds) in sinks {
                for kind in kinds {
                    graph.add_edge(source, sink, *kind);
                }
            }
        }

        info!(
            "Built dependency graph: {} units, {} edges, {} modules with exports, {} failed",
            graph.unit_count(),
            graph.edge_count(),
            exports.len(),
            failed.len()
        );
        BuildResult { graph, exports, failed }
    }

    /// Exports from the manifest where listed, otherwise derived from the
    /// defining source.
    fn export_table(&self, parsed: &[(UnitRecord, Result<SourceFile, ScanError>)]) -> ExportTable {
        let mut table = ExportTable::new();
        for (record, file) in parsed {
            for module in &record.modules {
                let exports = match (self.manifest.list_module_exports(module), file) {
                    (Some(exports), _) => exports,
                    (None, Ok(file)) => scanner::module_exports(file, module).unwrap_or_else(|e| {
                        debug!("No exports for {}: {}", module, e);
                        ModuleExports::default()
                    }),
                    (None, Err(_)) => ModuleExports::default(),
                };
                table.insert(module.clone(), exports);
            }
            if let Ok(file) = file {
                for def in scanner::struct_defs(file) {
                    table.add_struct(def.module);
                }
            }
        }
        table
    }
}

/// Strongest kind per referenced module, grouped by owning unit.
///
/// Runtime needs a reference that uses the module: declared by the
/// manifest, or anything in the source besides an `import`/`require`/`use`
/// target. A bare `require X` alone adds no edge.
fn classify(
    record: &UnitRecord,
    file: &SourceFile,
    owners: &HashMap<&str, &str>,
    exports: &ExportTable,
) -> BTreeMap<UnitId, BTreeSet<DependencyKind>> {
    let mut candidates: BTreeMap<String, bool> = BTreeMap::new();
    for reference in scanner::module_references(file) {
        *candidates.entry(reference.module).or_default() |= !reference.directive;
    }
    for module in &record.references {
        candidates.insert(module.clone(), true);
    }

    let mut sinks: BTreeMap<UnitId, BTreeSet<DependencyKind>> = BTreeMap::new();
    for (module, used) in candidates {
        let Some(owner) = owners.get(module.as_str()) else {
            continue;
        };
        if *owner == record.id {
            continue;
        }
        let kind = [DependencyKind::Compile, DependencyKind::Exports]
            .into_iter()
            .find(|kind| !scan_causes(file, &module, *kind, exports).is_empty())
            .or(used.then_some(DependencyKind::Runtime));
        if let Some(kind) = kind {
            sinks.entry(owner.to_string()).or_default().insert(kind);
        }
    }
    sinks
}
