//! Cause extraction: the source expressions behind one dependency edge.

use std::collections::HashSet;
use std::path::PathBuf;

use depscope_core::{DependencyGraph, DependencyKind};
use serde::Serialize;
use tracing::debug;

use crate::ast::Span;
use crate::builder::ExportTable;
use crate::manifest::ModuleExports;
use crate::scanner::{self, ModuleExprKind, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseKind {
    StructUsage,
    Import,
    Macro,
    CompileTimeInvocation,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Cause {
    pub kind: CauseKind,
    pub origin_file: PathBuf,
    pub span: Span,
}

/// Causes in `file` for a `kind` edge towards `module`. Runtime edges carry
/// no code evidence.
pub fn scan_causes(file: &SourceFile, module: &str, kind: DependencyKind, table: &ExportTable) -> Vec<Cause> {
    let empty = ModuleExports::default();
    let exports = table.exports(module).unwrap_or(&empty);
    let mut found: Vec<(CauseKind, Span)> = Vec::new();

    match kind {
        DependencyKind::Compile => {
            found.extend(scanner::macro_exprs(file, module, exports).into_iter().map(|m| (CauseKind::Macro, m.span)));
            found.extend(
                scanner::compile_invocation_exprs(file, module, exports)
                    .into_iter()
                    .map(|m| (CauseKind::CompileTimeInvocation, m.span)),
            );
        }
        DependencyKind::Exports => {
            for defined in scanner::defined_modules(file) {
                let Ok(imports) = scanner::scan_module_exprs(file, &defined, ModuleExprKind::Import) else {
                    continue;
                };
                found.extend(imports.into_iter().filter(|m| m.target == module).map(|m| (CauseKind::Import, m.span)));
            }
            if table.defines_struct(module) {
                let names = HashSet::from([module.to_string()]);
                found.extend(scanner::struct_exprs(file, &names).into_iter().map(|m| (CauseKind::StructUsage, m.span)));
            }
        }
        DependencyKind::Runtime => {}
    }

    let mut causes: Vec<Cause> = found
        .into_iter()
        .map(|(kind, span)| Cause { kind, origin_file: file.path.clone(), span })
        .collect();
    causes.sort_by_key(|c| (c.span, c.kind));
    causes.dedup();
    causes
}

/// Re-scans sources on demand to explain graph edges.
pub struct CauseExtractor<'a> {
    graph: &'a DependencyGraph,
    exports: &'a ExportTable,
}

impl<'a> CauseExtractor<'a> {
    pub fn new(graph: &'a DependencyGraph, exports: &'a ExportTable) -> Self {
        CauseExtractor { graph, exports }
    }

    /// Expressions in `source`'s file establishing its `kind` edge to `sink`.
    ///
    /// Best effort: a missing unit, unreadable file or parse failure yields
    /// an empty list.
    pub fn dependency_causes(&self, source: &str, sink: &str, kind: DependencyKind) -> Vec<Cause> {
        let (Some(source_unit), Some(sink_unit)) = (self.graph.unit(source), self.graph.unit(sink)) else {
            return Vec::new();
        };
        if kind == DependencyKind::Runtime {
            return Vec::new();
        }
        let file = match SourceFile::load(&source_unit.source_path) {
            Ok(file) => file,
            Err(e) => {
                debug!("No causes for {} -> {}: {}", source, sink, e);
                return Vec::new();
            }
        };

        let mut causes: Vec<Cause> = sink_unit
            .modules
            .iter()
            .flat_map(|module| scan_causes(&file, module, kind, self.exports))
            .collect();
        causes.sort_by_key(|c| (c.span, c.kind));
        causes.dedup();
        causes
    }
}
