//! Explanation assembly: a causal path expanded into UI-ready entries.

use std::collections::HashMap;
use std::path::PathBuf;

use depscope_core::{CausalPath, CodeSnippet, DependencyCause, DependencyGraph, DependencyKind, DependencyLink};
use depscope_indexer::{Cause, CauseExtractor, ExportTable};
use tracing::debug;

use crate::snippet::extract_snippet;

/// Step of the walk. `EndOfPath` closes the sequence so a pending runtime
/// run is always flushed.
enum Step<'p> {
    Hop(&'p DependencyLink),
    EndOfPath,
}

pub struct ExplanationAssembler<'a> {
    extractor: CauseExtractor<'a>,
    padding: usize,
}

impl<'a> ExplanationAssembler<'a> {
    pub fn new(graph: &'a DependencyGraph, exports: &'a ExportTable, padding: usize) -> Self {
        ExplanationAssembler {
            extractor: CauseExtractor::new(graph, exports),
            padding,
        }
    }

    /// One entry per compile/exports hop, one per run of runtime hops.
    pub fn explain(&self, path: &CausalPath) -> Vec<DependencyCause> {
        let mut entries = Vec::new();
        let mut run: Vec<&DependencyLink> = Vec::new();
        let mut files: HashMap<PathBuf, Option<String>> = HashMap::new();

        let steps = path.hops().iter().map(Step::Hop).chain(std::iter::once(Step::EndOfPath));
        for step in steps {
            match step {
                Step::Hop(hop) if hop.dependency_type == DependencyKind::Runtime => run.push(hop),
                Step::Hop(hop) => {
                    flush_runtime(&mut run, &mut entries);
                    let causes = self.extractor.dependency_causes(&hop.source, &hop.sink, hop.dependency_type);
                    entries.push(DependencyCause {
                        dependency_type: hop.dependency_type,
                        source: hop.source.clone(),
                        intermediates: Vec::new(),
                        sink: hop.sink.clone(),
                        snippets: self.snippets(&causes, &mut files),
                    });
                }
                Step::EndOfPath => flush_runtime(&mut run, &mut entries),
            }
        }
        entries
    }

    fn snippets(&self, causes: &[Cause], files: &mut HashMap<PathBuf, Option<String>>) -> Vec<CodeSnippet> {
        causes
            .iter()
            .filter_map(|cause| {
                let text = files.entry(cause.origin_file.clone()).or_insert_with(|| {
                    std::fs::read_to_string(&cause.origin_file)
                        .map_err(|e| debug!("Cannot read {:?} for snippet: {}", cause.origin_file, e))
                        .ok()
                });
                extract_snippet(text.as_deref()?, cause.span, self.padding)
            })
            .collect()
    }
}

fn flush_runtime(run: &mut Vec<&DependencyLink>, entries: &mut Vec<DependencyCause>) {
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return;
    };
    entries.push(DependencyCause {
        dependency_type: DependencyKind::Runtime,
        source: first.source.clone(),
        intermediates: run[1..].iter().map(|hop| hop.source.clone()).collect(),
        sink: last.sink.clone(),
        snippets: Vec::new(),
    });
    run.clear();
}
