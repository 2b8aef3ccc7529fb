//! Analysis session owning the current graph generation and its path cache

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use depscope_core::{
    recompile_all, search_units, DependencyCause, DependencyGraph, FileEntry, PathCache, RecompileReason,
};
use depscope_indexer::{Config, ExportTable, GraphBuilder, ManifestReader};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::explain::ExplanationAssembler;

/// Everything produced by one build. Replaced wholesale on rebuild.
struct Generation {
    id: u64,
    graph: DependencyGraph,
    exports: ExportTable,
    summary: Vec<FileEntry>,
    cache: Arc<PathCache>,
}

/// One analysis session over a manifest.
pub struct Session {
    manifest: Arc<dyn ManifestReader>,
    config: Config,
    current: RwLock<Option<Arc<Generation>>>,
    /// Background cache population of the latest build.
    population: Mutex<Option<JoinHandle<usize>>>,
    next_generation: AtomicU64,
}

impl Session {
    /// Create a new session; nothing is built until [`Session::build_graph_summary`].
    pub fn new(manifest: Arc<dyn ManifestReader>, config: Config) -> Self {
        Self {
            manifest,
            config,
            current: RwLock::new(None),
            population: Mutex::new(None),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the graph, compute every unit's recompile dependencies and
    /// return the summary. The path cache fills in the background.
    pub async fn build_graph_summary(&self) -> Result<Vec<FileEntry>> {
        let id = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let manifest = Arc::clone(&self.manifest);
        let exclude = self.config.exclude_set().context("Invalid exclude patterns")?;
        let max_depth = self.config.max_path_depth;

        let (result, closures) = tokio::task::spawn_blocking(move || {
            let result = GraphBuilder::new(manifest.as_ref()).with_exclude(exclude).build();
            let closures = recompile_all(&result.graph, max_depth);
            (result, closures)
        })
        .await
        .context("Graph build task failed")?;

        let summary: Vec<FileEntry> = result
            .graph
            .summarize()
            .into_iter()
            .map(|unit| FileEntry {
                recompile_dependencies: closures
                    .get(&unit.path)
                    .map(|set| set.to_dependencies(&unit.path))
                    .unwrap_or_default(),
                path: unit.path,
                outgoing_edges: unit.outgoing_edges,
            })
            .collect();

        let cache = Arc::new(PathCache::new(id));
        let generation = Arc::new(Generation {
            id,
            graph: result.graph,
            exports: result.exports,
            summary: summary.clone(),
            cache: Arc::clone(&cache),
        });
        *self.current.write().await = Some(generation);

        let handle = tokio::task::spawn_blocking(move || cache.populate(&closures));
        // An older population is detached, not cancelled: it finishes filling
        // a cache nobody can reach any more.
        *self.population.lock().await = Some(handle);

        info!("Generation {} built: {} units", id, summary.len());
        Ok(summary)
    }

    /// Explanation of why `source` recompiles because of `sink`.
    ///
    /// Empty when nothing is cached for the key yet: either the background
    /// population has not reached it or the key is stale.
    pub async fn explain_dependency(
        &self,
        source: &str,
        sink: &str,
        reason: RecompileReason,
    ) -> Result<Vec<DependencyCause>> {
        let Some(generation) = self.current.read().await.clone() else {
            debug!("Explain {} -> {} before any build", source, sink);
            return Ok(Vec::new());
        };
        let Some(path) = generation.cache.get(source, sink, reason) else {
            debug!("Cache miss for {} -> {} ({}) in generation {}", source, sink, reason, generation.id);
            return Ok(Vec::new());
        };

        let padding = self.config.snippet_padding;
        let entries = tokio::task::spawn_blocking(move || {
            ExplanationAssembler::new(&generation.graph, &generation.exports, padding).explain(&path)
        })
        .await
        .context("Explanation task failed")?;
        Ok(entries)
    }

    /// Wait for the latest background cache population to finish.
    pub async fn wait_for_cache(&self) -> Result<()> {
        let handle = self.population.lock().await.take();
        if let Some(handle) = handle {
            let inserted = handle.await.context("Cache population task failed")?;
            debug!("Cache population finished with {} entries", inserted);
        }
        Ok(())
    }

    /// Fuzzy search over the latest summary.
    pub async fn search(&self, term: &str) -> Vec<FileEntry> {
        match self.current.read().await.as_ref() {
            Some(generation) => search_units(&generation.summary, term),
            None => Vec::new(),
        }
    }

    pub async fn generation(&self) -> Option<u64> {
        self.current.read().await.as_ref().map(|g| g.id)
    }

    pub async fn cache_ready(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|g| g.cache.is_ready())
    }
}
