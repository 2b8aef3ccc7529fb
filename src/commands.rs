//! CLI command implementations

use anyhow::Context;
use depscope_core::RecompileReason;
use depscope_indexer::{Config, JsonManifest};
use depscope_session::Session;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Flags shared by every command.
pub struct Options {
    pub root: PathBuf,
    pub manifest: Option<PathBuf>,
}

pub async fn summary(options: Options, filter: Option<String>) -> anyhow::Result<()> {
    let session = open_session(options, None)?;
    let summary = session.build_graph_summary().await?;

    let entries = match filter {
        Some(term) => session.search(&term).await,
        None => summary,
    };
    print_json(&entries)
}

pub async fn explain(
    options: Options,
    source: String,
    sink: String,
    reason: RecompileReason,
    padding: Option<usize>,
) -> anyhow::Result<()> {
    let session = open_session(options, padding)?;
    session.build_graph_summary().await?;
    session.wait_for_cache().await?;

    let entries = session.explain_dependency(&source, &sink, reason).await?;
    if entries.is_empty() {
        tracing::warn!("No {} dependency from {} on {}", reason, source, sink);
    }
    print_json(&entries)
}

pub async fn search(options: Options, term: String) -> anyhow::Result<()> {
    let session = open_session(options, None)?;
    session.build_graph_summary().await?;

    let paths: Vec<String> = session
        .search(&term)
        .await
        .into_iter()
        .map(|entry| entry.path)
        .collect();
    for path in paths {
        println!("{}", path);
    }
    Ok(())
}

/// Load `depscope.toml`, apply CLI overrides and open the manifest.
fn open_session(options: Options, padding: Option<usize>) -> anyhow::Result<Session> {
    let mut config = Config::load(&options.root)
        .with_context(|| format!("Failed to load config from {}", options.root.display()))?;
    if let Some(manifest) = options.manifest {
        config.manifest = manifest;
    }
    if let Some(padding) = padding {
        config.snippet_padding = padding;
    }

    let manifest_path = config.manifest_path(&options.root);
    tracing::info!("Loading manifest: {}", manifest_path.display());
    let manifest = JsonManifest::load(&manifest_path)
        .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;

    Ok(Session::new(Arc::new(manifest), config))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
