//! Integration tests for depscope
//!
//! These tests drive the manifest, the session and the CLI binary together
//! over a small project written to a temp directory.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use depscope_core::{DependencyKind, RecompileReason};
use depscope_indexer::{Config, JsonManifest};
use depscope_session::Session;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
  "units": [
    { "id": "lib/app/router.ex", "source": "lib/app/router.ex", "modules": ["App.Router"] },
    { "id": "lib/app/routes.ex", "source": "lib/app/routes.ex", "modules": ["App.Routes"] },
    { "id": "lib/app/plug.ex", "source": "lib/app/plug.ex", "modules": ["App.Plug"] },
    { "id": "lib/app/repo.ex", "source": "lib/app/repo.ex", "modules": ["App.Repo"] }
  ],
  "exports": {
    "App.Routes": { "functions": [], "macros": [["get", 2]] }
  }
}"#;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

/// router -compile-> routes -compile-> plug -runtime-> repo
fn create_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    write(
        root,
        "lib/app/router.ex",
        "defmodule App.Router do\n  require App.Routes\n\n  App.Routes.get \"/\", :index\nend\n",
    );
    write(
        root,
        "lib/app/routes.ex",
        "defmodule App.Routes do\n  @plug App.Plug.init([])\n\n  defmacro get(path, action) do\n    {path, action}\n  end\nend\n",
    );
    write(
        root,
        "lib/app/plug.ex",
        "defmodule App.Plug do\n  def init(opts), do: opts\n\n  def call(conn) do\n    App.Repo.all(conn)\n  end\nend\n",
    );
    write(root, "lib/app/repo.ex", "defmodule App.Repo do\n  def all(_), do: []\nend\n");
    write(root, "depscope.manifest.json", MANIFEST);
    temp_dir
}

fn depscope(root: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_depscope"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("Failed to execute depscope")
}

#[tokio::test]
async fn test_session_over_json_manifest() {
    let dir = create_project();
    let config = Config::load(dir.path()).unwrap();
    let manifest = JsonManifest::load(&config.manifest_path(dir.path())).unwrap();
    let session = Session::new(Arc::new(manifest), config);

    let summary = session.build_graph_summary().await.unwrap();
    assert_eq!(summary.len(), 4);

    let router = summary.iter().find(|e| e.path == "lib/app/router.ex").unwrap();
    let deps: Vec<(&str, RecompileReason)> =
        router.recompile_dependencies.iter().map(|d| (d.path.as_str(), d.reason)).collect();
    assert_eq!(
        deps,
        vec![
            ("lib/app/plug.ex", RecompileReason::Compile),
            ("lib/app/routes.ex", RecompileReason::Compile),
            ("lib/app/repo.ex", RecompileReason::CompileThenRuntime),
        ]
    );

    session.wait_for_cache().await.unwrap();
    let entries = session
        .explain_dependency("lib/app/router.ex", "lib/app/repo.ex", RecompileReason::CompileThenRuntime)
        .await
        .unwrap();
    let kinds: Vec<DependencyKind> = entries.iter().map(|e| e.dependency_type).collect();
    assert_eq!(kinds, vec![DependencyKind::Compile, DependencyKind::Compile, DependencyKind::Runtime]);
    assert_eq!(entries[0].snippets[0].highlight, (4, 4));
    assert_eq!(entries[1].snippets[0].highlight, (2, 2));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    let output = depscope(dir.path(), &["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("depscope v"));
}

#[test]
fn test_cli_summary_prints_json() {
    let dir = create_project();
    let output = depscope(dir.path(), &["summary"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 4);

    let plug = entries.iter().find(|e| e["path"] == "lib/app/plug.ex").unwrap();
    assert_eq!(plug["outgoing_edges"][0]["dependency_type"], "runtime");
    assert_eq!(plug["outgoing_edges"][0]["sink"], "lib/app/repo.ex");
    assert!(plug["recompile_dependencies"].as_array().unwrap().is_empty());
}

#[test]
fn test_cli_explain_prints_causes() {
    let dir = create_project();
    let output = depscope(
        dir.path(),
        &["explain", "lib/app/router.ex", "lib/app/routes.ex", "compile", "--padding", "1"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(entries[0]["type"], "compile");
    assert_eq!(entries[0]["snippets"][0]["highlight"], serde_json::json!([4, 4]));
    assert_eq!(entries[0]["snippets"][0]["lines_span"], serde_json::json!([3, 5]));
}

#[test]
fn test_cli_rejects_unknown_reason() {
    let dir = create_project();
    let output = depscope(dir.path(), &["explain", "lib/app/router.ex", "lib/app/routes.ex", "sometimes"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_missing_manifest_fails() {
    let dir = TempDir::new().unwrap();
    let output = depscope(dir.path(), &["summary"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load manifest"));
}
