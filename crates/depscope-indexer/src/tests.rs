//! Unit tests for depscope-indexer

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use depscope_core::DependencyKind;

use crate::ast::{DefKind, Expr, ImportFilter};
use crate::parser;
use crate::scanner::{self, ModuleExprKind};
use crate::test_utils::{create_test_project, source, write};
use crate::*;

fn walk<'a>(exprs: &'a [Expr], out: &mut Vec<&'a Expr>) {
    for expr in exprs {
        out.push(expr);
        for child in expr.children() {
            walk(std::slice::from_ref(child), out);
        }
    }
}

fn all_exprs(exprs: &[Expr]) -> Vec<&Expr> {
    let mut out = Vec::new();
    walk(exprs, &mut out);
    out
}

fn exports(functions: &[(&str, usize)], macros: &[(&str, usize)]) -> ModuleExports {
    ModuleExports {
        functions: functions.iter().map(|(n, a)| (n.to_string(), *a)).collect(),
        macros: macros.iter().map(|(n, a)| (n.to_string(), *a)).collect(),
    }
}

const WORKER: &str = r#"defmodule Sample.Worker do
  @moduledoc """
  Handles #{inspect(:jobs)} in the background.
  """
  use GenServer
  alias Sample.{Queue, Job}

  @timeout 5_000

  def start_link(opts \\ []) do
    GenServer.start_link(__MODULE__, opts, name: __MODULE__)
  end

  @impl true
  def handle_call({:run, %Job{id: id} = job}, _from, state) when is_integer(id) do
    result =
      case Queue.push(state.queue, job) do
        {:ok, queue} -> {:reply, :ok, %{state | queue: queue}}
        {:error, reason} = err ->
          Logger.warning("failed: #{reason}")
          {:reply, err, state}
      end

    result
  end

  defp ids(jobs), do: Enum.map(jobs, & &1.id)

  defp valid?(job), do: job.id not in [nil, 0] and ~r/^\d+$/ =~ to_string(job.id)
end
"#;

#[test]
fn test_parse_realistic_module() {
    let exprs = parser::parse(WORKER).unwrap();
    assert_eq!(exprs.len(), 1);

    let defs: Vec<(DefKind, &str, usize, usize)> = all_exprs(&exprs)
        .into_iter()
        .filter_map(|e| match e {
            Expr::Def { kind, name, arity, defaults, .. } => Some((*kind, name.as_str(), *arity, *defaults)),
            _ => None,
        })
        .collect();
    assert_eq!(
        defs,
        vec![
            (DefKind::Def, "start_link", 1, 1),
            (DefKind::Def, "handle_call", 3, 0),
            (DefKind::Defp, "ids", 1, 0),
            (DefKind::Defp, "valid?", 1, 0),
        ]
    );

    let Expr::Module { name, span, .. } = &exprs[0] else {
        panic!("expected a module");
    };
    assert_eq!(name, "Sample.Worker");
    assert_eq!((span.start, span.end), (1, 30));
}

#[test]
fn test_parse_call_shapes() {
    let exprs = parser::parse(
        r#"defmodule P do
  def run(x) do
    x |> Enum.map(&String.trim/1) |> Helper.go(1)
    IO.puts "no parens"
    Helper.ping
    local(1, key: 2)
  end
end
"#,
    )
    .unwrap();

    let calls: Vec<String> = all_exprs(&exprs)
        .into_iter()
        .filter_map(|e| match e {
            Expr::RemoteCall { module, name, arity, span, .. } => {
                Some(format!("{module}.{name}/{arity}@{}", span.start))
            }
            Expr::LocalCall { name, arity, .. } => Some(format!("{name}/{arity}")),
            Expr::Capture { module: Some(module), name, arity, .. } => Some(format!("&{module}.{name}/{arity}")),
            _ => None,
        })
        .collect();

    assert_eq!(
        calls,
        vec![
            "Enum.map/2@3",
            "&String.trim/1",
            "Helper.go/2@3",
            "IO.puts/1@4",
            "Helper.ping/0@5",
            "local/2",
        ]
    );
}

#[test]
fn test_parse_error_reports_line() {
    let err = parser::parse("defmodule Fine do\n  def ok, do: 1\nend\n\n)\n").unwrap_err();
    assert_eq!(err.line, 5);

    let err = parser::parse("defmodule Broken do\n  def oops(\nend\n").unwrap_err();
    assert!((1..=3).contains(&err.line), "{err}");
    assert!(parser::parse("defmodule A do\n  @doc \"unterminated\nend\n").is_err());
}

#[test]
fn test_parse_anonymous_functions_and_unquoted_defs() {
    let exprs = parser::parse(
        r#"defmodule Gen do
  for n <- [:a, :b] do
    def unquote(n)(), do: unquote(n)
  end

  def total(items) do
    Enum.reduce(items, 0, fn x, acc -> x + acc end)
  end

  def names(items), do: Enum.map(items, fn %{name: name} -> name end)
end
"#,
    )
    .unwrap();

    let exprs = all_exprs(&exprs);
    let defs: Vec<(&str, usize)> = exprs
        .iter()
        .filter_map(|e| match e {
            Expr::Def { name, arity, .. } => Some((name.as_str(), *arity)),
            _ => None,
        })
        .collect();
    assert_eq!(defs, vec![("unquote", 0), ("total", 1), ("names", 1)]);

    let calls: Vec<String> = exprs
        .iter()
        .filter_map(|e| match e {
            Expr::RemoteCall { module, name, arity, span, .. } => {
                Some(format!("{module}.{name}/{arity}@{}", span.start))
            }
            _ => None,
        })
        .collect();
    assert_eq!(calls, vec!["Enum.reduce/3@7", "Enum.map/2@10"]);
}

#[test]
fn test_resolver_aliases_and_scopes() {
    let mut resolver = NameResolver::new();
    resolver.alias("App.Accounts.User", None);
    resolver.alias("App.Repo", Some("R"));

    assert_eq!(resolver.resolve("User"), "App.Accounts.User");
    assert_eq!(resolver.resolve("User.Token"), "App.Accounts.User.Token");
    assert_eq!(resolver.resolve("R"), "App.Repo");
    assert_eq!(resolver.resolve("Elixir.Unknown"), "Unknown");

    resolver.push_scope();
    resolver.alias("Legacy.User", None);
    assert_eq!(resolver.resolve("User"), "Legacy.User");
    resolver.pop_scope();
    assert_eq!(resolver.resolve("User"), "App.Accounts.User");

    // Later aliases shadow earlier ones in the same scope.
    resolver.alias("Other.User", None);
    assert_eq!(resolver.resolve("User"), "Other.User");

    resolver.import("R", ImportFilter::Only(vec![("all".to_string(), 1)]));
    assert!(resolver.is_required("App.Repo"));
    assert!(!resolver.is_required("App.Accounts.User"));
    let filter = resolver.import_filter("App.Repo").unwrap();
    assert!(filter.allows("all", 1, false));
    assert!(!filter.allows("get", 2, false));
}

#[test]
fn test_scan_module_exprs_nested_imports() {
    let file = source(
        r#"defmodule B1 do
  import B2

  defmodule Nested do
    import B2
  end

  def run do
    require Logger
  end
end
"#,
    );

    let outer = scanner::scan_module_exprs(&file, "B1", ModuleExprKind::Import).unwrap();
    let inner = scanner::scan_module_exprs(&file, "B1.Nested", ModuleExprKind::Import).unwrap();
    assert_eq!(outer.len(), 1);
    assert_eq!(outer[0].span.start, 2);
    assert_eq!(outer[0].target, "B2");
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].span.start, 5);

    let requires = scanner::scan_module_exprs(&file, "B1", ModuleExprKind::Require).unwrap();
    assert_eq!(requires.len(), 1);
    assert_eq!(requires[0].target, "Logger");

    assert_eq!(scanner::defined_modules(&file), vec!["B1", "B1.Nested"]);
    assert!(matches!(
        scanner::scan_module_exprs(&file, "B9", ModuleExprKind::Import),
        Err(ScanError::ModuleNotFound { .. })
    ));
}

#[test]
fn test_compile_invocation_pruned_inside_def() {
    let d2 = exports(&[("x", 0)], &[]);
    let top_level = source("defmodule D1 do\n  require D2\n  D2.x()\nend\n");
    let in_def = source("defmodule D1 do\n  require D2\n  def run do\n    D2.x()\n  end\nend\n");

    let matches = scanner::compile_invocation_exprs(&top_level, "D2", &d2);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].span.start, 3);
    assert_eq!(matches[0].function, Some(("x".to_string(), 0)));

    assert!(scanner::compile_invocation_exprs(&in_def, "D2", &d2).is_empty());
}

#[test]
fn test_macro_exprs_are_arity_aware() {
    let d3 = exports(&[], &[("y1", 0)]);
    let file = source(
        r#"defmodule User do
  import D3

  def run do
    y1()
    y1
    y1(1)
  end
end
"#,
    );

    let matches = scanner::macro_exprs(&file, "D3", &d3);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].span.start, 5);

    let filtered = source("defmodule User do\n  import D3, only: [other: 1]\n  y1()\nend\n");
    assert!(scanner::macro_exprs(&filtered, "D3", &d3).is_empty());

    // Qualified calls need the module required first.
    let qualified = source("defmodule User do\n  D3.y1()\n  require D3\n  D3.y1()\nend\n");
    let matches = scanner::macro_exprs(&qualified, "D3", &d3);
    assert_eq!(matches.iter().map(|m| m.span.start).collect::<Vec<_>>(), vec![4]);
}

#[test]
fn test_struct_scans_follow_aliases() {
    let file = source(
        r#"defmodule App.Web do
  alias App.Accounts.User
  alias App.{Repo, Mailer}

  def build do
    %User{name: "x"}
    Repo.insert(%User{})
  end

  defmodule Form do
    defstruct [:user]
  end
end
"#,
    );

    let names = HashSet::from(["App.Accounts.User".to_string()]);
    let lines: Vec<u32> = scanner::struct_exprs(&file, &names).iter().map(|m| m.span.start).collect();
    assert_eq!(lines, vec![6, 7]);

    let defs = scanner::struct_defs(&file);
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].module, "App.Web.Form");

    let rendered: Vec<String> = scanner::module_references(&file)
        .iter()
        .map(|r| format!("{}@{}{}", r.module, r.span.start, if r.in_function { " fn" } else { "" }))
        .collect();
    insta::assert_snapshot!(rendered.join("\n"), @r"
    App.Accounts.User@6 fn
    App.Accounts.User@7 fn
    App.Repo@7 fn
    ");
}

#[test]
fn test_module_exports_expand_defaults() {
    let file = source(
        r#"defmodule Util do
  def fetch(key, opts \\ []), do: {key, opts}
  defp hidden(x), do: x
  defmacro trace(expr), do: expr
end
"#,
    );

    let found = scanner::module_exports(&file, "Util").unwrap();
    assert_eq!(found, exports(&[("fetch", 1), ("fetch", 2)], &[("trace", 1)]));

    let worker = source(WORKER);
    let found = scanner::module_exports(&worker, "Sample.Worker").unwrap();
    let functions: BTreeSet<_> = found.functions.iter().map(|(n, a)| format!("{n}/{a}")).collect();
    assert_eq!(
        functions,
        BTreeSet::from(["handle_call/3".to_string(), "start_link/0".to_string(), "start_link/1".to_string()])
    );
}

#[test]
fn test_graph_builder_classifies_edges() {
    let (_dir, manifest) = create_test_project();
    let result = GraphBuilder::new(&manifest).build();
    let graph = &result.graph;

    assert_eq!(graph.unit_count(), 8);
    assert!(graph.has_edge("lib/settings.ex", "lib/user.ex", DependencyKind::Compile));
    assert!(graph.has_edge("lib/account.ex", "lib/user.ex", DependencyKind::Exports));
    assert!(graph.has_edge("lib/report.ex", "lib/user.ex", DependencyKind::Runtime));
    assert!(graph.has_edge("lib/page.ex", "lib/web.ex", DependencyKind::Compile));
    assert!(!graph.has_edge("lib/account.ex", "lib/user.ex", DependencyKind::Compile));
    assert_eq!(graph.edge_count(), 4);

    assert_eq!(result.failed, vec!["lib/broken.ex".to_string(), "lib/ghost.ex".to_string()]);
    assert!(graph.contains("lib/ghost.ex"));
    assert!(graph.edges_from("lib/broken.ex").is_empty());
    assert_eq!(result.exports.len(), 8);
    assert!(result.exports.defines_struct("User"));
    assert!(result.exports.exports("Web").unwrap().has_macro("__using__", 1));
}

#[test]
fn test_graph_builder_keeps_several_kinds_per_pair() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "lib/b.ex", r#"defmodule B.Macros do
  defmacro route(path), do: path
end

defmodule B.Data do
  def fetch(id), do: id
end
"#);
    write(root, "lib/a.ex", r#"defmodule A do
  require B.Macros
  B.Macros.route("/")

  def load(id), do: B.Data.fetch(id)
end
"#);
    write(root, "lib/c.ex", "defmodule C do\n  require B.Data\nend\n");
    let manifest = InMemoryManifest::new()
        .with_unit("lib/a.ex", root.join("lib/a.ex"), &["A"])
        .with_unit("lib/b.ex", root.join("lib/b.ex"), &["B.Macros", "B.Data"])
        .with_unit("lib/c.ex", root.join("lib/c.ex"), &["C"]);

    let graph = GraphBuilder::new(&manifest).build().graph;
    assert!(graph.has_edge("lib/a.ex", "lib/b.ex", DependencyKind::Compile));
    assert!(graph.has_edge("lib/a.ex", "lib/b.ex", DependencyKind::Runtime));
    assert!(!graph.has_edge("lib/a.ex", "lib/b.ex", DependencyKind::Exports));
    assert_eq!(graph.edge_count(), 2);

    // A bare `require` names the module without using it.
    assert!(graph.edges_from("lib/c.ex").is_empty());
    let refs = scanner::module_references(&SourceFile::load(&root.join("lib/c.ex")).unwrap());
    assert_eq!(refs.len(), 1);
    assert!(refs[0].directive);
}

#[test]
fn test_graph_builder_exclude_and_empty_input() {
    let (_dir, manifest) = create_test_project();
    let config = Config {
        exclude: vec!["**/report.ex".to_string()],
        ..Config::default()
    };
    let result = GraphBuilder::new(&manifest).with_exclude(config.exclude_set().unwrap()).build();
    assert!(!result.graph.contains("lib/report.ex"));
    assert_eq!(result.graph.unit_count(), 7);

    let empty = InMemoryManifest::new();
    let result = GraphBuilder::new(&empty).build();
    assert_eq!(result.graph.unit_count(), 0);
    assert!(result.failed.is_empty());
    assert!(result.exports.is_empty());
}

#[test]
fn test_dependency_causes_per_kind() {
    let (_dir, manifest) = create_test_project();
    let result = GraphBuilder::new(&manifest).build();
    let extractor = CauseExtractor::new(&result.graph, &result.exports);

    let compile = extractor.dependency_causes("lib/settings.ex", "lib/user.ex", DependencyKind::Compile);
    assert_eq!(compile.len(), 1);
    assert_eq!(compile[0].kind, CauseKind::CompileTimeInvocation);
    assert_eq!(compile[0].span.start, 2);

    let exports = extractor.dependency_causes("lib/account.ex", "lib/user.ex", DependencyKind::Exports);
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].kind, CauseKind::StructUsage);
    assert_eq!(exports[0].span.start, 3);

    let using = extractor.dependency_causes("lib/page.ex", "lib/web.ex", DependencyKind::Compile);
    assert_eq!(using.len(), 1);
    assert_eq!(using[0].kind, CauseKind::Macro);

    assert!(extractor.dependency_causes("lib/report.ex", "lib/user.ex", DependencyKind::Runtime).is_empty());
    assert!(extractor.dependency_causes("lib/ghost.ex", "lib/user.ex", DependencyKind::Compile).is_empty());
    assert!(extractor.dependency_causes("lib/nope.ex", "lib/user.ex", DependencyKind::Compile).is_empty());
}

#[test]
fn test_dependency_causes_idempotent() {
    let (_dir, manifest) = create_test_project();
    let result = GraphBuilder::new(&manifest).build();
    let extractor = CauseExtractor::new(&result.graph, &result.exports);

    let first = extractor.dependency_causes("lib/account.ex", "lib/user.ex", DependencyKind::Exports);
    let second = extractor.dependency_causes("lib/account.ex", "lib/user.ex", DependencyKind::Exports);
    assert_eq!(first, second);
}

#[test]
fn test_json_manifest_resolves_relative_sources() {
    let text = r#"{
        "units": [
            {"id": "lib/a.ex", "source": "lib/a.ex", "modules": ["A"]},
            {"id": "lib/b.ex", "source": "/abs/b.ex", "modules": ["B"], "references": ["A"]}
        ],
        "exports": {"A": {"functions": [["run", 1]], "macros": [["m", 0]]}}
    }"#;
    let manifest = JsonManifest::from_str(Path::new("/project"), text).unwrap();
    let units = manifest.list_compiled_units();

    assert_eq!(units[0].source, Path::new("/project/lib/a.ex"));
    assert_eq!(units[1].source, Path::new("/abs/b.ex"));
    assert_eq!(units[1].references, vec!["A".to_string()]);
    let a = manifest.list_module_exports("A").unwrap();
    assert!(a.has_function("run", 1));
    assert!(a.has_macro("m", 0));
    assert!(manifest.list_module_exports("B").is_none());
}

#[test]
fn test_json_manifest_load_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = JsonManifest::load(&dir.path().join("depscope.manifest.json"));
    assert!(matches!(missing, Err(ManifestError::Io { .. })));

    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(JsonManifest::load(&path), Err(ManifestError::Json { .. })));
}

#[test]
fn test_config_defaults_and_overrides() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(Config::load(dir.path()).unwrap(), Config::default());

    std::fs::write(
        dir.path().join("depscope.toml"),
        "snippet_padding = 2\nexclude = [\"test/**\"]\n",
    )
    .unwrap();
    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config.snippet_padding, 2);
    assert_eq!(config.max_path_depth, 64);
    assert!(config.exclude_set().unwrap().is_match("test/foo_test.exs"));

    let bad = Config { exclude: vec!["[".to_string()], ..Config::default() };
    assert!(matches!(bad.exclude_set(), Err(ConfigError::Glob { .. })));
}
