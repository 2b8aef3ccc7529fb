//! Test utilities for depscope-indexer

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::manifest::InMemoryManifest;
use crate::scanner::SourceFile;

/// Parse an in-memory source, panicking on parse errors.
pub fn source(text: &str) -> SourceFile {
    SourceFile::parse("test.ex", text).unwrap()
}

pub fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

/// Create a temporary project with one unit per file:
///
/// - `lib/user.ex` defines the `User` struct and `User.new/1`
/// - `lib/account.ex` builds a `%User{}` in a function (exports)
/// - `lib/report.ex` calls `User.new/1` in a function (runtime)
/// - `lib/settings.ex` calls `User.new/1` in a module attribute (compile)
/// - `lib/web.ex` defines `__using__/1`, `lib/page.ex` uses it (compile)
/// - `lib/broken.ex` does not parse, `lib/ghost.ex` does not exist
pub fn create_test_project() -> (TempDir, InMemoryManifest) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    write(root, "lib/user.ex", r#"defmodule User do
  defstruct [:name]

  def new(name), do: %User{name: name}
end
"#);

    write(root, "lib/account.ex", r#"defmodule Account do
  def owner(name) do
    %User{name: name}
  end
end
"#);

    write(root, "lib/report.ex", r#"defmodule Report do
  def render(name) do
    User.new(name)
  end
end
"#);

    write(root, "lib/settings.ex", r#"defmodule Settings do
  @default User.new("root")

  def default, do: @default
end
"#);

    write(root, "lib/web.ex", r#"defmodule Web do
  defmacro __using__(_opts) do
    quote do
      import Web
    end
  end
end
"#);

    write(root, "lib/page.ex", r#"defmodule Page do
  use Web
end
"#);

    write(root, "lib/broken.ex", r#"defmodule Broken do
  def oops(
end
"#);

    let manifest = InMemoryManifest::new()
        .with_unit("lib/user.ex", root.join("lib/user.ex"), &["User"])
        .with_unit("lib/account.ex", root.join("lib/account.ex"), &["Account"])
        .with_unit("lib/report.ex", root.join("lib/report.ex"), &["Report"])
        .with_unit("lib/settings.ex", root.join("lib/settings.ex"), &["Settings"])
        .with_unit("lib/web.ex", root.join("lib/web.ex"), &["Web"])
        .with_unit("lib/page.ex", root.join("lib/page.ex"), &["Page"])
        .with_unit("lib/broken.ex", root.join("lib/broken.ex"), &["Broken"])
        .with_unit("lib/ghost.ex", root.join("lib/ghost.ex"), &["Ghost"]);

    (temp_dir, manifest)
}
