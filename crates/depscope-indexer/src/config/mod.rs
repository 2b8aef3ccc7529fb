//! Project configuration loaded from `depscope.toml`

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "depscope.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Context lines on each side of a highlighted cause.
    pub snippet_padding: usize,
    /// Hard ceiling on causal path length.
    pub max_path_depth: usize,
    /// Globs of unit paths left out of the graph.
    pub exclude: Vec<String>,
    /// Manifest path, relative to the project root.
    pub manifest: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            snippet_padding: 5,
            max_path_depth: depscope_core::DEFAULT_MAX_PATH_DEPTH,
            exclude: Vec::new(),
            manifest: PathBuf::from("depscope.manifest.json"),
        }
    }
}

impl Config {
    /// Load `depscope.toml` from `root`; a missing file gives the defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml { path, source })
    }

    pub fn exclude_set(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ConfigError::Glob {
            pattern: self.exclude.join(","),
            source,
        })
    }

    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        root.join(&self.manifest)
    }
}
