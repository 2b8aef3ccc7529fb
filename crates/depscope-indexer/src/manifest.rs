//! Compiled-unit manifest: the build system's record of units and exports.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// One compiled unit as reported by the build system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: String,
    pub source: PathBuf,
    pub modules: Vec<String>,
    /// Modules the compiler saw referenced; unioned with what the scanner finds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// Public surface of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleExports {
    #[serde(default)]
    pub functions: BTreeSet<(String, usize)>,
    #[serde(default)]
    pub macros: BTreeSet<(String, usize)>,
}

impl ModuleExports {
    pub fn has_function(&self, name: &str, arity: usize) -> bool {
        self.functions.contains(&(name.to_string(), arity))
    }

    pub fn has_macro(&self, name: &str, arity: usize) -> bool {
        self.macros.contains(&(name.to_string(), arity))
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.macros.is_empty()
    }
}

/// Source of compiled-unit records and module exports.
pub trait ManifestReader: Send + Sync {
    fn list_compiled_units(&self) -> Vec<UnitRecord>;

    /// `None` when the manifest has no export table for `module`.
    fn list_module_exports(&self, module: &str) -> Option<ModuleExports>;
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    units: Vec<UnitRecord>,
    #[serde(default)]
    exports: HashMap<String, ModuleExports>,
}

/// Manifest loaded from `depscope.manifest.json`.
#[derive(Debug, Clone)]
pub struct JsonManifest {
    units: Vec<UnitRecord>,
    exports: HashMap<String, ModuleExports>,
}

impl JsonManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_str(&root, &text).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse manifest JSON; relative sources are resolved against `root`.
    pub fn from_str(root: &Path, text: &str) -> Result<Self, serde_json::Error> {
        let file: ManifestFile = serde_json::from_str(text)?;
        let units = file
            .units
            .into_iter()
            .map(|mut unit| {
                if unit.source.is_relative() {
                    unit.source = root.join(&unit.source);
                }
                unit
            })
            .collect();
        Ok(JsonManifest {
            units,
            exports: file.exports,
        })
    }
}

impl ManifestReader for JsonManifest {
    fn list_compiled_units(&self) -> Vec<UnitRecord> {
        self.units.clone()
    }

    fn list_module_exports(&self, module: &str) -> Option<ModuleExports> {
        self.exports.get(module).cloned()
    }
}

/// Manifest built in code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryManifest {
    units: Vec<UnitRecord>,
    exports: HashMap<String, ModuleExports>,
}

impl InMemoryManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, id: &str, source: impl Into<PathBuf>, modules: &[&str]) -> Self {
        self.units.push(UnitRecord {
            id: id.to_string(),
            source: source.into(),
            modules: modules.iter().map(|m| m.to_string()).collect(),
            references: Vec::new(),
        });
        self
    }

    pub fn with_exports(mut self, module: &str, exports: ModuleExports) -> Self {
        self.exports.insert(module.to_string(), exports);
        self
    }
}

impl ManifestReader for InMemoryManifest {
    fn list_compiled_units(&self) -> Vec<UnitRecord> {
        self.units.clone()
    }

    fn list_module_exports(&self, module: &str) -> Option<ModuleExports> {
        self.exports.get(module).cloned()
    }
}
