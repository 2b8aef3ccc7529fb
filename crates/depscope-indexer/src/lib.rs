//! Source scanning, graph building and cause extraction

pub mod ast;
pub mod builder;
pub mod causes;
pub mod config;
pub mod error;
mod lower;
pub mod manifest;
pub mod parser;
pub mod resolver;
pub mod scanner;

#[cfg(test)]
mod tests;

#[cfg(test)]
pub mod test_utils;

pub use ast::{DefKind, Expr, Span};
pub use builder::{BuildResult, ExportTable, GraphBuilder};
pub use causes::{Cause, CauseExtractor, CauseKind};
pub use config::Config;
pub use error::{ConfigError, ManifestError, ScanError};
pub use manifest::{InMemoryManifest, JsonManifest, ManifestReader, ModuleExports, UnitRecord};
pub use resolver::NameResolver;
pub use scanner::{ExprMatch, ModuleExprKind, ModuleReference, SourceFile, StructDefinition};
