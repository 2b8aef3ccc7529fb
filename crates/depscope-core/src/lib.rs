//! depscope core: dependency graph model, recompile closure and path cache

pub mod graph;
pub mod model;
pub mod closure;
pub mod cache;
pub mod search;


pub use model::{
    CausalPath, CodeSnippet, DependencyCause, DependencyKind, DependencyLink, FileEntry,
    RecompileDependency, RecompileReason, RecompileSet, Unit, UnitId, UnitSummary,
};
pub use graph::DependencyGraph;
pub use closure::{recompile_all, recompile_dependencies, recompile_dependencies_bounded, DEFAULT_MAX_PATH_DEPTH};
pub use cache::{CacheKey, PathCache};
pub use search::search_units;
