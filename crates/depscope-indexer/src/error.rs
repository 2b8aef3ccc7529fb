//! Error types for scanning, manifests and configuration

use std::path::PathBuf;
use thiserror::Error;

/// Failure scanning one source file. Never fatal to a whole build.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("source file not found: {path}: {reason}")]
    FileNotFound { path: PathBuf, reason: String },

    #[error("module {module} is not defined in {path}")]
    ModuleNotFound { module: String, path: PathBuf },

    #[error("parse error in {path} at line {line}: {message}")]
    Parse { path: PathBuf, line: u32, message: String },
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid exclude pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
