use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by catalog loaders and sinks.
///
/// None of these are fatal: the store logs them and carries on with whatever
/// it has in memory.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("facts directory {} not found", .0.display())]
    MissingDirectory(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode theme '{theme}': {source}")]
    Encode {
        theme: String,
        source: serde_json::Error,
    },

    #[error("failed to write theme '{theme}': {source}")]
    Write {
        theme: String,
        source: std::io::Error,
    },

    #[error("invalid theme name '{0}'")]
    InvalidTheme(String),
}
