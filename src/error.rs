use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong between reading the résumé JSON and writing the PDF.
#[derive(Debug, Error)]
pub enum Error {
    #[error("JSON file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid JSON format in {}: {source}", .path.display())]
    MalformedInput {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    SchemaViolation(String),

    #[error("Template '{name}' not found")]
    TemplateNotFound { name: String, available: Vec<String> },

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
