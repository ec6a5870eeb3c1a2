//! Error types for graph and configuration operations

use std::path::PathBuf;

use thiserror::Error;

/// Structural errors raised by kind-specific graph operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The handle refers to a node that has been destroyed
    #[error("node is no longer alive")]
    DeadNode,

    /// The node exists but is not of the kind the operation requires
    #[error("expected a {expected} node, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The edge would make a node its own descendant
    #[error("adding this child would create a cycle")]
    Cycle,
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors loading or saving a [`RenderConfig`](crate::config::RenderConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}
