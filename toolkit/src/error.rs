// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Errors surfaced by the public toolkit operations
//!
//! Per-source failures (a missing eval result, an unreadable statistics file)
//! never reach this type: the scaffolder logs them and moves on.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolkitError>;

#[derive(Debug, Error)]
pub enum ToolkitError {
    /// No artifact in the lineage store has the given model URI
    #[error("\"{uri}\" cannot be found in the lineage store")]
    ModelUriNotFound { uri: String },

    /// A lineage store was supplied without a model URI to resolve
    #[error("a model URI is required when a lineage store is set")]
    StoreWithoutModelUri,

    /// A model URI was supplied without a lineage store to resolve it against
    #[error("model URI \"{uri}\" was given without a lineage store")]
    ModelUriWithoutStore { uri: String },

    /// The lineage store failed while resolving the binding
    #[error("lineage store query failed for \"{uri}\": {source}")]
    Lineage {
        uri: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{0}")]
    Precondition(String),

    /// Nothing has been persisted at the record path yet
    #[error("no model card has been scaffolded at {}", path.display())]
    NotScaffolded { path: PathBuf },

    #[error("malformed model card record{}: {reason}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    MalformedRecord {
        path: Option<PathBuf>,
        reason: String,
    },

    /// A built-in template named in the manifest is not in the registry
    #[error("cannot find built-in template resource '{name}'")]
    TemplateResourceMissing { name: String },

    /// A document name that is not a single plain file name
    #[error("invalid output name '{name}': expected a plain file name")]
    InvalidOutputName { name: String },

    #[error("template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    #[error("failed to render template {}: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to encode model card: {0}")]
    Encode(String),

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ToolkitError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures raised while binding the lineage store
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ModelUriNotFound { .. }
                | Self::StoreWithoutModelUri
                | Self::ModelUriWithoutStore { .. }
                | Self::Lineage { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = ToolkitError::ModelUriNotFound {
            uri: "/models/a".to_string(),
        };
        assert!(err.to_string().contains("/models/a"));
        assert!(err.is_configuration());

        let err = ToolkitError::MalformedRecord {
            path: Some(PathBuf::from("/tmp/x/data/model_card.proto")),
            reason: "truncated".to_string(),
        };
        assert!(err.to_string().contains("model_card.proto"));
        assert!(!err.is_configuration());

        let err = ToolkitError::TemplateResourceMissing {
            name: "html/missing.jinja".to_string(),
        };
        assert!(err.to_string().contains("html/missing.jinja"));

        let err = ToolkitError::InvalidOutputName {
            name: "../card.html".to_string(),
        };
        assert!(err.to_string().contains("../card.html"));
        assert!(!err.is_configuration());
    }
}
