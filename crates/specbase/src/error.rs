//! Error types for spec reconciliation

use crate::decl::ResourceKind;
use thiserror::Error;

/// Errors raised while loading a spec or reconciling it against the registry.
///
/// Every variant aborts the current `respec` call. Nothing is retried and
/// nothing committed before the failure is rolled back.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("No resource named '{0}'")]
    NotFound(String),

    #[error("Resource '{0}' already exists")]
    AlreadyExists(String),

    #[error("{kind} '{name}' depends on '{dependency}', which does not exist")]
    DependencyNotFound {
        name: String,
        kind: ResourceKind,
        dependency: String,
    },

    #[error("Couldn't create {kind} '{name}': {reason}")]
    CreationFailed {
        name: String,
        kind: ResourceKind,
        reason: String,
    },

    #[error("Couldn't destroy {kind} '{name}': {reason}")]
    DestructionFailed {
        name: String,
        kind: ResourceKind,
        reason: String,
    },

    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("Invalid declaration '{name}': {reason}")]
    InvalidDeclaration { name: String, reason: String },

    #[error("Keep-marker names '{0}', which does not exist")]
    KeepTargetMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpecError {
    /// Name of the resource the error is about, if any
    pub fn resource_name(&self) -> Option<&str> {
        match self {
            Self::NotFound(name)
            | Self::AlreadyExists(name)
            | Self::KeepTargetMissing(name) => Some(name),
            Self::DependencyNotFound { name, .. }
            | Self::CreationFailed { name, .. }
            | Self::DestructionFailed { name, .. }
            | Self::InvalidDeclaration { name, .. } => Some(name),
            Self::UnknownKind(_) | Self::Config(_) | Self::Io(_) | Self::Toml(_) | Self::Json(_) => {
                None
            }
        }
    }
}

/// Result type for spec operations
pub type SpecResult<T> = Result<T, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_resource() {
        let err = SpecError::DependencyNotFound {
            name: "dr".into(),
            kind: ResourceKind::DisplayRegion,
            dependency: "win".into(),
        };
        assert_eq!(
            err.to_string(),
            "display region 'dr' depends on 'win', which does not exist"
        );
        assert_eq!(err.resource_name(), Some("dr"));

        let err = SpecError::UnknownKind("lamp".into());
        assert_eq!(err.resource_name(), None);
    }
}
