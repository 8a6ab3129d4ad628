//! Manifest error types.

/// Errors raised while parsing or validating a manifest document.
///
/// All of these are configuration errors: they are surfaced before any
/// conversation or tool call happens.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The document is not valid JSON or does not match the manifest shape.
    #[error("manifest parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The `schema_version` field is missing or not a supported version.
    #[error("unsupported manifest schema version `{found}` (expected `{expected}`)")]
    UnsupportedSchemaVersion { found: String, expected: String },

    /// A manifest or action name violates the allowed slug character set.
    #[error("invalid name `{name}`: {reason}")]
    InvalidName { name: String, reason: String },

    /// The `base_url` field is not a parseable absolute URL.
    #[error("invalid base_url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// Two actions in the same manifest share an id.
    #[error("duplicate action id `{id}`")]
    DuplicateActionId { id: String },

    /// Two parameters of the same action share a name.
    #[error("duplicate parameter `{name}` in action `{action}`")]
    DuplicateParameter { action: String, name: String },

    /// A `{placeholder}` in an action path has no matching `in=path` parameter.
    #[error("action `{action}` path references `{{{placeholder}}}` but declares no matching path parameter")]
    UnboundPlaceholder { action: String, placeholder: String },

    /// An `in=path` parameter does not appear as a placeholder in the path.
    #[error("action `{action}` declares path parameter `{name}` but the path has no `{{{name}}}` placeholder")]
    UnusedPathParameter { action: String, name: String },

    /// An auth scheme field that must be non-empty is empty.
    #[error("auth scheme `{scheme}` is missing required field `{field}`")]
    IncompleteAuth { scheme: String, field: String },
}

/// Convenience alias used throughout the manifest crate.
pub type Result<T> = std::result::Result<T, ManifestError>;
