//! Plugin error types.

use apibridge_manifest::ManifestError;

/// Errors raised by the plugin compiler and registry.
///
/// These are load-time configuration errors.  Failures during action
/// *execution* never surface here — they are converted into structured
/// failed outcomes so the conversation can continue.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The underlying manifest failed to parse or validate.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A plugin with the same name is already registered.
    #[error("plugin `{name}` is already registered")]
    DuplicateName { name: String },

    /// An encoded tool name does not resolve to a registered action.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// An encoded tool name cannot be decoded.
    #[error("malformed tool name `{name}`: {reason}")]
    MalformedToolName { name: String, reason: String },

    /// A plugin's setup or teardown hook failed during (un)registration.
    #[error("lifecycle hook failed for plugin `{plugin}`: {reason}")]
    Lifecycle { plugin: String, reason: String },
}

/// Convenience alias used throughout the plugins crate.
pub type Result<T> = std::result::Result<T, PluginError>;
