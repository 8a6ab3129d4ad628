//! Tool-name encoding.
//!
//! A model-facing tool name is the pair `(plugin, action)` joined by `__`.
//! Slug validation (in `apibridge-manifest`) guarantees neither component
//! contains the separator, which makes decoding a strict inverse of
//! encoding.

use apibridge_manifest::{NAME_SEPARATOR, is_valid_slug};

use crate::error::{PluginError, Result};

/// Encode a `(plugin, action)` pair into a model-facing tool name.
pub fn encode_tool_name(plugin: &str, action: &str) -> String {
    format!("{plugin}{NAME_SEPARATOR}{action}")
}

/// Decode a tool name back into its `(plugin, action)` pair.
///
/// # Errors
///
/// A name without the separator, with empty components, or with components
/// outside the slug character set is a hard error — it can only come from a
/// misbehaving caller, never from our own encoding.
pub fn parse_tool_name(name: &str) -> Result<(String, String)> {
    let (plugin, action) =
        name.split_once(NAME_SEPARATOR)
            .ok_or_else(|| PluginError::MalformedToolName {
                name: name.to_owned(),
                reason: format!("missing `{NAME_SEPARATOR}` separator"),
            })?;

    if !is_valid_slug(plugin) || !is_valid_slug(action) {
        return Err(PluginError::MalformedToolName {
            name: name.to_owned(),
            reason: "plugin and action components must be non-empty slugs".into(),
        });
    }

    Ok((plugin.to_owned(), action.to_owned()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
