//! Manifest parsing and structural validation.
//!
//! Parsing accepts a JSON document and checks it against the rules the rest
//! of the runtime relies on: slug-safe names, unique action ids, and agreement
//! between `{placeholder}` segments and `in=path` parameters.  Everything here
//! fails fast — a manifest that parses is safe to compile.

use std::collections::HashSet;

use crate::error::{ManifestError, Result};
use crate::types::{AuthScheme, Manifest, ParamLocation, SCHEMA_VERSION};

/// The separator used when encoding tool names (`plugin__action`).  Names may
/// contain single underscores but never this sequence, which keeps the
/// encoding reversible.
pub const NAME_SEPARATOR: &str = "__";

/// Parse and validate a manifest from a JSON string.
pub fn parse_manifest(input: &str) -> Result<Manifest> {
    let manifest: Manifest = serde_json::from_str(input)?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Parse and validate a manifest from an already-deserialized JSON value.
pub fn parse_manifest_value(value: serde_json::Value) -> Result<Manifest> {
    let manifest: Manifest = serde_json::from_value(value)?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Check whether a name is a valid slug: ASCII alphanumerics, `_`, and `-`,
/// non-empty, and free of the tool-name separator.
pub fn is_valid_slug(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(NAME_SEPARATOR)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Validate a parsed manifest.
///
/// # Errors
///
/// Returns the first violated rule as a typed [`ManifestError`].
pub fn validate_manifest(manifest: &Manifest) -> Result<()> {
    if manifest.schema_version != SCHEMA_VERSION {
        return Err(ManifestError::UnsupportedSchemaVersion {
            found: manifest.schema_version.clone(),
            expected: SCHEMA_VERSION.to_owned(),
        });
    }

    if !is_valid_slug(&manifest.name) {
        return Err(ManifestError::InvalidName {
            name: manifest.name.clone(),
            reason: "manifest names are slugs: [A-Za-z0-9_-]+ without `__`".into(),
        });
    }

    url::Url::parse(&manifest.base_url).map_err(|e| ManifestError::InvalidBaseUrl {
        url: manifest.base_url.clone(),
        reason: e.to_string(),
    })?;

    validate_auth(&manifest.auth)?;

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for action in &manifest.actions {
        if !is_valid_slug(&action.id) {
            return Err(ManifestError::InvalidName {
                name: action.id.clone(),
                reason: "action ids are slugs: [A-Za-z0-9_-]+ without `__`".into(),
            });
        }
        if !seen_ids.insert(action.id.as_str()) {
            return Err(ManifestError::DuplicateActionId {
                id: action.id.clone(),
            });
        }

        let mut seen_params: HashSet<&str> = HashSet::new();
        for param in &action.parameters {
            if !seen_params.insert(param.name.as_str()) {
                return Err(ManifestError::DuplicateParameter {
                    action: action.id.clone(),
                    name: param.name.clone(),
                });
            }
        }

        // Placeholders and path parameters must agree in both directions.
        let placeholders = action.path_placeholders();
        for placeholder in &placeholders {
            let bound = action
                .parameter(placeholder)
                .is_some_and(|p| p.location == ParamLocation::Path);
            if !bound {
                return Err(ManifestError::UnboundPlaceholder {
                    action: action.id.clone(),
                    placeholder: (*placeholder).to_owned(),
                });
            }
        }
        for param in &action.parameters {
            if param.location == ParamLocation::Path
                && !placeholders.contains(&param.name.as_str())
            {
                return Err(ManifestError::UnusedPathParameter {
                    action: action.id.clone(),
                    name: param.name.clone(),
                });
            }
        }
    }

    Ok(())
}

/// The tagged deserializer guarantees the fields exist; this rejects the
/// empty strings it still lets through.
fn validate_auth(auth: &AuthScheme) -> Result<()> {
    let incomplete = |field: &str| ManifestError::IncompleteAuth {
        scheme: auth.label().to_owned(),
        field: field.to_owned(),
    };

    match auth {
        AuthScheme::None | AuthScheme::Bearer => {}
        AuthScheme::ApiKey { api_key_header } => {
            if api_key_header.is_empty() {
                return Err(incomplete("api_key_header"));
            }
        }
        AuthScheme::Oauth2 {
            authorization_url,
            token_url,
            ..
        } => {
            if authorization_url.is_empty() {
                return Err(incomplete("authorization_url"));
            }
            if token_url.is_empty() {
                return Err(incomplete("token_url"));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_manifest() -> serde_json::Value {
        json!({
            "schema_version": "1.0",
            "name": "library",
            "description": "A book library API",
            "version": "1.0.0",
            "base_url": "https://api.example.com",
            "actions": [
                {
                    "id": "get_book",
                    "description": "Fetch one book by id",
                    "method": "GET",
                    "path": "/books/{id}",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "type": "string"}
                    ]
                }
            ]
        })
    }

    #[test]
    fn parses_valid_manifest() {
        let manifest = parse_manifest_value(base_manifest()).unwrap();
        assert_eq!(manifest.name, "library");
        assert_eq!(manifest.actions.len(), 1);
        assert_eq!(manifest.actions[0].id, "get_book");
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let mut doc = base_manifest();
        doc["schema_version"] = json!("2.0");
        let err = parse_manifest_value(doc).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::UnsupportedSchemaVersion { .. }
        ));
    }

    #[test]
    fn rejects_separator_in_name() {
        let mut doc = base_manifest();
        doc["name"] = json!("my__api");
        let err = parse_manifest_value(doc).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidName { .. }));
    }

    #[test]
    fn rejects_invalid_base_url() {
        let mut doc = base_manifest();
        doc["base_url"] = json!("not a url");
        let err = parse_manifest_value(doc).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn rejects_duplicate_action_ids() {
        let mut doc = base_manifest();
        let action = doc["actions"][0].clone();
        doc["actions"].as_array_mut().unwrap().push(action);
        let err = parse_manifest_value(doc).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateActionId { .. }));
    }

    #[test]
    fn rejects_unbound_placeholder() {
        let mut doc = base_manifest();
        doc["actions"][0]["parameters"] = json!([]);
        let err = parse_manifest_value(doc).unwrap_err();
        assert!(matches!(err, ManifestError::UnboundPlaceholder { .. }));
    }

    #[test]
    fn rejects_path_param_without_placeholder() {
        let mut doc = base_manifest();
        doc["actions"][0]["path"] = json!("/books");
        let err = parse_manifest_value(doc).unwrap_err();
        assert!(matches!(err, ManifestError::UnusedPathParameter { .. }));
    }

    #[test]
    fn rejects_duplicate_parameter_names() {
        let mut doc = base_manifest();
        doc["actions"][0]["parameters"]
            .as_array_mut()
            .unwrap()
            .push(json!({"name": "id", "in": "query"}));
        let err = parse_manifest_value(doc).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateParameter { .. }));
    }

    #[test]
    fn rejects_empty_auth_fields() {
        let mut doc = base_manifest();
        doc["auth"] = json!({"type": "api_key", "api_key_header": ""});
        let err = parse_manifest_value(doc).unwrap_err();
        assert!(matches!(err, ManifestError::IncompleteAuth { .. }));

        let mut doc = base_manifest();
        doc["auth"] = json!({
            "type": "oauth2",
            "authorization_url": "https://auth.example.com/authorize",
            "token_url": "",
            "scopes": {},
        });
        let err = parse_manifest_value(doc).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::IncompleteAuth { ref field, .. } if field.as_str() == "token_url"
        ));
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("spotify"));
        assert!(is_valid_slug("my_api-v2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("has space"));
        assert!(!is_valid_slug("double__under"));
    }
}
