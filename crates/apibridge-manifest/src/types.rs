//! Manifest type definitions.
//!
//! A manifest is a declarative JSON description of a remote HTTP API: a base
//! URL, an auth scheme, and a list of callable actions with typed parameters.
//! Manifests are external input and immutable once loaded; the compiler in
//! `apibridge-plugins` turns them into executable plugins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The manifest schema version this crate understands.
pub const SCHEMA_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// HTTP method
// ---------------------------------------------------------------------------

/// HTTP methods an action may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Whether this method may carry a request body.
    ///
    /// Only mutating methods serialize collected `body` parameters as a
    /// payload; `GET`/`DELETE` never send one.
    pub fn accepts_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    /// The canonical wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Where a parameter value is placed in the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// Appended to the query string.
    Query,
    /// Substituted into a `{name}` placeholder in the path.
    Path,
    /// Sent as a request header.
    Header,
    /// Collected into the JSON request body.
    Body,
}

/// The declared type of a parameter, used for schema generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

/// A single typed parameter of a declared action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredParameter {
    /// Parameter name, unique within its action.
    pub name: String,

    /// Human-readable description surfaced to the model.
    #[serde(default)]
    pub description: String,

    /// Where the value is routed in the outgoing request.
    #[serde(rename = "in")]
    pub location: ParamLocation,

    /// Whether the model must supply a value.
    #[serde(default)]
    pub required: bool,

    /// Declared value type.
    #[serde(rename = "type", default)]
    pub param_type: ParamType,

    /// Value used when the model omits this parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Closed set of allowed values, if the parameter is enumerated.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// One callable operation declared by a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredAction {
    /// Action identifier, unique within the manifest.
    pub id: String,

    /// Human-readable description surfaced to the model.
    #[serde(default)]
    pub description: String,

    /// HTTP method used for the call.
    pub method: HttpMethod,

    /// Path appended to the manifest's `base_url`.  May contain `{name}`
    /// placeholders, each of which must match an `in=path` parameter.
    pub path: String,

    /// Typed parameters accepted by this action.
    #[serde(default)]
    pub parameters: Vec<DeclaredParameter>,

    /// Whether a frontend should ask the user before executing.
    #[serde(default)]
    pub confirm: bool,
}

impl DeclaredAction {
    /// Look up a declared parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&DeclaredParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Extract the `{name}` placeholders from the action path, in order.
    pub fn path_placeholders(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    out.push(&after[..close]);
                    rest = &after[close + 1..];
                }
                None => break,
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Auth schemes
// ---------------------------------------------------------------------------

/// How credentials are injected into outgoing requests.
///
/// The runtime only *consumes* credentials; token acquisition (OAuth flows,
/// key provisioning) happens outside this system.  The `oauth2` variant's
/// URLs and scopes are carried for display and introspection only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// No authentication.
    #[default]
    None,

    /// `Authorization: Bearer <token>` from the credential record.
    Bearer,

    /// A static key sent in a manifest-configured header.
    ApiKey {
        /// The header name the key is sent under (e.g. `X-Api-Key`).
        api_key_header: String,
    },

    /// `Authorization: Bearer <access_token>` from a previously acquired
    /// OAuth 2.0 token.
    Oauth2 {
        /// The provider's authorization endpoint (display only).
        authorization_url: String,
        /// The provider's token endpoint (display only).
        token_url: String,
        /// Scope name → human description (display only).
        #[serde(default)]
        scopes: BTreeMap<String, String>,
    },
}

impl AuthScheme {
    /// Short lowercase label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bearer => "bearer",
            Self::ApiKey { .. } => "api_key",
            Self::Oauth2 { .. } => "oauth2",
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// A complete API manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Document schema version; must equal [`SCHEMA_VERSION`].
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Globally unique slug identifying this API.
    pub name: String,

    /// One-line description shown in the system prompt and tool listings.
    #[serde(default)]
    pub description: String,

    /// Manifest version string (informational).
    #[serde(default)]
    pub version: String,

    /// Base URL every action path is resolved against.
    pub base_url: String,

    /// How credentials are injected, if at all.
    #[serde(default)]
    pub auth: AuthScheme,

    /// The callable actions this API exposes.
    #[serde(default)]
    pub actions: Vec<DeclaredAction>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_owned()
}

impl Manifest {
    /// Look up a declared action by id.
    pub fn action(&self, id: &str) -> Option<&DeclaredAction> {
        self.actions.iter().find(|a| a.id == id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_body_rules() {
        assert!(!HttpMethod::Get.accepts_body());
        assert!(HttpMethod::Post.accepts_body());
        assert!(HttpMethod::Put.accepts_body());
        assert!(HttpMethod::Patch.accepts_body());
        assert!(!HttpMethod::Delete.accepts_body());
    }

    #[test]
    fn path_placeholder_extraction() {
        let action: DeclaredAction = serde_json::from_value(json!({
            "id": "get_item",
            "method": "GET",
            "path": "/users/{user_id}/items/{id}",
        }))
        .unwrap();
        assert_eq!(action.path_placeholders(), vec!["user_id", "id"]);
    }

    #[test]
    fn path_without_placeholders() {
        let action: DeclaredAction = serde_json::from_value(json!({
            "id": "list",
            "method": "GET",
            "path": "/items",
        }))
        .unwrap();
        assert!(action.path_placeholders().is_empty());
    }

    #[test]
    fn auth_scheme_tagged_parsing() {
        let api_key: AuthScheme =
            serde_json::from_value(json!({"type": "api_key", "api_key_header": "X-Api-Key"}))
                .unwrap();
        assert_eq!(api_key.label(), "api_key");

        let oauth: AuthScheme = serde_json::from_value(json!({
            "type": "oauth2",
            "authorization_url": "https://example.com/authorize",
            "token_url": "https://example.com/token",
            "scopes": {"read": "Read access"},
        }))
        .unwrap();
        assert_eq!(oauth.label(), "oauth2");

        let none: AuthScheme = serde_json::from_value(json!({"type": "none"})).unwrap();
        assert_eq!(none, AuthScheme::None);
    }

    #[test]
    fn parameter_defaults() {
        let p: DeclaredParameter = serde_json::from_value(json!({
            "name": "limit",
            "in": "query",
        }))
        .unwrap();
        assert!(!p.required);
        assert_eq!(p.param_type, ParamType::String);
        assert!(p.default.is_none());
        assert!(p.enum_values.is_none());
    }

    #[test]
    fn enum_values_round_trip() {
        let p: DeclaredParameter = serde_json::from_value(json!({
            "name": "sort",
            "in": "query",
            "type": "string",
            "enum": ["asc", "desc"],
        }))
        .unwrap();
        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["enum"], json!(["asc", "desc"]));
        assert_eq!(back["in"], "query");
    }
}
