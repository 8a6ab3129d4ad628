//! Credential record accessors.
//!
//! A credential record is an opaque key/value map handed to the runtime by
//! an external vault.  The runtime never mutates or persists it; this module
//! only provides the typed lookups the compiler needs for auth injection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An opaque credential map for one API.
///
/// Known keys: `token`, `api_key`, `oauth_client_id`, and a nested `oauth`
/// object carrying `access_token` / `refresh_token` / `client_id` /
/// `client_secret` / `expires_at`.  Unknown keys are preserved untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CredentialRecord(pub Map<String, Value>);

impl CredentialRecord {
    /// Create an empty record (no credentials available).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Raw lookup of a top-level string field.
    fn top_level_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The bearer token: `token`, falling back to `api_key`.
    pub fn bearer_token(&self) -> Option<&str> {
        self.top_level_str("token")
            .or_else(|| self.top_level_str("api_key"))
    }

    /// The API key value: `api_key`, falling back to `token`.
    pub fn api_key(&self) -> Option<&str> {
        self.top_level_str("api_key")
            .or_else(|| self.top_level_str("token"))
    }

    /// The OAuth access token.
    ///
    /// Priority order: the nested `oauth.access_token` sub-record first, then
    /// a top-level `access_token` field.
    pub fn oauth_access_token(&self) -> Option<&str> {
        self.0
            .get("oauth")
            .and_then(|v| v.get("access_token"))
            .and_then(Value::as_str)
            .or_else(|| self.top_level_str("access_token"))
    }

    /// Whether the record carries no entries at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for CredentialRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> CredentialRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn bearer_prefers_token_over_api_key() {
        let creds = record(json!({"token": "tok-1", "api_key": "key-1"}));
        assert_eq!(creds.bearer_token(), Some("tok-1"));
    }

    #[test]
    fn api_key_falls_back_to_token() {
        let creds = record(json!({"token": "tok-1"}));
        assert_eq!(creds.api_key(), Some("tok-1"));
    }

    #[test]
    fn oauth_nested_beats_top_level() {
        let creds = record(json!({
            "access_token": "top",
            "oauth": {"access_token": "nested", "refresh_token": "r"}
        }));
        assert_eq!(creds.oauth_access_token(), Some("nested"));
    }

    #[test]
    fn oauth_top_level_fallback() {
        let creds = record(json!({"access_token": "top"}));
        assert_eq!(creds.oauth_access_token(), Some("top"));
    }

    #[test]
    fn empty_record_yields_nothing() {
        let creds = CredentialRecord::empty();
        assert!(creds.is_empty());
        assert!(creds.bearer_token().is_none());
        assert!(creds.api_key().is_none());
        assert!(creds.oauth_access_token().is_none());
    }
}
