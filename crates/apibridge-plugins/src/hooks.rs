//! Per-API enrichment hooks.
//!
//! Some APIs need more than generic parameter routing: a placeholder that
//! must be resolved with an auxiliary call, or human-friendly fields that the
//! upstream endpoint expects pre-encoded.  Hooks are opt-in, keyed by
//! `(plugin, action)`, and run on the argument object before routing.  They
//! fail closed: missing or ambiguous input produces a failed outcome, never a
//! guessed request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value, json};

use apibridge_manifest::{CredentialRecord, Manifest};

use crate::transport::HttpTransport;

/// Channel for asking the end user a question mid-execution.  The answer is
/// the user's raw reply.
#[async_trait]
pub trait AskUser: Send + Sync {
    async fn ask(&self, question: &str) -> String;
}

/// Per-call execution context, threaded from the caller down to hooks.
#[derive(Default, Clone)]
pub struct CallContext {
    /// The conversation session the call belongs to, when there is one.
    pub session_id: Option<String>,
    /// Channel for clarifying questions to the end user.
    pub ask: Option<Arc<dyn AskUser>>,
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("session_id", &self.session_id)
            .field("ask", &self.ask.is_some())
            .finish()
    }
}

/// What a hook sees while enriching: the owning manifest, the credential
/// record, the transport (for auxiliary calls), and the call context.
pub struct HookContext<'a> {
    /// The manifest the action belongs to.
    pub manifest: &'a Manifest,
    /// Credentials for the owning API.
    pub credentials: &'a CredentialRecord,
    /// Transport for auxiliary requests a hook may need to make.
    pub transport: &'a dyn HttpTransport,
    /// The session this call belongs to, when executing inside a conversation.
    pub session_id: Option<&'a str>,
    /// Channel for asking the end user a clarifying question.
    pub ask: Option<&'a Arc<dyn AskUser>>,
}

/// A transformation applied to an action's arguments before routing.
#[async_trait]
pub trait EnrichmentHook: Send + Sync {
    /// Rewrite the argument object.
    ///
    /// # Errors
    ///
    /// Returns a reason string when required inputs are missing or ambiguous;
    /// the compiler converts it into a failed outcome.
    async fn enrich(
        &self,
        ctx: &HookContext<'_>,
        params: Map<String, Value>,
    ) -> Result<Map<String, Value>, String>;
}

/// The opt-in hook table, keyed by `(plugin, action)`.
#[derive(Default, Clone)]
pub struct HookTable {
    hooks: HashMap<(String, String), Arc<dyn EnrichmentHook>>,
}

impl HookTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for one manifest action.  Replaces any previous hook
    /// for the same pair.
    pub fn insert(
        &mut self,
        plugin: impl Into<String>,
        action: impl Into<String>,
        hook: Arc<dyn EnrichmentHook>,
    ) {
        self.hooks.insert((plugin.into(), action.into()), hook);
    }

    /// Look up the hook for one manifest action.
    pub fn get(&self, plugin: &str, action: &str) -> Option<Arc<dyn EnrichmentHook>> {
        self.hooks
            .get(&(plugin.to_owned(), action.to_owned()))
            .cloned()
    }
}

impl std::fmt::Debug for HookTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTable")
            .field("entries", &self.hooks.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in hooks
// ---------------------------------------------------------------------------

/// Converts human-supplied `to` / `subject` / `body` fields into a single
/// base64url-encoded RFC 2822 envelope, for mail APIs that expect the raw
/// message format.
///
/// The encoded value replaces the three input fields under `target_field`.
pub struct MailEnvelopeHook {
    /// The body-parameter name the encoded envelope is written to.
    pub target_field: String,
}

impl MailEnvelopeHook {
    /// Create a hook writing to the given body field (commonly `raw`).
    pub fn new(target_field: impl Into<String>) -> Self {
        Self {
            target_field: target_field.into(),
        }
    }
}

#[async_trait]
impl EnrichmentHook for MailEnvelopeHook {
    async fn enrich(
        &self,
        _ctx: &HookContext<'_>,
        mut params: Map<String, Value>,
    ) -> Result<Map<String, Value>, String> {
        let field = |params: &Map<String, Value>, key: &str| -> Result<String, String> {
            params
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| format!("cannot build mail envelope: missing field `{key}`"))
        };

        let to = field(&params, "to")?;
        let subject = field(&params, "subject")?;
        let body = field(&params, "body")?;

        let message = format!(
            "To: {to}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}"
        );
        let encoded = URL_SAFE_NO_PAD.encode(message.as_bytes());

        params.remove("to");
        params.remove("subject");
        params.remove("body");
        params.insert(self.target_field.clone(), json!(encoded));

        Ok(params)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpRequest, HttpResponse, TransportError};
    use apibridge_manifest::parse_manifest_value;

    struct NullTransport;

    #[async_trait]
    impl HttpTransport for NullTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError("no network in tests".into()))
        }
    }

    fn manifest() -> Manifest {
        parse_manifest_value(serde_json::json!({
            "schema_version": "1.0",
            "name": "mail",
            "base_url": "https://mail.example.com",
            "actions": [],
        }))
        .unwrap()
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn mail_hook_encodes_envelope() {
        let manifest = manifest();
        let creds = CredentialRecord::empty();
        let transport = NullTransport;
        let ctx = HookContext {
            manifest: &manifest,
            credentials: &creds,
            transport: &transport,
            session_id: None,
            ask: None,
        };

        let hook = MailEnvelopeHook::new("raw");
        let out = hook
            .enrich(
                &ctx,
                args(json!({"to": "a@b.c", "subject": "Hi", "body": "Hello"})),
            )
            .await
            .unwrap();

        assert!(out.get("to").is_none());
        assert!(out.get("subject").is_none());
        assert!(out.get("body").is_none());

        let raw = out["raw"].as_str().unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(raw).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.starts_with("To: a@b.c\r\nSubject: Hi\r\n"));
        assert!(text.ends_with("\r\n\r\nHello"));
    }

    #[tokio::test]
    async fn mail_hook_fails_closed_on_missing_field() {
        let manifest = manifest();
        let creds = CredentialRecord::empty();
        let transport = NullTransport;
        let ctx = HookContext {
            manifest: &manifest,
            credentials: &creds,
            transport: &transport,
            session_id: None,
            ask: None,
        };

        let hook = MailEnvelopeHook::new("raw");
        let err = hook
            .enrich(&ctx, args(json!({"to": "a@b.c", "subject": "Hi"})))
            .await
            .unwrap_err();
        assert!(err.contains("missing field `body`"));
    }

    #[test]
    fn table_lookup_is_keyed_by_pair() {
        let mut table = HookTable::new();
        table.insert("mail", "send", Arc::new(MailEnvelopeHook::new("raw")));

        assert!(table.get("mail", "send").is_some());
        assert!(table.get("mail", "list").is_none());
        assert!(table.get("other", "send").is_none());
    }
}
