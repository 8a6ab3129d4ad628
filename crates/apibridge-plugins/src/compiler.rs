//! Manifest compilation.
//!
//! The compiler turns one [`Manifest`] plus one optional [`CredentialRecord`]
//! into a [`Plugin`]: a set of [`CompiledAction`]s, each pairing a
//! parameter-validation schema with an executable closure over the manifest,
//! the credentials, and an injectable [`HttpTransport`].  Parameter routing
//! is the part that must be bit-exact — a body value that lands in the query
//! string silently breaks the upstream call.

use std::collections::HashMap;
use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::{Map, Value};
use tracing::warn;

use apibridge_manifest::{
    AuthScheme, CredentialRecord, DeclaredAction, Manifest, ParamLocation, validate_manifest,
};

use crate::error::Result;
use crate::hooks::{CallContext, EnrichmentHook, HookContext, HookTable};
use crate::outcome::ActionOutcome;
use crate::registry::PluginLifecycle;
use crate::schema::parameters_to_schema;
use crate::summary::{summarize_response, truncate_chars};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport};

/// Character budget for error-response bodies echoed back to the model.
const ERROR_BODY_BUDGET: usize = 500;

/// Characters percent-encoded when substituting a path placeholder.
/// Matches the url crate's path-segment set plus `%` (values are raw).
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%')
    .add(b'&')
    .add(b'+');

// ---------------------------------------------------------------------------
// Compiled action
// ---------------------------------------------------------------------------

struct ActionInner {
    manifest: Arc<Manifest>,
    action: DeclaredAction,
    credentials: Arc<CredentialRecord>,
    transport: Arc<dyn HttpTransport>,
    hook: Option<Arc<dyn EnrichmentHook>>,
    schema: Value,
}

/// One executable, schema-validated action.
///
/// Created once when a plugin is compiled and immutable thereafter; cloning
/// is cheap (shared inner state).
#[derive(Clone)]
pub struct CompiledAction {
    inner: Arc<ActionInner>,
}

impl CompiledAction {
    /// The action id, unique within its plugin.
    pub fn id(&self) -> &str {
        &self.inner.action.id
    }

    /// The human-readable description surfaced to the model.
    pub fn description(&self) -> &str {
        &self.inner.action.description
    }

    /// Whether a frontend should confirm with the user before executing.
    pub fn confirm(&self) -> bool {
        self.inner.action.confirm
    }

    /// The parameter-validation schema, derived once at compile time.
    pub fn parameter_schema(&self) -> &Value {
        &self.inner.schema
    }

    /// The declared action this was compiled from.
    pub fn declared(&self) -> &DeclaredAction {
        &self.inner.action
    }

    /// Execute the action with a JSON argument object and no call context.
    ///
    /// Never panics and never returns a Rust error: every failure mode is
    /// folded into a failed [`ActionOutcome`] so the conversation can
    /// continue.
    pub async fn execute(&self, arguments: Value) -> ActionOutcome {
        self.execute_with(arguments, &CallContext::default()).await
    }

    /// Execute the action with a per-call [`CallContext`] (session id and
    /// `ask` channel), which hooks see alongside the manifest state.
    pub async fn execute_with(&self, arguments: Value, call: &CallContext) -> ActionOutcome {
        let inner = &self.inner;

        let mut params = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return ActionOutcome::failed(format!(
                    "invalid arguments for `{}`: expected an object, got {}",
                    inner.action.id,
                    json_kind(&other)
                ));
            }
        };

        // Declared defaults fill in missing arguments.
        for param in &inner.action.parameters {
            if let Some(default) = &param.default {
                params
                    .entry(param.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        // Required parameters are checked against the caller's arguments: a
        // hook may consume declared fields while building its replacement.
        for param in &inner.action.parameters {
            if param.required && !params.contains_key(&param.name) {
                return ActionOutcome::failed(format!(
                    "missing required parameter `{}` for `{}`",
                    param.name, inner.action.id
                ));
            }
        }

        // Enrichment runs before routing; hooks fail closed.
        if let Some(hook) = &inner.hook {
            let ctx = HookContext {
                manifest: &inner.manifest,
                credentials: &inner.credentials,
                transport: inner.transport.as_ref(),
                session_id: call.session_id.as_deref(),
                ask: call.ask.as_ref(),
            };
            params = match hook.enrich(&ctx, params).await {
                Ok(enriched) => enriched,
                Err(reason) => return ActionOutcome::failed(reason),
            };
        }

        let request =
            match build_request(&inner.manifest, &inner.action, &inner.credentials, &params) {
                Ok(request) => request,
                Err(reason) => return ActionOutcome::failed(reason),
            };

        match inner.transport.send(request).await {
            Err(e) => ActionOutcome::failed(format!("Request failed: {e}")),
            Ok(response) if !response.is_success() => ActionOutcome::failed(format!(
                "{}: {}",
                response.status,
                truncate_chars(&response.body, ERROR_BODY_BUDGET)
            )),
            Ok(response) => {
                let data: Value = serde_json::from_str(&response.body)
                    .unwrap_or_else(|_| Value::String(response.body.clone()));
                let message = summarize_response(&inner.action.id, &data);
                ActionOutcome::ok(message, Some(data))
            }
        }
    }
}

impl std::fmt::Debug for CompiledAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledAction")
            .field("id", &self.inner.action.id)
            .field("method", &self.inner.action.method)
            .field("path", &self.inner.action.path)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Request building
// ---------------------------------------------------------------------------

/// Route the argument map into an outbound request.
///
/// Routing order: path substitution, query string, headers, body collection,
/// then auth injection.  The body is serialized only for mutating methods
/// and only when non-empty.
fn build_request(
    manifest: &Manifest,
    action: &DeclaredAction,
    credentials: &CredentialRecord,
    params: &Map<String, Value>,
) -> std::result::Result<HttpRequest, String> {
    let mut path = action.path.clone();
    let mut query: Vec<(String, String)> = Vec::new();
    let mut headers: HashMap<String, String> = HashMap::new();
    let mut body = Map::new();

    for param in &action.parameters {
        let Some(value) = params.get(&param.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        match param.location {
            ParamLocation::Path => {
                let encoded =
                    utf8_percent_encode(&value_to_component(value), PATH_SEGMENT).to_string();
                path = path.replace(&format!("{{{}}}", param.name), &encoded);
            }
            ParamLocation::Query => {
                query.push((param.name.clone(), value_to_component(value)));
            }
            ParamLocation::Header => {
                headers.insert(param.name.clone(), value_to_component(value));
            }
            ParamLocation::Body => {
                body.insert(param.name.clone(), value.clone());
            }
        }
    }

    // Keys introduced by an enrichment hook are not declared; they always
    // belong to the body.
    for (key, value) in params {
        if action.parameter(key).is_none() && body.get(key).is_none() {
            if action.method.accepts_body() {
                body.insert(key.clone(), value.clone());
            }
        }
    }

    let mut url = url::Url::parse(&format!(
        "{}{}",
        manifest.base_url.trim_end_matches('/'),
        path
    ))
    .map_err(|e| format!("failed to build URL for `{}`: {e}", action.id))?;

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &query {
            pairs.append_pair(name, value);
        }
    }

    inject_auth(manifest, credentials, &mut headers);

    let body = if action.method.accepts_body() && !body.is_empty() {
        Some(Value::Object(body))
    } else {
        None
    };

    Ok(HttpRequest {
        method: action.method,
        url: url.into(),
        headers,
        body,
    })
}

/// Inject credentials according to the manifest's auth scheme.
///
/// A missing credential is not an error here: the request goes out without
/// it and the upstream 401/403 is surfaced as a failed outcome.
fn inject_auth(
    manifest: &Manifest,
    credentials: &CredentialRecord,
    headers: &mut HashMap<String, String>,
) {
    match &manifest.auth {
        AuthScheme::None => {}
        AuthScheme::Bearer => match credentials.bearer_token() {
            Some(token) => {
                headers.insert("Authorization".into(), format!("Bearer {token}"));
            }
            None => warn!(plugin = %manifest.name, "bearer auth configured but no token in credentials"),
        },
        AuthScheme::ApiKey { api_key_header } => match credentials.api_key() {
            Some(key) => {
                headers.insert(api_key_header.clone(), key.to_owned());
            }
            None => warn!(plugin = %manifest.name, "api_key auth configured but no key in credentials"),
        },
        AuthScheme::Oauth2 { .. } => match credentials.oauth_access_token() {
            Some(token) => {
                headers.insert("Authorization".into(), format!("Bearer {token}"));
            }
            None => warn!(plugin = %manifest.name, "oauth2 auth configured but no access token in credentials"),
        },
    }
}

/// Render a JSON value as a URL/header component.
fn value_to_component(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Short JSON type name for error messages.
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// The compiled, executable form of a manifest.
///
/// Owned by the registry that holds it; immutable after compilation.
pub struct Plugin {
    /// Plugin name (equals the owning manifest's name).
    pub name: String,
    /// One-line description for the system prompt and tool listings.
    pub description: String,
    /// Manifest version string.
    pub version: String,
    actions: Vec<CompiledAction>,
    manifest: Arc<Manifest>,
    lifecycle: Option<Arc<dyn PluginLifecycle>>,
}

impl Plugin {
    /// All compiled actions, in manifest order.
    pub fn actions(&self) -> &[CompiledAction] {
        &self.actions
    }

    /// Look up one compiled action by id.
    pub fn action(&self, id: &str) -> Option<&CompiledAction> {
        self.actions.iter().find(|a| a.id() == id)
    }

    /// The manifest this plugin was compiled from.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Attach setup/teardown hooks invoked on (un)registration.
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn PluginLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub(crate) fn lifecycle(&self) -> Option<&Arc<dyn PluginLifecycle>> {
        self.lifecycle.as_ref()
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("actions", &self.actions.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Compiles manifests into plugins.
///
/// The compiler owns the transport every compiled action dispatches through
/// and the opt-in [`HookTable`] of per-API enrichments.
pub struct ActionCompiler {
    transport: Arc<dyn HttpTransport>,
    hooks: HookTable,
}

impl ActionCompiler {
    /// Create a compiler using the production `reqwest` transport.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()))
    }

    /// Create a compiler with an injected transport (tests, proxies).
    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            hooks: HookTable::new(),
        }
    }

    /// Register an enrichment hook for one `(plugin, action)` pair.
    pub fn with_hook(
        mut self,
        plugin: impl Into<String>,
        action: impl Into<String>,
        hook: Arc<dyn EnrichmentHook>,
    ) -> Self {
        self.hooks.insert(plugin, action, hook);
        self
    }

    /// Compile one manifest and its credential record into a plugin.
    ///
    /// # Errors
    ///
    /// Fails fast on manifest validation errors; execution-time failures are
    /// never raised here.
    pub fn compile(
        &self,
        manifest: Manifest,
        credentials: Option<CredentialRecord>,
    ) -> Result<Plugin> {
        validate_manifest(&manifest)?;

        let manifest = Arc::new(manifest);
        let credentials = Arc::new(credentials.unwrap_or_default());

        let actions = manifest
            .actions
            .iter()
            .map(|action| CompiledAction {
                inner: Arc::new(ActionInner {
                    manifest: Arc::clone(&manifest),
                    action: action.clone(),
                    credentials: Arc::clone(&credentials),
                    transport: Arc::clone(&self.transport),
                    hook: self.hooks.get(&manifest.name, &action.id),
                    schema: parameters_to_schema(&action.parameters),
                }),
            })
            .collect();

        tracing::debug!(
            plugin = %manifest.name,
            actions = manifest.actions.len(),
            auth = manifest.auth.label(),
            "compiled manifest"
        );

        Ok(Plugin {
            name: manifest.name.clone(),
            description: manifest.description.clone(),
            version: manifest.version.clone(),
            actions,
            manifest,
            lifecycle: None,
        })
    }
}

impl Default for ActionCompiler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
