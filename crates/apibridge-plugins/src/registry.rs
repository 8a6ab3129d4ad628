//! The plugin registry.
//!
//! Holds every registered [`Plugin`], projects their actions into
//! model-facing tool definitions, and resolves a tool call back to the
//! compiled action that executes it.  Registration and removal run optional
//! per-plugin lifecycle hooks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::compiler::{CompiledAction, Plugin};
use crate::error::{PluginError, Result};
use crate::naming::{encode_tool_name, parse_tool_name};
use crate::schema::compact_schema;
use crate::select::{HeuristicRanker, ToolRanker};

/// One model-facing tool definition.
#[derive(Debug, Clone, Serialize)]
pub struct LlmTool {
    /// `plugin__action` encoded name.
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
}

/// Setup/teardown hooks invoked when a plugin is (un)registered.
///
/// Useful for plugins that need a warm-up call or hold external resources.
#[async_trait]
pub trait PluginLifecycle: Send + Sync {
    /// Runs before the plugin becomes visible.  An error aborts
    /// registration.
    async fn setup(&self, plugin: &Plugin) -> std::result::Result<(), String> {
        let _ = plugin;
        Ok(())
    }

    /// Runs after the plugin has been removed.  Errors are logged, not
    /// propagated; the plugin is gone either way.
    async fn teardown(&self, plugin: &Plugin) -> std::result::Result<(), String> {
        let _ = plugin;
        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    plugins: HashMap<String, Arc<Plugin>>,
    /// Registration order, for stable tool listings.
    order: Vec<String>,
}

/// Thread-safe store of registered plugins.
pub struct PluginRegistry {
    inner: RwLock<Inner>,
    ranker: Box<dyn ToolRanker>,
}

impl PluginRegistry {
    /// Create an empty registry with the default heuristic ranker.
    pub fn new() -> Self {
        Self::with_ranker(Box::new(HeuristicRanker::new()))
    }

    /// Create an empty registry with a custom relevance ranker.
    pub fn with_ranker(ranker: Box<dyn ToolRanker>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ranker,
        }
    }

    /// Register a compiled plugin.
    ///
    /// # Errors
    ///
    /// Rejects a name that is already registered, and propagates lifecycle
    /// setup failures (the plugin is not added in either case).
    pub async fn register(&self, plugin: Plugin) -> Result<()> {
        {
            let inner = self.inner.read().await;
            if inner.plugins.contains_key(&plugin.name) {
                return Err(PluginError::DuplicateName {
                    name: plugin.name.clone(),
                });
            }
        }

        if let Some(lifecycle) = plugin.lifecycle() {
            lifecycle
                .setup(&plugin)
                .await
                .map_err(|reason| PluginError::Lifecycle {
                    plugin: plugin.name.clone(),
                    reason,
                })?;
        }

        let mut inner = self.inner.write().await;
        // Re-check under the write lock; setup ran without it.
        if inner.plugins.contains_key(&plugin.name) {
            return Err(PluginError::DuplicateName {
                name: plugin.name.clone(),
            });
        }
        info!(plugin = %plugin.name, actions = plugin.actions().len(), "registered plugin");
        inner.order.push(plugin.name.clone());
        inner.plugins.insert(plugin.name.clone(), Arc::new(plugin));
        Ok(())
    }

    /// Remove a plugin by name, running its teardown hook if present.
    ///
    /// # Errors
    ///
    /// Fails only when the name is unknown.
    pub async fn unregister(&self, name: &str) -> Result<()> {
        let plugin = {
            let mut inner = self.inner.write().await;
            let plugin = inner
                .plugins
                .remove(name)
                .ok_or_else(|| PluginError::UnknownTool {
                    name: name.to_owned(),
                })?;
            inner.order.retain(|n| n != name);
            plugin
        };

        if let Some(lifecycle) = plugin.lifecycle() {
            if let Err(reason) = lifecycle.teardown(&plugin).await {
                warn!(plugin = %name, %reason, "plugin teardown failed");
            }
        }
        info!(plugin = %name, "unregistered plugin");
        Ok(())
    }

    /// Look up a plugin by name.
    pub async fn plugin(&self, name: &str) -> Option<Arc<Plugin>> {
        self.inner.read().await.plugins.get(name).cloned()
    }

    /// Registered plugin names, in registration order.
    pub async fn plugin_names(&self) -> Vec<String> {
        self.inner.read().await.order.clone()
    }

    /// Project every registered action into a tool definition, with full
    /// parameter schemas.
    pub async fn to_llm_tools(&self) -> Vec<LlmTool> {
        self.collect_tools(false).await
    }

    /// Like [`to_llm_tools`](Self::to_llm_tools) but with compacted schemas,
    /// for backends with tight request-size limits.
    pub async fn to_compact_llm_tools(&self) -> Vec<LlmTool> {
        self.collect_tools(true).await
    }

    /// The at-most-`max` tools most relevant to one user message.
    pub async fn select_llm_tools(&self, input: &str, max: usize) -> Vec<LlmTool> {
        let tools = self.to_llm_tools().await;
        if tools.len() <= max {
            return tools;
        }
        self.ranker.rank(input, &tools, max)
    }

    /// Resolve an encoded tool name to its plugin and compiled action.
    ///
    /// # Errors
    ///
    /// Malformed names and names that do not map to a registered action are
    /// rejected; both come from the model, never from our own encoding.
    pub async fn resolve(&self, tool_name: &str) -> Result<(Arc<Plugin>, CompiledAction)> {
        let (plugin_name, action_id) = parse_tool_name(tool_name)?;
        let plugin = self
            .plugin(&plugin_name)
            .await
            .ok_or_else(|| PluginError::UnknownTool {
                name: tool_name.to_owned(),
            })?;
        let action = plugin
            .action(&action_id)
            .ok_or_else(|| PluginError::UnknownTool {
                name: tool_name.to_owned(),
            })?
            .clone();
        Ok((plugin, action))
    }

    /// One-line-per-plugin roster for the system prompt.
    pub async fn roster(&self) -> String {
        let inner = self.inner.read().await;
        let mut lines = Vec::with_capacity(inner.order.len());
        for name in &inner.order {
            if let Some(plugin) = inner.plugins.get(name) {
                let actions: Vec<&str> = plugin.actions().iter().map(CompiledAction::id).collect();
                lines.push(format!(
                    "- {} ({}): {}",
                    plugin.name,
                    actions.join(", "),
                    plugin.description
                ));
            }
        }
        lines.join("\n")
    }

    async fn collect_tools(&self, compact: bool) -> Vec<LlmTool> {
        let inner = self.inner.read().await;
        let mut tools = Vec::new();
        for name in &inner.order {
            let Some(plugin) = inner.plugins.get(name) else {
                continue;
            };
            for action in plugin.actions() {
                let parameters = if compact {
                    compact_schema(action.parameter_schema())
                } else {
                    action.parameter_schema().clone()
                };
                tools.push(LlmTool {
                    name: encode_tool_name(&plugin.name, action.id()),
                    description: action.description().to_owned(),
                    parameters,
                });
            }
        }
        tools
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ActionCompiler;
    use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
    use apibridge_manifest::parse_manifest_value;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullTransport;

    #[async_trait]
    impl HttpTransport for NullTransport {
        async fn send(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            Err(TransportError("no network in tests".into()))
        }
    }

    fn compile(name: &str, actions: Value) -> Plugin {
        let manifest = parse_manifest_value(json!({
            "schema_version": "1.0",
            "name": name,
            "description": format!("The {name} API"),
            "base_url": "https://api.example.com",
            "actions": actions,
        }))
        .unwrap();
        ActionCompiler::with_transport(Arc::new(NullTransport))
            .compile(manifest, None)
            .unwrap()
    }

    fn music_plugin() -> Plugin {
        compile(
            "music",
            json!([
                {
                    "id": "search_tracks",
                    "description": "Search for tracks",
                    "method": "GET",
                    "path": "/search",
                    "parameters": [
                        {"name": "q", "in": "query", "required": true, "description": "Search query"}
                    ]
                },
                {"id": "pause", "description": "Pause playback", "method": "POST", "path": "/pause"}
            ]),
        )
    }

    #[tokio::test]
    async fn register_and_list_tools() {
        let registry = PluginRegistry::new();
        registry.register(music_plugin()).await.unwrap();

        let tools = registry.to_llm_tools().await;
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "music__search_tracks");
        assert_eq!(tools[1].name, "music__pause");
        assert_eq!(
            tools[0].parameters["properties"]["q"]["description"],
            "Search query"
        );
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = PluginRegistry::new();
        registry.register(music_plugin()).await.unwrap();
        let err = registry.register(music_plugin()).await.unwrap_err();
        assert!(matches!(err, PluginError::DuplicateName { .. }));
    }

    #[tokio::test]
    async fn compact_tools_drop_descriptions() {
        let registry = PluginRegistry::new();
        registry.register(music_plugin()).await.unwrap();

        let tools = registry.to_compact_llm_tools().await;
        assert!(tools[0].parameters["properties"]["q"].get("description").is_none());
        assert_eq!(tools[0].parameters["properties"]["q"]["type"], "string");
    }

    #[tokio::test]
    async fn resolve_round_trips() {
        let registry = PluginRegistry::new();
        registry.register(music_plugin()).await.unwrap();

        let (plugin, action) = registry.resolve("music__pause").await.unwrap();
        assert_eq!(plugin.name, "music");
        assert_eq!(action.id(), "pause");
    }

    #[tokio::test]
    async fn resolve_rejects_unknown_and_malformed() {
        let registry = PluginRegistry::new();
        registry.register(music_plugin()).await.unwrap();

        assert!(matches!(
            registry.resolve("music__nope").await.unwrap_err(),
            PluginError::UnknownTool { .. }
        ));
        assert!(matches!(
            registry.resolve("noseparator").await.unwrap_err(),
            PluginError::MalformedToolName { .. }
        ));
    }

    #[tokio::test]
    async fn unregister_removes_tools() {
        let registry = PluginRegistry::new();
        registry.register(music_plugin()).await.unwrap();
        registry.unregister("music").await.unwrap();

        assert!(registry.to_llm_tools().await.is_empty());
        assert!(registry.unregister("music").await.is_err());
    }

    #[tokio::test]
    async fn selection_respects_cap() {
        let registry = PluginRegistry::new();
        registry.register(music_plugin()).await.unwrap();
        registry
            .register(compile(
                "tasks",
                json!([
                    {"id": "add_item", "description": "Add a task", "method": "POST", "path": "/items"},
                    {"id": "list_items", "description": "List tasks", "method": "GET", "path": "/items"}
                ]),
            ))
            .await
            .unwrap();

        let tools = registry.select_llm_tools("search for tracks", 2).await;
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "music__search_tracks");
    }

    #[tokio::test]
    async fn lifecycle_hooks_run() {
        struct Counter(AtomicUsize, AtomicUsize);

        #[async_trait]
        impl PluginLifecycle for Counter {
            async fn setup(&self, _plugin: &Plugin) -> std::result::Result<(), String> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            async fn teardown(&self, _plugin: &Plugin) -> std::result::Result<(), String> {
                self.1.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let counter = Arc::new(Counter(AtomicUsize::new(0), AtomicUsize::new(0)));
        let registry = PluginRegistry::new();
        registry
            .register(music_plugin().with_lifecycle(counter.clone()))
            .await
            .unwrap();
        registry.unregister("music").await.unwrap();

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(counter.1.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_setup_aborts_registration() {
        struct Failing;

        #[async_trait]
        impl PluginLifecycle for Failing {
            async fn setup(&self, _plugin: &Plugin) -> std::result::Result<(), String> {
                Err("warm-up call failed".into())
            }
        }

        let registry = PluginRegistry::new();
        let err = registry
            .register(music_plugin().with_lifecycle(Arc::new(Failing)))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Lifecycle { .. }));
        assert!(registry.plugin("music").await.is_none());
    }

    #[tokio::test]
    async fn roster_lists_plugins_and_actions() {
        let registry = PluginRegistry::new();
        registry.register(music_plugin()).await.unwrap();

        let roster = registry.roster().await;
        assert!(roster.contains("- music (search_tracks, pause): The music API"));
    }
}
