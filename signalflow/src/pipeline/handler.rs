//! Stage handlers and the registry that resolves them.
//!
//! The executor only ever sees [`StageHandler`]. Whether a stage is served by
//! an in-process function or by a plugin module is decided once, when
//! [`HandlerRegistry::resolve`] maps each stage's kind tag to a backend.

use super::StageGraph;
use crate::context::RunContext;
use crate::core::StageKind;
use crate::errors::ConfigurationError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;

/// A unit of work at the DAG executor layer.
///
/// Returning an error aborts the whole run.
#[async_trait]
pub trait StageHandler: Send + Sync + Debug {
    /// Transforms the stage input into the stage output.
    async fn invoke(&self, payload: Value, ctx: &RunContext) -> anyhow::Result<Value>;
}

/// An external plugin module that can serve one or more plugin stages.
#[async_trait]
pub trait StagePlugin: Send + Sync + Debug {
    /// Returns the plugin name stages refer to.
    fn name(&self) -> &str;

    /// Runs the plugin for one stage.
    async fn invoke(&self, stage_id: &str, payload: Value, ctx: &RunContext)
        -> anyhow::Result<Value>;
}

/// A synchronous closure handler.
pub struct FnHandler<F>
where
    F: Fn(Value, &RunContext) -> anyhow::Result<Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Value, &RunContext) -> anyhow::Result<Value> + Send + Sync,
{
    /// Creates a new closure handler.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnHandler<F>
where
    F: Fn(Value, &RunContext) -> anyhow::Result<Value> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> StageHandler for FnHandler<F>
where
    F: Fn(Value, &RunContext) -> anyhow::Result<Value> + Send + Sync,
{
    async fn invoke(&self, payload: Value, ctx: &RunContext) -> anyhow::Result<Value> {
        (self.func)(payload, ctx)
    }
}

/// An async closure handler.
///
/// The closure receives an owned clone of the run context so the returned
/// future can be `'static`.
pub struct AsyncFnHandler<F, Fut>
where
    F: Fn(Value, RunContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    name: String,
    func: F,
    _phantom: std::marker::PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnHandler<F, Fut>
where
    F: Fn(Value, RunContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    /// Creates a new async closure handler.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnHandler<F, Fut>
where
    F: Fn(Value, RunContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnHandler")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> StageHandler for AsyncFnHandler<F, Fut>
where
    F: Fn(Value, RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn invoke(&self, payload: Value, ctx: &RunContext) -> anyhow::Result<Value> {
        (self.func)(payload, ctx.clone()).await
    }
}

/// Adapts a plugin to the handler capability for one stage.
#[derive(Debug, Clone)]
pub struct PluginHandler {
    stage_id: String,
    plugin: Arc<dyn StagePlugin>,
}

impl PluginHandler {
    /// Binds a plugin to a stage id.
    #[must_use]
    pub fn new(stage_id: impl Into<String>, plugin: Arc<dyn StagePlugin>) -> Self {
        Self {
            stage_id: stage_id.into(),
            plugin,
        }
    }
}

#[async_trait]
impl StageHandler for PluginHandler {
    async fn invoke(&self, payload: Value, ctx: &RunContext) -> anyhow::Result<Value> {
        self.plugin.invoke(&self.stage_id, payload, ctx).await
    }
}

/// Explicitly constructed registry of handlers and plugins.
///
/// Owned by the process or test that builds it; there is no global registry.
#[derive(Debug, Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn StageHandler>>,
    plugins: HashMap<String, Arc<dyn StagePlugin>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an internal handler for a stage id.
    #[must_use]
    pub fn with_handler(mut self, stage_id: impl Into<String>, handler: Arc<dyn StageHandler>) -> Self {
        self.handlers.insert(stage_id.into(), handler);
        self
    }

    /// Registers a synchronous closure for a stage id.
    #[must_use]
    pub fn with_fn<F>(self, stage_id: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value, &RunContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let stage_id = stage_id.into();
        let handler = Arc::new(FnHandler::new(stage_id.clone(), func));
        self.with_handler(stage_id, handler)
    }

    /// Registers a plugin under its own name.
    #[must_use]
    pub fn with_plugin(mut self, plugin: Arc<dyn StagePlugin>) -> Self {
        self.plugins.insert(plugin.name().to_string(), plugin);
        self
    }

    /// Returns the number of internal handlers and plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len() + self.plugins.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Selects a handler for every stage of the graph by its kind tag.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` naming the first stage whose handler or
    /// plugin is not registered.
    pub fn resolve(&self, graph: &StageGraph) -> Result<ResolvedHandlers, ConfigurationError> {
        let mut resolved = HashMap::with_capacity(graph.len());
        for stage in graph.stages() {
            let handler: Arc<dyn StageHandler> = match stage.kind {
                StageKind::Internal => self.handlers.get(&stage.id).cloned().ok_or_else(|| {
                    ConfigurationError::new(
                        stage.id.clone(),
                        format!("no handler registered for internal stage '{}'", stage.id),
                    )
                })?,
                StageKind::Plugin => {
                    let plugin = self.plugins.get(stage.plugin_name()).ok_or_else(|| {
                        ConfigurationError::new(
                            stage.plugin_name(),
                            format!(
                                "plugin '{}' required by stage '{}' is not registered",
                                stage.plugin_name(),
                                stage.id
                            ),
                        )
                    })?;
                    Arc::new(PluginHandler::new(stage.id.clone(), plugin.clone()))
                }
            };
            resolved.insert(stage.id.clone(), handler);
        }
        Ok(ResolvedHandlers { handlers: resolved })
    }
}

/// Handlers bound to every stage of one graph.
#[derive(Debug, Clone, Default)]
pub struct ResolvedHandlers {
    handlers: HashMap<String, Arc<dyn StageHandler>>,
}

impl ResolvedHandlers {
    /// Returns the handler for a stage.
    #[must_use]
    pub fn get(&self, stage_id: &str) -> Option<&Arc<dyn StageHandler>> {
        self.handlers.get(stage_id)
    }

    /// Returns the number of bound handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageDefinition;
    use serde_json::json;

    #[derive(Debug)]
    struct EchoPlugin;

    #[async_trait]
    impl StagePlugin for EchoPlugin {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(
            &self,
            stage_id: &str,
            payload: Value,
            _ctx: &RunContext,
        ) -> anyhow::Result<Value> {
            Ok(json!({ "stage": stage_id, "payload": payload }))
        }
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = FnHandler::new("inc", |v: Value, _ctx: &RunContext| {
            Ok(json!(v.as_i64().unwrap_or(0) + 1))
        });
        let out = handler.invoke(json!(1), &RunContext::new()).await.unwrap();
        assert_eq!(out, json!(2));
    }

    #[tokio::test]
    async fn test_async_fn_handler_sees_context() {
        let handler = AsyncFnHandler::new("who", |_v: Value, ctx: RunContext| async move {
            Ok(json!(ctx.signal_id().unwrap_or_default()))
        });
        let ctx = RunContext::new().with_signal_id("sig-9");
        assert_eq!(handler.invoke(Value::Null, &ctx).await.unwrap(), json!("sig-9"));
    }

    #[tokio::test]
    async fn test_resolve_selects_backend_by_kind() {
        let graph = StageGraph::build(vec![
            StageDefinition::new("ingest"),
            StageDefinition::plugin("news", "echo").with_dependency("ingest"),
        ])
        .unwrap();
        let registry = HandlerRegistry::new()
            .with_fn("ingest", |v, _| Ok(v))
            .with_plugin(Arc::new(EchoPlugin));

        let resolved = registry.resolve(&graph).unwrap();
        assert_eq!(resolved.len(), 2);

        let out = resolved
            .get("news")
            .unwrap()
            .invoke(json!(7), &RunContext::new())
            .await
            .unwrap();
        assert_eq!(out, json!({ "stage": "news", "payload": 7 }));
    }

    #[test]
    fn test_resolve_reports_missing_handler() {
        let graph = StageGraph::build(vec![StageDefinition::new("score")]).unwrap();
        let err = HandlerRegistry::new().resolve(&graph).unwrap_err();
        assert_eq!(err.field, "score");
    }

    #[test]
    fn test_resolve_reports_missing_plugin() {
        let graph = StageGraph::build(vec![StageDefinition::plugin("ml", "predictor")]).unwrap();
        let err = HandlerRegistry::new().resolve(&graph).unwrap_err();
        assert_eq!(err.field, "predictor");
        assert!(err.message.contains("'ml'"));
    }
}
