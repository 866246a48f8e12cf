//! Stage definitions as declared by a pipeline author.

use crate::core::StageKind;
use serde::{Deserialize, Serialize};

/// One declared stage.
///
/// Accepts both `dependsOn` and `dependencies` when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDefinition {
    /// Unique stage id.
    pub id: String,
    /// Which backend serves the stage.
    #[serde(default)]
    pub kind: StageKind,
    /// Plugin name for plugin stages; defaults to the stage id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    /// Ids of the stages whose output this stage consumes, in declared order.
    #[serde(default, alias = "dependencies")]
    pub depends_on: Vec<String>,
}

impl StageDefinition {
    /// Creates an internal stage with no dependencies.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StageKind::Internal,
            plugin: None,
            depends_on: Vec::new(),
        }
    }

    /// Creates a plugin stage served by the named plugin.
    #[must_use]
    pub fn plugin(id: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StageKind::Plugin,
            plugin: Some(plugin.into()),
            depends_on: Vec::new(),
        }
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.depends_on.push(dep.into());
        self
    }

    /// Replaces the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the plugin name this stage resolves against.
    #[must_use]
    pub fn plugin_name(&self) -> &str {
        self.plugin.as_deref().unwrap_or(&self.id)
    }

    /// Returns true if the stage has no dependencies.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.depends_on.is_empty()
    }
}
