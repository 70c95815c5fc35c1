//! Tool registry shared by the orchestrator and the prompt builder.
//!
//! Tool names are derived from enum variants via strum, so the name the model
//! sees and the name the orchestrator dispatches on cannot drift apart.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// All tool names as an exhaustive enum.
///
/// Adding a new tool requires:
/// 1. Add variant here
/// 2. Register metadata in `tool_defs`
/// 3. Add an arm to `ToolInvocation` (compile error if missing due to exhaustive match)
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    EnumIter,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ToolName {
    ProductDetails,
    ProductComparison,
    ProductTiles,
}

/// Metadata for a tool definition.
#[derive(Debug, Clone)]
pub struct ToolMetadata {
    /// Tool identifier - string representation derived via strum Display
    pub name: ToolName,

    /// Description shown to the model
    pub description: &'static str,

    /// JSON Schema for tool parameters (called lazily to avoid static initialization issues)
    pub parameters: fn() -> serde_json::Value,
}

/// Central registry of all tools.
pub struct ToolRegistry {
    tools: HashMap<ToolName, ToolMetadata>,
}

impl ToolRegistry {
    /// Build the registry from all registered tool definitions
    pub fn new() -> Self {
        let mut tools = HashMap::new();
        super::tool_defs::register_all_tools(&mut tools);
        Self { tools }
    }

    /// Get all tools as Ollama tool definitions, in a stable order
    pub fn ollama_definitions(&self) -> Vec<super::OllamaToolDefinition> {
        let mut tools: Vec<&ToolMetadata> = self.tools.values().collect();
        tools.sort_by_key(|t| t.name);

        tools
            .into_iter()
            .map(|t| super::OllamaToolDefinition {
                tool_type: "function".to_string(),
                function: super::OllamaFunctionDefinition {
                    name: t.name.to_string(),
                    description: t.description.to_string(),
                    parameters: (t.parameters)(),
                },
            })
            .collect()
    }

    /// Resolve a model-supplied tool name to a registered tool
    pub fn resolve(&self, name: &str) -> Option<ToolName> {
        ToolName::from_str(name)
            .ok()
            .filter(|n| self.tools.contains_key(n))
    }

    /// Get metadata by enum variant
    #[cfg(test)]
    pub fn get(&self, name: ToolName) -> Option<&ToolMetadata> {
        self.tools.get(&name)
    }

    /// Number of registered tools
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global singleton registry instance
pub static REGISTRY: LazyLock<ToolRegistry> = LazyLock::new(ToolRegistry::new);
