//! Tool definitions for Ollama's function calling format.
//!
//! The definitions themselves live in the unified registry in
//! `crate::tools::registry`; this module provides the wire types and the
//! accessor used when building generation requests.

use serde::{Deserialize, Serialize};

use super::registry::REGISTRY;

/// Tool definition for Ollama's tool format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: OllamaFunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaFunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Get tool definitions in Ollama's format.
pub fn get_ollama_tool_definitions() -> Vec<OllamaToolDefinition> {
    REGISTRY.ollama_definitions()
}
