//! Presentation tools the model can call.
//!
//! This module contains:
//! - Core tool types (ToolCall, ToolResult and its per-tool payloads)
//! - Typed argument parsing and dispatch over the closed set of tools
//! - Submodules for the registry, Ollama definitions, and each tool

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};

use crate::assets::ProductAssets;
use crate::catalog::{Catalog, CatalogRow};

pub mod definitions;
pub mod product_comparison;
pub mod product_details;
pub mod product_tiles;
pub mod registry;
mod tool_defs;

pub use definitions::{OllamaFunctionDefinition, OllamaToolDefinition, get_ollama_tool_definitions};
pub use product_comparison::{ProductComparison, ProductComparisonArgs};
pub use product_details::{ProductDetail, ProductDetailsArgs};
pub use product_tiles::{ProductTiles, ProductTilesArgs};
pub use registry::ToolName;

/// Tool call from the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub tool: String,
    pub args: serde_json::Value,
}

/// Everything a tool reads while executing
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub catalog: &'a Catalog,
    pub assets: &'a ProductAssets,
    pub product_type: &'a str,
}

/// Keys every view computes; catalog columns of the same name are dropped
const VIEW_KEYS: [&str; 2] = ["has_image", "image_url"];

/// A catalog row with image availability attached
#[derive(Debug, Clone)]
pub struct ProductView {
    pub row: CatalogRow,
    pub has_image: bool,
    pub image_url: Option<String>,
}

impl ProductView {
    pub fn new(row: &CatalogRow, assets: &ProductAssets) -> Self {
        let image_url = assets.image_url(row.product_id());
        Self {
            row: row.clone(),
            has_image: image_url.is_some(),
            image_url,
        }
    }

    /// Write the row columns and image fields into an open map.
    ///
    /// Columns named in `computed` are left out so the caller's own entries
    /// for those keys are the only ones emitted.
    pub(crate) fn serialize_entries<M: SerializeMap>(
        &self,
        map: &mut M,
        computed: &[&str],
    ) -> Result<(), M::Error> {
        for (name, value) in self.row.fields() {
            if !VIEW_KEYS.contains(&name) && !computed.contains(&name) {
                map.serialize_entry(name, value)?;
            }
        }
        map.serialize_entry("has_image", &self.has_image)?;
        map.serialize_entry("image_url", &self.image_url)
    }
}

impl Serialize for ProductView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.serialize_entries(&mut map, &[])?;
        map.end()
    }
}

/// Recoverable tool failure, explained to the user by the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolError {
    pub error: String,
    /// Every known product id, present when a lookup failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_ids: Option<Vec<String>>,
}

impl ToolError {
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            available_ids: None,
        }
    }

    pub fn not_found(error: impl Into<String>, catalog: &Catalog) -> Self {
        Self {
            error: error.into(),
            available_ids: Some(catalog.ids()),
        }
    }
}

/// Output of one tool execution
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolResult {
    Detail(ProductDetail),
    Comparison(ProductComparison),
    Tiles(ProductTiles),
    Error(ToolError),
}

impl ToolResult {
    pub fn as_error(&self) -> Option<&ToolError> {
        match self {
            ToolResult::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Parsed arguments for one of the registered tools
#[derive(Debug, Clone)]
pub enum ToolInvocation {
    Details(ProductDetailsArgs),
    Comparison(ProductComparisonArgs),
    Tiles(ProductTilesArgs),
}

impl ToolInvocation {
    pub fn parse(name: ToolName, args: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match name {
            ToolName::ProductDetails => Self::Details(ProductDetailsArgs::deserialize(args)?),
            ToolName::ProductComparison => {
                Self::Comparison(ProductComparisonArgs::deserialize(args)?)
            }
            ToolName::ProductTiles => Self::Tiles(ProductTilesArgs::deserialize(args)?),
        })
    }

    pub fn execute(&self, ctx: &ToolContext<'_>) -> ToolResult {
        match self {
            Self::Details(args) => product_details::execute(args, ctx),
            Self::Comparison(args) => product_comparison::execute(args, ctx),
            Self::Tiles(args) => product_tiles::execute(args, ctx),
        }
    }
}

/// Run a tool by name. Never fails: bad arguments become a [`ToolError`].
pub fn execute_tool(name: ToolName, args: &serde_json::Value, ctx: &ToolContext<'_>) -> ToolResult {
    match ToolInvocation::parse(name, args) {
        Ok(invocation) => invocation.execute(ctx),
        Err(e) => ToolResult::Error(ToolError::message(format!(
            "Invalid arguments for {}: {}",
            name, e
        ))),
    }
}

/// Product ids arrive as strings or, following the prompt, as integers
#[derive(Deserialize)]
#[serde(untagged)]
enum RawProductId {
    Text(String),
    Number(serde_json::Number),
}

impl RawProductId {
    fn into_string(self) -> String {
        match self {
            RawProductId::Text(s) => s,
            RawProductId::Number(n) => n.to_string(),
        }
    }
}

pub(crate) fn deserialize_product_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    RawProductId::deserialize(deserializer).map(RawProductId::into_string)
}

pub(crate) fn deserialize_product_ids<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    Vec::<RawProductId>::deserialize(deserializer)
        .map(|ids| ids.into_iter().map(RawProductId::into_string).collect())
}
