//! Tool metadata registered into the registry.
//!
//! Descriptions are what the model reads when deciding whether to answer in
//! text or to show the user something; parameter schemas are derived from the
//! typed argument structs so parsing and advertising stay in step.

use std::collections::HashMap;

use schemars::{JsonSchema, r#gen::SchemaSettings};

use super::registry::{ToolMetadata, ToolName};
use super::{ProductComparisonArgs, ProductDetailsArgs, ProductTilesArgs};

/// Register every tool into the registry.
pub fn register_all_tools(registry: &mut HashMap<ToolName, ToolMetadata>) {
    let tools = [product_details(), product_comparison(), product_tiles()];
    for tool in tools {
        registry.insert(tool.name, tool);
    }
}

/// Inline JSON Schema for an argument struct, without the draft and title keys
fn parameters_schema<T: JsonSchema>() -> serde_json::Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator();
    let schema = generator.into_root_schema_for::<T>();

    let mut value = serde_json::to_value(schema).unwrap_or_default();
    if let Some(object) = value.as_object_mut() {
        object.remove("title");
    }
    value
}

fn product_details() -> ToolMetadata {
    ToolMetadata {
        name: ToolName::ProductDetails,
        description: "Show detailed information about a single product. Use this when the user asks about one specific item from the catalog.",
        parameters: parameters_schema::<ProductDetailsArgs>,
    }
}

fn product_comparison() -> ToolMetadata {
    ToolMetadata {
        name: ToolName::ProductComparison,
        description: "Show a side-by-side comparison of exactly two products. Use this when the user wants to weigh two items against each other.",
        parameters: parameters_schema::<ProductComparisonArgs>,
    }
}

fn product_tiles() -> ToolMetadata {
    ToolMetadata {
        name: ToolName::ProductTiles,
        description: "Show a grid of product tiles. Use this when recommending or listing three or more products.",
        parameters: parameters_schema::<ProductTilesArgs>,
    }
}
