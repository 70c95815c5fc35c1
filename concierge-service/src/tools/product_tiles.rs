//! Grid of product tiles for three or more recommendations.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ProductView, ToolContext, ToolError, ToolResult};

pub const DEFAULT_TILES_TITLE: &str = "Recommended Products";

fn default_title() -> String {
    DEFAULT_TILES_TITLE.to_string()
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ProductTilesArgs {
    /// A list of product IDs to display as tiles
    #[serde(deserialize_with = "super::deserialize_product_ids")]
    pub product_ids: Vec<String>,

    /// Optional title for the tiles section
    #[serde(default = "default_title")]
    pub title: String,

    /// Optional generative content to display with the tiles, based on the conversation context
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductTiles {
    pub title: String,
    pub products: Vec<ProductView>,
    pub description: String,
    /// Names the requested ids that were not in the catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub fn execute(args: &ProductTilesArgs, ctx: &ToolContext<'_>) -> ToolResult {
    if let Some(error) = ctx.catalog.load_error() {
        return ToolResult::Error(ToolError::message(format!(
            "Error loading {} tiles: {}",
            ctx.product_type, error
        )));
    }

    let mut products = Vec::new();
    let mut missing = Vec::new();

    for product_id in &args.product_ids {
        match ctx.catalog.get(product_id) {
            Some(row) => products.push(ProductView::new(row, ctx.assets)),
            None => missing.push(product_id.as_str()),
        }
    }

    if products.is_empty() {
        return ToolResult::Error(ToolError::not_found(
            format!(
                "No {} found with the provided product IDs: {}",
                ctx.product_type,
                args.product_ids.join(", ")
            ),
            ctx.catalog,
        ));
    }

    let warning = (!missing.is_empty())
        .then(|| format!("Some product IDs were not found: {}", missing.join(", ")));

    ToolResult::Tiles(ProductTiles {
        title: args.title.clone(),
        products,
        description: args.description.clone(),
        warning,
    })
}
