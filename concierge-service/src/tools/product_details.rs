//! Single-product detail view.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use super::{ProductView, ToolContext, ToolError, ToolResult};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ProductDetailsArgs {
    /// The product ID of the item to display
    #[serde(deserialize_with = "super::deserialize_product_id")]
    pub product_id: String,

    /// Optional generative content to display with the details, based on the conversation context
    #[serde(default)]
    pub description: String,
}

/// One product with everything the detail view shows
#[derive(Debug, Clone)]
pub struct ProductDetail {
    pub product: ProductView,
    pub description: String,
    pub marketing_content: Option<String>,
}

impl Serialize for ProductDetail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.product
            .serialize_entries(&mut map, &["description", "marketing_content"])?;
        map.serialize_entry("description", &self.description)?;
        map.serialize_entry("marketing_content", &self.marketing_content)?;
        map.end()
    }
}

pub fn execute(args: &ProductDetailsArgs, ctx: &ToolContext<'_>) -> ToolResult {
    if let Some(error) = ctx.catalog.load_error() {
        return ToolResult::Error(ToolError::message(format!(
            "Error loading {} data: {}",
            ctx.product_type, error
        )));
    }

    let Some(row) = ctx.catalog.get(&args.product_id) else {
        debug!(product_id = %args.product_id, "Product not found");
        return ToolResult::Error(ToolError::not_found(
            format!(
                "No {} item found with product ID: {}",
                ctx.product_type, args.product_id
            ),
            ctx.catalog,
        ));
    };

    ToolResult::Detail(ProductDetail {
        product: ProductView::new(row, ctx.assets),
        description: args.description.clone(),
        marketing_content: ctx.assets.marketing_content(&args.product_id),
    })
}
