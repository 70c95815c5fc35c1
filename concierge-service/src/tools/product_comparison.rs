//! Side-by-side comparison of two products.

use schemars::JsonSchema;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::CatalogRow;

use super::{ProductView, ToolContext, ToolError, ToolResult};

/// Hardware columns compared numerically when both products carry them
pub const NUMERIC_FIELDS: [&str; 3] = ["ram_gb", "storage_gb", "screen_size_inches"];

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ProductComparisonArgs {
    /// The product ID of the first item to compare
    #[serde(deserialize_with = "super::deserialize_product_id")]
    pub product_id_1: String,

    /// The product ID of the second item to compare
    #[serde(deserialize_with = "super::deserialize_product_id")]
    pub product_id_2: String,

    /// Optional generative content to display with the comparison, based on the conversation context
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ComparedProduct {
    pub product: ProductView,
    pub marketing_content: Option<String>,
}

impl Serialize for ComparedProduct {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.product
            .serialize_entries(&mut map, &["marketing_content"])?;
        map.serialize_entry("marketing_content", &self.marketing_content)?;
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductComparison {
    pub product1: ComparedProduct,
    pub product2: ComparedProduct,
    pub description: String,
    /// `<field>_difference` → absolute difference
    pub comparison: BTreeMap<String, f64>,
}

pub fn execute(args: &ProductComparisonArgs, ctx: &ToolContext<'_>) -> ToolResult {
    if let Some(error) = ctx.catalog.load_error() {
        return ToolResult::Error(ToolError::message(format!(
            "Error comparing {} items: {}",
            ctx.product_type, error
        )));
    }

    let first = ctx.catalog.get(&args.product_id_1);
    let second = ctx.catalog.get(&args.product_id_2);

    let (first, second) = match (first, second) {
        (Some(first), Some(second)) => (first, second),
        (first, second) => {
            let errors: Vec<String> = [
                (first, &args.product_id_1),
                (second, &args.product_id_2),
            ]
            .into_iter()
            .filter(|(row, _)| row.is_none())
            .map(|(_, id)| format!("No {} item found with product ID: {}", ctx.product_type, id))
            .collect();
            return ToolResult::Error(ToolError::not_found(errors.join(". "), ctx.catalog));
        }
    };

    let compared = |row: &CatalogRow| ComparedProduct {
        product: ProductView::new(row, ctx.assets),
        marketing_content: ctx.assets.marketing_content(row.product_id()),
    };

    ToolResult::Comparison(ProductComparison {
        product1: compared(first),
        product2: compared(second),
        description: args.description.clone(),
        comparison: differences(first, second),
    })
}

/// Absolute differences of every numeric field both rows can parse
pub fn differences(first: &CatalogRow, second: &CatalogRow) -> BTreeMap<String, f64> {
    let mut highlights = BTreeMap::new();

    if let (Some(a), Some(b)) = (
        first.get("price").and_then(parse_price),
        second.get("price").and_then(parse_price),
    ) {
        highlights.insert("price_difference".to_string(), (a - b).abs());
    }

    for field in NUMERIC_FIELDS {
        let parse = |row: &CatalogRow| row.get(field).and_then(|v| v.trim().parse::<f64>().ok());
        if let (Some(a), Some(b)) = (parse(first), parse(second)) {
            highlights.insert(format!("{}_difference", field), (a - b).abs());
        }
    }

    highlights
}

fn parse_price(raw: &str) -> Option<f64> {
    raw.replace(['$', ','], "").trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::Fixture;

    fn args(a: &str, b: &str) -> ProductComparisonArgs {
        ProductComparisonArgs {
            product_id_1: a.to_string(),
            product_id_2: b.to_string(),
            description: String::new(),
        }
    }

    fn comparison(result: ToolResult) -> ProductComparison {
        match result {
            ToolResult::Comparison(c) => c,
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_differences() {
        let fixture = Fixture::new();
        let result = comparison(execute(&args("1", "2"), &fixture.ctx()));

        assert_eq!(result.comparison["price_difference"], 300.0);
        assert_eq!(result.comparison["ram_gb_difference"], 8.0);
        assert_eq!(result.comparison["storage_gb_difference"], 256.0);
        assert!((result.comparison["screen_size_inches_difference"] - 1.6).abs() < 1e-9);

        assert_eq!(result.product1.product.row.product_id(), "1");
        assert_eq!(
            result.product1.marketing_content.as_deref(),
            Some("The Aero is featherlight.")
        );
        assert!(result.product2.marketing_content.is_none());
        assert!(result.product1.product.has_image);
        assert!(!result.product2.product.has_image);
    }

    #[test]
    fn test_symmetric_magnitudes() {
        let fixture = Fixture::new();
        for (a, b) in [("1", "2"), ("2", "3"), ("1", "4")] {
            let forward = comparison(execute(&args(a, b), &fixture.ctx()));
            let backward = comparison(execute(&args(b, a), &fixture.ctx()));

            assert_eq!(forward.comparison, backward.comparison);
            assert_eq!(forward.product1.product.row.product_id(), a);
            assert_eq!(backward.product1.product.row.product_id(), b);
        }
    }

    #[test]
    fn test_unparseable_fields_skipped() {
        let fixture = Fixture::new();
        let result = comparison(execute(&args("1", "4"), &fixture.ctx()));

        // Product 4 has "call us" for price and "n/a" for storage
        assert!(!result.comparison.contains_key("price_difference"));
        assert!(!result.comparison.contains_key("storage_gb_difference"));
        assert_eq!(result.comparison["ram_gb_difference"], 0.0);
        assert_eq!(result.comparison["screen_size_inches_difference"], 2.0);
    }

    #[test]
    fn test_one_side_missing() {
        let fixture = Fixture::new();
        let result = execute(&args("1", "77"), &fixture.ctx());
        let error = result.as_error().unwrap();

        assert_eq!(error.error, "No laptops item found with product ID: 77");
        assert_eq!(error.available_ids.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_both_sides_missing_reported_together() {
        let fixture = Fixture::new();
        let result = execute(&args("66", "77"), &fixture.ctx());
        let error = result.as_error().unwrap();

        assert_eq!(
            error.error,
            "No laptops item found with product ID: 66. No laptops item found with product ID: 77"
        );
    }

    #[test]
    fn test_serialized_shape() {
        let fixture = Fixture::new();
        let value = execute(&args("1", "3"), &fixture.ctx()).to_json();

        assert_eq!(value["product1"]["name"], "Aero 14");
        assert_eq!(value["product2"]["name"], "Cirrus 13");
        assert_eq!(value["product2"]["has_image"], false);
        assert_eq!(value["comparison"]["price_difference"], 200.0);
        assert_eq!(value["description"], "");
    }

    #[test]
    fn test_marketing_column_replaced() {
        let fixture = Fixture::new();
        let catalog = crate::catalog::Catalog::from_reader(
            "product_id,name,marketing_content\n1,Aero,stale copy\n3,Cirrus,stale copy\n".as_bytes(),
            "marketing.csv",
        )
        .unwrap();
        let ctx = ToolContext {
            catalog: &catalog,
            ..fixture.ctx()
        };

        let raw = serde_json::to_string(&execute(&args("1", "3"), &ctx)).unwrap();
        assert_eq!(raw.matches("\"marketing_content\"").count(), 2);

        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["product1"]["marketing_content"], "The Aero is featherlight.");
        assert_eq!(
            value["product2"]["marketing_content"],
            "Cirrus: a workstation in a backpack."
        );
    }

    #[test]
    fn test_unavailable_catalog() {
        let fixture = Fixture::new();
        let broken = crate::catalog::Catalog::load_or_unavailable(&fixture.dir.path().join("nope.csv"));
        let ctx = ToolContext {
            catalog: &broken,
            ..fixture.ctx()
        };

        let error = execute(&args("1", "2"), &ctx).as_error().cloned().unwrap();
        assert!(error.error.starts_with("Error comparing laptops items:"));
        assert!(error.available_ids.is_none());
    }
}
