//! In-memory product catalog.
//!
//! The catalog is read once at startup from a CSV file with a mandatory
//! `product_id` column and any number of other columns. It is immutable for
//! the lifetime of the process and shared by `Arc`.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::CatalogError;

/// Column that uniquely identifies a product
pub const PRODUCT_ID_COLUMN: &str = "product_id";

/// One product record, fields in header order
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    product_id: String,
    fields: Vec<(String, String)>,
}

impl CatalogRow {
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Value of a column, if the row has one
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Display name of the product (the `name` column)
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// One-line prompt rendering: `ID: <id>, <col>: <value>, ...`
    pub fn summary_line(&self) -> String {
        let mut parts = vec![format!("ID: {}", self.product_id)];
        parts.extend(
            self.fields()
                .filter(|(name, _)| *name != PRODUCT_ID_COLUMN)
                .map(|(name, value)| format!("{}: {}", name, value)),
        );
        parts.join(", ")
    }
}

impl Serialize for CatalogRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The product catalog
#[derive(Debug, Default)]
pub struct Catalog {
    rows: Vec<CatalogRow>,
    index: HashMap<String, usize>,
    /// Why the catalog is empty, when loading failed
    load_error: Option<String>,
}

impl Catalog {
    /// Load the catalog from a CSV file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|source| CatalogError::Open {
                path: path.display().to_string(),
                source,
            })?;

        let catalog = Self::from_csv(reader, &path.display().to_string())?;
        info!(
            path = %path.display(),
            products = catalog.len(),
            "Product catalog loaded"
        );
        Ok(catalog)
    }

    /// Load the catalog, falling back to an empty catalog that remembers why.
    ///
    /// A broken catalog must not keep the service from starting; tools report
    /// the stored error instead.
    pub fn load_or_unavailable(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                let message = crate::error::format_error_chain(&e);
                tracing::error!(error = %message, "Product catalog unavailable");
                Self {
                    load_error: Some(message),
                    ..Self::default()
                }
            }
        }
    }

    /// Parse a catalog from any CSV source
    #[cfg(test)]
    pub fn from_reader<R: Read>(source: R, name: &str) -> Result<Self, CatalogError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
        Self::from_csv(reader, name)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>, name: &str) -> Result<Self, CatalogError> {
        let headers = reader
            .headers()
            .map_err(|source| CatalogError::Open {
                path: name.to_string(),
                source,
            })?
            .clone();

        let id_column = headers
            .iter()
            .position(|h| h == PRODUCT_ID_COLUMN)
            .ok_or_else(|| CatalogError::MissingIdColumn {
                path: name.to_string(),
            })?;

        let mut rows = Vec::new();
        let mut index = HashMap::new();

        for record in reader.records() {
            let record = record.map_err(|source| CatalogError::Parse {
                line: source.position().map(|p| p.line()).unwrap_or(0),
                source,
            })?;

            let Some(product_id) = record.get(id_column).map(str::to_string) else {
                warn!(line = ?record.position().map(|p| p.line()), "Catalog row without product_id, skipping");
                continue;
            };

            if index.contains_key(&product_id) {
                warn!(product_id = %product_id, "Duplicate product_id in catalog, keeping first");
                continue;
            }

            // Short rows simply lack the trailing columns
            let fields = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect();

            index.insert(product_id.clone(), rows.len());
            rows.push(CatalogRow { product_id, fields });
        }

        Ok(Self {
            rows,
            index,
            load_error: None,
        })
    }

    pub fn get(&self, product_id: &str) -> Option<&CatalogRow> {
        self.index.get(product_id).map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    /// All product ids in catalog order
    pub fn ids(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.product_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The load failure, if the catalog could not be read at startup
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Catalog rendered for the model, one line per product
    pub fn summary(&self) -> String {
        if let Some(error) = &self.load_error {
            return format!("Error loading catalog data: {}", error);
        }
        self.rows
            .iter()
            .map(CatalogRow::summary_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const LAPTOPS_CSV: &str = "\
product_id,name,price,ram_gb,storage_gb,screen_size_inches
1,Aero 14,\"$1,299.00\",16,512,14
2,Bolt 15,$999,8,256,15.6
3,Cirrus 13,$1499,32,1024,13.3
4,Drift 16,call us,16,n/a,16
";

    pub(crate) fn laptops() -> Catalog {
        Catalog::from_reader(LAPTOPS_CSV.as_bytes(), "laptops.csv").unwrap()
    }

    #[test]
    fn test_lookup_and_order() {
        let catalog = laptops();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.ids(), vec!["1", "2", "3", "4"]);

        let row = catalog.get("1").unwrap();
        assert_eq!(row.name(), Some("Aero 14"));
        assert_eq!(row.get("price"), Some("$1,299.00"));
        assert!(catalog.get("99").is_none());
    }

    #[test]
    fn test_summary_lists_all_columns() {
        let catalog = laptops();
        let summary = catalog.summary();
        let first = summary.lines().next().unwrap();
        assert_eq!(
            first,
            "ID: 1, name: Aero 14, price: $1,299.00, ram_gb: 16, storage_gb: 512, screen_size_inches: 14"
        );
        assert_eq!(summary.lines().count(), 4);
    }

    #[test]
    fn test_missing_product_id_column() {
        let err = Catalog::from_reader("name,price\nA,1\n".as_bytes(), "bad.csv").unwrap_err();
        assert!(matches!(err, CatalogError::MissingIdColumn { .. }));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let csv = "product_id,name\n1,First\n1,Second\n2,Other\n";
        let catalog = Catalog::from_reader(csv.as_bytes(), "dup.csv").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("1").unwrap().name(), Some("First"));
    }

    #[test]
    fn test_short_rows_tolerated() {
        let csv = "product_id,name,price\n1,Only name\n";
        let catalog = Catalog::from_reader(csv.as_bytes(), "short.csv").unwrap();
        let row = catalog.get("1").unwrap();
        assert_eq!(row.name(), Some("Only name"));
        assert_eq!(row.get("price"), None);
    }

    #[test]
    fn test_row_serializes_as_map() {
        let catalog = laptops();
        let value = serde_json::to_value(catalog.get("2").unwrap()).unwrap();
        assert_eq!(value["product_id"], "2");
        assert_eq!(value["name"], "Bolt 15");
        assert_eq!(value["ram_gb"], "8");
    }

    #[test]
    fn test_unavailable_catalog_remembers_error() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load_or_unavailable(&dir.path().join("missing.csv"));
        assert!(catalog.is_empty());
        assert!(catalog.load_error().is_some());
        assert!(catalog.summary().starts_with("Error loading catalog data"));
    }
}
