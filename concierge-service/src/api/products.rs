//! Product listing and image endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::ollama::ChatModel;
use crate::tools::ProductView;

use super::AppState;

/// Catalog listing for the product carousel.
///
/// A catalog that failed to load is reported in the body, not as an HTTP error.
#[derive(Serialize)]
#[serde(untagged)]
pub enum ProductsResponse {
    Products {
        products: Vec<ProductView>,
        product_type: String,
    },
    Error {
        error: String,
    },
}

pub async fn products_handler<M: ChatModel>(State(state): State<Arc<AppState<M>>>) -> Json<ProductsResponse> {
    let response = match state.service.products() {
        Ok(products) => ProductsResponse::Products {
            products,
            product_type: state.service.product_type().to_string(),
        },
        Err(error) => ProductsResponse::Error { error },
    };
    Json(response)
}

/// A single path segment that cannot escape the images directory
fn safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && !segment.contains("..")
        && !segment.contains(['/', '\\', '\0'])
}

/// Serve `<data_dir>/<product_type>/images/<product_id>.jpg`
pub async fn product_image_handler<M: ChatModel>(
    State(state): State<Arc<AppState<M>>>,
    Path((product_type, product_id)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
    if !safe_segment(&product_type) || !safe_segment(&product_id) {
        warn!(product_type = %product_type, product_id = %product_id, "Rejected image path");
        return Err(ServiceError::InvalidRequest {
            message: "invalid image path".to_string(),
        });
    }

    let path = state
        .service
        .config()
        .storage
        .data_dir
        .join(&product_type)
        .join("images")
        .join(format!("{}.jpg", product_id));

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Product image not found");
            return Err(ServiceError::NotFound {
                what: format!("image for {} {}", product_type, product_id),
            });
        }
        Err(e) => return Err(ServiceError::Io(e)),
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime::IMAGE_JPEG.essence_str()),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{app, json_body, send};
    use crate::service::tests::{ScriptedModel, data_dir};
    use serde_json::json;

    #[tokio::test]
    async fn test_products_listing() {
        let dir = data_dir();
        let (status, response) = send(app(dir.path(), ScriptedModel::new([])), "GET", "/products", None).await;
        assert_eq!(status, StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["product_type"], "laptops");
        let products = body["products"].as_array().unwrap();
        assert_eq!(products.len(), 4);
        assert_eq!(products[0]["product_id"], "1");
        assert_eq!(products[0]["has_image"], true);
        assert_eq!(products[0]["image_url"], "/api/product-images/laptops/1");
        assert_eq!(products[1]["image_url"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_products_without_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let (status, response) = send(app(dir.path(), ScriptedModel::new([])), "GET", "/products", None).await;
        assert_eq!(status, StatusCode::OK);

        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Error loading laptops data:"));
        assert!(body.get("products").is_none());
    }

    #[tokio::test]
    async fn test_serves_image() {
        let dir = data_dir();
        let (status, response) = send(
            app(dir.path(), ScriptedModel::new([])),
            "GET",
            "/api/product-images/laptops/1",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=3600");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"\xff\xd8\xff");
    }

    #[tokio::test]
    async fn test_missing_image() {
        let dir = data_dir();
        let (status, response) = send(
            app(dir.path(), ScriptedModel::new([])),
            "GET",
            "/api/product-images/laptops/2",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], json!("not_found"));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = data_dir();
        let (status, _) = send(
            app(dir.path(), ScriptedModel::new([])),
            "GET",
            "/api/product-images/laptops/..%2F..%2Fsecret",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_safe_segment() {
        assert!(safe_segment("laptops"));
        assert!(safe_segment("12"));
        assert!(!safe_segment(""));
        assert!(!safe_segment(".."));
        assert!(!safe_segment("a/b"));
        assert!(!safe_segment("a\\b"));
    }
}
