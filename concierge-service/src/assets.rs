//! Per-product file resources: images and marketing copy.

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::ServiceConfig;

/// Locates product images and marketing content on disk
#[derive(Debug, Clone)]
pub struct ProductAssets {
    images_dir: PathBuf,
    knowledge_dir: PathBuf,
    images_endpoint: String,
}

impl ProductAssets {
    pub fn new(
        images_dir: impl Into<PathBuf>,
        knowledge_dir: impl Into<PathBuf>,
        images_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            images_dir: images_dir.into(),
            knowledge_dir: knowledge_dir.into(),
            images_endpoint: images_endpoint.into(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.images_dir(),
            config.knowledge_dir(),
            config.product_images_endpoint(),
        )
    }

    pub fn image_path(&self, product_id: &str) -> PathBuf {
        self.images_dir.join(format!("{}.jpg", product_id))
    }

    pub fn has_image(&self, product_id: &str) -> bool {
        self.image_path(product_id).is_file()
    }

    /// Public URL for the product image, or `None` when there is no image
    pub fn image_url(&self, product_id: &str) -> Option<String> {
        self.has_image(product_id)
            .then(|| format!("{}/{}", self.images_endpoint, product_id))
    }

    /// Marketing copy for a product, if a knowledge file exists and is readable
    pub fn marketing_content(&self, product_id: &str) -> Option<String> {
        let path = self.knowledge_dir.join(format!("{}.txt", product_id));
        read_optional_text(&path)
    }
}

fn read_optional_text(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read marketing content");
            None
        }
    }
}
