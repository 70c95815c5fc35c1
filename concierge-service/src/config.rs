use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

/// Service configuration, loaded once at startup.
///
/// Sources, lowest to highest precedence: built-in defaults, an optional
/// `config.{toml,yaml,json}` file in the working directory, and `CONCIERGE__*`
/// environment variables (e.g. `CONCIERGE__SHOP__PRODUCT_TYPE=phones`).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_shop")]
    pub shop: ShopConfig,

    #[serde(default = "default_ollama")]
    pub ollama: OllamaConfig,

    #[serde(default = "default_turn")]
    pub turn: TurnConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. The frontend dev server runs on :3000.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root of all persisted state: history log, per-product-type catalog
    /// directories, and user profiles.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Shop selection: which catalog is served and whose profile personalizes it
#[derive(Debug, Clone, Deserialize)]
pub struct ShopConfig {
    #[serde(default = "default_product_type")]
    pub product_type: String,

    #[serde(default = "default_user_profile")]
    pub user_profile: String,
}

/// Ollama LLM configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Turn orchestration limits
#[derive(Debug, Clone, Deserialize)]
pub struct TurnConfig {
    /// Upper bound on a single generation call within a turn
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,
}

impl TurnConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}

impl ServiceConfig {
    /// Load configuration from file and env vars
    pub fn load() -> ServiceResult<Self> {
        Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("CONCIERGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build config: {}", e),
            })?
            .try_deserialize()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to deserialize config: {}", e),
            })
    }

    /// Directory holding everything specific to the configured product type
    pub fn products_dir(&self) -> PathBuf {
        self.storage.data_dir.join(&self.shop.product_type)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.products_dir().join("catalog.csv")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.products_dir().join("images")
    }

    pub fn knowledge_dir(&self) -> PathBuf {
        self.products_dir().join("knowledge")
    }

    pub fn user_profiles_dir(&self) -> PathBuf {
        self.storage.data_dir.join("user_profiles")
    }

    pub fn history_path(&self) -> PathBuf {
        self.storage.data_dir.join("chat_history.csv")
    }

    /// Public URL prefix under which product images are served
    pub fn product_images_endpoint(&self) -> String {
        format!("/api/product-images/{}", self.shop.product_type)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            shop: default_shop(),
            ollama: default_ollama(),
            turn: default_turn(),
        }
    }
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
        cors_origins: default_cors_origins(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_shop() -> ShopConfig {
    ShopConfig {
        product_type: default_product_type(),
        user_profile: default_user_profile(),
    }
}

fn default_product_type() -> String {
    "laptops".to_string()
}

fn default_user_profile() -> String {
    "default".to_string()
}

fn default_ollama() -> OllamaConfig {
    OllamaConfig {
        base_url: default_ollama_url(),
        model: default_model(),
        temperature: default_temperature(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5:14b".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_turn() -> TurnConfig {
    TurnConfig {
        model_timeout_secs: default_model_timeout_secs(),
    }
}

fn default_model_timeout_secs() -> u64 {
    90
}
