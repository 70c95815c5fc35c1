mod dialogue;
mod prompts;
mod state;

pub use state::TurnState;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::assets::ProductAssets;
use crate::catalog::Catalog;
use crate::config::ServiceConfig;
use crate::history::{HistoryEntry, HistoryStore};
use crate::ollama::ChatModel;
use crate::profiles::ProfileStore;
use crate::tools::ProductView;

/// Main service coordinator.
///
/// Owns the catalog, the product assets, the history log and the profile
/// store, and drives dialogue turns against a [`ChatModel`].
pub struct AssistantService<M> {
    config: ServiceConfig,
    catalog: Arc<Catalog>,
    assets: ProductAssets,
    history: HistoryStore,
    profiles: ProfileStore,
    model: M,
    /// Held for the whole of a turn so history entries of concurrent turns never interleave
    turn_lock: Mutex<()>,
    started_at: Instant,
}

impl<M: ChatModel> AssistantService<M> {
    pub fn new(config: ServiceConfig, catalog: Arc<Catalog>, model: M) -> Self {
        info!(
            product_type = %config.shop.product_type,
            products = catalog.len(),
            profile = %config.shop.user_profile,
            "Initializing shopping assistant service"
        );

        let assets = ProductAssets::from_config(&config);
        let history = HistoryStore::new(config.history_path(), &config.shop.product_type);
        let profiles = ProfileStore::new(config.user_profiles_dir(), config.shop.user_profile.clone());

        Self {
            config,
            catalog,
            assets,
            history,
            profiles,
            model,
            turn_lock: Mutex::new(()),
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn product_type(&self) -> &str {
        &self.config.shop.product_type
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Whether the generation backend answers
    pub async fn model_available(&self) -> bool {
        self.model.health_check().await
    }

    /// The persisted conversation, starting with the seed greeting
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.load()
    }

    /// Clear the conversation back to the seed greeting.
    ///
    /// Waits for any turn in flight so a reset never lands between its entries.
    pub async fn reset_history(&self) {
        let _turn = self.turn_lock.lock().await;
        self.history.reset();
    }

    /// Every catalog row with image availability, or the catalog load error
    pub fn products(&self) -> Result<Vec<ProductView>, String> {
        if let Some(error) = self.catalog.load_error() {
            warn!(error = %error, "Product listing requested but catalog is unavailable");
            return Err(format!(
                "Error loading {} data: {}",
                self.product_type(),
                error
            ));
        }

        Ok(self
            .catalog
            .rows()
            .iter()
            .map(|row| ProductView::new(row, &self.assets))
            .collect())
    }
}
