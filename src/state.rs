use std::sync::Arc;

use crate::auth::{jwt::JwtKeys, repo::UserStore};
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::inventory::{repo::CatalogStore, services::InventoryService};
use crate::memory::MemoryStore;
use crate::purchases::{
    repo::PurchaseLedger,
    services::{Checkout, PurchaseRecorder},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub inventory: InventoryService,
    pub purchases: PurchaseRecorder,
    pub checkout: Checkout,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn from_parts(
        config: Arc<AppConfig>,
        catalog: Arc<dyn CatalogStore>,
        ledger: Arc<dyn PurchaseLedger>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        let inventory = InventoryService::new(catalog);
        let purchases = PurchaseRecorder::new(ledger);
        let checkout = Checkout::new(inventory.clone(), purchases.clone());
        Self {
            jwt: JwtKeys::from_config(&config.jwt),
            config,
            inventory,
            purchases,
            checkout,
            users,
        }
    }

    pub fn postgres(config: Arc<AppConfig>, store: PgStore) -> Self {
        let store = Arc::new(store);
        Self::from_parts(config, store.clone(), store.clone(), store)
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(config, store.clone(), store.clone(), store)
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, StoreBackend};

        let config = Arc::new(AppConfig {
            backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: Vec::new(),
            admin: None,
        });
        Self::in_memory(config)
    }
}
