use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::runs::LookupService;
use crate::store::users::UserStore;
use crate::store::RunStore;

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<LookupService>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, runs: Arc<dyn RunStore>, users: Arc<dyn UserStore>) -> Self {
        Self {
            lookup: Arc::new(LookupService::new(runs)),
            users,
            tokens: Arc::new(TokenService::from_config(&config.auth)),
            config: Arc::new(config),
        }
    }

    pub fn runs(&self) -> &Arc<dyn RunStore> {
        self.lookup.store()
    }
}
