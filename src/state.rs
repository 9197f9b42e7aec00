//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds process-wide pieces only: config, the tenant resolver, the auth
//! client and the settings service with its shared cache. Per-user session
//! state is never stored here; each request builds its own
//! `SessionAuthority` from the request cookies.

use std::sync::Arc;

use crate::config::PortalConfig;
use crate::services::api::{AuthApi, SettingsApi};
use crate::services::auth::AuthClient;
use crate::services::cache::TtlCache;
use crate::services::settings::SettingsService;
use crate::tenant::{RequestOrigin, TenantResolver};

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub tenants: TenantResolver,
    pub auth: AuthClient,
    pub settings: SettingsService,
}

impl AppState {
    #[must_use]
    pub fn new(config: PortalConfig, auth_api: Arc<dyn AuthApi>, settings_api: Arc<dyn SettingsApi>) -> Self {
        let tenants = TenantResolver::new(config.base_domain_labels);
        Self {
            config: Arc::new(config),
            tenants,
            auth: AuthClient::new(auth_api),
            settings: SettingsService::new(settings_api, TtlCache::default()),
        }
    }

    /// Whether cookies set for a request with this origin get `Secure`.
    #[must_use]
    pub fn cookie_secure(&self, origin: Option<&RequestOrigin>) -> bool {
        self.config
            .cookie_secure
            .unwrap_or_else(|| origin.map_or(self.config.default_scheme() == "https", RequestOrigin::is_https))
    }
}


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
