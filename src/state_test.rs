use std::sync::Arc;

use super::test_helpers::{test_app_state, test_config};
use super::*;
use crate::services::auth::test_helpers::MockAuthApi;
use crate::services::settings::test_helpers::MockSettingsApi;

fn state_with(cookie_secure: Option<bool>, public_origin: &str) -> AppState {
    let config = PortalConfig { cookie_secure, public_origin: public_origin.into(), ..test_config() };
    AppState::new(config, Arc::new(MockAuthApi::default()), Arc::new(MockSettingsApi::default()))
}

#[test]
fn resolver_uses_configured_label_count() {
    let state = test_app_state(Arc::new(MockAuthApi::default()), Arc::new(MockSettingsApi::default()));
    assert_eq!(state.tenants.base_domain_labels(), 2);
}

#[test]
fn explicit_cookie_secure_wins() {
    let state = state_with(Some(false), "https://example.uz");
    let origin = RequestOrigin::new("https", "ali.example.uz");
    assert!(!state.cookie_secure(Some(&origin)));
}

#[test]
fn cookie_secure_follows_request_scheme() {
    let state = state_with(None, "http://localhost:3000");
    assert!(state.cookie_secure(Some(&RequestOrigin::new("https", "example.uz"))));
    assert!(!state.cookie_secure(Some(&RequestOrigin::new("http", "localhost:3000"))));
}

#[test]
fn cookie_secure_without_origin_uses_public_origin() {
    assert!(state_with(None, "https://example.uz").cookie_secure(None));
    assert!(!state_with(None, "http://localhost:3000").cookie_secure(None));
}

#[test]
fn clones_share_settings_cache() {
    let state = test_app_state(Arc::new(MockAuthApi::default()), Arc::new(MockSettingsApi::default()));
    let other = state.clone();
    state.settings.cache().set("platform-settings", serde_json::json!({}));
    assert_eq!(other.settings.cache().len(), 1);
}
