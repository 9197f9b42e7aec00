//! Settings service — cached reads and invalidating writes over `SettingsApi`.
//!
//! INVALIDATION
//! ============
//! Every mutation invalidates each cache key it could have made stale, and
//! does so whether or not the remote call succeeded: a failed or timed-out
//! write may still have landed upstream.
//!
//! | mutation              | invalidates                              |
//! |-----------------------|------------------------------------------|
//! | platform settings     | `platform-settings`, `teachers:`         |
//! | teacher settings (id) | `teacher-settings:{id}`, `teachers:`     |

use std::sync::Arc;

use serde_json::Value;

use super::api::{ApiError, SettingsApi, TeacherListParams};
use super::cache::{TtlCache, cache_key};

pub const PLATFORM_SETTINGS_KEY: &str = "platform-settings";
pub const TEACHER_SETTINGS_PREFIX: &str = "teacher-settings";
pub const TEACHER_LIST_PREFIX: &str = "teachers";

#[must_use]
pub fn teacher_settings_key(teacher_id: i64) -> String {
    format!("{TEACHER_SETTINGS_PREFIX}:{teacher_id}")
}

#[derive(Clone)]
pub struct SettingsService {
    api: Arc<dyn SettingsApi>,
    cache: TtlCache<Value>,
}

impl SettingsService {
    #[must_use]
    pub fn new(api: Arc<dyn SettingsApi>, cache: TtlCache<Value>) -> Self {
        Self { api, cache }
    }

    #[cfg(test)]
    #[must_use]
    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    /// # Errors
    ///
    /// API failures propagate; nothing is cached on error.
    pub async fn platform_settings(&self, access_token: &str) -> Result<Value, ApiError> {
        if let Some(hit) = self.cache.get(PLATFORM_SETTINGS_KEY) {
            return Ok(hit);
        }
        let fresh = self.api.platform_settings(access_token).await?;
        self.cache.set(PLATFORM_SETTINGS_KEY, fresh.clone());
        Ok(fresh)
    }

    /// # Errors
    ///
    /// API failures propagate after invalidation.
    pub async fn update_platform_settings(&self, access_token: &str, patch: &Value) -> Result<Value, ApiError> {
        let result = self.api.update_platform_settings(access_token, patch).await;
        self.cache.invalidate(PLATFORM_SETTINGS_KEY);
        self.invalidate_listings();
        result
    }

    /// # Errors
    ///
    /// API failures propagate; nothing is cached on error.
    pub async fn teacher_settings(&self, access_token: &str, teacher_id: i64) -> Result<Value, ApiError> {
        let key = teacher_settings_key(teacher_id);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let fresh = self.api.teacher_settings(access_token, teacher_id).await?;
        self.cache.set(key, fresh.clone());
        Ok(fresh)
    }

    /// # Errors
    ///
    /// API failures propagate after invalidation.
    pub async fn update_teacher_settings(
        &self,
        access_token: &str,
        teacher_id: i64,
        patch: &Value,
    ) -> Result<Value, ApiError> {
        let result = self
            .api
            .update_teacher_settings(access_token, teacher_id, patch)
            .await;
        // `teacher-settings:4` as a prefix would also drop `:42`; that only
        // costs an extra fetch.
        let dropped = self.cache.invalidate(&teacher_settings_key(teacher_id)) + self.invalidate_listings();
        tracing::debug!(teacher_id, dropped, "teacher settings cache invalidated");
        result
    }

    /// # Errors
    ///
    /// API failures propagate; nothing is cached on error.
    pub async fn list_teachers(&self, access_token: &str, params: &TeacherListParams) -> Result<Value, ApiError> {
        let key = cache_key(TEACHER_LIST_PREFIX, params);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let fresh = self.api.list_teachers(access_token, params).await?;
        self.cache.set(key, fresh.clone());
        Ok(fresh)
    }

    fn invalidate_listings(&self) -> usize {
        self.cache.invalidate(&format!("{TEACHER_LIST_PREFIX}:"))
    }
}


#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
